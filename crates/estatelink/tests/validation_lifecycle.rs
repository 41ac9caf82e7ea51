//! Integration specifications for the validation lifecycle: reminder and
//! expiry sweeps, token confirmation, and owner reactivation, driven through
//! the public service facade with in-memory collaborators.

mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use common::{
    at, buy_requirement, house_listing, premium_user, MemoryListings, MemoryNotifications,
    MemoryRequirements, MemoryUsers, RecordingMailer,
};
use estatelink::config::ValidationConfig;
use estatelink::domain::{EntityKind, NotificationKind, UserId};
use estatelink::store::{GuardedUpdate, StoreError, ValidationPatch, ValidationStore};
use estatelink::notify::{BuiltinCatalog, Notifier};
use estatelink::validation::{ValidationError, ValidationLifecycle};

struct Harness {
    listings: Arc<MemoryListings>,
    notifications: Arc<MemoryNotifications>,
    mailer: Arc<RecordingMailer>,
    lifecycle: ValidationLifecycle<MemoryListings>,
}

fn harness() -> Harness {
    let listings = Arc::new(MemoryListings::default());
    let users = Arc::new(MemoryUsers::default());
    users.seed([premium_user("owner-1"), premium_user("owner-2")]);
    let notifications = Arc::new(MemoryNotifications::default());
    let mailer = Arc::new(RecordingMailer::default());

    let notifier = Notifier::new(users, notifications.clone(), Arc::new(BuiltinCatalog))
        .with_mailer(mailer.clone());
    let lifecycle =
        ValidationLifecycle::new(listings.clone(), notifier, ValidationConfig::default());

    Harness {
        listings,
        notifications,
        mailer,
        lifecycle,
    }
}

fn stale_listing(id: &str, owner: &str, now: DateTime<Utc>) -> estatelink::domain::Listing {
    let mut listing = house_listing(id, owner);
    listing.validation.last_validated = Some(now - Duration::days(10));
    listing.validation.last_reminder = Some(now - Duration::days(10));
    listing
}

#[test]
fn reminder_sweep_issues_tokens_and_notifies() {
    let h = harness();
    let now = at(10, 9);
    h.listings.seed([stale_listing("lst-1", "owner-1", now)]);

    let report = h.lifecycle.run_reminder_sweep(now).expect("sweep runs");
    assert_eq!(report.attempted, 1);
    assert_eq!(report.completed, 1);
    assert!(report.failures.is_empty());

    let listing = h.listings.get("lst-1").expect("listing exists");
    let token = listing.validation.token.clone().expect("token issued");
    assert_eq!(token.len(), 32);
    assert_eq!(listing.validation.expires, Some(now + Duration::hours(24)));
    assert_eq!(listing.validation.last_reminder, Some(now));
    assert!(!listing.validation.response_received);

    let notices = h.notifications.for_user("owner-1");
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NotificationKind::ValidationReminder);

    let emails = h.mailer.reminders();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].token, token);
    assert_eq!(emails[0].entity_kind, EntityKind::Listing);
}

#[test]
fn fresh_entities_are_left_alone() {
    let h = harness();
    let now = at(10, 9);
    let mut fresh = house_listing("lst-1", "owner-1");
    fresh.validation.last_validated = Some(now - Duration::days(2));
    fresh.validation.last_reminder = Some(now - Duration::days(2));
    h.listings.seed([fresh]);

    let report = h.lifecycle.run_reminder_sweep(now).expect("sweep runs");
    assert_eq!(report.attempted, 0);
    assert!(h.listings.get("lst-1").expect("exists").validation.token.is_none());
}

#[test]
fn unconfirmed_reminder_expires_into_deactivation() {
    // Reminder at day 10, no confirmation, expiry pass 25 hours later.
    let h = harness();
    let now = at(10, 9);
    h.listings.seed([stale_listing("lst-1", "owner-1", now)]);
    h.lifecycle.run_reminder_sweep(now).expect("reminder sweep");

    let later = now + Duration::hours(25);
    let report = h.lifecycle.run_expiry_sweep(later).expect("expiry sweep");
    assert_eq!(report.completed, 1);

    let listing = h.listings.get("lst-1").expect("listing exists");
    assert!(!listing.is_active);
    assert!(listing.validation.token.is_none());
    assert!(listing.validation.expires.is_none());

    let kinds: Vec<NotificationKind> = h
        .notifications
        .for_user("owner-1")
        .iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ValidationReminder,
            NotificationKind::ListingDeactivated
        ]
    );
}

#[test]
fn expiry_sweep_spares_unexpired_tokens() {
    let h = harness();
    let now = at(10, 9);
    h.listings.seed([stale_listing("lst-1", "owner-1", now)]);
    h.lifecycle.run_reminder_sweep(now).expect("reminder sweep");

    let report = h
        .lifecycle
        .run_expiry_sweep(now + Duration::hours(23))
        .expect("expiry sweep");
    assert_eq!(report.attempted, 0);
    assert!(h.listings.get("lst-1").expect("exists").is_active);
}

#[test]
fn confirm_within_window_refreshes_and_clears_token() {
    let h = harness();
    let now = at(10, 9);
    h.listings.seed([stale_listing("lst-1", "owner-1", now)]);
    h.lifecycle.run_reminder_sweep(now).expect("reminder sweep");
    let token = h
        .listings
        .get("lst-1")
        .and_then(|l| l.validation.token)
        .expect("token issued");

    let confirm_at = now + Duration::hours(3);
    let confirmed = h.lifecycle.confirm(&token, confirm_at).expect("confirms");
    assert!(confirmed.is_active);
    assert_eq!(confirmed.validation.last_validated, Some(confirm_at));
    assert!(confirmed.validation.response_received);
    assert!(confirmed.validation.token.is_none());

    // A later expiry pass has nothing left to deactivate.
    let report = h
        .lifecycle
        .run_expiry_sweep(now + Duration::hours(25))
        .expect("expiry sweep");
    assert_eq!(report.attempted, 0);
    assert!(h.listings.get("lst-1").expect("exists").is_active);

    let kinds: Vec<NotificationKind> = h
        .notifications
        .for_user("owner-1")
        .iter()
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&NotificationKind::ValidationConfirmed));
}

#[test]
fn confirm_after_window_reports_expired_and_writes_nothing() {
    let h = harness();
    let now = at(10, 9);
    h.listings.seed([stale_listing("lst-1", "owner-1", now)]);
    h.lifecycle.run_reminder_sweep(now).expect("reminder sweep");
    let token = h
        .listings
        .get("lst-1")
        .and_then(|l| l.validation.token)
        .expect("token issued");

    let err = h
        .lifecycle
        .confirm(&token, now + Duration::hours(30))
        .expect_err("expired token rejected");
    assert!(matches!(err, ValidationError::TokenExpired));

    let listing = h.listings.get("lst-1").expect("exists");
    assert!(!listing.validation.response_received);
    assert_eq!(listing.validation.token, Some(token));
}

#[test]
fn confirm_with_unknown_token_reports_not_found() {
    let h = harness();
    let err = h
        .lifecycle
        .confirm("nosuchtoken", at(10, 9))
        .expect_err("unknown token rejected");
    assert!(matches!(err, ValidationError::TokenNotFound));
}

#[test]
fn deactivation_is_reversible_by_the_owner() {
    let h = harness();
    let now = at(10, 9);
    h.listings.seed([stale_listing("lst-1", "owner-1", now)]);
    h.lifecycle.run_reminder_sweep(now).expect("reminder sweep");
    h.lifecycle
        .run_expiry_sweep(now + Duration::hours(25))
        .expect("expiry sweep");
    assert!(!h.listings.get("lst-1").expect("exists").is_active);

    let owner = UserId("owner-1".to_string());
    let revived_at = now + Duration::days(3);
    let revived = h
        .lifecycle
        .reactivate("lst-1", &owner, revived_at)
        .expect("owner reactivates");
    assert!(revived.is_active);
    assert_eq!(revived.validation.last_validated, Some(revived_at));
    assert!(revived.validation.token.is_none());
    assert!(revived.validation.expires.is_none());
}

#[test]
fn reactivate_rejects_non_owners_and_unknown_ids() {
    let h = harness();
    h.listings.seed([house_listing("lst-1", "owner-1")]);

    let stranger = UserId("owner-2".to_string());
    let err = h
        .lifecycle
        .reactivate("lst-1", &stranger, at(10, 9))
        .expect_err("stranger rejected");
    assert!(matches!(err, ValidationError::NotOwner));

    let owner = UserId("owner-1".to_string());
    let err = h
        .lifecycle
        .reactivate("lst-missing", &owner, at(10, 9))
        .expect_err("unknown id rejected");
    assert!(matches!(err, ValidationError::NotFound));
}

#[test]
fn email_failures_never_block_the_state_transition() {
    let listings = Arc::new(MemoryListings::default());
    let users = Arc::new(MemoryUsers::default());
    users.seed([premium_user("owner-1")]);
    let notifications = Arc::new(MemoryNotifications::default());
    let mailer = Arc::new(RecordingMailer::failing());

    let notifier = Notifier::new(users, notifications.clone(), Arc::new(BuiltinCatalog))
        .with_mailer(mailer);
    let lifecycle =
        ValidationLifecycle::new(listings.clone(), notifier, ValidationConfig::default());

    let now = at(10, 9);
    listings.seed([stale_listing("lst-1", "owner-1", now)]);

    let report = lifecycle.run_reminder_sweep(now).expect("sweep runs");
    assert_eq!(report.completed, 1);
    assert!(report.failures.is_empty());
    // Token issued and notification written even though every email bounced.
    assert!(listings.get("lst-1").expect("exists").validation.token.is_some());
    assert_eq!(notifications.for_user("owner-1").len(), 1);
}

#[test]
fn requirements_run_the_same_machine() {
    let requirements = Arc::new(MemoryRequirements::default());
    let users = Arc::new(MemoryUsers::default());
    users.seed([premium_user("buyer-1")]);
    let notifications = Arc::new(MemoryNotifications::default());

    let notifier = Notifier::new(users, notifications.clone(), Arc::new(BuiltinCatalog));
    let lifecycle =
        ValidationLifecycle::new(requirements.clone(), notifier, ValidationConfig::default());

    let now = at(10, 9);
    let mut requirement = buy_requirement("req-1", "buyer-1");
    requirement.validation.last_validated = Some(now - Duration::days(8));
    requirement.validation.last_reminder = Some(now - Duration::days(8));
    requirements.seed([requirement]);

    lifecycle.run_reminder_sweep(now).expect("reminder sweep");
    lifecycle
        .run_expiry_sweep(now + Duration::hours(25))
        .expect("expiry sweep");

    let stored = requirements.get("req-1").expect("exists");
    assert!(!stored.is_active);
    let kinds: Vec<NotificationKind> = notifications
        .for_user("buyer-1")
        .iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ValidationReminder,
            NotificationKind::RequirementDeactivated
        ]
    );
}

/// Store wrapper that loses every token race, as if the expiry sweep resolved
/// the token first.
struct RacingStore {
    inner: Arc<MemoryListings>,
}

impl ValidationStore for RacingStore {
    type Entity = estatelink::domain::Listing;

    fn needing_validation(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Self::Entity>, StoreError> {
        self.inner.needing_validation(cutoff)
    }

    fn with_expired_validation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self::Entity>, StoreError> {
        self.inner.with_expired_validation(now)
    }

    fn by_validation_token(&self, token: &str) -> Result<Option<Self::Entity>, StoreError> {
        self.inner.by_validation_token(token)
    }

    fn by_entity_id(&self, id: &str) -> Result<Option<Self::Entity>, StoreError> {
        self.inner.by_entity_id(id)
    }

    fn update(&self, entity: &Self::Entity) -> Result<(), StoreError> {
        self.inner.update(entity)
    }

    fn resolve_token(
        &self,
        _id: &str,
        _expected: &str,
        _patch: ValidationPatch,
    ) -> Result<GuardedUpdate<Self::Entity>, StoreError> {
        Ok(GuardedUpdate::StaleToken)
    }
}

#[test]
fn losing_the_token_race_reads_as_expired() {
    let inner = Arc::new(MemoryListings::default());
    let users = Arc::new(MemoryUsers::default());
    users.seed([premium_user("owner-1")]);
    let notifications = Arc::new(MemoryNotifications::default());

    let now = at(10, 9);
    let mut listing = house_listing("lst-1", "owner-1");
    listing.validation.token = Some("racetoken0000000000000000000000x".to_string());
    listing.validation.expires = Some(now + Duration::hours(12));
    inner.seed([listing]);

    let notifier = Notifier::new(users, notifications.clone(), Arc::new(BuiltinCatalog));
    let lifecycle = ValidationLifecycle::new(
        Arc::new(RacingStore { inner }),
        notifier,
        ValidationConfig::default(),
    );

    let err = lifecycle
        .confirm("racetoken0000000000000000000000x", now + Duration::hours(1))
        .expect_err("lost race reads as expired");
    assert!(matches!(err, ValidationError::TokenExpired));
    assert!(notifications.all().is_empty());
}
