//! In-memory collaborator implementations backing the demo deployment. The
//! production deployment swaps these for the relational store, the account
//! service, and the SMTP relay behind the same traits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use estatelink::domain::{
    Listing, ListingId, NewNotification, Notification, NotificationId, Requirement, RequirementId,
    User, UserId, ValidatedEntity,
};
use estatelink::store::{
    DailyDigestEmail, GuardedUpdate, InstantMatchEmail, ListingStore, MailError, Mailer,
    NotificationSink, RequirementStore, StoreError, UserDirectory, ValidationPatch,
    ValidationReminderEmail, ValidationStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn apply_patch<E: ValidatedEntity>(entity: &mut E, patch: &ValidationPatch) {
    if let Some(active) = patch.is_active {
        entity.set_active(active);
    }
    let validation = entity.validation_mut();
    if let Some(validated) = patch.last_validated {
        validation.last_validated = Some(validated);
    }
    if let Some(received) = patch.response_received {
        validation.response_received = received;
    }
    validation.clear_token();
}

#[derive(Default)]
pub(crate) struct InMemoryListings {
    records: Mutex<BTreeMap<ListingId, Listing>>,
}

impl InMemoryListings {
    pub(crate) fn insert(&self, listing: Listing) -> Result<Listing, StoreError> {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        if guard.contains_key(&listing.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    pub(crate) fn upsert(&self, listing: Listing) {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        guard.insert(listing.id.clone(), listing);
    }

    pub(crate) fn owned_by(&self, owner: &UserId) -> Vec<Listing> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        guard
            .values()
            .filter(|l| &l.owner == owner)
            .cloned()
            .collect()
    }
}

impl ValidationStore for InMemoryListings {
    type Entity = Listing;

    fn needing_validation(&self, cutoff: DateTime<Utc>) -> Result<Vec<Listing>, StoreError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard
            .values()
            .filter(|l| l.is_active && l.validation.is_stale(cutoff))
            .cloned()
            .collect())
    }

    fn with_expired_validation(&self, now: DateTime<Utc>) -> Result<Vec<Listing>, StoreError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard
            .values()
            .filter(|l| {
                l.is_active
                    && !l.validation.response_received
                    && l.validation.expires.map_or(false, |expires| expires < now)
            })
            .cloned()
            .collect())
    }

    fn by_validation_token(&self, token: &str) -> Result<Option<Listing>, StoreError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard
            .values()
            .find(|l| l.validation.token.as_deref() == Some(token))
            .cloned())
    }

    fn by_entity_id(&self, id: &str) -> Result<Option<Listing>, StoreError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard.get(&ListingId(id.to_string())).cloned())
    }

    fn update(&self, entity: &Listing) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        if guard.contains_key(&entity.id) {
            guard.insert(entity.id.clone(), entity.clone());
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn resolve_token(
        &self,
        id: &str,
        expected: &str,
        patch: ValidationPatch,
    ) -> Result<GuardedUpdate<Listing>, StoreError> {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        let record = guard
            .get_mut(&ListingId(id.to_string()))
            .ok_or(StoreError::NotFound)?;
        if record.validation.token.as_deref() != Some(expected) {
            return Ok(GuardedUpdate::StaleToken);
        }
        apply_patch(record, &patch);
        Ok(GuardedUpdate::Applied(record.clone()))
    }
}

impl ListingStore for InMemoryListings {
    fn active_listings(&self) -> Result<Vec<Listing>, StoreError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard.values().filter(|l| l.is_active).cloned().collect())
    }

    fn listings_created_after(&self, cutoff: DateTime<Utc>) -> Result<Vec<Listing>, StoreError> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        Ok(guard
            .values()
            .filter(|l| l.created_at > cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRequirements {
    records: Mutex<BTreeMap<RequirementId, Requirement>>,
}

impl InMemoryRequirements {
    pub(crate) fn insert(&self, requirement: Requirement) -> Result<Requirement, StoreError> {
        let mut guard = self.records.lock().expect("requirement mutex poisoned");
        if guard.contains_key(&requirement.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(requirement.id.clone(), requirement.clone());
        Ok(requirement)
    }

    pub(crate) fn upsert(&self, requirement: Requirement) {
        let mut guard = self.records.lock().expect("requirement mutex poisoned");
        guard.insert(requirement.id.clone(), requirement);
    }

    pub(crate) fn owned_by(&self, buyer: &UserId) -> Vec<Requirement> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        guard
            .values()
            .filter(|r| &r.buyer == buyer)
            .cloned()
            .collect()
    }
}

impl ValidationStore for InMemoryRequirements {
    type Entity = Requirement;

    fn needing_validation(&self, cutoff: DateTime<Utc>) -> Result<Vec<Requirement>, StoreError> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        Ok(guard
            .values()
            .filter(|r| r.is_active && r.validation.is_stale(cutoff))
            .cloned()
            .collect())
    }

    fn with_expired_validation(&self, now: DateTime<Utc>) -> Result<Vec<Requirement>, StoreError> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        Ok(guard
            .values()
            .filter(|r| {
                r.is_active
                    && !r.validation.response_received
                    && r.validation.expires.map_or(false, |expires| expires < now)
            })
            .cloned()
            .collect())
    }

    fn by_validation_token(&self, token: &str) -> Result<Option<Requirement>, StoreError> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        Ok(guard
            .values()
            .find(|r| r.validation.token.as_deref() == Some(token))
            .cloned())
    }

    fn by_entity_id(&self, id: &str) -> Result<Option<Requirement>, StoreError> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        Ok(guard.get(&RequirementId(id.to_string())).cloned())
    }

    fn update(&self, entity: &Requirement) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("requirement mutex poisoned");
        if guard.contains_key(&entity.id) {
            guard.insert(entity.id.clone(), entity.clone());
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn resolve_token(
        &self,
        id: &str,
        expected: &str,
        patch: ValidationPatch,
    ) -> Result<GuardedUpdate<Requirement>, StoreError> {
        let mut guard = self.records.lock().expect("requirement mutex poisoned");
        let record = guard
            .get_mut(&RequirementId(id.to_string()))
            .ok_or(StoreError::NotFound)?;
        if record.validation.token.as_deref() != Some(expected) {
            return Ok(GuardedUpdate::StaleToken);
        }
        apply_patch(record, &patch);
        Ok(GuardedUpdate::Applied(record.clone()))
    }
}

impl RequirementStore for InMemoryRequirements {
    fn active_requirements(&self) -> Result<Vec<Requirement>, StoreError> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        Ok(guard.values().filter(|r| r.is_active).cloned().collect())
    }

    fn requirements_created_after(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Requirement>, StoreError> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        Ok(guard
            .values()
            .filter(|r| r.created_at > cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryUsers {
    users: Mutex<BTreeMap<UserId, User>>,
}

impl InMemoryUsers {
    pub(crate) fn seed(&self, users: impl IntoIterator<Item = User>) {
        let mut guard = self.users.lock().expect("user mutex poisoned");
        for user in users {
            guard.insert(user.id.clone(), user);
        }
    }
}

impl UserDirectory for InMemoryUsers {
    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let guard = self.users.lock().expect("user mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryNotificationLog {
    sequence: AtomicU64,
    entries: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationLog {
    pub(crate) fn for_user(&self, id: &UserId) -> Vec<Notification> {
        let guard = self.entries.lock().expect("notification mutex poisoned");
        guard.iter().filter(|n| &n.user_id == id).cloned().collect()
    }
}

impl NotificationSink for InMemoryNotificationLog {
    fn create(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stored = Notification {
            id: NotificationId(format!("ntf-{id:06}")),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            content: notification.content,
            related_id: notification.related_id,
            read: false,
            created_at: Utc::now(),
        };
        self.entries
            .lock()
            .expect("notification mutex poisoned")
            .push(stored.clone());
        Ok(stored)
    }
}

/// Stand-in transport that writes each outbound email to the log instead of
/// an SMTP relay.
#[derive(Default)]
pub(crate) struct LoggingMailer;

impl Mailer for LoggingMailer {
    fn send_validation_reminder(&self, email: ValidationReminderEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            kind = email.entity_kind.label(),
            entity = %email.entity_name,
            "validation reminder email dispatched"
        );
        Ok(())
    }

    fn send_instant_match(&self, email: InstantMatchEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            best = %email.best_match_name,
            score = email.best_match_score,
            total = email.total_matches,
            "instant match email dispatched"
        );
        Ok(())
    }

    fn send_daily_digest(&self, email: DailyDigestEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            properties = email.property_matches.len(),
            requirements = email.requirement_matches.len(),
            "daily digest email dispatched"
        );
        Ok(())
    }
}
