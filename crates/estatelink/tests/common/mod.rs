//! Shared fixtures and in-memory collaborator fakes for the integration
//! suites.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use estatelink::domain::{
    Listing, ListingId, ListingIntent, LocationFilter, Measured, NewNotification, Notification,
    NotificationId, Price, PropertyType, Requirement, RequirementId, RequirementIntent,
    SubscriptionTier, User, UserId, ValidatedEntity, ValidationState,
};
use estatelink::store::{
    DailyDigestEmail, GuardedUpdate, InstantMatchEmail, ListingStore, MailError, Mailer,
    NotificationSink, RequirementStore, StoreError, UserDirectory, ValidationPatch,
    ValidationReminderEmail, ValidationStore,
};

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, day, hour, 0, 0)
        .single()
        .expect("valid date")
}

pub fn premium_user(id: &str) -> User {
    User {
        id: UserId(id.to_string()),
        display_name: format!("User {id}"),
        email: format!("{id}@example.com"),
        tier: SubscriptionTier::Premium,
        language: "en".to_string(),
        email_verified: true,
    }
}

pub fn free_user(id: &str) -> User {
    User {
        tier: SubscriptionTier::Free,
        ..premium_user(id)
    }
}

pub fn house_listing(id: &str, owner: &str) -> Listing {
    Listing {
        id: ListingId(id.to_string()),
        owner: UserId(owner.to_string()),
        title: format!("House {id}"),
        property_type: PropertyType::House,
        intent: ListingIntent::SellOrRent,
        sale_price: Price::new(100_000.0, "USD"),
        rent_price: Some(Price::new(1_200.0, "USD")),
        city: "Bangkok".to_string(),
        state: "Bangkok".to_string(),
        country: "Thailand".to_string(),
        bedrooms: Some(3),
        bathrooms: Some(2),
        area: Some(Measured::new(180.0, "sqm")),
        land_size: Some(Measured::new(320.0, "sqm")),
        build_size: Some(Measured::new(210.0, "sqm")),
        amenities: ["Swimming Pool", "Covered Parking"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        is_active: true,
        created_at: at(1, 9),
        validation: ValidationState::default(),
    }
}

/// Full match against [`house_listing`]: scores 100.
pub fn buy_requirement(id: &str, buyer: &str) -> Requirement {
    Requirement {
        id: RequirementId(id.to_string()),
        buyer: UserId(buyer.to_string()),
        property_type: PropertyType::House,
        intent: RequirementIntent::Buy,
        min_price: Some(50_000.0),
        max_price: Some(150_000.0),
        currency: "USD".to_string(),
        location: LocationFilter {
            city: Some("Bangkok".to_string()),
            ..LocationFilter::default()
        },
        min_bedrooms: Some(2),
        min_bathrooms: None,
        area: None,
        land_size: None,
        build_size: None,
        required_amenities: BTreeSet::new(),
        is_active: true,
        created_at: at(2, 9),
        validation: ValidationState::default(),
    }
}

/// Bedroom bound fails against [`house_listing`]: scores 88.
pub fn near_requirement(id: &str, buyer: &str) -> Requirement {
    Requirement {
        min_bedrooms: Some(5),
        ..buy_requirement(id, buyer)
    }
}

/// Currency and location both fail against [`house_listing`]: scores 63.
pub fn weak_requirement(id: &str, buyer: &str) -> Requirement {
    Requirement {
        currency: "THB".to_string(),
        location: LocationFilter {
            city: Some("Phuket".to_string()),
            ..LocationFilter::default()
        },
        ..buy_requirement(id, buyer)
    }
}

#[derive(Default, Clone)]
pub struct MemoryListings {
    records: Arc<Mutex<BTreeMap<ListingId, Listing>>>,
}

impl MemoryListings {
    pub fn seed(&self, listings: impl IntoIterator<Item = Listing>) {
        let mut guard = self.records.lock().expect("listing mutex poisoned");
        for listing in listings {
            guard.insert(listing.id.clone(), listing);
        }
    }

    pub fn get(&self, id: &str) -> Option<Listing> {
        let guard = self.records.lock().expect("listing mutex poisoned");
        guard.get(&ListingId(id.to_string())).cloned()
    }
}

impl ValidationStore for MemoryListings {
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

impl ListingStore for MemoryListings {
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

#[derive(Default, Clone)]
pub struct MemoryRequirements {
    records: Arc<Mutex<BTreeMap<RequirementId, Requirement>>>,
}

impl MemoryRequirements {
    pub fn seed(&self, requirements: impl IntoIterator<Item = Requirement>) {
        let mut guard = self.records.lock().expect("requirement mutex poisoned");
        for requirement in requirements {
            guard.insert(requirement.id.clone(), requirement);
        }
    }

    pub fn get(&self, id: &str) -> Option<Requirement> {
        let guard = self.records.lock().expect("requirement mutex poisoned");
        guard.get(&RequirementId(id.to_string())).cloned()
    }
}

impl ValidationStore for MemoryRequirements {
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

impl RequirementStore for MemoryRequirements {
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

#[derive(Default, Clone)]
pub struct MemoryUsers {
    users: Arc<Mutex<BTreeMap<UserId, User>>>,
}

impl MemoryUsers {
    pub fn seed(&self, users: impl IntoIterator<Item = User>) {
        let mut guard = self.users.lock().expect("user mutex poisoned");
        for user in users {
            guard.insert(user.id.clone(), user);
        }
    }
}

impl UserDirectory for MemoryUsers {
    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let guard = self.users.lock().expect("user mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryNotifications {
    sequence: AtomicU64,
    entries: Mutex<Vec<Notification>>,
}

impl MemoryNotifications {
    pub fn all(&self) -> Vec<Notification> {
        self.entries.lock().expect("notification mutex poisoned").clone()
    }

    pub fn for_user(&self, id: &str) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|n| n.user_id.0 == id)
            .collect()
    }
}

impl NotificationSink for MemoryNotifications {
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

/// Records every outbound email; optionally fails all sends.
#[derive(Default)]
pub struct RecordingMailer {
    pub fail_sends: bool,
    reminders: Mutex<Vec<ValidationReminderEmail>>,
    instants: Mutex<Vec<InstantMatchEmail>>,
    digests: Mutex<Vec<DailyDigestEmail>>,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn reminders(&self) -> Vec<ValidationReminderEmail> {
        self.reminders.lock().expect("mailer mutex poisoned").clone()
    }

    pub fn instants(&self) -> Vec<InstantMatchEmail> {
        self.instants.lock().expect("mailer mutex poisoned").clone()
    }

    pub fn digests(&self) -> Vec<DailyDigestEmail> {
        self.digests.lock().expect("mailer mutex poisoned").clone()
    }

    fn gate(&self) -> Result<(), MailError> {
        if self.fail_sends {
            Err(MailError::Transport("smtp relay offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Mailer for RecordingMailer {
    fn send_validation_reminder(&self, email: ValidationReminderEmail) -> Result<(), MailError> {
        self.gate()?;
        self.reminders.lock().expect("mailer mutex poisoned").push(email);
        Ok(())
    }

    fn send_instant_match(&self, email: InstantMatchEmail) -> Result<(), MailError> {
        self.gate()?;
        self.instants.lock().expect("mailer mutex poisoned").push(email);
        Ok(())
    }

    fn send_daily_digest(&self, email: DailyDigestEmail) -> Result<(), MailError> {
        self.gate()?;
        self.digests.lock().expect("mailer mutex poisoned").push(email);
        Ok(())
    }
}
