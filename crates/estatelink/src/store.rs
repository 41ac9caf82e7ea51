//! Collaborator contracts for storage, user lookup, notifications, and mail.
//!
//! The core never talks to a database or an SMTP relay directly; everything
//! goes through these traits so the matching and validation services can be
//! exercised in isolation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    EntityKind, Listing, NewNotification, Notification, Requirement, User, UserId, ValidatedEntity,
};
use crate::notify::MatchDirection;

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Partial update applied by [`ValidationStore::resolve_token`]. The token
/// and its expiry are always cleared as part of resolution; the fields here
/// are applied on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationPatch {
    pub is_active: Option<bool>,
    pub last_validated: Option<DateTime<Utc>>,
    pub response_received: Option<bool>,
}

/// Outcome of a token-guarded update.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardedUpdate<E> {
    /// The stored token still matched; the patch was applied and the token
    /// cleared. Carries the updated record.
    Applied(E),
    /// The stored token no longer matched (consumed or reissued by a
    /// concurrent actor); nothing was written.
    StaleToken,
}

/// Store surface required by the validation lifecycle, identical for both
/// entity kinds.
pub trait ValidationStore: Send + Sync {
    type Entity: ValidatedEntity + Clone + Send;

    /// Active entities whose `last_validated` or `last_reminder` is missing
    /// or older than `cutoff`.
    fn needing_validation(&self, cutoff: DateTime<Utc>) -> Result<Vec<Self::Entity>, StoreError>;

    /// Active entities with an expiry in the past and no confirmation
    /// received.
    fn with_expired_validation(&self, now: DateTime<Utc>) -> Result<Vec<Self::Entity>, StoreError>;

    fn by_validation_token(&self, token: &str) -> Result<Option<Self::Entity>, StoreError>;

    fn by_entity_id(&self, id: &str) -> Result<Option<Self::Entity>, StoreError>;

    /// Wholesale update of a single record.
    fn update(&self, entity: &Self::Entity) -> Result<(), StoreError>;

    /// Compare-and-update keyed on the validation token: applies `patch` and
    /// clears the token/expiry only if the stored token still equals
    /// `expected`. This is the primitive that keeps the expiry sweep and a
    /// concurrent confirm from trampling each other.
    fn resolve_token(
        &self,
        id: &str,
        expected: &str,
        patch: ValidationPatch,
    ) -> Result<GuardedUpdate<Self::Entity>, StoreError>;
}

/// Listing store contract consumed by the match finder and sweeps.
pub trait ListingStore: ValidationStore<Entity = Listing> {
    fn active_listings(&self) -> Result<Vec<Listing>, StoreError>;

    fn listings_created_after(&self, cutoff: DateTime<Utc>) -> Result<Vec<Listing>, StoreError>;
}

/// Requirement store contract, symmetric to [`ListingStore`].
pub trait RequirementStore: ValidationStore<Entity = Requirement> {
    fn active_requirements(&self) -> Result<Vec<Requirement>, StoreError>;

    fn requirements_created_after(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Requirement>, StoreError>;
}

/// Account lookup exposing tier, language, and contact details.
pub trait UserDirectory: Send + Sync {
    fn user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;
}

/// Append-only per-user notification log.
pub trait NotificationSink: Send + Sync {
    fn create(&self, notification: NewNotification) -> Result<Notification, StoreError>;
}

/// Mail dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Validation-reminder email payload; the link the transport renders embeds
/// the token and entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReminderEmail {
    pub to: String,
    pub recipient_name: String,
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub token: String,
}

/// Instant-match email payload, built from the single best match in the
/// recipient's batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantMatchEmail {
    pub to: String,
    pub recipient_name: String,
    pub direction: MatchDirection,
    pub best_match_name: String,
    pub best_match_score: u8,
    pub total_matches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub name: String,
    pub score: u8,
}

/// Combined daily digest email payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDigestEmail {
    pub to: String,
    pub recipient_name: String,
    pub property_matches: Vec<DigestEntry>,
    pub requirement_matches: Vec<DigestEntry>,
}

/// Outbound mail transport. Implementations report failure through the
/// `Result`; callers in the core log and swallow it, the triggering state
/// transition never depends on delivery.
pub trait Mailer: Send + Sync {
    fn send_validation_reminder(&self, email: ValidationReminderEmail) -> Result<(), MailError>;

    fn send_instant_match(&self, email: InstantMatchEmail) -> Result<(), MailError>;

    fn send_daily_digest(&self, email: DailyDigestEmail) -> Result<(), MailError>;
}
