use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for published property listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub String);

/// Identifier wrapper for buyer requirements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementId(pub String);

/// Identifier wrapper for marketplace accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for stored notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Land,
    Townhouse,
    PoolVilla,
}

impl PropertyType {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Apartment => "apartment",
            PropertyType::Land => "land",
            PropertyType::Townhouse => "townhouse",
            PropertyType::PoolVilla => "poolvilla",
        }
    }
}

/// What the owner offers the listing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingIntent {
    Sell,
    Rent,
    SellOrRent,
}

impl ListingIntent {
    pub const fn label(self) -> &'static str {
        match self {
            ListingIntent::Sell => "sell",
            ListingIntent::Rent => "rent",
            ListingIntent::SellOrRent => "sell_or_rent",
        }
    }
}

/// What the buyer is in the market for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementIntent {
    Buy,
    Rent,
}

impl RequirementIntent {
    pub const fn label(self) -> &'static str {
        match self {
            RequirementIntent::Buy => "buy",
            RequirementIntent::Rent => "rent",
        }
    }
}

/// An amount in a named currency. Currencies compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn same_currency(&self, other: &str) -> bool {
        self.currency.eq_ignore_ascii_case(other)
    }
}

/// A measured physical attribute such as living area or plot size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measured {
    pub value: f64,
    pub unit: String,
}

impl Measured {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// Inclusive numeric bounds for one requirement dimension. A side left as
/// `None` is unbounded; the dimension as a whole is constrained only when the
/// requirement carries a `SizeRange` at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SizeRange {
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |lo| value >= lo) && self.max.map_or(true, |hi| value <= hi)
    }
}

/// Location filter on a requirement. Absent fields mean "anywhere"; the most
/// specific present field is the one that counts during scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFilter {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl LocationFilter {
    pub fn is_anywhere(&self) -> bool {
        self.city.is_none() && self.state.is_none() && self.country.is_none()
    }
}

/// Freshness bookkeeping shared by listings and requirements.
///
/// `token` is `Some` exactly while a reminder is outstanding; it is cleared
/// when the owner confirms, when the expiry sweep deactivates the entity, or
/// when the owner manually reactivates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationState {
    pub last_validated: Option<DateTime<Utc>>,
    pub last_reminder: Option<DateTime<Utc>>,
    pub token: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub response_received: bool,
}

impl ValidationState {
    /// True when either the validation or the reminder timestamp is missing
    /// or older than `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        let validated_stale = self.last_validated.map_or(true, |at| at < cutoff);
        let reminder_stale = self.last_reminder.map_or(true, |at| at < cutoff);
        validated_stale || reminder_stale
    }

    pub fn clear_token(&mut self) {
        self.token = None;
        self.expires = None;
    }
}

/// A property offered for sale or rent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner: UserId,
    pub title: String,
    pub property_type: PropertyType,
    pub intent: ListingIntent,
    pub sale_price: Price,
    pub rent_price: Option<Price>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area: Option<Measured>,
    pub land_size: Option<Measured>,
    pub build_size: Option<Measured>,
    pub amenities: BTreeSet<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub validation: ValidationState,
}

/// A buyer's stated search criteria, matched symmetrically against listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub buyer: UserId,
    pub property_type: PropertyType,
    pub intent: RequirementIntent,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub currency: String,
    pub location: LocationFilter,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<u32>,
    pub area: Option<SizeRange>,
    pub land_size: Option<SizeRange>,
    pub build_size: Option<SizeRange>,
    pub required_amenities: BTreeSet<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub validation: ValidationState,
}

impl Requirement {
    /// Human-readable label used in notifications and digests.
    pub fn summary(&self) -> String {
        let place = self
            .location
            .city
            .as_deref()
            .or(self.location.state.as_deref())
            .or(self.location.country.as_deref());
        match place {
            Some(place) => format!(
                "{} to {} in {}",
                self.property_type.label(),
                self.intent.label(),
                place
            ),
            None => format!("{} to {}", self.property_type.label(), self.intent.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

/// Marketplace account snapshot as exposed by the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub tier: SubscriptionTier,
    pub language: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ValidationReminder,
    ListingDeactivated,
    RequirementDeactivated,
    ValidationConfirmed,
    PropertyMatch,
    RequirementMatch,
    LatestMatches,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::ValidationReminder => "validation_reminder",
            NotificationKind::ListingDeactivated => "listing_deactivated",
            NotificationKind::RequirementDeactivated => "requirement_deactivated",
            NotificationKind::ValidationConfirmed => "validation_confirmed",
            NotificationKind::PropertyMatch => "property_match",
            NotificationKind::RequirementMatch => "requirement_match",
            NotificationKind::LatestMatches => "latest_matches",
        }
    }
}

/// Payload handed to the notification store; ids and timestamps are assigned
/// by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub related_id: Option<String>,
}

/// Stored per-user notification. Append-only; `read` is the only field the
/// store ever mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub related_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Which side of the marketplace an entity lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Listing,
    Requirement,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Listing => "listing",
            EntityKind::Requirement => "requirement",
        }
    }
}

/// Uniform view over listings and requirements so the validation lifecycle
/// is written once for both.
pub trait ValidatedEntity {
    fn kind(&self) -> EntityKind;
    fn entity_id(&self) -> &str;
    fn owner_id(&self) -> &UserId;
    fn display_name(&self) -> String;
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
    fn created_at(&self) -> DateTime<Utc>;
    fn validation(&self) -> &ValidationState;
    fn validation_mut(&mut self) -> &mut ValidationState;
}

impl ValidatedEntity for Listing {
    fn kind(&self) -> EntityKind {
        EntityKind::Listing
    }

    fn entity_id(&self) -> &str {
        &self.id.0
    }

    fn owner_id(&self) -> &UserId {
        &self.owner
    }

    fn display_name(&self) -> String {
        self.title.clone()
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validation(&self) -> &ValidationState {
        &self.validation
    }

    fn validation_mut(&mut self) -> &mut ValidationState {
        &mut self.validation
    }
}

impl ValidatedEntity for Requirement {
    fn kind(&self) -> EntityKind {
        EntityKind::Requirement
    }

    fn entity_id(&self) -> &str {
        &self.id.0
    }

    fn owner_id(&self) -> &UserId {
        &self.buyer
    }

    fn display_name(&self) -> String {
        self.summary()
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validation(&self) -> &ValidationState {
        &self.validation
    }

    fn validation_mut(&mut self) -> &mut ValidationState {
        &mut self.validation
    }
}
