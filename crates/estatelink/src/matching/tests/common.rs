use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{
    Listing, ListingId, ListingIntent, LocationFilter, Measured, Price, PropertyType, Requirement,
    RequirementId, RequirementIntent, UserId, ValidationState,
};

pub(super) fn created(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).single().expect("valid date")
}

/// Bangkok house offered for sale or rent; the canonical fixture the scoring
/// scenarios are written against.
pub(super) fn bangkok_house() -> Listing {
    Listing {
        id: ListingId("lst-001".to_string()),
        owner: UserId("owner-1".to_string()),
        title: "Sukhumvit family house".to_string(),
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
        amenities: ["Swimming Pool", "Covered Parking", "Garden"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        is_active: true,
        created_at: created(1),
        validation: ValidationState::default(),
    }
}

/// Matching buy-side requirement for [`bangkok_house`].
pub(super) fn bangkok_buyer() -> Requirement {
    Requirement {
        id: RequirementId("req-001".to_string()),
        buyer: UserId("buyer-1".to_string()),
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
        created_at: created(2),
        validation: ValidationState::default(),
    }
}

/// Requirement with every optional bound absent.
pub(super) fn bare_requirement() -> Requirement {
    Requirement {
        min_price: None,
        max_price: None,
        location: LocationFilter::default(),
        min_bedrooms: None,
        ..bangkok_buyer()
    }
}

pub(super) fn listing_with_id(id: &str, day: u32) -> Listing {
    Listing {
        id: ListingId(id.to_string()),
        created_at: created(day),
        ..bangkok_house()
    }
}

pub(super) fn requirement_with_id(id: &str, day: u32) -> Requirement {
    Requirement {
        id: RequirementId(id.to_string()),
        created_at: created(day),
        ..bangkok_buyer()
    }
}
