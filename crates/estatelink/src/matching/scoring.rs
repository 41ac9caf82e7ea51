use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Listing, ListingIntent, Price, Requirement, RequirementIntent, SizeRange};

/// One scored dimension of compatibility between a listing and a
/// requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    PropertyType,
    Transaction,
    Price,
    Location,
    MinBedrooms,
    MinBathrooms,
    Area,
    LandSize,
    BuildSize,
    Amenities,
}

impl Criterion {
    pub const fn weight(self) -> u32 {
        match self {
            Criterion::PropertyType | Criterion::Transaction => 20,
            Criterion::Price | Criterion::Location => 15,
            Criterion::MinBedrooms | Criterion::Area => 10,
            Criterion::MinBathrooms
            | Criterion::LandSize
            | Criterion::BuildSize
            | Criterion::Amenities => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Criterion::PropertyType => "property_type",
            Criterion::Transaction => "transaction",
            Criterion::Price => "price",
            Criterion::Location => "location",
            Criterion::MinBedrooms => "min_bedrooms",
            Criterion::MinBathrooms => "min_bathrooms",
            Criterion::Area => "area",
            Criterion::LandSize => "land_size",
            Criterion::BuildSize => "build_size",
            Criterion::Amenities => "amenities",
        }
    }
}

/// Discrete contribution to a compatibility score, kept for transparent
/// audits of why a pair matched or missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub criterion: Criterion,
    pub weight: u32,
    pub satisfied: bool,
    pub notes: String,
}

/// Result of scoring one (listing, requirement) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compatibility {
    pub percentage: u8,
    pub satisfied: BTreeSet<Criterion>,
    pub components: Vec<ScoreComponent>,
}

/// Scores a pair over the weighted rubric. Total, deterministic, and free of
/// side effects: missing optional fields fail the criterion or keep it out
/// of the denominator, they never error.
///
/// The denominator only accumulates weights for criteria the requirement
/// actually constrains, so sparse requirements still produce meaningful
/// percentages. The four mandatory criteria keep it at 40 or above.
pub fn score(listing: &Listing, requirement: &Requirement) -> Compatibility {
    let mut components = Vec::new();

    push(
        &mut components,
        Criterion::PropertyType,
        listing.property_type == requirement.property_type,
        format!(
            "listing offers {}, requirement wants {}",
            listing.property_type.label(),
            requirement.property_type.label()
        ),
    );

    push(
        &mut components,
        Criterion::Transaction,
        transaction_compatible(listing.intent, requirement.intent),
        format!(
            "listing is for {}, requirement wants to {}",
            listing.intent.label(),
            requirement.intent.label()
        ),
    );

    let (price_ok, price_notes) = price_in_range(listing, requirement);
    push(&mut components, Criterion::Price, price_ok, price_notes);

    let (location_ok, location_notes) = location_matches(listing, requirement);
    push(
        &mut components,
        Criterion::Location,
        location_ok,
        location_notes,
    );

    if let Some(min) = requirement.min_bedrooms {
        let have = listing.bedrooms;
        push(
            &mut components,
            Criterion::MinBedrooms,
            have.map_or(false, |count| count >= min),
            match have {
                Some(count) => format!("{count} bedroom(s) against minimum {min}"),
                None => format!("bedroom count unknown, minimum {min} required"),
            },
        );
    }

    if let Some(min) = requirement.min_bathrooms {
        let have = listing.bathrooms;
        push(
            &mut components,
            Criterion::MinBathrooms,
            have.map_or(false, |count| count >= min),
            match have {
                Some(count) => format!("{count} bathroom(s) against minimum {min}"),
                None => format!("bathroom count unknown, minimum {min} required"),
            },
        );
    }

    if let Some(range) = requirement.area {
        push_size(
            &mut components,
            Criterion::Area,
            listing.area.as_ref().map(|m| m.value),
            range,
        );
    }

    if let Some(range) = requirement.land_size {
        push_size(
            &mut components,
            Criterion::LandSize,
            listing.land_size.as_ref().map(|m| m.value),
            range,
        );
    }

    if let Some(range) = requirement.build_size {
        push_size(
            &mut components,
            Criterion::BuildSize,
            listing.build_size.as_ref().map(|m| m.value),
            range,
        );
    }

    if !requirement.required_amenities.is_empty() {
        let missing: Vec<&str> = requirement
            .required_amenities
            .iter()
            .filter(|wanted| {
                !listing
                    .amenities
                    .iter()
                    .any(|have| contains_ignore_case(have, wanted))
            })
            .map(String::as_str)
            .collect();
        push(
            &mut components,
            Criterion::Amenities,
            missing.is_empty(),
            if missing.is_empty() {
                "all required amenities present".to_string()
            } else {
                format!("missing amenities: {}", missing.join(", "))
            },
        );
    }

    let total: u32 = components.iter().map(|c| c.weight).sum();
    let matched: u32 = components
        .iter()
        .filter(|c| c.satisfied)
        .map(|c| c.weight)
        .sum();

    let percentage = if total == 0 {
        0
    } else {
        ((f64::from(matched) / f64::from(total)) * 100.0).round() as u8
    };

    let satisfied = components
        .iter()
        .filter(|c| c.satisfied)
        .map(|c| c.criterion)
        .collect();

    Compatibility {
        percentage,
        satisfied,
        components,
    }
}

fn push(components: &mut Vec<ScoreComponent>, criterion: Criterion, satisfied: bool, notes: String) {
    components.push(ScoreComponent {
        criterion,
        weight: criterion.weight(),
        satisfied,
        notes,
    });
}

fn push_size(
    components: &mut Vec<ScoreComponent>,
    criterion: Criterion,
    value: Option<f64>,
    range: SizeRange,
) {
    push(
        components,
        criterion,
        value.map_or(false, |v| range.contains(v)),
        match value {
            Some(v) => format!("{} {v} against bounds {range:?}", criterion.label()),
            None => format!("{} unknown on listing", criterion.label()),
        },
    );
}

fn transaction_compatible(offered: ListingIntent, wanted: RequirementIntent) -> bool {
    match (offered, wanted) {
        (ListingIntent::SellOrRent, _) => true,
        (ListingIntent::Sell, RequirementIntent::Buy) => true,
        (ListingIntent::Rent, RequirementIntent::Rent) => true,
        _ => false,
    }
}

/// Selects rent price for rent requirements and sale price otherwise, then
/// checks the requirement's bounds. A currency mismatch fails outright: the
/// pairwise scorer deliberately performs no conversion.
fn price_in_range(listing: &Listing, requirement: &Requirement) -> (bool, String) {
    let price: &Price = match requirement.intent {
        RequirementIntent::Rent => match &listing.rent_price {
            Some(rent) => rent,
            None => return (false, "listing publishes no rent price".to_string()),
        },
        RequirementIntent::Buy => &listing.sale_price,
    };

    if !price.same_currency(&requirement.currency) {
        return (
            false,
            format!(
                "currency mismatch: listing in {}, requirement in {}",
                price.currency, requirement.currency
            ),
        );
    }

    let floor = requirement.min_price.unwrap_or(0.0);
    let within =
        price.amount >= floor && requirement.max_price.map_or(true, |cap| price.amount <= cap);
    (
        within,
        format!(
            "{} {} against bounds [{}, {}]",
            price.amount,
            price.currency,
            floor,
            requirement
                .max_price
                .map_or("∞".to_string(), |cap| cap.to_string())
        ),
    )
}

/// City beats state beats country; a requirement with no location at all is
/// vacuously satisfied.
fn location_matches(listing: &Listing, requirement: &Requirement) -> (bool, String) {
    let filter = &requirement.location;
    if let Some(city) = &filter.city {
        return (
            listing.city.eq_ignore_ascii_case(city),
            format!("city {} against {}", listing.city, city),
        );
    }
    if let Some(state) = &filter.state {
        return (
            listing.state.eq_ignore_ascii_case(state),
            format!("state {} against {}", listing.state, state),
        );
    }
    if let Some(country) = &filter.country {
        return (
            listing.country.eq_ignore_ascii_case(country),
            format!("country {} against {}", listing.country, country),
        );
    }
    (true, "requirement has no location filter".to_string())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
