//! Seeded command-line walkthrough: scores a pair, runs the instant match
//! check, then plays a full validation cycle against in-memory stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;

use estatelink::config::{MatchingConfig, ValidationConfig};
use estatelink::domain::{
    Listing, ListingId, ListingIntent, LocationFilter, Measured, Price, PropertyType, Requirement,
    RequirementId, RequirementIntent, SubscriptionTier, User, UserId, ValidatedEntity,
    ValidationState,
};
use estatelink::matching::score;
use estatelink::notify::{BuiltinCatalog, InstantMatchFanout, Notifier};
use estatelink::store::ValidationStore;
use estatelink::validation::ValidationLifecycle;

use crate::error::ApiError;
use crate::infra::{InMemoryListings, InMemoryNotificationLog, InMemoryRequirements, InMemoryUsers};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Also print every stored notification at the end of the walkthrough
    #[arg(long)]
    pub(crate) show_notifications: bool,
}

pub(crate) fn demo_users() -> Vec<User> {
    vec![
        User {
            id: UserId("anya".to_string()),
            display_name: "Anya".to_string(),
            email: "anya@example.com".to_string(),
            tier: SubscriptionTier::Premium,
            language: "en".to_string(),
            email_verified: true,
        },
        User {
            id: UserId("boon".to_string()),
            display_name: "Boon".to_string(),
            email: "boon@example.com".to_string(),
            tier: SubscriptionTier::Premium,
            language: "th".to_string(),
            email_verified: true,
        },
        User {
            id: UserId("chai".to_string()),
            display_name: "Chai".to_string(),
            email: "chai@example.com".to_string(),
            tier: SubscriptionTier::Free,
            language: "th".to_string(),
            email_verified: false,
        },
    ]
}

fn demo_listing() -> Listing {
    Listing {
        id: ListingId("lst-demo-1".to_string()),
        owner: UserId("anya".to_string()),
        title: "Thonglor family house".to_string(),
        property_type: PropertyType::House,
        intent: ListingIntent::SellOrRent,
        sale_price: Price::new(100_000.0, "USD"),
        rent_price: Some(Price::new(1_400.0, "USD")),
        city: "Bangkok".to_string(),
        state: "Bangkok".to_string(),
        country: "Thailand".to_string(),
        bedrooms: Some(3),
        bathrooms: Some(2),
        area: Some(Measured::new(185.0, "sqm")),
        land_size: Some(Measured::new(310.0, "sqm")),
        build_size: Some(Measured::new(220.0, "sqm")),
        amenities: ["Swimming Pool", "Covered Parking", "Garden"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        is_active: true,
        created_at: Utc::now(),
        validation: ValidationState::default(),
    }
}

fn demo_requirement(id: &str, buyer: &str) -> Requirement {
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
        created_at: Utc::now(),
        validation: ValidationState::default(),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), ApiError> {
    let listings = Arc::new(InMemoryListings::default());
    let requirements = Arc::new(InMemoryRequirements::default());
    let users = Arc::new(InMemoryUsers::default());
    users.seed(demo_users());
    let notifications = Arc::new(InMemoryNotificationLog::default());

    let notifier = Notifier::new(
        users.clone(),
        notifications.clone(),
        Arc::new(BuiltinCatalog),
    );

    println!("== EstateLink matching & validation walkthrough ==\n");

    // 1. Pairwise scoring with the full rubric breakdown.
    let listing = demo_listing();
    let requirement = demo_requirement("req-demo-1", "boon");
    let compatibility = score(&listing, &requirement);
    println!(
        "Scoring \"{}\" against \"{}\": {}%",
        listing.title,
        requirement.summary(),
        compatibility.percentage
    );
    for component in &compatibility.components {
        println!(
            "  [{}] {:>2} pts  {}",
            if component.satisfied { "x" } else { " " },
            component.weight,
            component.notes
        );
    }

    // 2. Instant fan-out on listing creation. Boon is premium and hears
    // about it; Chai is on the free tier and stays quiet.
    requirements.upsert(requirement);
    requirements.upsert(demo_requirement("req-demo-2", "chai"));
    listings.upsert(listing.clone());

    let instant = InstantMatchFanout::new(
        listings.clone(),
        requirements.clone(),
        notifier.clone(),
        MatchingConfig::default(),
    );
    let report = instant
        .listing_published(&listing)
        .map_err(|err| ApiError::Io(std::io::Error::other(err.to_string())))?;
    println!(
        "\nInstant match check: {} recipient batch(es), {} delivered",
        report.attempted, report.completed
    );

    // 3. A full validation cycle: stale listing, reminder, missed window,
    // deactivation, owner reactivation.
    let lifecycle = ValidationLifecycle::new(
        listings.clone(),
        notifier,
        ValidationConfig::default(),
    );

    let now = Utc::now();
    let mut stale = demo_listing();
    stale.validation.last_validated = Some(now - Duration::days(10));
    listings.upsert(stale.clone());

    lifecycle
        .run_reminder_sweep(now)
        .map_err(|err| ApiError::Io(std::io::Error::other(err.to_string())))?;
    let reminded = listings
        .by_entity_id(stale.entity_id())
        .ok()
        .flatten()
        .expect("listing survives the sweep");
    println!(
        "\nReminder sweep issued token {} (expires {})",
        reminded.validation.token.as_deref().unwrap_or("<none>"),
        reminded
            .validation
            .expires
            .map(|at| at.to_rfc3339())
            .unwrap_or_default()
    );

    lifecycle
        .run_expiry_sweep(now + Duration::hours(25))
        .map_err(|err| ApiError::Io(std::io::Error::other(err.to_string())))?;
    let expired = listings
        .by_entity_id(stale.entity_id())
        .ok()
        .flatten()
        .expect("listing survives the sweep");
    println!(
        "Expiry sweep 25h later: \"{}\" active = {}",
        expired.title, expired.is_active
    );

    let revived = lifecycle
        .reactivate(stale.entity_id(), &stale.owner, now + Duration::days(2))
        .map_err(|err| ApiError::Io(std::io::Error::other(err.to_string())))?;
    println!(
        "Owner reactivation: \"{}\" active = {}",
        revived.title, revived.is_active
    );

    if args.show_notifications {
        println!("\nStored notifications:");
        for user in demo_users() {
            for notice in notifications.for_user(&user.id) {
                println!(
                    "  {} -> [{}] {}",
                    user.display_name,
                    notice.kind.label(),
                    notice.title
                );
            }
        }
    }

    Ok(())
}
