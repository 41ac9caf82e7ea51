use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};
use serde::Serialize;
use serde_json::json;

use estatelink::domain::{Listing, Requirement, UserId};
use estatelink::matching::{
    dedupe_by_listing, dedupe_by_requirement, MatchEngine, MatchOutcome,
};
use estatelink::notify::InstantMatchFanout;
use estatelink::store::{ListingStore, RequirementStore, StoreError};
use estatelink::validation::{validation_router, ValidationRouterState};

use crate::infra::{AppState, InMemoryListings, InMemoryNotificationLog, InMemoryRequirements};

/// Marketplace state shared by the listing/requirement/match endpoints.
pub(crate) struct MarketContext {
    pub(crate) listings: Arc<InMemoryListings>,
    pub(crate) requirements: Arc<InMemoryRequirements>,
    pub(crate) notifications: Arc<InMemoryNotificationLog>,
    pub(crate) instant: InstantMatchFanout<InMemoryListings, InMemoryRequirements>,
    pub(crate) engine: MatchEngine,
}

pub(crate) fn build_router(
    market: Arc<MarketContext>,
    validation: Arc<ValidationRouterState<InMemoryListings, InMemoryRequirements>>,
) -> Router {
    validation_router(validation).merge(
        Router::new()
            .route("/health", axum::routing::get(healthcheck))
            .route("/ready", axum::routing::get(readiness_endpoint))
            .route("/metrics", axum::routing::get(metrics_endpoint))
            .route("/api/v1/listings", axum::routing::post(create_listing))
            .route(
                "/api/v1/requirements",
                axum::routing::post(create_requirement),
            )
            .route(
                "/api/v1/users/:user_id/matches",
                axum::routing::get(user_matches),
            )
            .route(
                "/api/v1/users/:user_id/notifications",
                axum::routing::get(user_notifications),
            )
            .with_state(market),
    )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, Json(json!({ "ready": true }))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ready": false }))).into_response()
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    state.metrics.render()
}

/// Stores the listing, then runs the instant match check as a best-effort
/// post-commit step: a fan-out failure is logged, never surfaced to the
/// caller.
pub(crate) async fn create_listing(
    State(market): State<Arc<MarketContext>>,
    Json(listing): Json<Listing>,
) -> impl IntoResponse {
    match market.listings.insert(listing) {
        Ok(stored) => {
            if let Err(err) = market.instant.listing_published(&stored) {
                tracing::warn!(listing = %stored.id.0, error = %err, "instant match check failed");
            }
            (StatusCode::CREATED, Json(stored)).into_response()
        }
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn create_requirement(
    State(market): State<Arc<MarketContext>>,
    Json(requirement): Json<Requirement>,
) -> impl IntoResponse {
    match market.requirements.insert(requirement) {
        Ok(stored) => {
            if let Err(err) = market.instant.requirement_published(&stored) {
                tracing::warn!(requirement = %stored.id.0, error = %err, "instant match check failed");
            }
            (StatusCode::CREATED, Json(stored)).into_response()
        }
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MatchView {
    pub(crate) counterpart_id: String,
    pub(crate) name: String,
    pub(crate) score: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserMatchesResponse {
    pub(crate) property_matches: Vec<MatchView>,
    pub(crate) requirement_matches: Vec<MatchView>,
}

/// On-demand view of the user's current matches in both directions, deduped
/// the same way the scheduled sweeps dedupe them.
pub(crate) async fn user_matches(
    State(market): State<Arc<MarketContext>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let user = UserId(user_id);

    let result = (|| -> Result<UserMatchesResponse, StoreError> {
        let listings = market.listings.active_listings()?;
        let requirements = market.requirements.active_requirements()?;

        let owned_requirements = market.requirements.owned_by(&user);
        let property_matches =
            dedupe_by_listing(market.engine.matches_for_requirements(&listings, &owned_requirements));

        let mut outcomes: Vec<MatchOutcome> = Vec::new();
        for listing in market.listings.owned_by(&user) {
            outcomes.extend(market.engine.matches_for_listing(&listing, &requirements));
        }
        let requirement_matches = dedupe_by_requirement(outcomes);

        Ok(UserMatchesResponse {
            property_matches: property_matches
                .iter()
                .map(|o| MatchView {
                    counterpart_id: o.listing.id.0.clone(),
                    name: o.listing.title.clone(),
                    score: o.percentage(),
                })
                .collect(),
            requirement_matches: requirement_matches
                .iter()
                .map(|o| MatchView {
                    counterpart_id: o.requirement.id.0.clone(),
                    name: o.requirement.summary(),
                    score: o.percentage(),
                })
                .collect(),
        })
    })();

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn user_notifications(
    State(market): State<Arc<MarketContext>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let user = UserId(user_id);
    (StatusCode::OK, Json(market.notifications.for_user(&user))).into_response()
}

fn store_error_response(err: StoreError) -> axum::response::Response {
    let status = match err {
        StoreError::Conflict => StatusCode::CONFLICT,
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
