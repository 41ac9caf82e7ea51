use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{UserId, ValidatedEntity};
use crate::store::{ListingStore, RequirementStore};

use super::lifecycle::{ValidationError, ValidationLifecycle};

/// Shared state for the validation endpoints: one lifecycle per entity kind.
pub struct ValidationRouterState<L, R>
where
    L: ListingStore,
    R: RequirementStore,
{
    pub listings: Arc<ValidationLifecycle<L>>,
    pub requirements: Arc<ValidationLifecycle<R>>,
}

/// Router builder for the confirm and reactivate endpoints. Ownership proof
/// for reactivation arrives in the request body; upstream auth middleware is
/// expected to have authenticated the caller.
pub fn validation_router<L, R>(state: Arc<ValidationRouterState<L, R>>) -> Router
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/validation/confirm/:kind/:token",
            post(confirm_handler::<L, R>),
        )
        .route(
            "/api/v1/listings/:id/reactivate",
            post(reactivate_listing_handler::<L, R>),
        )
        .route(
            "/api/v1/requirements/:id/reactivate",
            post(reactivate_requirement_handler::<L, R>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReactivateRequest {
    pub(crate) owner_id: String,
}

pub(crate) async fn confirm_handler<L, R>(
    State(state): State<Arc<ValidationRouterState<L, R>>>,
    Path((kind, token)): Path<(String, String)>,
) -> Response
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    let now = Utc::now();
    match kind.as_str() {
        "listing" => entity_response(state.listings.confirm(&token, now)),
        "requirement" => entity_response(state.requirements.confirm(&token, now)),
        other => {
            let payload = json!({ "error": format!("unknown entity kind '{other}'") });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn reactivate_listing_handler<L, R>(
    State(state): State<Arc<ValidationRouterState<L, R>>>,
    Path(id): Path<String>,
    Json(request): Json<ReactivateRequest>,
) -> Response
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    let caller = UserId(request.owner_id);
    entity_response(state.listings.reactivate(&id, &caller, Utc::now()))
}

pub(crate) async fn reactivate_requirement_handler<L, R>(
    State(state): State<Arc<ValidationRouterState<L, R>>>,
    Path(id): Path<String>,
    Json(request): Json<ReactivateRequest>,
) -> Response
where
    L: ListingStore + 'static,
    R: RequirementStore + 'static,
{
    let caller = UserId(request.owner_id);
    entity_response(state.requirements.reactivate(&id, &caller, Utc::now()))
}

fn entity_response<E: ValidatedEntity>(result: Result<E, ValidationError>) -> Response {
    match result {
        Ok(entity) => {
            let payload = json!({
                "id": entity.entity_id(),
                "kind": entity.kind().label(),
                "is_active": entity.is_active(),
                "last_validated": entity.validation().last_validated,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => {
            let status = match &error {
                ValidationError::TokenNotFound | ValidationError::NotFound => StatusCode::NOT_FOUND,
                ValidationError::TokenExpired => StatusCode::GONE,
                ValidationError::NotOwner => StatusCode::FORBIDDEN,
                ValidationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let payload = json!({ "error": error.to_string() });
            (status, Json(payload)).into_response()
        }
    }
}
