// Inbound domain event routes (spec §6): the sole entry point the
// surrounding CRUD system calls into the Engine.

use axum::{http::StatusCode, routing::post, Json, Router};
use workflow_engine_contracts::{OnEntityDeletedEvent, OnStateEnterEvent, OnStateExitEvent, OnTransitionEvent};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events/state-enter", post(on_state_enter))
        .route("/v1/events/state-exit", post(on_state_exit))
        .route("/v1/events/transition", post(on_transition))
        .route("/v1/events/entity-deleted", post(on_entity_deleted))
        .with_state(state)
}

/// POST /v1/events/state-enter
#[utoipa::path(
    post,
    path = "/v1/events/state-enter",
    request_body = OnStateEnterEvent,
    responses(
        (status = 202, description = "Event accepted and processed"),
        (status = 400, description = "Malformed workflow configuration"),
        (status = 404, description = "No active workflow for this entity type")
    ),
    tag = "events"
)]
pub async fn on_state_enter(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(event): Json<OnStateEnterEvent>,
) -> Result<StatusCode, ApiError> {
    state.engine.on_state_enter(event).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/events/state-exit
#[utoipa::path(
    post,
    path = "/v1/events/state-exit",
    request_body = OnStateExitEvent,
    responses(
        (status = 202, description = "Event accepted and processed"),
        (status = 400, description = "Malformed workflow configuration"),
        (status = 404, description = "No active workflow for this entity type")
    ),
    tag = "events"
)]
pub async fn on_state_exit(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(event): Json<OnStateExitEvent>,
) -> Result<StatusCode, ApiError> {
    state.engine.on_state_exit(event).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/events/transition
#[utoipa::path(
    post,
    path = "/v1/events/transition",
    request_body = OnTransitionEvent,
    responses(
        (status = 202, description = "Event accepted and processed"),
        (status = 400, description = "Malformed workflow configuration or no such transition"),
        (status = 404, description = "No active workflow for this entity type")
    ),
    tag = "events"
)]
pub async fn on_transition(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(event): Json<OnTransitionEvent>,
) -> Result<StatusCode, ApiError> {
    state.engine.on_transition(event).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/events/entity-deleted
#[utoipa::path(
    post,
    path = "/v1/events/entity-deleted",
    request_body = OnEntityDeletedEvent,
    responses(
        (status = 202, description = "Pending jobs for this entity cancelled")
    ),
    tag = "events"
)]
pub async fn on_entity_deleted(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(event): Json<OnEntityDeletedEvent>,
) -> Result<StatusCode, ApiError> {
    state.engine.on_entity_deleted(event).await?;
    Ok(StatusCode::ACCEPTED)
}
