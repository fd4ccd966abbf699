//! Dev backend: serves the onboarding REST contract over a
//! [`MemoryProgressStore`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{StepError, StoreError};

use super::http::ONBOARDING_PREFIX;
use super::memory::MemoryProgressStore;
use super::store::ProgressStore;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub store: Arc<MemoryProgressStore>,
}

#[derive(Deserialize)]
struct CurrentStepRequest {
    step: String,
    #[serde(default)]
    client_ts: Option<chrono::DateTime<chrono::Utc>>,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "puretask-onboarding-dev"
    }))
}

/// GET /api/cleaner/onboarding/progress
async fn get_progress(State(state): State<OnboardingRouteState>) -> Response {
    match state.store.fetch_progress().await {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// PATCH /api/cleaner/onboarding/current-step
///
/// Applied in receipt order; `client_ts` is logged but not used to reorder.
async fn set_current_step(
    State(state): State<OnboardingRouteState>,
    body: Result<Json<CurrentStepRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    debug!(step = %body.step, client_ts = ?body.client_ts, "Current step write");
    match state.store.persist_current_step(&body.step).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /api/cleaner/onboarding/steps/{step}
async fn submit_step(
    State(state): State<OnboardingRouteState>,
    Path(step): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match state.store.submit_step_payload(&step, payload).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => step_error_response(e),
    }
}

/// POST /api/cleaner/onboarding/complete
async fn complete(State(state): State<OnboardingRouteState>) -> Response {
    match state.store.complete_onboarding().await {
        Ok(handoff) => Json(handoff).into_response(),
        Err(e) => step_error_response(e),
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    debug!(error = %rejection, "Rejected request body");
    error_body(rejection.status(), rejection.body_text())
}

fn store_error_response(e: StoreError) -> Response {
    warn!(error = %e, "Progress store error");
    match e {
        StoreError::Status { status, message } => error_body(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message,
        ),
        StoreError::Timeout(_) => error_body(StatusCode::GATEWAY_TIMEOUT, e.to_string()),
        other => error_body(StatusCode::SERVICE_UNAVAILABLE, other.to_string()),
    }
}

fn step_error_response(e: StepError) -> Response {
    match e {
        StepError::Rejected { status, message } => error_body(
            StatusCode::from_u16(status).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY),
            message,
        ),
        StepError::InvalidPayload { .. } => error_body(StatusCode::BAD_REQUEST, e.to_string()),
        other => error_body(StatusCode::BAD_GATEWAY, other.to_string()),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(&format!("{ONBOARDING_PREFIX}/progress"), get(get_progress))
        .route(
            &format!("{ONBOARDING_PREFIX}/current-step"),
            patch(set_current_step),
        )
        .route(&format!("{ONBOARDING_PREFIX}/steps/{{step}}"), post(submit_step))
        .route(&format!("{ONBOARDING_PREFIX}/complete"), post(complete))
        .with_state(state)
}
