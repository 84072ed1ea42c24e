//! REST endpoints for chat turns and per-thread preferences.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

use super::orchestrator::{ChatTurn, TurnOrchestrator};
use crate::error::RelayError;
use crate::preferences::{OnboardingData, PreferencesRecord, Settings};

/// Shared state for relay routes.
#[derive(Clone)]
pub struct RelayState {
    pub orchestrator: Arc<TurnOrchestrator>,
}

// ── Request / response bodies ──────────────────────────────────────────

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default, rename = "threadID", alias = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub onboarding_data: Option<OnboardingData>,
}

/// Body returned by `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(rename = "threadID")]
    pub thread_id: String,
}

/// Body of `POST /preferences`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    #[serde(default, rename = "threadID", alias = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub onboarding_data: Option<OnboardingData>,
}

/// Body returned by `POST /preferences`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreferencesResponse {
    pub success: bool,
    pub message: String,
}

// ── Errors ──────────────────────────────────────────────────────────────

/// HTTP-facing error: a relay error or a body that failed to parse.
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayError),
    Body(JsonRejection),
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        ApiError::Relay(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Body(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Body(rejection) => (
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                rejection.body_text(),
            ),
            ApiError::Relay(RelayError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            ApiError::Relay(RelayError::Agent(e)) if e.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                "AGENT_UNAVAILABLE",
                e.to_string(),
            ),
            ApiError::Relay(RelayError::Agent(e)) => {
                warn!(error = %e, "Agent call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "AGENT_ERROR",
                    "The agent service failed to answer".to_string(),
                )
            }
        };

        if status.is_server_error() {
            warn!(status = %status, code, %message, "Request failed");
        }

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            })),
        )
            .into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "nutribot-relay"
    }))
}

/// POST /chat
///
/// Runs one chat turn. A missing `threadID` starts a new thread; the
/// response always carries the thread id to use for the next turn.
async fn chat(
    State(state): State<RelayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    let input = req
        .input
        .ok_or_else(|| RelayError::InvalidRequest("input is required".to_string()))?;

    let turn = ChatTurn {
        input,
        thread_id: req.thread_id,
        settings: req.settings,
        onboarding_data: req.onboarding_data,
    };

    let span = info_span!("chat_turn", request_id = %Uuid::new_v4());
    let reply = state.orchestrator.handle_turn(turn).instrument(span).await?;

    Ok(Json(ChatResponse {
        response: reply.response,
        thread_id: reply.thread_id,
    }))
}

/// POST /preferences
///
/// Replaces both `settings` and `onboardingData` for the thread.
async fn update_preferences(
    State(state): State<RelayState>,
    payload: Result<Json<PreferencesRequest>, JsonRejection>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let Json(req) = payload?;
    let thread_id = req
        .thread_id
        .ok_or_else(|| RelayError::InvalidRequest("threadID is required".to_string()))?;
    let settings = req
        .settings
        .ok_or_else(|| RelayError::InvalidRequest("settings is required".to_string()))?;

    state
        .orchestrator
        .replace_preferences(&thread_id, settings, req.onboarding_data)
        .await?;

    Ok(Json(PreferencesResponse {
        success: true,
        message: "Preferences updated".to_string(),
    }))
}

/// GET /preferences/{thread_id}
///
/// Unknown threads get the default record, never a 404.
async fn get_preferences(
    State(state): State<RelayState>,
    Path(thread_id): Path<String>,
) -> Json<PreferencesRecord> {
    Json(state.orchestrator.preferences(&thread_id).await)
}

// ── Router ──────────────────────────────────────────────────────────────

/// Build the relay routes, served both at the root and under `/api`.
pub fn relay_routes(state: RelayState) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/preferences", post(update_preferences))
        .route("/preferences/{thread_id}", get(get_preferences));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(state)
}

/// Relay routes wrapped with request tracing and CORS.
///
/// An empty origin list allows any origin.
pub fn relay_app(state: RelayState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    relay_routes(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}
