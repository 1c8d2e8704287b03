//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CountryRequest, ErrorResponse, MessageRequest, OptionRequest, QueuedResponse,
    SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::engine::ConversationSnapshot;
use crate::runtime::{RuntimeError, SseEvent};
use crate::state_machine::Event;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/chat/sessions", post(create_session))
        .route(
            "/api/chat/sessions/:id",
            get(get_session).delete(delete_session),
        )
        // SSE streaming
        .route("/api/chat/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/chat/sessions/:id/start", post(start_session))
        .route("/api/chat/sessions/:id/messages", post(send_message))
        .route("/api/chat/sessions/:id/options", post(select_option))
        .route("/api/chat/sessions/:id/countries", post(select_country))
        .route("/api/chat/sessions/:id/reset", post(reset_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let (session_id, handle) = state.runtime.create().await;
    Json(SessionResponse {
        session_id,
        snapshot: handle.snapshot(),
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    Ok(Json(state.runtime.snapshot(&id).await?))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before reading the snapshot so nothing falls in between
    let (snapshot, broadcast_rx) = state.runtime.subscribe(&id).await?;

    let init_event = SseEvent::Init {
        snapshot: serde_json::to_value(&snapshot).unwrap_or(Value::Null),
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn start_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::Start).await
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::UserText { text: req.text }).await
}

async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<OptionRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::OptionSelected { option: req.option }).await
}

async fn select_country(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CountryRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(
        &state,
        &id,
        Event::CountrySelected {
            country: req.country,
        },
    )
    .await
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::Reset).await
}

/// Hand the event to the session; whether the dialogue accepts it shows up
/// on the stream, never in this response
async fn queue(state: &AppState, id: &str, event: Event) -> Result<Json<QueuedResponse>, AppError> {
    state.runtime.send_event(id, event).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn get_version() -> &'static str {
    concat!("guru-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            RuntimeError::SessionStopped(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
