//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ErrorResponse, ModeBody, SendMessageRequest, SendMessageResponse};
use super::AppState;
use crate::runtime::{ConversationView, PassOutcome, RuntimeError};
use crate::system_prompt::Mode;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/conversation", get(get_conversation))
        .route("/api/conversation/messages", post(send_message))
        .route("/api/conversation/stream", get(stream_conversation))
        .route("/api/mode", put(set_mode))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Conversation
// ============================================================

async fn get_conversation(State(state): State<AppState>) -> Json<ConversationView> {
    Json(state.orchestrator.view())
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }

    let (outcome, error) = match state.orchestrator.start_pass(&req.text).await? {
        PassOutcome::Rejected => {
            return Err(AppError::Conflict(
                "A reply is already in progress".to_string(),
            ))
        }
        PassOutcome::Done => ("done", None),
        PassOutcome::Failed(e) => ("failed", Some(e.to_string())),
    };

    Ok(Json(SendMessageResponse {
        outcome,
        error,
        messages: state.orchestrator.view().messages,
    }))
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    sse_stream(state.orchestrator.subscribe())
}

// ============================================================
// Mode
// ============================================================

async fn set_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeBody>,
) -> Result<Json<ModeBody>, AppError> {
    let mode: Mode = body
        .mode
        .parse()
        .map_err(|e: crate::system_prompt::UnknownMode| AppError::BadRequest(e.to_string()))?;
    state.orchestrator.set_mode(mode).await;
    Ok(Json(ModeBody {
        mode: mode.to_string(),
    }))
}

async fn get_version() -> &'static str {
    concat!("converse ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        tracing::error!(error = %e, "Pass aborted");
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
