//! API request and response types

use crate::llm::Message;
use serde::{Deserialize, Serialize};

/// Request to submit user input
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Result of a finished pass
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// `done` or `failed`
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub messages: Vec<Message>,
}

/// Request and response body for mode changes
#[derive(Debug, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
