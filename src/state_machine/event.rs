//! Events that drive a pass

use crate::llm::{LlmError, Message};
use crate::tools::DecodeError;
use thiserror::Error;

/// Prefix of every synthesized failure message
pub const FAILURE_MARKER: &str = "⚠️";

/// Why a pass failed. All variants end the pass the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("{}. Check your API key.", .0.trim_end_matches('.'))]
    AuthFailure(String),
    #[error("The assistant could not respond: {0}")]
    RemoteFailure(String),
    #[error("The assistant sent a malformed tool request. {0}")]
    DecodeFailure(String),
}

impl PassError {
    /// Content of the assistant message recorded for this failure
    pub fn user_message(&self) -> String {
        format!("{FAILURE_MARKER} {self}")
    }
}

impl From<LlmError> for PassError {
    fn from(e: LlmError) -> Self {
        if e.is_auth() {
            PassError::AuthFailure(e.message)
        } else {
            PassError::RemoteFailure(e.message)
        }
    }
}

impl From<DecodeError> for PassError {
    fn from(e: DecodeError) -> Self {
        PassError::DecodeFailure(e.to_string())
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum PassEvent {
    /// Raw text submitted by the user
    UserInput { text: String },

    /// The completion service answered
    CompletionReceived { message: Message },

    /// Every requested tool ran; results in issued order
    ToolsCompleted { results: Vec<Message> },

    /// A completion or tool dispatch failed
    Failure { error: PassError },
}
