//! Pass state types

use super::PassError;
use crate::llm::Message;

/// Where a pass currently stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PassState {
    /// No pass in flight
    #[default]
    Idle,

    /// User message persisted, first completion requested
    AwaitingFirstCompletion,

    /// Model asked for tools; `request` is its assistant message
    ToolDispatch { request: Message },

    /// Tools ran; `pending` holds the request and every tool result in
    /// issued order, not yet durable
    AwaitingSecondCompletion { pending: Vec<Message> },

    /// Pass finished and its batch is persisted
    Done,

    /// Pass aborted; only the failure notice was persisted
    Failed { error: PassError },
}

impl PassState {
    /// True while a pass is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(
            self,
            PassState::Idle | PassState::Done | PassState::Failed { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PassState::Idle => "idle",
            PassState::AwaitingFirstCompletion => "awaiting_first_completion",
            PassState::ToolDispatch { .. } => "tool_dispatch",
            PassState::AwaitingSecondCompletion { .. } => "awaiting_second_completion",
            PassState::Done => "done",
            PassState::Failed { .. } => "failed",
        }
    }
}
