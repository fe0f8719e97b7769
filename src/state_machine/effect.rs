//! Effects produced by state transitions

use crate::llm::{Message, ToolCall};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Durably record the user's message on its own, before any network call
    PersistUserMessage { message: Message },

    /// Ask for a completion over the durable log followed by `working`
    RequestCompletion { working: Vec<Message> },

    /// Run the tools sequentially, in this order
    DispatchTools { calls: Vec<ToolCall> },

    /// Durably record the pass's batch with a single append
    PersistBatch { batch: Vec<Message> },
}
