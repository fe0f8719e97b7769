//! Pure state transition function

use super::{Effect, PassEvent, PassState};
use crate::llm::Message;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: PassState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: PassState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A pass is already in flight")]
    Busy,
    #[error("Tool results do not answer the requested calls in order")]
    MismatchedToolResults,
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(state: &PassState, event: PassEvent) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // A new pass can start from any resting state
        (PassState::Idle | PassState::Done | PassState::Failed { .. }, PassEvent::UserInput { text }) => {
            Ok(TransitionResult::new(PassState::AwaitingFirstCompletion)
                .with_effect(Effect::PersistUserMessage {
                    message: Message::user(text),
                })
                .with_effect(Effect::RequestCompletion { working: vec![] }))
        }

        (_, PassEvent::UserInput { .. }) => Err(TransitionError::Busy),

        // First completion, plain answer
        (PassState::AwaitingFirstCompletion, PassEvent::CompletionReceived { message })
            if !message.has_tool_calls() =>
        {
            Ok(TransitionResult::new(PassState::Done)
                .with_effect(Effect::PersistBatch { batch: vec![message] }))
        }

        // First completion, tools requested
        (PassState::AwaitingFirstCompletion, PassEvent::CompletionReceived { message }) => {
            let calls = message.requested_tool_calls().to_vec();
            Ok(TransitionResult::new(PassState::ToolDispatch { request: message })
                .with_effect(Effect::DispatchTools { calls }))
        }

        (PassState::ToolDispatch { request }, PassEvent::ToolsCompleted { results }) => {
            if !answers_in_order(request, &results) {
                return Err(TransitionError::MismatchedToolResults);
            }

            let mut pending = Vec::with_capacity(results.len() + 1);
            pending.push(request.clone());
            pending.extend(results);

            Ok(TransitionResult::new(PassState::AwaitingSecondCompletion {
                pending: pending.clone(),
            })
            .with_effect(Effect::RequestCompletion { working: pending }))
        }

        (PassState::AwaitingSecondCompletion { pending }, PassEvent::CompletionReceived { message }) => {
            let mut batch = pending.clone();
            batch.push(without_tool_calls(message));
            Ok(TransitionResult::new(PassState::Done).with_effect(Effect::PersistBatch { batch }))
        }

        // Any failure discards pending work and records a single notice
        (
            PassState::AwaitingFirstCompletion
            | PassState::ToolDispatch { .. }
            | PassState::AwaitingSecondCompletion { .. },
            PassEvent::Failure { error },
        ) => {
            let notice = Message::assistant(error.user_message());
            Ok(TransitionResult::new(PassState::Failed { error })
                .with_effect(Effect::PersistBatch { batch: vec![notice] }))
        }

        (state, event) => Err(TransitionError::InvalidTransition {
            state: state.name(),
            event: event_name(&event),
        }),
    }
}

/// Tool results must answer the request's calls one-to-one, in issued order
fn answers_in_order(request: &Message, results: &[Message]) -> bool {
    let calls = request.requested_tool_calls();
    calls.len() == results.len()
        && calls
            .iter()
            .zip(results)
            .all(|(call, result)| result.tool_call_ref.as_deref() == Some(call.id.as_str()))
}

/// The second completion has no follow-up round, so any tool calls it
/// carries would be left unanswered in the log
fn without_tool_calls(mut message: Message) -> Message {
    message.tool_calls = None;
    message
}

fn event_name(event: &PassEvent) -> &'static str {
    match event {
        PassEvent::UserInput { .. } => "user_input",
        PassEvent::CompletionReceived { .. } => "completion_received",
        PassEvent::ToolsCompleted { .. } => "tools_completed",
        PassEvent::Failure { .. } => "failure",
    }
}
