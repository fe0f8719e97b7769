//! Property-based tests for the pass state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::llm::{Message, ToolCall};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    (
        "[a-z0-9]{4,10}",
        prop_oneof![Just("generate_image"), Just("web_search"), Just("teleport")],
        "[a-zA-Z0-9 ]{0,20}",
    )
        .prop_map(|(id, name, arg)| ToolCall::new(id, name, format!("{{\"prompt\":\"{arg}\"}}")))
}

/// Non-empty call list with unique ids
fn arb_tool_calls() -> impl Strategy<Value = Vec<ToolCall>> {
    proptest::collection::vec(arb_tool_call(), 1..5).prop_map(|calls| {
        calls
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.id = format!("{}_{i}", c.id);
                c
            })
            .collect()
    })
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?]{0,40}"
}

fn arb_pass_error() -> impl Strategy<Value = PassError> {
    prop_oneof![
        arb_text().prop_map(PassError::AuthFailure),
        arb_text().prop_map(PassError::RemoteFailure),
        arb_text().prop_map(PassError::DecodeFailure),
    ]
}

fn arb_busy_state() -> impl Strategy<Value = PassState> {
    prop_oneof![
        Just(PassState::AwaitingFirstCompletion),
        arb_tool_calls().prop_map(|calls| PassState::ToolDispatch {
            request: Message::assistant_with_tool_calls("", calls),
        }),
        arb_tool_calls().prop_map(|calls| {
            let mut pending: Vec<Message> = calls
                .iter()
                .map(|c| Message::tool_result(c, "ok"))
                .collect();
            pending.insert(0, Message::assistant_with_tool_calls("", calls));
            PassState::AwaitingSecondCompletion { pending }
        }),
    ]
}

fn arb_resting_state() -> impl Strategy<Value = PassState> {
    prop_oneof![
        Just(PassState::Idle),
        Just(PassState::Done),
        arb_pass_error().prop_map(|error| PassState::Failed { error }),
    ]
}

fn arb_event() -> impl Strategy<Value = PassEvent> {
    prop_oneof![
        arb_text().prop_map(|text| PassEvent::UserInput { text }),
        arb_text().prop_map(|t| PassEvent::CompletionReceived {
            message: Message::assistant(t)
        }),
        arb_tool_calls().prop_map(|calls| PassEvent::CompletionReceived {
            message: Message::assistant_with_tool_calls("", calls)
        }),
        arb_pass_error().prop_map(|error| PassEvent::Failure { error }),
    ]
}

fn persisted(effects: &[Effect]) -> Vec<&Vec<Message>> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::PersistBatch { batch } => Some(batch),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Busy states never accept a new user input
    #[test]
    fn busy_states_reject_user_input(state in arb_busy_state(), text in arb_text()) {
        prop_assert!(state.is_busy());
        let result = transition(&state, PassEvent::UserInput { text });
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
    }

    /// Resting states always start a pass by persisting the user message first
    #[test]
    fn resting_states_start_pass(state in arb_resting_state(), text in arb_text()) {
        prop_assert!(!state.is_busy());
        let result = transition(&state, PassEvent::UserInput { text: text.clone() }).unwrap();
        prop_assert_eq!(result.new_state, PassState::AwaitingFirstCompletion);
        prop_assert_eq!(
            result.effects.first(),
            Some(&Effect::PersistUserMessage { message: Message::user(text) })
        );
    }

    /// A failure in any busy state persists exactly one marked assistant message
    #[test]
    fn failure_persists_single_notice(state in arb_busy_state(), error in arb_pass_error()) {
        let result = transition(&state, PassEvent::Failure { error }).unwrap();
        prop_assert!(
            matches!(result.new_state, PassState::Failed { .. }),
            "expected failed state, got {}",
            result.new_state.name()
        );

        let batches = persisted(&result.effects);
        prop_assert_eq!(batches.len(), 1);
        prop_assert_eq!(batches[0].len(), 1);
        prop_assert!(batches[0][0].content.starts_with(FAILURE_MARKER));
        prop_assert!(!batches[0][0].has_tool_calls());
    }

    /// A full tool pass persists [request, results in issued order, final]
    #[test]
    fn tool_pass_batch_order(calls in arb_tool_calls(), final_text in arb_text()) {
        let request = Message::assistant_with_tool_calls("", calls.clone());

        let first = transition(
            &PassState::AwaitingFirstCompletion,
            PassEvent::CompletionReceived { message: request.clone() },
        ).unwrap();
        prop_assert_eq!(&first.effects, &vec![Effect::DispatchTools { calls: calls.clone() }]);

        let results: Vec<Message> = calls.iter().map(|c| Message::tool_result(c, "r")).collect();
        let second = transition(
            &first.new_state,
            PassEvent::ToolsCompleted { results: results.clone() },
        ).unwrap();

        let done = transition(
            &second.new_state,
            PassEvent::CompletionReceived { message: Message::assistant(final_text.clone()) },
        ).unwrap();
        prop_assert_eq!(&done.new_state, &PassState::Done);

        let batches = persisted(&done.effects);
        prop_assert_eq!(batches.len(), 1);
        let batch = batches[0];
        prop_assert_eq!(batch.len(), calls.len() + 2);
        prop_assert_eq!(&batch[0], &request);
        for (i, call) in calls.iter().enumerate() {
            prop_assert_eq!(batch[i + 1].tool_call_ref.as_deref(), Some(call.id.as_str()));
        }
        prop_assert_eq!(batch.last().unwrap(), &Message::assistant(final_text));
    }

    /// Resting states ignore everything except user input
    #[test]
    fn resting_states_reject_non_input_events(state in arb_resting_state(), event in arb_event()) {
        let is_input = matches!(event, PassEvent::UserInput { .. });
        let result = transition(&state, event);
        prop_assert_eq!(result.is_ok(), is_input);
    }

    /// Transitions are deterministic
    #[test]
    fn transition_is_pure(state in arb_busy_state(), event in arb_event()) {
        let a = transition(&state, event.clone());
        let b = transition(&state, event);
        match (a, b) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.new_state, b.new_state);
                prop_assert_eq!(a.effects, b.effects);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            _ => prop_assert!(false, "nondeterministic transition"),
        }
    }
}
