//! Conversation runtime
//!
//! Runs passes of the state machine against the real collaborators: the
//! completion client, the tool registry and the message store. At most one
//! pass is in flight at a time; a second `start_pass` while busy is a no-op.


use crate::llm::{CompletionClient, Credentials, Message};
use crate::state_machine::{transition, Effect, PassError, PassEvent, PassState, TransitionError};
use crate::store::{MessageStore, StoreError};
use crate::system_prompt::Mode;
use crate::tools::ToolRegistry;
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::Instrument;

/// What the view layer observes
#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub messages: Vec<Message>,
    pub busy: bool,
    pub mode: Mode,
}

/// How a call to `start_pass` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was in flight; nothing happened
    Rejected,
    Done,
    /// The failure notice was persisted as the pass's batch
    Failed(PassError),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Pass ended in unexpected state {0}")]
    Unfinished(&'static str),
}

struct Session {
    state: PassState,
    log: Vec<Message>,
}

/// Drives passes for a single conversation
pub struct Orchestrator {
    session: Mutex<Session>,
    store: MessageStore,
    client: CompletionClient,
    tools: ToolRegistry,
    credentials: Credentials,
    mode: RwLock<Mode>,
    view_tx: watch::Sender<ConversationView>,
}

impl Orchestrator {
    /// Build an orchestrator over the log currently in `store`
    pub async fn new(
        store: MessageStore,
        client: CompletionClient,
        tools: ToolRegistry,
        credentials: Credentials,
        mode: Mode,
    ) -> Result<Self, StoreError> {
        let log = store.load().await?;
        let (view_tx, _) = watch::channel(ConversationView {
            messages: log.clone(),
            busy: false,
            mode,
        });

        Ok(Self {
            session: Mutex::new(Session {
                state: PassState::Idle,
                log,
            }),
            store,
            client,
            tools,
            credentials,
            mode: RwLock::new(mode),
            view_tx,
        })
    }

    /// Subscribe to view updates
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.view_tx.subscribe()
    }

    /// Current view snapshot
    pub fn view(&self) -> ConversationView {
        self.view_tx.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.view_tx.borrow().busy
    }

    /// Change the mode; a pass already in flight keeps the mode it started with
    pub async fn set_mode(&self, mode: Mode) {
        *self.mode.write().await = mode;
        self.view_tx.send_modify(|view| view.mode = mode);
        tracing::info!(mode = %mode, "Conversation mode changed");
    }

    /// Run one pass for `raw_user_text`.
    ///
    /// Completion and tool failures are not errors here: they end the pass
    /// as `PassOutcome::Failed` with a notice in the log. Errors are reserved
    /// for the local store, which is the durability source of truth.
    pub async fn start_pass(&self, raw_user_text: &str) -> Result<PassOutcome, RuntimeError> {
        let Ok(mut session) = self.session.try_lock() else {
            tracing::debug!("Pass already in flight, ignoring input");
            return Ok(PassOutcome::Rejected);
        };

        let mode = *self.mode.read().await;
        let pass_id = uuid::Uuid::new_v4();
        self.publish(&session.log, true);

        let result = self
            .run_pass(&mut session, raw_user_text, mode)
            .instrument(tracing::info_span!("pass", %pass_id, mode = %mode))
            .await;

        session.state = PassState::Idle;
        self.publish(&session.log, false);
        result
    }

    async fn run_pass(
        &self,
        session: &mut Session,
        text: &str,
        mode: Mode,
    ) -> Result<PassOutcome, RuntimeError> {
        tracing::info!(log_len = session.log.len(), "Pass started");

        let mut events = VecDeque::from([PassEvent::UserInput {
            text: text.to_string(),
        }]);

        while let Some(event) = events.pop_front() {
            let result = transition(&session.state, event)?;
            tracing::debug!(
                from = session.state.name(),
                to = result.new_state.name(),
                "State transition"
            );
            session.state = result.new_state;

            for effect in result.effects {
                if let Some(next) = self.execute_effect(session, effect, mode).await? {
                    events.push_back(next);
                }
            }
        }

        match &session.state {
            PassState::Done => {
                tracing::info!(log_len = session.log.len(), "Pass done");
                Ok(PassOutcome::Done)
            }
            PassState::Failed { error } => {
                tracing::warn!(error = %error, "Pass failed");
                Ok(PassOutcome::Failed(error.clone()))
            }
            other => Err(RuntimeError::Unfinished(other.name())),
        }
    }

    async fn execute_effect(
        &self,
        session: &mut Session,
        effect: Effect,
        mode: Mode,
    ) -> Result<Option<PassEvent>, RuntimeError> {
        match effect {
            Effect::PersistUserMessage { message } => {
                self.persist(session, vec![message]).await?;
                Ok(None)
            }

            Effect::RequestCompletion { working } => {
                let mut history = Vec::with_capacity(session.log.len() + working.len());
                history.extend_from_slice(&session.log);
                history.extend(working);

                let event = match self.client.send_turn(&history, mode, &self.credentials).await {
                    Ok(message) => {
                        if message.has_tool_calls()
                            && matches!(session.state, PassState::AwaitingSecondCompletion { .. })
                        {
                            tracing::warn!(
                                calls = message.requested_tool_calls().len(),
                                "Dropping tool calls from final completion"
                            );
                        }
                        PassEvent::CompletionReceived { message }
                    }
                    Err(e) => PassEvent::Failure { error: e.into() },
                };
                Ok(Some(event))
            }

            Effect::DispatchTools { calls } => Ok(Some(self.dispatch_tools(&calls))),

            Effect::PersistBatch { batch } => {
                self.persist(session, batch).await?;
                Ok(None)
            }
        }
    }

    /// Run each call in issued order; the first decode failure aborts
    fn dispatch_tools(&self, calls: &[crate::llm::ToolCall]) -> PassEvent {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            match self.tools.execute(&call.capability_name, &call.argument_payload) {
                Ok(output) => {
                    tracing::info!(
                        capability = %call.capability_name,
                        call_id = %call.id,
                        "Tool executed"
                    );
                    results.push(Message::tool_result(call, output));
                }
                Err(e) => {
                    tracing::warn!(call_id = %call.id, error = %e, "Tool arguments rejected");
                    return PassEvent::Failure { error: e.into() };
                }
            }
        }
        PassEvent::ToolsCompleted { results }
    }

    async fn persist(&self, session: &mut Session, batch: Vec<Message>) -> Result<(), RuntimeError> {
        self.store.append(batch.clone()).await?;
        session.log.extend(batch);
        self.publish(&session.log, true);
        Ok(())
    }

    fn publish(&self, log: &[Message], busy: bool) {
        self.view_tx.send_modify(|view| {
            view.busy = busy;
            if view.messages.len() != log.len() {
                view.messages = log.to_vec();
            }
        });
    }
}
