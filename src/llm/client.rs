//! Turn-level completion client

use super::types::{CompletionRequest, Credentials, Message, Role, ToolDefinition};
use super::{LlmError, LlmService};
use crate::system_prompt::{compose, Mode};
use std::sync::Arc;

/// Sends one conversational turn to the completion service.
///
/// Tool calls in the reply are returned untouched; interpreting them is the
/// orchestrator's job.
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn LlmService>,
    tools: Vec<ToolDefinition>,
}

impl CompletionClient {
    pub fn new(service: Arc<dyn LlmService>, tools: Vec<ToolDefinition>) -> Self {
        Self { service, tools }
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    /// Outgoing request: a fresh directive for `mode`, then `history` minus
    /// any earlier system messages, then the capability schemas.
    pub fn build_request(&self, history: &[Message], mode: Mode) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(compose(mode)));
        messages.extend(
            history
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );

        CompletionRequest {
            messages,
            tools: self.tools.clone(),
        }
    }

    pub async fn send_turn(
        &self,
        history: &[Message],
        mode: Mode,
        credentials: &Credentials,
    ) -> Result<Message, LlmError> {
        let request = self.build_request(history, mode);
        let response = self.service.complete(&request, credentials).await?;

        response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))
    }
}
