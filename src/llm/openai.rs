//! `OpenAI`-compatible chat completions provider

use super::types::{CompletionRequest, CompletionResponse, Credentials, Message, Role, ToolCall, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAIService {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    fn translate_request(&self, request: &CompletionRequest) -> OpenAIRequest {
        let messages = request.messages.iter().map(Self::translate_message).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAITool {
                        r#type: "function".to_string(),
                        function: OpenAIFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        // tool_choice is rejected by the API unless tools are present
        let tool_choice = tools.as_ref().map(|_| "auto".to_string());

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            tools,
            tool_choice,
            stream: false,
        }
    }

    fn translate_message(msg: &Message) -> OpenAIMessage {
        let tool_calls = msg.tool_calls.as_ref().filter(|c| !c.is_empty()).map(|calls| {
            calls
                .iter()
                .map(|call| OpenAIToolCall {
                    id: call.id.clone(),
                    r#type: "function".to_string(),
                    function: OpenAIFunctionCall {
                        name: call.capability_name.clone(),
                        arguments: call.argument_payload.clone(),
                    },
                })
                .collect()
        });

        // Assistant tool requests usually carry no text; the API wants null there
        let content = if tool_calls.is_some() && msg.content.is_empty() {
            None
        } else {
            Some(msg.content.clone())
        };

        OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content,
            tool_calls,
            tool_call_id: msg.tool_call_ref.clone(),
            name: msg.capability_name.clone(),
        }
    }

    fn normalize_message(msg: OpenAIMessage) -> Message {
        let role = Role::parse(&msg.role).unwrap_or(Role::Assistant);

        let tool_calls = msg.tool_calls.map(|calls| {
            calls
                .into_iter()
                .filter(|tc| !tc.function.name.is_empty())
                .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                .collect::<Vec<_>>()
        });

        Message {
            role,
            content: msg.content.unwrap_or_default(),
            tool_calls: tool_calls.filter(|c| !c.is_empty()),
            tool_call_ref: msg.tool_call_id,
            capability_name: msg.name,
        }
    }

    fn normalize_response(resp: OpenAIResponse) -> CompletionResponse {
        let usage = resp
            .usage
            .map(|u| Usage {
                input_tokens: u64::from(u.prompt_tokens),
                output_tokens: u64::from(u.completion_tokens),
            })
            .unwrap_or_default();

        CompletionResponse {
            choices: resp
                .choices
                .into_iter()
                .map(|c| Self::normalize_message(c.message))
                .collect(),
            usage,
        }
    }
}

/// Classify a non-success response.
///
/// Prefers the server-reported message; falls back to the status text.
pub(crate) fn error_from_status(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<OpenAIErrorResponse>(body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
        });

    match status.as_u16() {
        401 => LlmError::auth(format!("Authentication failed: {message}")),
        429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
        400 => LlmError::invalid_request(format!("Invalid request: {message}")),
        500..=599 => LlmError::server_error(format!("Server error: {message}")),
        _ => LlmError::unknown(format!("HTTP {}: {message}", status.as_u16())),
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<CompletionResponse, LlmError> {
        let openai_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&credentials.api_key)
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }

        let openai_response: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(Self::normalize_response(openai_response))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
