//! Capabilities the model may invoke
//!
//! Tools are synchronous and stateless: given the same name and arguments
//! they produce the same text, and they never touch the conversation log.

mod generate_image;
mod web_search;

pub use generate_image::GenerateImageTool;
pub use web_search::WebSearchTool;

use crate::llm::ToolDefinition;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Result text for a capability name nobody declared
pub const UNKNOWN_CAPABILITY: &str = "unknown capability";

/// Argument payload could not be turned into a tool input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid arguments for {capability}: {reason}")]
pub struct DecodeError {
    pub capability: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            reason: reason.into(),
        }
    }
}

/// Parse a raw argument payload into a JSON object.
///
/// An empty payload is an empty object; anything that is not an object is
/// rejected.
pub fn parse_payload(capability: &str, payload: &str) -> Result<Map<String, Value>, DecodeError> {
    if payload.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DecodeError::new(
            capability,
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
        Err(e) => Err(DecodeError::new(capability, e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode validated arguments into a tool's typed input
pub(crate) fn decode_input<T: DeserializeOwned>(
    capability: &str,
    args: Map<String, Value>,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| DecodeError::new(capability, e.to_string()))
}

/// Schema for an object whose properties are all required strings
pub(crate) fn string_object_schema(properties: &[(&str, &str)]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, description)| {
            (
                (*name).to_string(),
                serde_json::json!({ "type": "string", "description": description }),
            )
        })
        .collect();
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();

    serde_json::json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

/// A locally executable capability
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &'static str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool arguments
    fn input_schema(&self) -> Value;

    /// Validate `args` into the tool's input and run it
    fn run(&self, args: Map<String, Value>) -> Result<String, DecodeError>;
}

/// The fixed set of capabilities offered to the model
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        Self {
            tools: vec![Arc::new(GenerateImageTool), Arc::new(WebSearchTool)],
        }
    }

    /// Capability schemas in declaration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                parameters: t.input_schema(),
            })
            .collect()
    }

    /// Execute a capability by name.
    ///
    /// The payload is always parsed, so malformed JSON is a `DecodeError`
    /// even for a name that turns out to be unknown.
    pub fn execute(&self, name: &str, argument_payload: &str) -> Result<String, DecodeError> {
        let args = parse_payload(name, argument_payload)?;
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => tool.run(args),
            None => {
                tracing::warn!(capability = %name, "Model requested unknown capability");
                Ok(UNKNOWN_CAPABILITY.to_string())
            }
        }
    }
}
