//! Web search tool (stub)
//!
//! Declared so the model can ask for it, but no search backend is wired
//! up. The reply tells the model search is unavailable.

use super::{decode_input, string_object_schema, DecodeError, Tool};
use serde::Deserialize;
use serde_json::{Map, Value};

pub struct WebSearchTool;

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
}

impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> String {
        "Search the web for current information.".to_string()
    }

    fn input_schema(&self) -> Value {
        string_object_schema(&[("query", "The search query")])
    }

    fn run(&self, args: Map<String, Value>) -> Result<String, DecodeError> {
        let input: WebSearchInput = decode_input(self.name(), args)?;
        Ok(format!(
            "Web search is not available. No results for \"{}\".",
            input.query.trim()
        ))
    }
}
