//! Remote mirror of the conversation log
//!
//! Talks to a PostgREST-style table: one row per message, ordered by
//! `created_at`. The mirror is optional and never the source of truth.

use crate::llm::{Message, Role, ToolCall};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TABLE: &str = "messages";

/// Connection settings for the remote mirror
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Project root, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub api_key: String,
    pub table: String,
}

impl MirrorConfig {
    /// `None` unless both `MIRROR_URL` and `MIRROR_API_KEY` are set
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("MIRROR_URL").ok().filter(|v| !v.is_empty())?;
        let api_key = std::env::var("MIRROR_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self {
            url,
            api_key,
            table: std::env::var("MIRROR_TABLE").unwrap_or_else(|_| DEFAULT_TABLE.to_string()),
        })
    }
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Mirror request failed: {0}")]
    Http(String),
    #[error("Mirror returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Mirror row is invalid: {0}")]
    InvalidRow(String),
}

/// One mirrored message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRow {
    pub role: String,
    #[serde(default)]
    pub content: String,
    /// JSON text of the tool call list, null when absent
    #[serde(default)]
    pub tool_calls: Option<String>,
    #[serde(default)]
    pub tool_call_ref: Option<String>,
    #[serde(default)]
    pub capability_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MirrorRow {
    pub fn from_message(msg: &Message, created_at: DateTime<Utc>) -> Result<Self, MirrorError> {
        let tool_calls = msg
            .tool_calls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MirrorError::InvalidRow(e.to_string()))?;

        Ok(Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
            tool_calls,
            tool_call_ref: msg.tool_call_ref.clone(),
            capability_name: msg.capability_name.clone(),
            created_at,
        })
    }

    pub fn into_message(self) -> Result<Message, MirrorError> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| MirrorError::InvalidRow(format!("unknown role {}", self.role)))?;
        let tool_calls = self
            .tool_calls
            .as_deref()
            .map(serde_json::from_str::<Vec<ToolCall>>)
            .transpose()
            .map_err(|e| MirrorError::InvalidRow(e.to_string()))?;

        Ok(Message {
            role,
            content: self.content,
            tool_calls,
            tool_call_ref: self.tool_call_ref,
            capability_name: self.capability_name,
        })
    }
}

/// Rows for `batch` with strictly increasing timestamps starting at `base`,
/// so ordering by `created_at` reproduces batch order.
pub fn rows_for_batch(batch: &[Message], base: DateTime<Utc>) -> Result<Vec<MirrorRow>, MirrorError> {
    batch
        .iter()
        .zip(0i64..)
        .map(|(msg, offset)| MirrorRow::from_message(msg, base + ChronoDuration::microseconds(offset)))
        .collect()
}

/// HTTP client for the mirror table
pub struct MirrorClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl MirrorClient {
    pub fn new(config: &MirrorConfig) -> Result<Self, MirrorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MirrorError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MirrorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MirrorError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch every mirrored message in `created_at` order
    pub async fn fetch_all(&self) -> Result<Vec<Message>, MirrorError> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[
                (
                    "select",
                    "role,content,tool_calls,tool_call_ref,capability_name,created_at",
                ),
                ("order", "created_at.asc"),
            ])
            .send()
            .await
            .map_err(|e| MirrorError::Http(e.to_string()))?;

        let rows: Vec<MirrorRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MirrorError::InvalidRow(e.to_string()))?;

        rows.into_iter().map(MirrorRow::into_message).collect()
    }

    /// Insert `batch` as new rows stamped from `created_at` on
    pub async fn insert(&self, batch: &[Message], created_at: DateTime<Utc>) -> Result<(), MirrorError> {
        let rows = rows_for_batch(batch, created_at)?;
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|e| MirrorError::Http(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}
