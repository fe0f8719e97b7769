//! Process configuration, read once from the environment at startup

use crate::llm::LlmConfig;
use crate::mirror::MirrorConfig;
use crate::system_prompt::Mode;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Mode for the first pass; clients may change it later
    pub mode: Mode,
    pub llm: LlmConfig,
    /// Absent means the local store is the only backend
    pub mirror: Option<MirrorConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("CONVERSE_DB_PATH").map_or_else(
            |_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".converse").join("converse.db")
            },
            PathBuf::from,
        );

        let port = std::env::var("CONVERSE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let mode = match std::env::var("CONVERSE_MODE") {
            Ok(raw) => parse_mode(&raw),
            Err(_) => Mode::default(),
        };

        Self {
            db_path,
            port,
            mode,
            llm: LlmConfig::from_env(),
            mirror: MirrorConfig::from_env(),
        }
    }
}

fn parse_mode(raw: &str) -> Mode {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!(value = raw, error = %e, "Ignoring CONVERSE_MODE");
        Mode::default()
    })
}
