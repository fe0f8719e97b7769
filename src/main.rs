//! Converse - a single-conversation chat service
//!
//! Runs a tool-calling orchestration loop against an OpenAI-compatible
//! completion API, keeping the log in SQLite with an optional remote mirror.

mod api;
mod config;
mod db;
mod llm;
mod mirror;
mod runtime;
mod state_machine;
mod store;
mod system_prompt;
#[cfg(test)]
mod testing;
mod tools;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::{CompletionClient, Credentials, LoggingService, OpenAIService};
use mirror::MirrorClient;
use runtime::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use store::{DatabaseBackend, MessageStore, MirrorBackend, MirrorEvent, PrimaryStore, TokioSpawner};
use tools::ToolRegistry;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "converse=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let primary: Option<Arc<dyn PrimaryStore>> = match &config.mirror {
        Some(mirror) => {
            tracing::info!(url = %mirror.url, table = %mirror.table, "Remote mirror enabled");
            Some(Arc::new(MirrorBackend::new(MirrorClient::new(mirror)?)))
        }
        None => {
            tracing::info!("No remote mirror configured, using local store only");
            None
        }
    };

    let store = MessageStore::new(
        Arc::new(DatabaseBackend::new(db)),
        primary,
        Arc::new(TokioSpawner),
    );
    if store.has_mirror() {
        spawn_mirror_monitor(&store);
    }

    // Completion provider
    let service = OpenAIService::new(&config.llm.base_url, config.llm.model.clone())?;
    let tools = ToolRegistry::standard();
    let client = CompletionClient::new(
        Arc::new(LoggingService::new(Arc::new(service))),
        tools.definitions(),
    );

    let credentials = if let Some(key) = &config.llm.api_key {
        Credentials::new(key.clone())
    } else {
        tracing::warn!("OPENAI_API_KEY is not set; every pass will fail authentication");
        Credentials::new("")
    };

    tracing::info!(
        model = %client.model_id(),
        base_url = %config.llm.base_url,
        mode = %config.mode,
        "Completion client initialized"
    );

    let orchestrator = Orchestrator::new(store, client, tools, credentials, config.mode).await?;
    let state = AppState::new(orchestrator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true).deflate(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Converse server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log the outcome of background mirror writes
fn spawn_mirror_monitor(store: &MessageStore) {
    let mut events = store.subscribe_mirror_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MirrorEvent::Appended { batch_len }) => {
                    tracing::debug!(batch_len, "Mirror append succeeded");
                }
                Ok(MirrorEvent::AppendFailed { batch_len, error }) => {
                    tracing::warn!(batch_len, %error, "Mirror is behind the local store");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Mirror monitor lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
