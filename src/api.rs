//! HTTP API for the conversation
//!
//! A thin view layer over the orchestrator: read the log, submit input,
//! switch mode and follow changes over SSE.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::Orchestrator;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}
