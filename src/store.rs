//! Dual-backend message store
//!
//! The secondary (local) backend is the durability source of truth: an
//! append does not complete until it has succeeded. The primary (remote
//! mirror) backend is optional. It wins outright on load when it has data,
//! and is written best-effort from a detached task on append. Batches
//! missed while the mirror is down are never backfilled.

mod backends;
mod spawner;

pub use backends::{DatabaseBackend, MirrorBackend};
pub use spawner::{TaskSpawner, TokioSpawner};

use crate::db::DbError;
use crate::llm::Message;
use crate::mirror::MirrorError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Optional remote mirror
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Message>, StoreError>;

    /// Append `batch`, its first message stamped `created_at` and each
    /// following one a microsecond later
    async fn append(&self, batch: &[Message], created_at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Always-present local durable store
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Message>, StoreError>;

    async fn append(&self, batch: &[Message]) -> Result<(), StoreError>;
}

/// Outcome of a background mirror write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    Appended { batch_len: usize },
    AppendFailed { batch_len: usize, error: String },
}

const MIRROR_EVENT_CAPACITY: usize = 64;

/// Conversation log storage used by the orchestrator
#[derive(Clone)]
pub struct MessageStore {
    primary: Option<Arc<dyn PrimaryStore>>,
    secondary: Arc<dyn SecondaryStore>,
    spawner: Arc<dyn TaskSpawner>,
    mirror_events: broadcast::Sender<MirrorEvent>,
    /// Earliest timestamp the next mirrored batch may start at
    mirror_clock: Arc<Mutex<DateTime<Utc>>>,
}

impl MessageStore {
    pub fn new(
        secondary: Arc<dyn SecondaryStore>,
        primary: Option<Arc<dyn PrimaryStore>>,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        let (mirror_events, _) = broadcast::channel(MIRROR_EVENT_CAPACITY);
        Self {
            primary,
            secondary,
            spawner,
            mirror_events,
            mirror_clock: Arc::new(Mutex::new(DateTime::<Utc>::MIN_UTC)),
        }
    }

    pub fn has_mirror(&self) -> bool {
        self.primary.is_some()
    }

    /// Subscribe to background mirror write outcomes
    pub fn subscribe_mirror_events(&self) -> broadcast::Receiver<MirrorEvent> {
        self.mirror_events.subscribe()
    }

    /// Load the log: the mirror's copy if it has one, else the local copy.
    /// The two are never merged.
    pub async fn load(&self) -> Result<Vec<Message>, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.load().await {
                Ok(messages) if !messages.is_empty() => {
                    tracing::info!(count = messages.len(), "Loaded conversation from mirror");
                    return Ok(messages);
                }
                Ok(_) => {
                    tracing::debug!("Mirror is empty, falling back to local store");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Mirror load failed, falling back to local store");
                }
            }
        }

        let messages = self.secondary.load().await?;
        tracing::info!(count = messages.len(), "Loaded conversation from local store");
        Ok(messages)
    }

    /// Append `batch` durably, then mirror it in the background
    pub async fn append(&self, batch: Vec<Message>) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        self.secondary.append(&batch).await?;

        if let Some(primary) = self.primary.clone() {
            // Stamped here, in append order; the task may run much later
            let created_at = self.stamp_batch(batch.len());
            let events = self.mirror_events.clone();
            self.spawner.spawn(Box::pin(async move {
                let batch_len = batch.len();
                let event = match primary.append(&batch, created_at).await {
                    Ok(()) => MirrorEvent::Appended { batch_len },
                    Err(e) => {
                        tracing::warn!(error = %e, batch_len, "Mirror append failed");
                        MirrorEvent::AppendFailed {
                            batch_len,
                            error: e.to_string(),
                        }
                    }
                };
                // No subscribers is fine
                let _ = events.send(event);
            }));
        }

        Ok(())
    }

    /// Reserve `len` strictly increasing microsecond stamps after every
    /// stamp handed out before
    fn stamp_batch(&self, len: usize) -> DateTime<Utc> {
        let mut next = self
            .mirror_clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let base = Utc::now().max(*next);
        let span = i64::try_from(len).unwrap_or(i64::MAX);
        *next = base + ChronoDuration::microseconds(span);
        base
    }
}
