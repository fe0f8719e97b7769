//! Production adapters for the store backends

use super::{PrimaryStore, SecondaryStore, StoreError};
use crate::db::Database;
use crate::llm::Message;
use crate::mirror::MirrorClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Adapter to use `Database` as the secondary store
#[derive(Clone)]
pub struct DatabaseBackend {
    db: Database,
}

impl DatabaseBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SecondaryStore for DatabaseBackend {
    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self.db.load_messages()?)
    }

    async fn append(&self, batch: &[Message]) -> Result<(), StoreError> {
        let len = self.db.append_messages(batch)?;
        tracing::debug!(appended = batch.len(), total = len, "Local store append");
        Ok(())
    }
}

/// Adapter to use `MirrorClient` as the primary store
pub struct MirrorBackend {
    client: MirrorClient,
}

impl MirrorBackend {
    pub fn new(client: MirrorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PrimaryStore for MirrorBackend {
    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self.client.fetch_all().await?)
    }

    async fn append(&self, batch: &[Message], created_at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(self.client.insert(batch, created_at).await?)
    }
}
