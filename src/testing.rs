//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::llm::{CompletionRequest, CompletionResponse, Credentials, LlmError, LlmService, Message, Usage};
use crate::store::{PrimaryStore, SecondaryStore, StoreError, TaskSpawner};
use crate::mirror::MirrorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    /// Record of all requests made
    requests: Mutex<Vec<CompletionRequest>>,
    /// Notified each time a request arrives
    pub request_started: Arc<Notify>,
    /// When set, each request waits for a notification before answering
    gate: Option<Arc<Notify>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            request_started: Arc::new(Notify::new()),
            gate: None,
        }
    }

    /// Hold every request until `gate` is notified
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    /// Queue a response with a single choice
    pub fn queue_message(&self, message: Message) {
        self.queue_choices(vec![message]);
    }

    pub fn queue_choices(&self, choices: Vec<Message>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(CompletionResponse {
                choices,
                usage: Usage::default(),
            }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(
        &self,
        request: &CompletionRequest,
        _credentials: &Credentials,
    ) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory backend usable as either primary or secondary store
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
    /// Primary appends with the stamp they were given
    stamped: Mutex<Vec<(DateTime<Utc>, Vec<Message>)>>,
    load_calls: AtomicUsize,
    append_calls: AtomicUsize,
    fail_loads: AtomicBool,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    /// Primary appends ordered the way the mirror would list them
    pub fn messages_by_created_at(&self) -> Vec<Message> {
        let mut stamped = self.stamped.lock().unwrap().clone();
        stamped.sort_by_key(|(at, _)| *at);
        stamped.into_iter().flat_map(|(_, batch)| batch).collect()
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn do_load(&self) -> Result<Vec<Message>, StoreError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(MirrorError::Http("load refused".to_string()).into());
        }
        Ok(self.messages())
    }

    fn do_append(&self, batch: &[Message]) -> Result<(), StoreError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(MirrorError::Http("append refused".to_string()).into());
        }
        self.messages.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

#[async_trait]
impl PrimaryStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        self.do_load()
    }

    async fn append(&self, batch: &[Message], created_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.do_append(batch)?;
        self.stamped
            .lock()
            .unwrap()
            .push((created_at, batch.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl SecondaryStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        self.do_load()
    }

    async fn append(&self, batch: &[Message]) -> Result<(), StoreError> {
        self.do_append(batch)
    }
}

// ============================================================================
// Manual task spawner
// ============================================================================

/// Collects spawned tasks so tests decide when background work runs
#[derive(Default)]
pub struct ManualSpawner {
    tasks: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl ManualSpawner {
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Run every queued task to completion, in spawn order
    pub async fn run_all(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            task.await;
        }
    }

    /// Run every queued task to completion, newest first
    pub async fn run_all_reversed(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks.into_iter().rev() {
            task.await;
        }
    }
}

impl TaskSpawner for ManualSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.tasks.lock().unwrap().push(task);
    }
}
