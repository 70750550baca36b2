//! Task dispatch abstraction.
//!
//! Submission enqueues a [`TaskEnvelope`]; the worker pool dequeues and
//! executes, decoupling task execution from any request/response cycle.
//!
//! ## Design Principles
//!
//! - **Backend agnostic**: Same interface for cloud queues and local workers
//! - **Idempotent dispatch**: Task IDs enable deduplication
//! - **Structured payloads**: JSON-serializable task envelopes

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use tally_core::{DatasetId, Error as CoreError, TaskId, UserId};

use crate::column::ColumnSelector;
use crate::error::{Error, Result};

/// Envelope for a reconciliation task to be dispatched.
///
/// Contains everything a worker needs to execute without re-reading the
/// task row first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEnvelope {
    /// Unique task identifier.
    pub task_id: TaskId,
    /// The query dataset being reconciled.
    pub source_dataset: DatasetId,
    /// The master dataset being reconciled against.
    pub master_dataset: DatasetId,
    /// Column selector for the source side.
    pub source_column: ColumnSelector,
    /// Column selector for the master side.
    pub master_column: ColumnSelector,
    /// The submitting user.
    pub requested_by: UserId,
    /// When the task was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    /// Builds the envelope for a task record.
    #[must_use]
    pub fn for_task(task: &crate::task::ReconciliationTask) -> Self {
        Self {
            task_id: task.id,
            source_dataset: task.source_dataset,
            master_dataset: task.master_dataset,
            source_column: task.source_column.clone(),
            master_column: task.master_column.clone(),
            requested_by: task.requested_by,
            enqueued_at: Utc::now(),
        }
    }

    /// Returns the idempotency key for this envelope.
    ///
    /// Each task is created and executed exactly once, so the task ID
    /// alone is the key.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        self.task_id.to_string()
    }
}

/// Result of enqueuing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Task was enqueued successfully.
    Enqueued {
        /// Queue-specific message ID.
        message_id: String,
    },
    /// Task was deduplicated (already enqueued).
    Deduplicated {
        /// The existing message ID.
        existing_message_id: String,
    },
}

impl EnqueueResult {
    /// Returns true if the task was newly enqueued.
    #[must_use]
    pub const fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued { .. })
    }
}

/// Task queue abstraction for dispatching reconciliation work.
///
/// Implementations may target cloud task queues or local in-memory queues
/// (for testing and single-process deployments).
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    /// Enqueues a task for execution.
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<EnqueueResult>;

    /// Takes the next task from the queue, or `None` if it is empty.
    async fn take(&self) -> Result<Option<TaskEnvelope>>;

    /// Returns the approximate number of tasks in the queue.
    async fn queue_depth(&self) -> Result<usize>;

    /// Returns the queue's name or identifier.
    fn queue_name(&self) -> &str;
}

/// Internal queue state protected by a single lock.
#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<TaskEnvelope>,
    seen_keys: HashMap<String, String>,
}

/// In-memory task queue.
///
/// Thread-safe via `RwLock`. Suitable for tests and single-process
/// deployments; tasks are not visible across process boundaries.
#[derive(Debug)]
pub struct InMemoryTaskQueue {
    name: String,
    state: RwLock<QueueState>,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Core(CoreError::storage("task queue lock poisoned"))
}

impl InMemoryTaskQueue {
    /// Creates a new in-memory task queue.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(QueueState::default()),
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<EnqueueResult> {
        let idempotency_key = envelope.idempotency_key();

        let mut state = self.state.write().map_err(poison_err)?;

        if let Some(existing) = state.seen_keys.get(&idempotency_key) {
            return Ok(EnqueueResult::Deduplicated {
                existing_message_id: existing.clone(),
            });
        }

        let message_id = Ulid::new().to_string();
        state
            .seen_keys
            .insert(idempotency_key, message_id.clone());
        state.queue.push_back(envelope);
        drop(state);

        Ok(EnqueueResult::Enqueued { message_id })
    }

    async fn take(&self) -> Result<Option<TaskEnvelope>> {
        let mut state = self.state.write().map_err(poison_err)?;
        let entry = state.queue.pop_front();
        if let Some(ref envelope) = entry {
            state.seen_keys.remove(&envelope.idempotency_key());
        }
        drop(state);
        Ok(entry)
    }

    async fn queue_depth(&self) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.queue.len())
    }

    fn queue_name(&self) -> &str {
        &self.name
    }
}
