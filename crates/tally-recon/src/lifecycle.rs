//! Task lifecycle management.
//!
//! [`TaskLifecycleManager`] owns the synchronous submission surface:
//! role validation, task creation in PENDING, and hand-off to the
//! dispatch queue. [`TaskExecutor`] is the worker-side counterpart that
//! claims and runs one task to a terminal status.
//!
//! Failures inside background execution are absorbed into a FAILED
//! transition — there is no caller waiting synchronously, so nothing is
//! ever propagated as an unhandled fault. A failed task stays queryable
//! forever with its end timestamp set and no result reference.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use tally_core::observability::task_span;
use tally_core::{read_table, BlobStore, Dataset, DatasetId, DatasetKind, Table, TaskId, UserId};

use crate::column::ColumnSelector;
use crate::dispatch::{TaskEnvelope, TaskQueue};
use crate::engine::reconcile;
use crate::error::{Error, Result};
use crate::metrics;
use crate::result_store::ResultStore;
use crate::store::{CasResult, RecordStore, TaskFilter};
use crate::task::{ReconciliationTask, TaskStatus};

/// A reconciliation request as it arrives from the submission surface.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// The query dataset to reconcile.
    pub source_dataset: DatasetId,
    /// The master dataset to reconcile against.
    pub master_dataset: DatasetId,
    /// Column selector for the source side.
    pub source_column: ColumnSelector,
    /// Column selector for the master side.
    pub master_column: ColumnSelector,
    /// The submitting user.
    pub requested_by: UserId,
}

/// Owns task creation and the submission-side queries.
pub struct TaskLifecycleManager {
    records: Arc<dyn RecordStore>,
    queue: Arc<dyn TaskQueue>,
}

impl TaskLifecycleManager {
    /// Creates a lifecycle manager over the given collaborators.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { records, queue }
    }

    /// Validates a request, creates the task in PENDING, and schedules
    /// execution. Returns immediately; the submitting caller never waits
    /// for the reconciliation itself.
    ///
    /// # Errors
    ///
    /// - [`Error::DatasetNotFound`] if either dataset is absent
    /// - [`Error::InvalidMapping`] if the source dataset is a master or
    ///   the master dataset is a query — checked before any task row is
    ///   created
    pub async fn submit(&self, request: SubmitRequest) -> Result<ReconciliationTask> {
        let source = self.require_dataset(request.source_dataset).await?;
        let master = self.require_dataset(request.master_dataset).await?;

        // Mapping only flows query -> master.
        if source.kind == DatasetKind::Master {
            return Err(Error::invalid_mapping(
                "a master dataset cannot be a mapping source",
            ));
        }
        if master.kind == DatasetKind::Query {
            return Err(Error::invalid_mapping(
                "a query dataset cannot be a mapping target",
            ));
        }

        let task = ReconciliationTask::new(
            request.source_dataset,
            request.master_dataset,
            request.source_column,
            request.master_column,
            request.requested_by,
        );
        self.records.create_task(&task).await?;

        self.queue.enqueue(TaskEnvelope::for_task(&task)).await?;
        if let Ok(depth) = self.queue.queue_depth().await {
            metrics::set_queue_depth(depth);
        }

        tracing::info!(task_id = %task.id, source = %task.source_dataset,
            master = %task.master_dataset, "reconciliation task submitted");
        Ok(task)
    }

    /// Gets one task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] if the task does not exist.
    pub async fn get_task(&self, task_id: TaskId) -> Result<ReconciliationTask> {
        self.records
            .get_task(task_id)
            .await?
            .ok_or(Error::TaskNotFound { task_id })
    }

    /// Lists tasks newest-first.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<ReconciliationTask>> {
        self.records.list_tasks(filter).await
    }

    async fn require_dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.records
            .get_dataset(id)
            .await?
            .ok_or(Error::DatasetNotFound { dataset_id: id })
    }
}

impl std::fmt::Debug for TaskLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLifecycleManager").finish_non_exhaustive()
    }
}

/// Executes claimed tasks to a terminal status.
pub struct TaskExecutor {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    results: ResultStore,
}

impl TaskExecutor {
    /// Creates an executor over the given collaborators.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let results = ResultStore::new(Arc::clone(&blobs), Arc::clone(&records));
        Self {
            records,
            blobs,
            results,
        }
    }

    /// Claims and executes one dispatched task.
    ///
    /// Losing the PENDING → IN_PROGRESS claim is not an error: another
    /// worker already owns the task. Execution errors end the task in
    /// FAILED; only record-store failures while persisting the terminal
    /// transition surface to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal transition cannot be persisted.
    pub async fn execute(&self, envelope: &TaskEnvelope) -> Result<()> {
        let span = task_span("execute", &envelope.task_id.to_string());
        self.execute_inner(envelope).instrument(span).await
    }

    async fn execute_inner(&self, envelope: &TaskEnvelope) -> Result<()> {
        let claim = self
            .records
            .cas_task_status(envelope.task_id, TaskStatus::Pending, TaskStatus::InProgress)
            .await?;
        match claim {
            CasResult::Success => {}
            CasResult::NotFound => {
                tracing::warn!(task_id = %envelope.task_id, "dispatched task no longer exists");
                return Ok(());
            }
            CasResult::StatusMismatch { actual } => {
                tracing::warn!(task_id = %envelope.task_id, status = actual.as_label(),
                    "task already claimed, skipping");
                return Ok(());
            }
        }
        metrics::record_task_transition("pending", "in_progress");

        let started = Instant::now();
        let outcome = self.run(envelope).await;

        let mut task = self
            .records
            .get_task(envelope.task_id)
            .await?
            .ok_or(Error::TaskNotFound {
                task_id: envelope.task_id,
            })?;

        match outcome {
            Ok(result_dataset) => {
                task.complete(result_dataset)?;
                self.records.save_task(&task).await?;
                metrics::record_task_transition("in_progress", "completed");
                metrics::observe_task_duration("completed", started.elapsed().as_secs_f64());
                tracing::info!(task_id = %task.id, result = %result_dataset,
                    "reconciliation completed");
            }
            Err(error) => {
                task.fail()?;
                self.records.save_task(&task).await?;
                metrics::record_task_transition("in_progress", "failed");
                metrics::observe_task_duration("failed", started.elapsed().as_secs_f64());
                tracing::warn!(task_id = %task.id, %error, "reconciliation failed");
            }
        }
        Ok(())
    }

    /// The fallible part of execution: load, reconcile, materialize.
    async fn run(&self, envelope: &TaskEnvelope) -> Result<DatasetId> {
        let source = self.load_table(envelope.source_dataset).await?;
        let master = self.load_table(envelope.master_dataset).await?;

        let result = reconcile(
            &source,
            &master,
            &envelope.source_column,
            &envelope.master_column,
        )?;

        let task = self
            .records
            .get_task(envelope.task_id)
            .await?
            .ok_or(Error::TaskNotFound {
                task_id: envelope.task_id,
            })?;
        self.results.materialize(&task, &result).await
    }

    /// Materializes a dataset's blob content as a table.
    async fn load_table(&self, id: DatasetId) -> Result<Table> {
        let dataset = self
            .records
            .get_dataset(id)
            .await?
            .ok_or(Error::DatasetNotFound { dataset_id: id })?;
        let bytes = self.blobs.get(&dataset.blob_key()).await?;
        Ok(read_table(&dataset.name, &bytes)?)
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor").finish_non_exhaustive()
    }
}
