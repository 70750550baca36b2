//! Pluggable record storage for datasets, tasks, and quality snapshots.
//!
//! The `RecordStore` trait defines the persistence layer the
//! reconciliation core depends on. Every write path touches a bounded,
//! task-scoped set of rows, so single-row transactional updates are
//! sufficient; no multi-row distributed transaction is required.
//!
//! ## Design Principles
//!
//! - **CAS semantics**: The PENDING → IN_PROGRESS claim uses compare-and-swap
//!   to prevent double-dispatch across workers
//! - **Testability**: In-memory implementation for tests, a relational
//!   database in production

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use tally_core::{Dataset, DatasetId, DatasetKind, DatasetStats, TaskId, UserId};

use crate::error::Result;
use crate::quality::QualitySnapshot;
use crate::task::{ReconciliationTask, TaskStatus};

/// Default page size for listings, matching the submission surface.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Filter for dataset listings.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    /// Restrict to one dataset kind.
    pub kind: Option<DatasetKind>,
    /// Restrict to one owner.
    pub owner: Option<UserId>,
    /// Maximum records to return (default [`DEFAULT_PAGE_LIMIT`]).
    pub limit: Option<usize>,
    /// Records to skip.
    pub offset: usize,
}

impl DatasetFilter {
    /// Restricts the filter to one kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: DatasetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts the filter to one owner.
    #[must_use]
    pub const fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filter for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to tasks submitted by one user.
    pub requested_by: Option<UserId>,
    /// Maximum records to return (default [`DEFAULT_PAGE_LIMIT`]).
    pub limit: Option<usize>,
    /// Records to skip.
    pub offset: usize,
}

/// Result of a compare-and-swap status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    /// The transition was applied.
    Success,
    /// The task does not exist.
    NotFound,
    /// The current status didn't match the expected value.
    StatusMismatch {
        /// The actual status that was found.
        actual: TaskStatus,
    },
}

impl CasResult {
    /// Returns true if the transition was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Storage abstraction for reconciliation records.
///
/// ## CAS Semantics
///
/// `cas_task_status` is the core primitive for correctness across worker
/// processes: a task is claimed exactly once, so two workers can never
/// both execute it.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from the
/// submission path, the worker pool, and the quality scheduler.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    // --- Dataset Operations ---

    /// Creates a dataset record.
    async fn create_dataset(&self, dataset: &Dataset) -> Result<()>;

    /// Gets a dataset by ID. Returns `None` if absent.
    async fn get_dataset(&self, id: DatasetId) -> Result<Option<Dataset>>;

    /// Lists datasets matching the filter, newest-first.
    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>>;

    /// Replaces a dataset's ingestion statistics, refreshing its
    /// modification time.
    ///
    /// Fails with a not-found error if the dataset does not exist.
    async fn update_dataset_stats(&self, id: DatasetId, stats: DatasetStats) -> Result<()>;

    // --- Task Operations ---

    /// Creates a task record.
    async fn create_task(&self, task: &ReconciliationTask) -> Result<()>;

    /// Gets a task by ID. Returns `None` if absent.
    async fn get_task(&self, id: TaskId) -> Result<Option<ReconciliationTask>>;

    /// Lists tasks matching the filter, newest-first.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<ReconciliationTask>>;

    /// Saves a task (full replacement).
    ///
    /// For the concurrent claim use [`RecordStore::cas_task_status`]; this
    /// method is for the single executing worker that owns the task.
    async fn save_task(&self, task: &ReconciliationTask) -> Result<()>;

    /// Atomically transitions a task's status if the current status
    /// matches `expected`.
    ///
    /// This is the double-dispatch guard: only one caller can win the
    /// PENDING → IN_PROGRESS claim.
    async fn cas_task_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        target: TaskStatus,
    ) -> Result<CasResult>;

    // --- Quality Snapshot Operations ---

    /// Inserts a snapshot keyed by its month, only if no snapshot for
    /// that month exists yet.
    ///
    /// Returns true if the snapshot was written, false for the idempotent
    /// no-op.
    async fn insert_snapshot(&self, snapshot: &QualitySnapshot) -> Result<bool>;

    /// Gets the snapshot for an exact month (first day of month).
    async fn get_snapshot(&self, month: NaiveDate) -> Result<Option<QualitySnapshot>>;

    /// Gets the most recent snapshot at or before the given month.
    async fn latest_snapshot_at_or_before(
        &self,
        month: NaiveDate,
    ) -> Result<Option<QualitySnapshot>>;
}
