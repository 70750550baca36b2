//! # tally-recon
//!
//! The reconciliation domain of the Tally service.
//!
//! This crate implements the reconciliation task pipeline:
//!
//! - **Similarity Scoring**: Full and partial string similarity ratios
//! - **Match Selection**: Best-candidate selection with reproducible
//!   tie-breaks
//! - **Reconciliation Engine**: Ordered row-to-row mapping of a query
//!   column onto a master column
//! - **Task Lifecycle**: The PENDING → IN_PROGRESS → COMPLETED/FAILED
//!   state machine, submission surface, and worker pool
//! - **Result Store**: Versioned result artifacts with single-row
//!   correction and point-in-time revert
//! - **Quality Ledger**: Monthly uniqueness/completeness snapshots with
//!   deltas and trend series
//!
//! ## Guarantees
//!
//! - **Deterministic**: Identical inputs produce byte-identical result
//!   artifacts (stable argmax tie-breaks)
//! - **Total**: Every query row maps to some master row; low scores mark
//!   low confidence instead of a "no match" outcome
//! - **Auditable**: Tasks are never deleted; terminal records keep their
//!   end timestamps forever
//!
//! ## Example
//!
//! ```rust
//! use tally_core::Table;
//! use tally_recon::column::ColumnSelector;
//! use tally_recon::engine::reconcile;
//!
//! # fn main() -> tally_recon::error::Result<()> {
//! let source = Table::new(
//!     vec!["company".into()],
//!     vec![vec!["Acme Corp".into()]],
//! )?;
//! let master = Table::new(
//!     vec!["name".into()],
//!     vec![vec!["ACME Corporation".into()]],
//! )?;
//!
//! let result = reconcile(
//!     &source,
//!     &master,
//!     &ColumnSelector::ByName("company".into()),
//!     &ColumnSelector::ByName("name".into()),
//! )?;
//! assert_eq!(result.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss, clippy::module_name_repetitions)]

pub mod catalog;
pub mod column;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod quality;
pub mod result_store;
pub mod result_table;
pub mod selector;
pub mod similarity;
pub mod store;
pub mod task;
pub mod worker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::catalog::DatasetCatalog;
    pub use crate::column::ColumnSelector;
    pub use crate::dispatch::{EnqueueResult, InMemoryTaskQueue, TaskEnvelope, TaskQueue};
    pub use crate::engine::reconcile;
    pub use crate::error::{Error, MappingSide, Result};
    pub use crate::lifecycle::{SubmitRequest, TaskExecutor, TaskLifecycleManager};
    pub use crate::quality::{
        QualityAggregator, QualitySnapshot, QualityStats, SnapshotOutcome, TrendMetric, TrendPoint,
    };
    pub use crate::result_store::ResultStore;
    pub use crate::result_table::{MatchRow, ResultTable};
    pub use crate::selector::{select_match, Match, MatchConfidence};
    pub use crate::store::memory::MemoryRecordStore;
    pub use crate::store::{CasResult, DatasetFilter, RecordStore, TaskFilter};
    pub use crate::task::{ReconciliationTask, TaskStatus};
    pub use crate::worker::WorkerPool;
}

pub use error::{Error, Result};
