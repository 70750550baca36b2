//! # tally-core
//!
//! Core abstractions for the Tally tabular reconciliation service.
//!
//! This crate provides the foundational types and traits used across all
//! Tally components:
//!
//! - **Identifiers**: Strongly-typed ULID ids for datasets, tasks, and users
//! - **Datasets**: The registered-resource model and ingestion statistics
//! - **Storage**: The versioned blob-store contract with an in-memory backend
//! - **Content Reading**: Delimited and fixed-width tabular materialization
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `tally-core` is the only crate allowed to define shared primitives. The
//! reconciliation domain lives in `tally-recon`; HTTP routing, object-store
//! and database backends are external collaborators behind the traits
//! defined here.
//!
//! ## Example
//!
//! ```rust
//! use tally_core::prelude::*;
//!
//! let owner = UserId::generate();
//! let dataset = Dataset::new("customers.csv", DatasetKind::Query, owner);
//! assert_eq!(dataset.stats.total_count, 0);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]

pub mod dataset;
pub mod error;
pub mod id;
pub mod observability;
pub mod storage;
pub mod table;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tally_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::dataset::{Dataset, DatasetKind, DatasetStats};
    pub use crate::error::{Error, Result};
    pub use crate::id::{DatasetId, TaskId, UserId};
    pub use crate::storage::{BlobStore, BlobVersion, MemoryBlobStore};
    pub use crate::table::{read_table, Table};
}

// Re-export key types at crate root for ergonomics
pub use dataset::{Dataset, DatasetKind, DatasetStats};
pub use error::{Error, Result};
pub use id::{DatasetId, TaskId, UserId};
pub use observability::{init_logging, LogFormat};
pub use storage::{BlobStore, BlobVersion, MemoryBlobStore};
pub use table::{read_table, Table};
