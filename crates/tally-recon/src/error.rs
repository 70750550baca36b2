//! Error types for the reconciliation domain.

use tally_core::{DatasetId, TaskId};

/// The result type used throughout tally-recon.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a mapping a column selector addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSide {
    /// The query dataset being reconciled.
    Source,
    /// The master dataset being reconciled against.
    Master,
}

impl std::fmt::Display for MappingSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Master => write!(f, "master"),
        }
    }
}

/// Errors that can occur in reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A column selector did not resolve against a dataset's columns.
    #[error("column not found on {side} dataset: {selector}")]
    ColumnNotFound {
        /// Which dataset the selector was resolved against.
        side: MappingSide,
        /// The selector as the user supplied it.
        selector: String,
    },

    /// A mapping request violated the allowed dataset roles.
    ///
    /// Mapping only flows query → master; a master dataset cannot be a
    /// mapping source and a query dataset cannot be a mapping target.
    #[error("invalid mapping: {message}")]
    InvalidMapping {
        /// Description of the role violation.
        message: String,
    },

    /// An invalid task status transition was attempted.
    #[error("invalid status transition: {from} -> {to} ({reason})")]
    InvalidStatusTransition {
        /// The current status.
        from: String,
        /// The attempted target status.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// A reconciliation task was not found.
    #[error("task not found: {task_id}")]
    TaskNotFound {
        /// The task ID that was not found.
        task_id: TaskId,
    },

    /// A dataset referenced by a task or query was not found.
    #[error("dataset not found: {dataset_id}")]
    DatasetNotFound {
        /// The dataset ID that was not found.
        dataset_id: DatasetId,
    },

    /// A result artifact version was not found.
    #[error("result version not found: {version_id}")]
    VersionNotFound {
        /// The version token that was not found.
        version_id: String,
    },

    /// An error from tally-core (storage, serialization, content reading).
    #[error("core error: {0}")]
    Core(#[from] tally_core::Error),
}

impl Error {
    /// Creates a column-not-found error for the given side.
    #[must_use]
    pub fn column_not_found(side: MappingSide, selector: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            side,
            selector: selector.into(),
        }
    }

    /// Creates an invalid-mapping error.
    #[must_use]
    pub fn invalid_mapping(message: impl Into<String>) -> Self {
        Self::InvalidMapping {
            message: message.into(),
        }
    }
}
