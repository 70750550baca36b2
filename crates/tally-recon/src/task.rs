//! Reconciliation task records and lifecycle state.
//!
//! This module provides:
//! - `TaskStatus`: The state machine for a reconciliation run
//! - `ReconciliationTask`: The durable task record and its transitions
//!
//! Tasks are never deleted; terminal records form the audit trail that
//! lets an operator distinguish "ran and failed" from "never ran" (the
//! latter is impossible by design — a created task is always scheduled).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{DatasetId, TaskId, UserId};

use crate::column::ColumnSelector;
use crate::error::{Error, Result};

/// Reconciliation task state machine.
///
/// ```text
/// ┌─────────┐  claimed   ┌─────────────┐  engine ok   ┌───────────┐
/// │ PENDING │───────────►│ IN_PROGRESS │─────────────►│ COMPLETED │
/// └─────────┘            └─────────────┘              └───────────┘
///      │                        │
///      │ aborted                │ engine / storage error
///      ▼                        ▼
/// ┌─────────┐              ┌────────┐
/// │ FAILED  │◄─────────────│ FAILED │
/// └─────────┘              └────────┘
/// ```
///
/// COMPLETED and FAILED are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, waiting for a worker to claim it.
    Pending,
    /// Claimed by a worker, actively reconciling.
    InProgress,
    /// Finished successfully; the result dataset is linked.
    Completed,
    /// Finished unsuccessfully; no result dataset exists.
    Failed,
}

impl TaskStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::InProgress | Self::Failed),
            Self::InProgress => matches!(target, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One reconciliation run, linking a query dataset and column to a master
/// dataset and column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationTask {
    /// Unique task identifier.
    pub id: TaskId,
    /// The query dataset being reconciled.
    pub source_dataset: DatasetId,
    /// The master dataset being reconciled against.
    pub master_dataset: DatasetId,
    /// The result dataset, linked on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_dataset: Option<DatasetId>,
    /// The user who submitted the task.
    pub requested_by: UserId,
    /// Column selector for the source side, recorded for audit.
    pub source_column: ColumnSelector,
    /// Column selector for the master side, recorded for audit.
    pub master_column: ColumnSelector,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// When the task was created.
    pub started_at: DateTime<Utc>,
    /// When the task reached a terminal status.
    ///
    /// Invariant: set if and only if the status is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl ReconciliationTask {
    /// Creates a new task in PENDING status.
    #[must_use]
    pub fn new(
        source_dataset: DatasetId,
        master_dataset: DatasetId,
        source_column: ColumnSelector,
        master_column: ColumnSelector,
        requested_by: UserId,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            source_dataset,
            master_dataset,
            result_dataset: None,
            requested_by,
            source_column,
            master_column,
            status: TaskStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Returns true if the task is in a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transitions to a new status, maintaining the end-timestamp
    /// invariant.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is invalid.
    pub fn transition_to(&mut self, target: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: "transition not allowed by the task state machine".to_string(),
            });
        }

        self.status = target;
        if target.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Marks the task as completed, linking the produced result dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is invalid.
    pub fn complete(&mut self, result_dataset: DatasetId) -> Result<()> {
        self.transition_to(TaskStatus::Completed)?;
        self.result_dataset = Some(result_dataset);
        Ok(())
    }

    /// Marks the task as failed. Failed tasks carry no result reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is invalid.
    pub fn fail(&mut self) -> Result<()> {
        self.transition_to(TaskStatus::Failed)?;
        self.result_dataset = None;
        Ok(())
    }
}
