//! Versioned persistence of reconciliation results.
//!
//! Materializes a [`ResultTable`] as a blob keyed by the source dataset
//! id, registers the corresponding `RESULT` dataset record, and supports
//! the three artifact operations: single-row correction (a new version of
//! the same blob), version listing, and point-in-time revert.

use std::sync::Arc;

use tally_core::{
    BlobStore, BlobVersion, Dataset, DatasetId, DatasetKind, Error as CoreError, TaskId,
};

use crate::error::{Error, Result};
use crate::result_table::ResultTable;
use crate::store::RecordStore;
use crate::task::ReconciliationTask;

/// The stable blob key for a task's result artifact.
///
/// Derived from the source dataset id: one result chain per source
/// dataset, collision-resistant because dataset ids are ULIDs.
#[must_use]
pub fn result_key(source_dataset: DatasetId) -> String {
    format!("result/{source_dataset}.csv")
}

/// Persists and mutates result artifacts.
pub struct ResultStore {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
}

impl ResultStore {
    /// Creates a result store over the given collaborators.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn RecordStore>) -> Self {
        Self { blobs, records }
    }

    /// Writes the result table and registers the `RESULT` dataset record.
    ///
    /// The dataset's statistics reflect the destination column of the
    /// result: distinct, non-empty, and total destination values.
    ///
    /// # Errors
    ///
    /// Returns a storage or serialization error if persistence fails.
    pub async fn materialize(
        &self,
        task: &ReconciliationTask,
        result: &ResultTable,
    ) -> Result<DatasetId> {
        let key = result_key(task.source_dataset);
        self.blobs.put(&key, result.to_csv()?).await?;

        let mut dataset = Dataset::new(
            format!("{}.csv", task.source_dataset),
            DatasetKind::Result,
            task.requested_by,
        );
        dataset.stats = destination_stats(result);
        self.records.create_dataset(&dataset).await?;

        tracing::info!(task_id = %task.id, dataset_id = %dataset.id, rows = result.len(),
            "result materialized");
        Ok(dataset.id)
    }

    /// Loads the current result table for a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] for an unknown task and a
    /// not-found error when the task has no result yet.
    pub async fn result_table(&self, task_id: TaskId) -> Result<ResultTable> {
        let task = self.require_task_with_result(task_id).await?;
        let bytes = self.blobs.get(&result_key(task.source_dataset)).await?;
        Ok(ResultTable::from_csv(&bytes)?)
    }

    /// Rewrites every row whose source equals `source_value` as a user
    /// override, persisting the table as a new version of the same blob.
    ///
    /// Returns the number of rows rewritten; when nothing matches, no new
    /// version is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskNotFound`] for an unknown task and a
    /// not-found error when the task has no result yet.
    pub async fn correct(
        &self,
        task_id: TaskId,
        source_value: &str,
        new_destination: &str,
    ) -> Result<usize> {
        let task = self.require_task_with_result(task_id).await?;
        let key = result_key(task.source_dataset);

        let mut table = ResultTable::from_csv(&self.blobs.get(&key).await?)?;
        let corrected = table.correct_rows(source_value, new_destination);
        if corrected > 0 {
            self.blobs.put(&key, table.to_csv()?).await?;
            tracing::info!(task_id = %task_id, rows = corrected, "result rows corrected");
        }
        Ok(corrected)
    }

    /// Lists the result artifact's versions, newest first.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown result dataset.
    pub async fn list_versions(&self, result_dataset: DatasetId) -> Result<Vec<BlobVersion>> {
        let key = self.key_for_result_dataset(result_dataset).await?;
        Ok(self.blobs.list_versions(&key).await?)
    }

    /// Restores a historical version to the head of the version chain,
    /// then removes that historical version tag.
    ///
    /// Copy-then-delete ordering: the historical content is copied first
    /// so a failed copy loses nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] for an unknown version and a
    /// not-found error for an unknown result dataset.
    pub async fn revert(&self, result_dataset: DatasetId, version_id: &str) -> Result<()> {
        let key = self.key_for_result_dataset(result_dataset).await?;

        self.blobs
            .copy_version(&key, version_id, &key)
            .await
            .map_err(|e| match e {
                CoreError::NotFound(_) => Error::VersionNotFound {
                    version_id: version_id.to_string(),
                },
                other => Error::Core(other),
            })?;
        self.blobs.delete(&key, Some(version_id)).await?;

        tracing::info!(dataset_id = %result_dataset, version = version_id, "result reverted");
        Ok(())
    }

    async fn require_task_with_result(&self, task_id: TaskId) -> Result<ReconciliationTask> {
        let task = self
            .records
            .get_task(task_id)
            .await?
            .ok_or(Error::TaskNotFound { task_id })?;
        if task.result_dataset.is_none() {
            return Err(Error::Core(CoreError::NotFound(format!(
                "task {task_id} has no result artifact"
            ))));
        }
        Ok(task)
    }

    /// Resolves a result dataset record back to its blob key.
    async fn key_for_result_dataset(&self, result_dataset: DatasetId) -> Result<String> {
        let dataset = self
            .records
            .get_dataset(result_dataset)
            .await?
            .ok_or(Error::DatasetNotFound {
                dataset_id: result_dataset,
            })?;
        match dataset.kind {
            DatasetKind::Result => Ok(dataset.blob_key()),
            DatasetKind::Master | DatasetKind::Query => Err(Error::Core(
                CoreError::InvalidInput(format!("dataset {result_dataset} is not a result")),
            )),
        }
    }
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore").finish_non_exhaustive()
    }
}

/// Statistics of the result's destination column.
fn destination_stats(result: &ResultTable) -> tally_core::DatasetStats {
    let total = result.len() as u64;
    let valid = result
        .rows()
        .iter()
        .filter(|r| !r.destination.is_empty())
        .count() as u64;
    let unique = result
        .rows()
        .iter()
        .filter(|r| !r.destination.is_empty())
        .map(|r| r.destination.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len() as u64;
    tally_core::DatasetStats::new(unique, valid, total)
}
