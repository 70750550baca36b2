//! In-memory record store for testing.
//!
//! Thread-safe via a single `RwLock`. Not suitable for production: no
//! durability, single-process only. CAS semantics match what a relational
//! backend provides with a conditional `UPDATE ... WHERE status = ?`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use tally_core::{Dataset, DatasetId, DatasetStats, Error as CoreError, TaskId};

use super::{CasResult, DatasetFilter, RecordStore, TaskFilter, DEFAULT_PAGE_LIMIT};
use crate::error::{Error, Result};
use crate::quality::QualitySnapshot;
use crate::task::{ReconciliationTask, TaskStatus};

/// Internal store state protected by a single lock.
#[derive(Debug, Default)]
struct State {
    datasets: HashMap<DatasetId, Dataset>,
    tasks: HashMap<TaskId, ReconciliationTask>,
    snapshots: BTreeMap<NaiveDate, QualitySnapshot>,
}

/// In-memory implementation of [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: RwLock<State>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Core(CoreError::storage("record store lock poisoned"))
}

impl MemoryRecordStore {
    /// Creates a new empty record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.datasets.insert(dataset.id, dataset.clone());
        Ok(())
    }

    async fn get_dataset(&self, id: DatasetId) -> Result<Option<Dataset>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.datasets.get(&id).cloned())
    }

    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>> {
        let state = self.state.read().map_err(poison_err)?;
        let mut datasets: Vec<Dataset> = state
            .datasets
            .values()
            .filter(|d| filter.kind.is_none_or(|kind| d.kind == kind))
            .filter(|d| filter.owner.is_none_or(|owner| d.owner == owner))
            .cloned()
            .collect();
        drop(state);

        // ULIDs sort by creation time; newest first.
        datasets.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page(datasets, filter.limit, filter.offset))
    }

    async fn update_dataset_stats(&self, id: DatasetId, stats: DatasetStats) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let dataset = state
            .datasets
            .get_mut(&id)
            .ok_or_else(|| Error::Core(CoreError::resource_not_found("dataset", id)))?;
        dataset.stats = stats;
        dataset.modified_at = Utc::now();
        Ok(())
    }

    async fn create_task(&self, task: &ReconciliationTask) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<ReconciliationTask>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<ReconciliationTask>> {
        let state = self.state.read().map_err(poison_err)?;
        let mut tasks: Vec<ReconciliationTask> = state
            .tasks
            .values()
            .filter(|t| filter.requested_by.is_none_or(|u| t.requested_by == u))
            .cloned()
            .collect();
        drop(state);

        tasks.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page(tasks, filter.limit, filter.offset))
    }

    async fn save_task(&self, task: &ReconciliationTask) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if !state.tasks.contains_key(&task.id) {
            return Err(Error::TaskNotFound { task_id: task.id });
        }
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn cas_task_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        target: TaskStatus,
    ) -> Result<CasResult> {
        let mut state = self.state.write().map_err(poison_err)?;
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(CasResult::NotFound);
        };

        if task.status != expected {
            return Ok(CasResult::StatusMismatch {
                actual: task.status,
            });
        }

        task.transition_to(target)?;
        Ok(CasResult::Success)
    }

    async fn insert_snapshot(&self, snapshot: &QualitySnapshot) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.snapshots.contains_key(&snapshot.month) {
            return Ok(false);
        }
        state.snapshots.insert(snapshot.month, snapshot.clone());
        Ok(true)
    }

    async fn get_snapshot(&self, month: NaiveDate) -> Result<Option<QualitySnapshot>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.snapshots.get(&month).cloned())
    }

    async fn latest_snapshot_at_or_before(
        &self,
        month: NaiveDate,
    ) -> Result<Option<QualitySnapshot>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .snapshots
            .range(..=month)
            .next_back()
            .map(|(_, snapshot)| snapshot.clone()))
    }
}

fn page<T>(items: Vec<T>, limit: Option<usize>, offset: usize) -> Vec<T> {
    items
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(DEFAULT_PAGE_LIMIT))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnSelector;
    use tally_core::{DatasetKind, UserId};

    fn dataset(kind: DatasetKind, owner: UserId) -> Dataset {
        Dataset::new("file.csv", kind, owner)
    }

    fn task(owner: UserId) -> ReconciliationTask {
        ReconciliationTask::new(
            DatasetId::generate(),
            DatasetId::generate(),
            ColumnSelector::ByIndex(0),
            ColumnSelector::ByIndex(0),
            owner,
        )
    }

    fn snapshot(month: NaiveDate) -> QualitySnapshot {
        QualitySnapshot {
            month,
            overall_uniqueness: 0.5,
            overall_completeness: 0.5,
            total_query_records: 10,
            total_master_records: 20,
        }
    }

    #[tokio::test]
    async fn dataset_roundtrip() {
        let store = MemoryRecordStore::new();
        let ds = dataset(DatasetKind::Query, UserId::generate());

        store.create_dataset(&ds).await.unwrap();
        let loaded = store.get_dataset(ds.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, ds.name);
    }

    #[tokio::test]
    async fn list_datasets_filters_by_kind_and_owner() {
        let store = MemoryRecordStore::new();
        let alice = UserId::generate();
        let bob = UserId::generate();

        store
            .create_dataset(&dataset(DatasetKind::Master, alice))
            .await
            .unwrap();
        store
            .create_dataset(&dataset(DatasetKind::Query, alice))
            .await
            .unwrap();
        store
            .create_dataset(&dataset(DatasetKind::Query, bob))
            .await
            .unwrap();

        let masters = store
            .list_datasets(&DatasetFilter::default().with_kind(DatasetKind::Master))
            .await
            .unwrap();
        assert_eq!(masters.len(), 1);

        let alices_queries = store
            .list_datasets(
                &DatasetFilter::default()
                    .with_kind(DatasetKind::Query)
                    .with_owner(alice),
            )
            .await
            .unwrap();
        assert_eq!(alices_queries.len(), 1);
        assert_eq!(alices_queries[0].owner, alice);
    }

    #[tokio::test]
    async fn update_stats_requires_existing_dataset() {
        let store = MemoryRecordStore::new();
        let err = store
            .update_dataset_stats(DatasetId::generate(), DatasetStats::new(1, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Core(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn cas_claim_succeeds_once() {
        let store = MemoryRecordStore::new();
        let t = task(UserId::generate());
        store.create_task(&t).await.unwrap();

        let first = store
            .cas_task_status(t.id, TaskStatus::Pending, TaskStatus::InProgress)
            .await
            .unwrap();
        assert!(first.is_success());

        // Second claim observes the new status and loses.
        let second = store
            .cas_task_status(t.id, TaskStatus::Pending, TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            second,
            CasResult::StatusMismatch {
                actual: TaskStatus::InProgress
            }
        );
    }

    #[tokio::test]
    async fn cas_missing_task_reports_not_found() {
        let store = MemoryRecordStore::new();
        let result = store
            .cas_task_status(
                TaskId::generate(),
                TaskStatus::Pending,
                TaskStatus::InProgress,
            )
            .await
            .unwrap();
        assert_eq!(result, CasResult::NotFound);
    }

    #[tokio::test]
    async fn list_tasks_newest_first_with_paging() {
        let store = MemoryRecordStore::new();
        let owner = UserId::generate();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let t = task(owner);
            ids.push(t.id);
            store.create_task(&t).await.unwrap();
        }

        let listed = store
            .list_tasks(&TaskFilter {
                requested_by: Some(owner),
                limit: Some(2),
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, ids[2], "newest task first");

        let rest = store
            .list_tasks(&TaskFilter {
                requested_by: Some(owner),
                limit: Some(2),
                offset: 2,
            })
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, ids[0]);
    }

    #[tokio::test]
    async fn save_task_requires_existing_row() {
        let store = MemoryRecordStore::new();
        let t = task(UserId::generate());
        let err = store.save_task(&t).await.unwrap_err();
        assert!(matches!(err, Error::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn snapshot_insert_is_idempotent_per_month() {
        let store = MemoryRecordStore::new();
        let month = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        assert!(store.insert_snapshot(&snapshot(month)).await.unwrap());
        assert!(!store.insert_snapshot(&snapshot(month)).await.unwrap());

        let other = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(store.insert_snapshot(&snapshot(other)).await.unwrap());
    }

    #[tokio::test]
    async fn latest_snapshot_falls_back_to_prior_month() {
        let store = MemoryRecordStore::new();
        let march = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        store.insert_snapshot(&snapshot(march)).await.unwrap();

        let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let found = store
            .latest_snapshot_at_or_before(june)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.month, march);

        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(store
            .latest_snapshot_at_or_before(feb)
            .await
            .unwrap()
            .is_none());
    }
}
