//! Cross-component pipeline tests over the in-memory collaborators:
//! registration → submission → worker execution → result artifact →
//! correction → revert, plus the quality ledger.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeZone, Utc};

use tally_core::{BlobStore, DatasetKind, MemoryBlobStore, UserId};
use tally_recon::prelude::*;

struct Pipeline {
    catalog: DatasetCatalog,
    manager: TaskLifecycleManager,
    executor: Arc<TaskExecutor>,
    results: ResultStore,
    aggregator: QualityAggregator,
    queue: Arc<InMemoryTaskQueue>,
    records: Arc<MemoryRecordStore>,
    owner: UserId,
}

fn pipeline() -> Pipeline {
    let records = Arc::new(MemoryRecordStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let queue = Arc::new(InMemoryTaskQueue::new("pipeline"));

    let records_dyn = Arc::clone(&records) as Arc<dyn RecordStore>;
    let blobs_dyn = Arc::clone(&blobs) as Arc<dyn BlobStore>;

    Pipeline {
        catalog: DatasetCatalog::new(Arc::clone(&records_dyn), Arc::clone(&blobs_dyn)),
        manager: TaskLifecycleManager::new(
            Arc::clone(&records_dyn),
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
        ),
        executor: Arc::new(TaskExecutor::new(
            Arc::clone(&records_dyn),
            Arc::clone(&blobs_dyn),
        )),
        results: ResultStore::new(blobs_dyn, Arc::clone(&records_dyn)),
        aggregator: QualityAggregator::new(records_dyn),
        queue,
        records,
        owner: UserId::generate(),
    }
}

async fn seed(p: &Pipeline, name: &str, kind: DatasetKind, content: &str) -> tally_core::DatasetId {
    let dataset = p.catalog.register(name, kind, p.owner).await.unwrap();
    p.catalog
        .store_content(dataset.id, Bytes::from(content.to_string()))
        .await
        .unwrap();
    p.catalog
        .analyze(dataset.id, &ColumnSelector::ByIndex(0))
        .await
        .unwrap();
    dataset.id
}

async fn drain_one(p: &Pipeline) {
    let envelope = p.queue.take().await.unwrap().expect("envelope enqueued");
    p.executor.execute(&envelope).await.unwrap();
}

#[tokio::test]
async fn end_to_end_reconciliation() {
    let p = pipeline();
    let source = seed(
        &p,
        "companies.csv",
        DatasetKind::Query,
        "company\nAcme Corp\nGlobex\nInitech Inc\n",
    )
    .await;
    let master = seed(
        &p,
        "reference.csv",
        DatasetKind::Master,
        "name\nACME Corporation\nGlobex GmbH\nInitech\n",
    )
    .await;

    let task = p
        .manager
        .submit(SubmitRequest {
            source_dataset: source,
            master_dataset: master,
            source_column: ColumnSelector::ByName("company".into()),
            master_column: ColumnSelector::ByName("name".into()),
            requested_by: p.owner,
        })
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    drain_one(&p).await;

    let task = p.manager.get_task(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.ended_at.is_some());

    let table = p.results.result_table(task.id).await.unwrap();
    assert_eq!(table.len(), 3, "one row per query row, in order");
    let sources: Vec<&str> = table.rows().iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["Acme Corp", "Globex", "Initech Inc"]);
    for row in table.rows() {
        assert!(!row.destination.is_empty());
        assert!(row.partial <= 100 && row.full <= 100);
    }
}

#[tokio::test]
async fn fixed_width_source_reconciles_by_position() {
    let p = pipeline();
    let source = seed(
        &p,
        "companies.txt",
        DatasetKind::Query,
        "Acme Corp   Berlin\nGlobex      Paris\n",
    )
    .await;
    let master = seed(
        &p,
        "reference.csv",
        DatasetKind::Master,
        "name\nACME Corporation\nGlobex GmbH\n",
    )
    .await;

    let task = p
        .manager
        .submit(SubmitRequest {
            source_dataset: source,
            master_dataset: master,
            source_column: ColumnSelector::ByIndex(0),
            master_column: ColumnSelector::ByName("name".into()),
            requested_by: p.owner,
        })
        .await
        .unwrap();

    drain_one(&p).await;
    let task = p.manager.get_task(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    let table = p.results.result_table(task.id).await.unwrap();
    assert_eq!(table.rows()[1].source, "Globex");
    assert_eq!(table.rows()[1].destination, "Globex GmbH");
}

#[tokio::test]
async fn correction_and_revert_lifecycle() {
    let p = pipeline();
    let source = seed(&p, "q.csv", DatasetKind::Query, "company\nAcme Corp\n").await;
    let master = seed(
        &p,
        "m.csv",
        DatasetKind::Master,
        "name\nACME Corporation\n",
    )
    .await;

    let task = p
        .manager
        .submit(SubmitRequest {
            source_dataset: source,
            master_dataset: master,
            source_column: ColumnSelector::ByIndex(0),
            master_column: ColumnSelector::ByIndex(0),
            requested_by: p.owner,
        })
        .await
        .unwrap();
    drain_one(&p).await;

    let task = p.manager.get_task(task.id).await.unwrap();
    let result_id = task.result_dataset.unwrap();

    // Correct one row: a new version appears, the prior one survives.
    p.results
        .correct(task.id, "Acme Corp", "ACME Holdings")
        .await
        .unwrap();
    let versions = p.results.list_versions(result_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    let prior = versions.iter().find(|v| !v.is_latest).unwrap().version_id.clone();

    let corrected = p.results.result_table(task.id).await.unwrap();
    assert_eq!(corrected.rows()[0].destination, "ACME Holdings");
    assert_eq!(corrected.rows()[0].full, 100);

    // Revert: content restored, the restored-from version tag pruned.
    p.results.revert(result_id, &prior).await.unwrap();
    let restored = p.results.result_table(task.id).await.unwrap();
    assert_eq!(restored.rows()[0].destination, "ACME Corporation");

    let versions = p.results.list_versions(result_id).await.unwrap();
    assert!(versions.iter().all(|v| v.version_id != prior));
}

#[tokio::test]
async fn failed_task_is_queryable_forever() {
    let p = pipeline();
    let source = seed(&p, "q.csv", DatasetKind::Query, "company\nAcme\n").await;
    let master = seed(&p, "m.csv", DatasetKind::Master, "name\nACME\n").await;

    let task = p
        .manager
        .submit(SubmitRequest {
            source_dataset: source,
            master_dataset: master,
            source_column: ColumnSelector::ByName("absent".into()),
            master_column: ColumnSelector::ByIndex(0),
            requested_by: p.owner,
        })
        .await
        .unwrap();
    drain_one(&p).await;

    let task = p.manager.get_task(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.ended_at.is_some());
    assert!(task.result_dataset.is_none());

    // Still listed alongside everything else.
    let listed = p
        .manager
        .list_tasks(&TaskFilter {
            requested_by: Some(p.owner),
            ..TaskFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, TaskStatus::Failed);
}

#[tokio::test]
async fn worker_pool_end_to_end() {
    let p = pipeline();
    let source = seed(&p, "q.csv", DatasetKind::Query, "company\nAcme Corp\n").await;
    let master = seed(
        &p,
        "m.csv",
        DatasetKind::Master,
        "name\nACME Corporation\n",
    )
    .await;

    let pool = WorkerPool::spawn(
        2,
        Arc::clone(&p.queue) as Arc<dyn TaskQueue>,
        Arc::clone(&p.executor),
    );

    let task = p
        .manager
        .submit(SubmitRequest {
            source_dataset: source,
            master_dataset: master,
            source_column: ColumnSelector::ByIndex(0),
            master_column: ColumnSelector::ByIndex(0),
            requested_by: p.owner,
        })
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = p.manager.get_task(task.id).await.unwrap();
        if current.is_terminal() {
            assert_eq!(current.status, TaskStatus::Completed);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "task stuck");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn quality_ledger_over_the_ingested_corpus() {
    let p = pipeline();
    seed(
        &p,
        "q.csv",
        DatasetKind::Query,
        "company\nAcme\nAcme\nGlobex\n\"\"\n",
    )
    .await;
    seed(
        &p,
        "m.csv",
        DatasetKind::Master,
        "name\nACME\nGlobex\nInitech\n",
    )
    .await;

    let march = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
    assert_eq!(
        p.aggregator.run_once_at(march).await.unwrap(),
        SnapshotOutcome::Written
    );
    // The daily re-run inside the same month is a no-op.
    assert_eq!(
        p.aggregator.run_once_at(march).await.unwrap(),
        SnapshotOutcome::AlreadyExists
    );

    let stats = p.aggregator.stats_at(march).await.unwrap();
    assert_eq!(stats.total_master_records, 3);
    assert_eq!(stats.total_query_records, 4);

    let trend = p
        .aggregator
        .trend_at(march, TrendMetric::MasterRecords, 2)
        .await
        .unwrap();
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[1].value, 3);

    // Result datasets never feed the ledger.
    let before = p.records.list_datasets(&DatasetFilter::default()).await.unwrap().len();
    assert_eq!(before, 2);
}
