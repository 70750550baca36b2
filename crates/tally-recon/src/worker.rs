//! The reconciliation worker pool.
//!
//! Workers drain the dispatch queue on a poll loop, decoupled from the
//! submission path: submission returns as soon as the task row exists and
//! the envelope is enqueued. Each envelope is executed exactly once; the
//! executor's CAS claim guards against duplicate delivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dispatch::TaskQueue;
use crate::lifecycle::TaskExecutor;
use crate::metrics;

/// How long an idle worker sleeps before polling again.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A pool of reconciliation workers.
///
/// Dropping the pool does not stop the workers; call
/// [`WorkerPool::shutdown`] for a clean stop.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stop: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawns `size` workers draining `queue` through `executor`.
    #[must_use]
    pub fn spawn(size: usize, queue: Arc<dyn TaskQueue>, executor: Arc<TaskExecutor>) -> Self {
        let (stop, _) = watch::channel(false);

        let handles = (0..size)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let executor = Arc::clone(&executor);
                let mut stop_rx = stop.subscribe();

                tokio::spawn(async move {
                    tracing::debug!(worker, "reconciliation worker started");
                    loop {
                        if *stop_rx.borrow() {
                            break;
                        }

                        match queue.take().await {
                            Ok(Some(envelope)) => {
                                if let Ok(depth) = queue.queue_depth().await {
                                    metrics::set_queue_depth(depth);
                                }
                                if let Err(error) = executor.execute(&envelope).await {
                                    // Terminal-transition persistence failed;
                                    // the task stays recoverable in the store.
                                    tracing::error!(worker, task_id = %envelope.task_id,
                                        %error, "task execution could not be finalized");
                                }
                            }
                            Ok(None) => {
                                tokio::select! {
                                    _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                                    _ = stop_rx.changed() => {}
                                }
                            }
                            Err(error) => {
                                tracing::error!(worker, %error, "queue poll failed");
                                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                            }
                        }
                    }
                    tracing::debug!(worker, "reconciliation worker stopped");
                })
            })
            .collect();

        Self { handles, stop }
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signals all workers to stop and waits for them to finish their
    /// current task.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.handles.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnSelector;
    use crate::dispatch::InMemoryTaskQueue;
    use crate::lifecycle::{SubmitRequest, TaskLifecycleManager};
    use crate::store::memory::MemoryRecordStore;
    use crate::store::RecordStore;
    use crate::task::TaskStatus;
    use bytes::Bytes;
    use tally_core::{BlobStore, Dataset, DatasetKind, MemoryBlobStore, UserId};

    #[tokio::test]
    async fn pool_drains_submitted_tasks() {
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let queue = Arc::new(InMemoryTaskQueue::new("pool-test"));
        let owner = UserId::generate();

        let source = Dataset::new("q.csv", DatasetKind::Query, owner);
        blobs
            .put(&source.blob_key(), Bytes::from("company\nAcme\nGlobex\n"))
            .await
            .unwrap();
        records.create_dataset(&source).await.unwrap();

        let master = Dataset::new("m.csv", DatasetKind::Master, owner);
        blobs
            .put(&master.blob_key(), Bytes::from("name\nACME Corp\nGlobex GmbH\n"))
            .await
            .unwrap();
        records.create_dataset(&master).await.unwrap();

        let manager = TaskLifecycleManager::new(
            Arc::clone(&records) as Arc<dyn RecordStore>,
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
        );
        let executor = Arc::new(crate::lifecycle::TaskExecutor::new(
            Arc::clone(&records) as Arc<dyn RecordStore>,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
        ));

        let pool = WorkerPool::spawn(2, Arc::clone(&queue) as Arc<dyn TaskQueue>, executor);
        assert_eq!(pool.size(), 2);

        let task = manager
            .submit(SubmitRequest {
                source_dataset: source.id,
                master_dataset: master.id,
                source_column: ColumnSelector::ByName("company".into()),
                master_column: ColumnSelector::ByName("name".into()),
                requested_by: owner,
            })
            .await
            .unwrap();

        // Wait for the pool to pick the task up and finish it.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let current = records.get_task(task.id).await.unwrap().unwrap();
            if current.is_terminal() {
                assert_eq!(current.status, TaskStatus::Completed);
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task did not complete in time"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let queue = Arc::new(InMemoryTaskQueue::new("idle-test"));

        let executor = Arc::new(crate::lifecycle::TaskExecutor::new(
            Arc::clone(&records) as Arc<dyn RecordStore>,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
        ));
        let pool = WorkerPool::spawn(2, queue as Arc<dyn TaskQueue>, executor);

        // Must return promptly even though the queue never had work.
        tokio::time::timeout(Duration::from_secs(2), pool.shutdown())
            .await
            .expect("shutdown should not hang");
    }
}
