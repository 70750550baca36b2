//! Dataset registration and ingestion analysis.
//!
//! Uploads themselves happen out of band (presigned URLs, out of scope);
//! the catalog owns the record side: registering a dataset with zeroed
//! statistics, storing content for it, and recomputing statistics when
//! the content is (re-)analyzed. The reconciliation path never mutates an
//! existing dataset through the catalog.

use std::sync::Arc;

use bytes::Bytes;

use tally_core::{read_table, BlobStore, Dataset, DatasetId, DatasetKind, DatasetStats, UserId};

use crate::column::ColumnSelector;
use crate::error::{Error, MappingSide, Result};
use crate::store::{DatasetFilter, RecordStore};

/// Registers datasets and maintains their ingestion statistics.
pub struct DatasetCatalog {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl DatasetCatalog {
    /// Creates a catalog over the given collaborators.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { records, blobs }
    }

    /// Registers a new master or query dataset with zeroed statistics.
    ///
    /// Result datasets are spawned by the reconciliation engine, not
    /// registered here.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMapping` when asked to register a result dataset,
    /// or a storage error if the record store fails.
    pub async fn register(
        &self,
        name: impl Into<String>,
        kind: DatasetKind,
        owner: UserId,
    ) -> Result<Dataset> {
        match kind {
            DatasetKind::Master | DatasetKind::Query => {}
            DatasetKind::Result => {
                return Err(Error::invalid_mapping(
                    "result datasets are materialized by reconciliation, not registered",
                ));
            }
        }

        let dataset = Dataset::new(name, kind, owner);
        self.records.create_dataset(&dataset).await?;
        tracing::info!(dataset_id = %dataset.id, kind = kind.as_label(), name = %dataset.name,
            "dataset registered");
        Ok(dataset)
    }

    /// Stores content for a registered dataset.
    ///
    /// Re-uploads append a new blob version; statistics are only
    /// refreshed by a subsequent [`DatasetCatalog::analyze`].
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown dataset.
    pub async fn store_content(&self, id: DatasetId, content: Bytes) -> Result<String> {
        let dataset = self.require(id).await?;
        Ok(self.blobs.put(&dataset.blob_key(), content).await?)
    }

    /// Recomputes a dataset's ingestion statistics over one column.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown dataset, `ColumnNotFound`
    /// for an unresolvable selector, and `UnsupportedFormat` for content
    /// the reader cannot parse.
    pub async fn analyze(&self, id: DatasetId, column: &ColumnSelector) -> Result<DatasetStats> {
        let dataset = self.require(id).await?;
        let bytes = self.blobs.get(&dataset.blob_key()).await?;
        let table = read_table(&dataset.name, &bytes)?;

        let side = match dataset.kind {
            DatasetKind::Master => MappingSide::Master,
            DatasetKind::Query | DatasetKind::Result => MappingSide::Source,
        };
        let index = column.resolve(table.columns(), side)?;

        let stats = table.column_stats(index);
        self.records.update_dataset_stats(id, stats).await?;
        tracing::info!(dataset_id = %id, total = stats.total_count, valid = stats.valid_count,
            unique = stats.unique_count, "dataset analyzed");
        Ok(stats)
    }

    /// Gets one dataset.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown dataset.
    pub async fn get(&self, id: DatasetId) -> Result<Dataset> {
        self.require(id).await
    }

    /// Lists datasets matching the filter, newest-first.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn list(&self, filter: &DatasetFilter) -> Result<Vec<Dataset>> {
        self.records.list_datasets(filter).await
    }

    async fn require(&self, id: DatasetId) -> Result<Dataset> {
        self.records
            .get_dataset(id)
            .await?
            .ok_or(Error::DatasetNotFound { dataset_id: id })
    }
}

impl std::fmt::Debug for DatasetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetCatalog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRecordStore;
    use tally_core::MemoryBlobStore;

    fn catalog() -> (DatasetCatalog, UserId) {
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        (
            DatasetCatalog::new(records, blobs),
            UserId::generate(),
        )
    }

    #[tokio::test]
    async fn register_starts_with_zero_stats() {
        let (catalog, owner) = catalog();
        let dataset = catalog
            .register("customers.csv", DatasetKind::Query, owner)
            .await
            .unwrap();

        assert_eq!(dataset.stats, DatasetStats::default());
        assert_eq!(catalog.get(dataset.id).await.unwrap().kind, DatasetKind::Query);
    }

    #[tokio::test]
    async fn register_rejects_result_kind() {
        let (catalog, owner) = catalog();
        let err = catalog
            .register("r.csv", DatasetKind::Result, owner)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMapping { .. }));
    }

    #[tokio::test]
    async fn analyze_recomputes_stats() {
        let (catalog, owner) = catalog();
        let dataset = catalog
            .register("customers.csv", DatasetKind::Query, owner)
            .await
            .unwrap();

        catalog
            .store_content(
                dataset.id,
                Bytes::from("company,city\nAcme,Berlin\nAcme,Paris\n,Oslo\nGlobex,Lyon\n"),
            )
            .await
            .unwrap();

        let stats = catalog
            .analyze(dataset.id, &ColumnSelector::ByName("company".into()))
            .await
            .unwrap();
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.unique_count, 2);

        let stored = catalog.get(dataset.id).await.unwrap();
        assert_eq!(stored.stats, stats);
    }

    #[tokio::test]
    async fn analyze_missing_column_reports_side_by_kind() {
        let (catalog, owner) = catalog();
        let dataset = catalog
            .register("ref.csv", DatasetKind::Master, owner)
            .await
            .unwrap();
        catalog
            .store_content(dataset.id, Bytes::from("name\nACME\n"))
            .await
            .unwrap();

        let err = catalog
            .analyze(dataset.id, &ColumnSelector::ByName("absent".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnNotFound {
                side: MappingSide::Master,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn analyze_unknown_dataset_is_not_found() {
        let (catalog, _) = catalog();
        let err = catalog
            .analyze(DatasetId::generate(), &ColumnSelector::ByIndex(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DatasetNotFound { .. }));
    }
}
