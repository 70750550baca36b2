//! Dataset records and ingestion statistics.
//!
//! A dataset is a registered tabular resource. Master datasets are the
//! reference tables queries are reconciled against; query datasets are the
//! tables being reconciled; result datasets are spawned by the
//! reconciliation engine and never uploaded directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{DatasetId, UserId};

/// The role a dataset plays in reconciliation.
///
/// This is a closed enumeration; every use site matches exhaustively so a
/// new kind cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetKind {
    /// A master reference table. Reconciliation maps query values onto it.
    Master,
    /// A query table awaiting reconciliation against a master.
    Query,
    /// A reconciliation output. Spawned by the engine, never uploaded.
    Result,
}

impl DatasetKind {
    /// Returns a lowercase label suitable for metrics, logs, and storage
    /// key prefixes.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Query => "query",
            Self::Result => "result",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => write!(f, "MASTER"),
            Self::Query => write!(f, "QUERY"),
            Self::Result => write!(f, "RESULT"),
        }
    }
}

/// Ingestion statistics for one dataset.
///
/// Computed when content is analyzed, zeroed at registration. The counts
/// describe the dataset's reconciliation column: `total_count` rows, of
/// which `valid_count` are non-empty and `unique_count` are distinct
/// non-empty values.
///
/// Invariant: `unique_count <= total_count` and `valid_count <= total_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    /// Number of distinct non-empty values.
    pub unique_count: u64,
    /// Number of non-empty values.
    pub valid_count: u64,
    /// Total number of rows.
    pub total_count: u64,
}

impl DatasetStats {
    /// Creates statistics from raw counts.
    #[must_use]
    pub const fn new(unique_count: u64, valid_count: u64, total_count: u64) -> Self {
        Self {
            unique_count,
            valid_count,
            total_count,
        }
    }

    /// Returns true if the counts satisfy the dataset invariant.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.unique_count <= self.total_count && self.valid_count <= self.total_count
    }

    /// Fraction of rows holding a distinct non-empty value.
    ///
    /// A zero total yields 0.0, not a fault.
    #[must_use]
    pub fn uniqueness(&self) -> f64 {
        ratio(self.unique_count, self.total_count)
    }

    /// Fraction of rows holding a non-empty value.
    ///
    /// A zero total yields 0.0, not a fault.
    #[must_use]
    pub fn completeness(&self) -> f64 {
        ratio(self.valid_count, self.total_count)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// A registered tabular resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Unique dataset identifier.
    pub id: DatasetId,
    /// Logical name; also the file name component of the storage key.
    pub name: String,
    /// Role of the dataset in reconciliation.
    pub kind: DatasetKind,
    /// Owning user.
    pub owner: UserId,
    /// Ingestion statistics for the reconciliation column.
    pub stats: DatasetStats,
    /// When the dataset was registered.
    pub created_at: DateTime<Utc>,
    /// When the dataset record was last modified.
    pub modified_at: DateTime<Utc>,
}

impl Dataset {
    /// Registers a new dataset with zeroed statistics.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: DatasetKind, owner: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: DatasetId::generate(),
            name: name.into(),
            kind,
            owner,
            stats: DatasetStats::default(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Replaces the ingestion statistics, refreshing the modification time.
    pub fn set_stats(&mut self, stats: DatasetStats) {
        self.stats = stats;
        self.modified_at = Utc::now();
    }

    /// The storage key of the dataset's content blob.
    ///
    /// Master and query content lives under a per-kind prefix keyed by the
    /// logical name; result content is keyed the same way but the name is
    /// derived from the source dataset id at materialization time.
    #[must_use]
    pub fn blob_key(&self) -> String {
        format!("{}/{}", self.kind.as_label(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_dataset_has_zero_stats() {
        let ds = Dataset::new("customers.csv", DatasetKind::Query, UserId::generate());
        assert_eq!(ds.stats, DatasetStats::default());
        assert!(ds.stats.is_consistent());
        assert_eq!(ds.created_at, ds.modified_at);
    }

    #[test]
    fn stats_ratios() {
        let stats = DatasetStats::new(6, 8, 10);
        assert!((stats.uniqueness() - 0.6).abs() < f64::EPSILON);
        assert!((stats.completeness() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_yields_zero_ratios() {
        let stats = DatasetStats::default();
        assert_eq!(stats.uniqueness(), 0.0);
        assert_eq!(stats.completeness(), 0.0);
    }

    #[test]
    fn inconsistent_stats_detected() {
        let stats = DatasetStats::new(11, 4, 10);
        assert!(!stats.is_consistent());
    }

    #[test]
    fn blob_key_uses_kind_prefix() {
        let ds = Dataset::new("suppliers.csv", DatasetKind::Master, UserId::generate());
        assert_eq!(ds.blob_key(), "master/suppliers.csv");
    }

    #[test]
    fn kind_labels() {
        assert_eq!(DatasetKind::Master.as_label(), "master");
        assert_eq!(DatasetKind::Query.to_string(), "QUERY");
        assert_eq!(DatasetKind::Result.as_label(), "result");
    }

    #[test]
    fn set_stats_refreshes_modified_at() {
        let mut ds = Dataset::new("a.csv", DatasetKind::Query, UserId::generate());
        let created = ds.modified_at;
        ds.set_stats(DatasetStats::new(1, 1, 1));
        assert!(ds.modified_at >= created);
        assert_eq!(ds.stats.total_count, 1);
    }
}
