//! The rolling data-quality ledger.
//!
//! A scheduled job snapshots uniqueness/completeness statistics of all
//! ingested master and query datasets once per calendar month and serves
//! month-over-month deltas and a trend series on demand.
//!
//! Snapshots are immutable: re-runs within the same month are silent
//! no-ops, so the daily schedule (plus the eager run at process start)
//! writes exactly one row per month.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::Result;
use crate::metrics;
use crate::store::{DatasetFilter, RecordStore};
use tally_core::DatasetKind;

/// One month's frozen data-quality statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySnapshot {
    /// First day of the snapshot's calendar month.
    pub month: NaiveDate,
    /// Sum of unique counts over sum of total counts, in `[0, 1]`.
    pub overall_uniqueness: f64,
    /// Sum of valid counts over sum of total counts, in `[0, 1]`.
    pub overall_completeness: f64,
    /// Total rows across query datasets.
    pub total_query_records: u64,
    /// Total rows across master datasets.
    pub total_master_records: u64,
}

impl QualitySnapshot {
    /// An all-zero snapshot for months with no data.
    #[must_use]
    pub const fn zero(month: NaiveDate) -> Self {
        Self {
            month,
            overall_uniqueness: 0.0,
            overall_completeness: 0.0,
            total_query_records: 0,
            total_master_records: 0,
        }
    }
}

/// Aggregated statistics with month-over-month deltas, formatted for the
/// dashboard surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityStats {
    /// Overall completeness as a percentage, e.g. `"80.0%"`.
    pub overall_completeness: String,
    /// Completeness change in percentage points, e.g. `"+20.0%"`.
    pub completeness_diff: String,
    /// Overall uniqueness as a percentage.
    pub overall_uniqueness: String,
    /// Uniqueness change in percentage points.
    pub uniqueness_diff: String,
    /// Total rows across query datasets.
    pub total_query_records: u64,
    /// Change in query rows since the previous snapshot.
    pub query_records_diff: i64,
    /// Total rows across master datasets.
    pub total_master_records: u64,
    /// Change in master rows since the previous snapshot.
    pub master_records_diff: i64,
}

/// Metric selector for the trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    /// Overall uniqueness, as a rounded percentage.
    Uniqueness,
    /// Overall completeness, as a rounded percentage.
    Completeness,
    /// Total query rows.
    QueryRecords,
    /// Total master rows.
    MasterRecords,
}

impl TrendMetric {
    fn value_of(self, snapshot: &QualitySnapshot) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        match self {
            Self::Uniqueness => (snapshot.overall_uniqueness * 100.0).round() as i64,
            Self::Completeness => (snapshot.overall_completeness * 100.0).round() as i64,
            Self::QueryRecords => i64::try_from(snapshot.total_query_records).unwrap_or(i64::MAX),
            Self::MasterRecords => i64::try_from(snapshot.total_master_records).unwrap_or(i64::MAX),
        }
    }
}

/// One point of the trend series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// First day of the month.
    pub month: NaiveDate,
    /// The metric value for that month.
    pub value: i64,
}

/// Outcome of one aggregator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A new snapshot row was written for the current month.
    Written,
    /// The current month already has a snapshot; nothing was written.
    AlreadyExists,
    /// Another run is in flight; this trigger was skipped, not queued.
    Skipped,
}

impl SnapshotOutcome {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::AlreadyExists => "already_exists",
            Self::Skipped => "skipped",
        }
    }
}

/// Computes and serves the monthly quality ledger.
pub struct QualityAggregator {
    records: Arc<dyn RecordStore>,
    run_guard: Mutex<()>,
}

impl QualityAggregator {
    /// Creates an aggregator over the given record store.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            run_guard: Mutex::new(()),
        }
    }

    /// Runs one aggregation pass for the current month.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn run_once(&self) -> Result<SnapshotOutcome> {
        self.run_once_at(Utc::now()).await
    }

    /// Runs one aggregation pass as of a given instant.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<SnapshotOutcome> {
        // At most one concurrent run; overlapping triggers are skipped.
        let Ok(_guard) = self.run_guard.try_lock() else {
            return Ok(SnapshotOutcome::Skipped);
        };

        let span = tally_core::observability::quality_span("aggregate");
        self.aggregate(now).instrument(span).await
    }

    async fn aggregate(&self, now: DateTime<Utc>) -> Result<SnapshotOutcome> {
        let snapshot = self.compute_snapshot(month_floor(now.date_naive())).await?;
        let written = self.records.insert_snapshot(&snapshot).await?;

        let outcome = if written {
            tracing::info!(month = %snapshot.month, "quality snapshot written");
            SnapshotOutcome::Written
        } else {
            tracing::debug!(month = %snapshot.month, "quality snapshot exists, skipping");
            SnapshotOutcome::AlreadyExists
        };
        metrics::record_quality_run(outcome.as_label());
        Ok(outcome)
    }

    /// Sums ingestion statistics over all master and query datasets.
    async fn compute_snapshot(&self, month: NaiveDate) -> Result<QualitySnapshot> {
        let mut unique_sum = 0u64;
        let mut valid_sum = 0u64;
        let mut total_sum = 0u64;
        let mut query_total = 0u64;
        let mut master_total = 0u64;

        for kind in [DatasetKind::Master, DatasetKind::Query] {
            // Full scan; the aggregator must see every dataset.
            let datasets = self
                .records
                .list_datasets(&DatasetFilter::default().with_kind(kind).with_limit(usize::MAX))
                .await?;

            for dataset in datasets {
                unique_sum += dataset.stats.unique_count;
                valid_sum += dataset.stats.valid_count;
                total_sum += dataset.stats.total_count;
                match kind {
                    DatasetKind::Master => master_total += dataset.stats.total_count,
                    DatasetKind::Query => query_total += dataset.stats.total_count,
                    DatasetKind::Result => {}
                }
            }
        }

        Ok(QualitySnapshot {
            month,
            overall_uniqueness: ratio(unique_sum, total_sum),
            overall_completeness: ratio(valid_sum, total_sum),
            total_query_records: query_total,
            total_master_records: master_total,
        })
    }

    /// Current statistics with month-over-month deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn stats(&self) -> Result<QualityStats> {
        self.stats_at(Utc::now()).await
    }

    /// Statistics as of a given instant.
    ///
    /// Falls back to the most recent prior month when the current month
    /// has no snapshot; reports all-zero statistics with neutral deltas
    /// when no snapshot exists at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<QualityStats> {
        let this_month = month_floor(now.date_naive());
        let current = self
            .records
            .latest_snapshot_at_or_before(this_month)
            .await?
            .unwrap_or_else(|| QualitySnapshot::zero(this_month));

        let previous = match prev_month(current.month) {
            Some(before) => self
                .records
                .latest_snapshot_at_or_before(before)
                .await?
                .unwrap_or_else(|| QualitySnapshot::zero(before)),
            None => QualitySnapshot::zero(current.month),
        };

        Ok(QualityStats {
            overall_completeness: format_percent(current.overall_completeness),
            completeness_diff: format_diff(
                current.overall_completeness - previous.overall_completeness,
            ),
            overall_uniqueness: format_percent(current.overall_uniqueness),
            uniqueness_diff: format_diff(current.overall_uniqueness - previous.overall_uniqueness),
            total_query_records: current.total_query_records,
            query_records_diff: record_diff(
                current.total_query_records,
                previous.total_query_records,
            ),
            total_master_records: current.total_master_records,
            master_records_diff: record_diff(
                current.total_master_records,
                previous.total_master_records,
            ),
        })
    }

    /// A monthly trend series ending at the current month.
    ///
    /// Months without a snapshot carry the most recent prior snapshot
    /// forward; months before the first snapshot report zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn trend(&self, metric: TrendMetric, months: u32) -> Result<Vec<TrendPoint>> {
        self.trend_at(Utc::now(), metric, months).await
    }

    /// The trend series as of a given instant.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn trend_at(
        &self,
        now: DateTime<Utc>,
        metric: TrendMetric,
        months: u32,
    ) -> Result<Vec<TrendPoint>> {
        let head = month_floor(now.date_naive());
        let mut points = Vec::with_capacity(months as usize);

        for offset in (0..months).rev() {
            let Some(month) = head.checked_sub_months(Months::new(offset)) else {
                continue;
            };
            let value = self
                .records
                .latest_snapshot_at_or_before(month)
                .await?
                .map_or(0, |snapshot| metric.value_of(&snapshot));
            points.push(TrendPoint { month, value });
        }

        Ok(points)
    }
}

impl std::fmt::Debug for QualityAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityAggregator").finish_non_exhaustive()
    }
}

/// Spawns the fixed-interval aggregation schedule.
///
/// The first tick fires immediately (the eager run at process start);
/// missed ticks are skipped, never queued.
pub fn spawn_schedule(aggregator: Arc<QualityAggregator>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match aggregator.run_once().await {
                Ok(outcome) => {
                    tracing::debug!(outcome = outcome.as_label(), "quality aggregation tick");
                }
                Err(error) => {
                    tracing::warn!(%error, "quality aggregation failed");
                    metrics::record_quality_run("failed");
                }
            }
        }
    })
}

/// First day of the date's calendar month.
fn month_floor(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the previous calendar month.
fn prev_month(month: NaiveDate) -> Option<NaiveDate> {
    month.checked_sub_months(Months::new(1))
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn format_diff(delta: f64) -> String {
    format!("{:+.1}%", delta * 100.0)
}

fn record_diff(current: u64, previous: u64) -> i64 {
    i64::try_from(current).unwrap_or(i64::MAX) - i64::try_from(previous).unwrap_or(i64::MAX)
}
