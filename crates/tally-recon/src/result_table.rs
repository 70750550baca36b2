//! The reconciliation result artifact.
//!
//! A [`ResultTable`] is an ordered sequence of [`MatchRow`], one per query
//! row, serialized as delimited text with the header
//! `source,destination,partial,full`. Row order equals source row order;
//! that ordering is what makes single-row correction and audit possible.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use tally_core::{Error as CoreError, Result as CoreResult};

use crate::similarity::MAX_SCORE;

/// One reconciled pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRow {
    /// The query value, verbatim.
    pub source: String,
    /// The selected master value.
    pub destination: String,
    /// Partial-similarity score in `[0, 100]`.
    pub partial: u8,
    /// Full-similarity score in `[0, 100]`.
    pub full: u8,
}

impl MatchRow {
    /// Marks this row as a user override: the destination is replaced and
    /// both scores are set to the maximum, signaling full confidence.
    pub fn correct(&mut self, destination: impl Into<String>) {
        self.destination = destination.into();
        self.partial = MAX_SCORE;
        self.full = MAX_SCORE;
    }
}

/// The ordered reconciliation output for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    rows: Vec<MatchRow>,
}

impl ResultTable {
    /// Wraps an ordered row sequence.
    #[must_use]
    pub fn new(rows: Vec<MatchRow>) -> Self {
        Self { rows }
    }

    /// Number of rows (equals the query dataset's row count).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows in source order.
    #[must_use]
    pub fn rows(&self) -> &[MatchRow] {
        &self.rows
    }

    /// Rewrites every row whose source equals `source_value` as a user
    /// override of `destination`. Returns the number of rows rewritten.
    pub fn correct_rows(&mut self, source_value: &str, destination: &str) -> usize {
        let mut corrected = 0;
        for row in &mut self.rows {
            if row.source == source_value {
                row.correct(destination);
                corrected += 1;
            }
        }
        corrected
    }

    /// Serializes the table as delimited text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_csv(&self) -> CoreResult<Bytes> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            writer
                .serialize(row)
                .map_err(|e| CoreError::serialization(format!("result row encode: {e}")))?;
        }
        let buffer = writer
            .into_inner()
            .map_err(|e| CoreError::serialization(format!("result flush: {e}")))?;
        Ok(Bytes::from(buffer))
    }

    /// Deserializes a table from delimited text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed content.
    pub fn from_csv(bytes: &[u8]) -> CoreResult<Self> {
        let mut reader = csv::Reader::from_reader(bytes);
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            let row: MatchRow =
                row.map_err(|e| CoreError::serialization(format!("result row decode: {e}")))?;
            rows.push(row);
        }
        Ok(Self::new(rows))
    }
}

impl IntoIterator for ResultTable {
    type Item = MatchRow;
    type IntoIter = std::vec::IntoIter<MatchRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
