//! Tabular content reading.
//!
//! Materializes dataset blobs into an in-memory [`Table`]: an ordered
//! sequence of rows with named, positionally-indexed columns. Two formats
//! are supported, dispatched on the dataset name's extension:
//!
//! - `.csv` — delimited text; the first record supplies column names
//! - `.txt` — fixed-width text; column boundaries are inferred from
//!   all-blank character runs and columns are named positionally
//!
//! Anything else fails with [`Error::UnsupportedFormat`].

use std::collections::HashSet;

use crate::dataset::DatasetStats;
use crate::error::{Error, Result};

/// A materialized tabular dataset.
///
/// Rows are rectangular: every row has exactly `columns.len()` cells.
/// Cells are plain strings; the reader does not coerce types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table from parts.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any row's width differs from the
    /// column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::InvalidInput(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// The ordered column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds; callers resolve selectors
    /// against [`Table::columns`] first.
    #[must_use]
    pub fn column_values(&self, index: usize) -> Vec<String> {
        assert!(index < self.columns.len(), "column index out of bounds");
        self.rows.iter().map(|row| row[index].clone()).collect()
    }

    /// Ingestion statistics for one column: total rows, non-empty values,
    /// distinct non-empty values.
    #[must_use]
    pub fn column_stats(&self, index: usize) -> DatasetStats {
        let values = self.column_values(index);
        let total = values.len() as u64;
        let valid = values.iter().filter(|v| !v.is_empty()).count() as u64;
        let unique = values
            .iter()
            .filter(|v| !v.is_empty())
            .collect::<HashSet<_>>()
            .len() as u64;
        DatasetStats::new(unique, valid, total)
    }
}

/// Reads a dataset blob into a [`Table`], dispatching on the extension of
/// `name`.
///
/// # Errors
///
/// - `Error::UnsupportedFormat` for an unrecognized extension
/// - `Error::InvalidInput` for malformed content
pub fn read_table(name: &str, bytes: &[u8]) -> Result<Table> {
    if name.ends_with(".csv") {
        read_delimited(bytes)
    } else if name.ends_with(".txt") {
        read_fixed_width(bytes)
    } else {
        Err(Error::unsupported_format(name))
    }
}

/// Parses delimited text. The first record is the header.
fn read_delimited(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("malformed delimited header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Error::InvalidInput(format!("malformed delimited row: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Table::new(columns, rows)
}

/// Parses fixed-width text with no header row.
///
/// Column boundaries are character positions that are blank on every
/// non-empty line; columns are named by position ("0", "1", ...), matching
/// the positional selectors users address them with.
fn read_fixed_width(bytes: &[u8]) -> Result<Table> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::InvalidInput(format!("fixed-width content is not UTF-8: {e}")))?;

    let lines: Vec<Vec<char>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().collect())
        .collect();

    if lines.is_empty() {
        return Table::new(Vec::new(), Vec::new());
    }

    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let mut blank = vec![true; width];
    for line in &lines {
        for (i, slot) in blank.iter_mut().enumerate() {
            if line.get(i).is_some_and(|c| !c.is_whitespace()) {
                *slot = false;
            }
        }
    }

    // Field spans are the maximal runs of non-blank character columns.
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = None;
    for (i, is_blank) in blank.iter().enumerate() {
        match (start, is_blank) {
            (None, false) => start = Some(i),
            (Some(s), true) => {
                spans.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, width));
    }

    let columns: Vec<String> = (0..spans.len()).map(|i| i.to_string()).collect();
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|line| {
            spans
                .iter()
                .map(|&(s, e)| {
                    line.get(s..e.min(line.len()))
                        .unwrap_or(&[])
                        .iter()
                        .collect::<String>()
                        .trim()
                        .to_string()
                })
                .collect()
        })
        .collect();

    Table::new(columns, rows)
}
