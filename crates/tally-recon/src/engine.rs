//! The reconciliation engine.
//!
//! Drives match selection over every row of the source column, producing
//! the ordered result table. The engine is pure with respect to its
//! inputs: it never mutates the tables, and identical inputs produce
//! byte-identical output (deterministic tie-breaks).

use tally_core::Table;

use crate::column::ColumnSelector;
use crate::error::{MappingSide, Result};
use crate::result_table::{MatchRow, ResultTable};
use crate::selector::select_match;

/// Reconciles every row of the source column against the master column.
///
/// One [`MatchRow`] is appended per source row, in source order; the
/// result length always equals the source row count. An empty master
/// column maps every source row to an empty destination with zero scores.
///
/// # Errors
///
/// Returns [`crate::Error::ColumnNotFound`] tagged with the failing side
/// when either selector does not resolve.
pub fn reconcile(
    source: &Table,
    master: &Table,
    source_column: &ColumnSelector,
    master_column: &ColumnSelector,
) -> Result<ResultTable> {
    let source_index = source_column.resolve(source.columns(), MappingSide::Source)?;
    let master_index = master_column.resolve(master.columns(), MappingSide::Master)?;

    let source_values = source.column_values(source_index);
    let master_values = master.column_values(master_index);

    let mut rows = Vec::with_capacity(source_values.len());
    for value in source_values {
        let row = match select_match(&value, &master_values) {
            Some(m) => MatchRow {
                source: value,
                destination: master_values[m.index].clone(),
                partial: m.partial,
                full: m.full,
            },
            None => MatchRow {
                source: value,
                destination: String::new(),
                partial: 0,
                full: 0,
            },
        };
        rows.push(row);
    }

    Ok(ResultTable::new(rows))
}
