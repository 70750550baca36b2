//! Column selection and resolution.
//!
//! Users address the column to reconcile either by name or by 0-based
//! position. The selector is a tagged variant resolved explicitly against a
//! materialized table's columns; resolution is pure and has no side
//! effects.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, MappingSide, Result};

/// A user-supplied column selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnSelector {
    /// Select by literal column name.
    ByName(String),
    /// Select by 0-based position.
    ByIndex(usize),
}

impl ColumnSelector {
    /// Resolves the selector to a column index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] tagged with `side` when the name
    /// is absent or the index is out of bounds.
    pub fn resolve(&self, columns: &[String], side: MappingSide) -> Result<usize> {
        match self {
            Self::ByName(name) => columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| Error::column_not_found(side, name.clone())),
            Self::ByIndex(index) => {
                if *index < columns.len() {
                    Ok(*index)
                } else {
                    Err(Error::column_not_found(side, index.to_string()))
                }
            }
        }
    }
}

impl FromStr for ColumnSelector {
    type Err = std::convert::Infallible;

    /// A selector string parsing as a non-negative integer is positional;
    /// anything else is a literal name. Parsing never fails.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(s.parse::<usize>()
            .map_or_else(|_| Self::ByName(s.to_string()), Self::ByIndex))
    }
}

impl std::fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByName(name) => write!(f, "{name}"),
            Self::ByIndex(index) => write!(f, "{index}"),
        }
    }
}
