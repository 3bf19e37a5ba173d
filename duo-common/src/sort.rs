//! Column sort state
//!
//! Each column cycles NONE → ASC → DESC → ASC → …; once a column has been
//! clicked it never returns to NONE on its own. Clicking a column resets
//! every other column to NONE.

use crate::header::{strip_line_breaks, Header};
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sort direction of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    None,
    Ascending,
    Descending,
}

impl SortDirection {
    /// Direction after one click
    pub fn next(self) -> Self {
        match self {
            SortDirection::None | SortDirection::Descending => SortDirection::Ascending,
            SortDirection::Ascending => SortDirection::Descending,
        }
    }

    /// Compare two cell values under this direction
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            SortDirection::None => Ordering::Equal,
            SortDirection::Ascending => a.cmp(b),
            SortDirection::Descending => b.cmp(a),
        }
    }

    /// Header indicator used by the table renderer
    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::None => "-",
            SortDirection::Ascending => "^",
            SortDirection::Descending => "v",
        }
    }
}

/// Sort direction for every header column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    directions: BTreeMap<String, SortDirection>,
}

impl SortState {
    pub fn new(header: &Header) -> Self {
        Self {
            directions: header
                .keys()
                .map(|k| (k.to_string(), SortDirection::None))
                .collect(),
        }
    }

    pub fn direction(&self, column: &str) -> SortDirection {
        self.directions
            .get(&strip_line_breaks(column))
            .copied()
            .unwrap_or_default()
    }

    /// Apply one click on `column`, returning its new direction
    pub fn click(&mut self, column: &str) -> Result<SortDirection> {
        let key = strip_line_breaks(column);
        let current = *self
            .directions
            .get(&key)
            .ok_or_else(|| Error::UnknownColumn(column.to_string()))?;
        let next = current.next();
        for (k, direction) in self.directions.iter_mut() {
            *direction = if *k == key { next } else { SortDirection::None };
        }
        Ok(next)
    }

    /// The engaged column, if any
    pub fn active(&self) -> Option<(&str, SortDirection)> {
        self.directions
            .iter()
            .find(|(_, d)| **d != SortDirection::None)
            .map(|(k, d)| (k.as_str(), *d))
    }

    pub fn reset(&mut self) {
        for direction in self.directions.values_mut() {
            *direction = SortDirection::None;
        }
    }
}
