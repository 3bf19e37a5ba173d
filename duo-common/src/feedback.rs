//! Feedback records and the feedback map
//!
//! The backend sends one flat [`FeedbackRecord`] per (row, column) cell. The
//! [`FeedbackMap`] indexes the same information by true row identifier and
//! stripped column key so the grid can look up and toggle cells in constant
//! time, independent of the order rows are displayed in.

use crate::header::{strip_line_breaks, Column};
use crate::sample::{RowId, Sample};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Marked state of one cell as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub row: RowId,
    pub col: String,
    pub marked: bool,
}

impl FeedbackRecord {
    pub fn new(row: RowId, col: impl Into<String>, marked: bool) -> Self {
        Self {
            row,
            col: col.into(),
            marked,
        }
    }

    /// Whether this record covers the given row and column key
    pub fn covers(&self, row: &RowId, key: &str) -> bool {
        self.row == *row && self.col == key
    }
}

/// What to do when no record covers a required cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFeedbackPolicy {
    /// Missing or duplicate records are a protocol violation
    #[default]
    Strict,
    /// Missing cells default to unmarked, duplicates resolve to the first record
    Lenient,
}

/// Row identifier → column key → marked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackMap {
    cells: BTreeMap<RowId, BTreeMap<String, bool>>,
}

impl FeedbackMap {
    /// Build the map for every sample row and every given column
    ///
    /// # Errors
    /// Under [`MissingFeedbackPolicy::Strict`]:
    /// - [`Error::MissingFeedback`] when a cell has no record
    /// - [`Error::DuplicateFeedback`] when a cell has more than one record
    pub fn build(
        sample: &Sample,
        columns: &[Column],
        records: &[FeedbackRecord],
        policy: MissingFeedbackPolicy,
    ) -> Result<Self> {
        let mut index: HashMap<(RowId, String), Vec<bool>> = HashMap::with_capacity(records.len());
        for record in records {
            index
                .entry((record.row.clone(), record.col.clone()))
                .or_default()
                .push(record.marked);
        }

        let mut cells = BTreeMap::new();
        for row in sample.rows() {
            let mut tup = BTreeMap::new();
            for column in columns {
                let key = column.key();
                let marked = match index.get(&(row.id().clone(), key.to_string())).map(Vec::as_slice) {
                    Some([marked]) => *marked,
                    Some([first, ..]) => match policy {
                        MissingFeedbackPolicy::Strict => {
                            return Err(Error::DuplicateFeedback {
                                row: row.id().to_string(),
                                column: key.to_string(),
                            })
                        }
                        MissingFeedbackPolicy::Lenient => {
                            warn!(row = %row.id(), column = key, "Duplicate feedback records, using the first");
                            *first
                        }
                    },
                    _ => match policy {
                        MissingFeedbackPolicy::Strict => {
                            return Err(Error::MissingFeedback {
                                row: row.id().to_string(),
                                column: key.to_string(),
                            })
                        }
                        MissingFeedbackPolicy::Lenient => {
                            warn!(row = %row.id(), column = key, "No feedback record, treating cell as unmarked");
                            false
                        }
                    },
                };
                tup.insert(key.to_string(), marked);
            }
            cells.insert(row.id().clone(), tup);
        }

        debug!(
            rows = cells.len(),
            columns = columns.len(),
            records = records.len(),
            "Built feedback map"
        );
        Ok(Self { cells })
    }

    pub fn get(&self, row: &RowId, column: &str) -> Option<bool> {
        self.cells
            .get(row)
            .and_then(|tup| tup.get(&strip_line_breaks(column)))
            .copied()
    }

    pub fn row(&self, row: &RowId) -> Option<&BTreeMap<String, bool>> {
        self.cells.get(row)
    }

    /// Flip one cell, returning the new state (None if the cell is unknown)
    pub fn flip(&mut self, row: &RowId, column: &str) -> Option<bool> {
        let cell = self
            .cells
            .get_mut(row)?
            .get_mut(&strip_line_breaks(column))?;
        *cell = !*cell;
        Some(*cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RowId, &BTreeMap<String, bool>)> {
        self.cells.iter()
    }

    /// Number of (row, column) cells held
    pub fn cell_count(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn marked_count(&self) -> usize {
        self.cells
            .values()
            .flat_map(BTreeMap::values)
            .filter(|m| **m)
            .count()
    }

    /// Backend submission shape: `{"<row id>": {"<column>": bool}}`
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        for (row, tup) in &self.cells {
            let cols: Map<String, Value> = tup
                .iter()
                .map(|(col, marked)| (col.clone(), Value::Bool(*marked)))
                .collect();
            payload.insert(row.to_string(), Value::Object(cols));
        }
        Value::Object(payload)
    }
}
