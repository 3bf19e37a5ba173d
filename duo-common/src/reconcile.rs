//! Sample/feedback reconciliation
//!
//! Turns a raw backend sample plus its flat feedback records into a
//! display-ready grid. The grid keeps three things consistent:
//!
//! - the normalized sample in backend order
//! - the feedback map and the flat record list, both keyed by true row id
//! - the display order, a permutation over sample rows driven by sorting
//!
//! Positions used by the participant ("row 3") always go through the display
//! order, so sorting never moves feedback to the wrong row and the map never
//! needs rebuilding after a sort.

use crate::feedback::{FeedbackMap, FeedbackRecord, MissingFeedbackPolicy};
use crate::header::{strip_line_breaks, Column, Header};
use crate::sample::{normalize, RawSample, Row, Sample, SampleLayout};
use crate::sort::{SortDirection, SortState};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Address of a displayed cell: position in display order plus column
///
/// Textual form is `<position>_<column>`; the column may itself contain `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellKey {
    pub position: usize,
    pub column: String,
}

impl CellKey {
    pub fn new(position: usize, column: impl Into<String>) -> Self {
        Self {
            position,
            column: column.into(),
        }
    }
}

impl FromStr for CellKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (position, column) = s
            .split_once('_')
            .ok_or_else(|| Error::InvalidInput(format!("cell key {:?} has no column", s)))?;
        let position = position
            .parse()
            .map_err(|_| Error::InvalidInput(format!("cell key {:?} has no row position", s)))?;
        if column.is_empty() {
            return Err(Error::InvalidInput(format!("cell key {:?} has no column", s)));
        }
        Ok(CellKey::new(position, column))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.position, self.column)
    }
}

/// Reconciled sample for one backend round-trip
#[derive(Debug, Clone)]
pub struct ReconciledSample {
    header: Header,
    layout: SampleLayout,
    sample: Sample,
    records: Vec<FeedbackRecord>,
    feedback: FeedbackMap,
    order: Vec<usize>,
    sort: SortState,
}

impl ReconciledSample {
    /// Normalize `raw` and build the feedback map from `records`
    pub fn reconcile(
        raw: &RawSample,
        records: Vec<FeedbackRecord>,
        header: Header,
        layout: SampleLayout,
        policy: MissingFeedbackPolicy,
    ) -> Result<Self> {
        let sample = normalize(raw, &layout)?;
        let columns = layout.feedback_columns(&header);
        let feedback = FeedbackMap::build(&sample, &columns, &records, policy)?;
        let order = (0..sample.len()).collect();
        let sort = SortState::new(&header);

        debug!(
            rows = sample.len(),
            columns = header.len(),
            marked = feedback.marked_count(),
            "Reconciled sample"
        );

        Ok(Self {
            header,
            layout,
            sample,
            records,
            feedback,
            order,
            sort,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    /// Flat records as they will be re-serialized for the backend
    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    pub fn feedback_map(&self) -> &FeedbackMap {
        &self.feedback
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Columns rendered in the grid
    pub fn display_columns(&self) -> Vec<&Column> {
        self.layout.display_columns(&self.header)
    }

    /// Row shown at a display position
    pub fn row_at(&self, position: usize) -> Option<&Row> {
        self.order.get(position).map(|i| &self.sample.rows()[*i])
    }

    /// Rows in display order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.order.iter().map(move |i| &self.sample.rows()[*i])
    }

    /// Feedback column the participant can address; a hidden `id` never is
    fn feedback_column(&self, name: &str) -> Result<Column> {
        let key = strip_line_breaks(name);
        self.layout
            .feedback_columns(&self.header)
            .into_iter()
            .filter(|c| !(self.layout.hides_id() && c.is_id()))
            .find(|c| c.label() == name || c.key() == key)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Marked state of a displayed cell
    pub fn is_marked(&self, position: usize, column: &str) -> Result<bool> {
        let row = self
            .row_at(position)
            .ok_or_else(|| Error::UnknownCell(CellKey::new(position, column).to_string()))?;
        let column = self.feedback_column(column)?;
        self.feedback
            .get(row.id(), column.key())
            .ok_or_else(|| Error::UnknownCell(CellKey::new(position, column.label()).to_string()))
    }

    /// Toggle a cell addressed by its textual key
    pub fn toggle(&mut self, key: &str) -> Result<bool> {
        let key: CellKey = key.parse()?;
        self.toggle_cell(key.position, &key.column)
    }

    /// Flip a displayed cell in both the map and the flat record list
    ///
    /// Returns the new marked state.
    pub fn toggle_cell(&mut self, position: usize, column: &str) -> Result<bool> {
        let unknown = || Error::UnknownCell(CellKey::new(position, column).to_string());
        let row_id = self.row_at(position).ok_or_else(unknown)?.id().clone();
        let column = self.feedback_column(column)?;
        let key = column.key();

        let marked = self.feedback.flip(&row_id, key).ok_or_else(unknown)?;
        match self.records.iter_mut().find(|r| r.covers(&row_id, key)) {
            Some(record) => record.marked = marked,
            // Only reachable when the map was built leniently
            None => self
                .records
                .push(FeedbackRecord::new(row_id.clone(), key, marked)),
        }

        debug!(row = %row_id, column = key, marked, "Toggled cell");
        Ok(marked)
    }

    /// Click a column's sort control and reorder the display
    pub fn click_sort(&mut self, column: &str) -> Result<SortDirection> {
        let target = self
            .header
            .find(column)
            .cloned()
            .ok_or_else(|| Error::UnknownColumn(column.to_string()))?;
        let direction = self.sort.click(target.key())?;
        let rows = self.sample.rows();
        self.order
            .sort_by(|a, b| direction.compare(rows[*a].value(&target), rows[*b].value(&target)));
        debug!(column = target.key(), ?direction, "Sorted sample");
        Ok(direction)
    }

    /// Position → column → marked, in display order
    pub fn positional_view(&self) -> Vec<BTreeMap<String, bool>> {
        self.rows()
            .map(|row| self.feedback.row(row.id()).cloned().unwrap_or_default())
            .collect()
    }

    /// Feedback object for the backend's `feedback` field
    pub fn feedback_payload(&self) -> Value {
        self.feedback.to_payload()
    }
}
