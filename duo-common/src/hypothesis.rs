//! Participant FD hypothesis
//!
//! Every header column sits on the LHS, the RHS, or neither. Columns are
//! looked up by their stripped key, but the hypothesis serializes the raw
//! header labels: `(c1, c2) => (d1)` with each side sorted. A participant
//! who does not know sends the [`UNKNOWN_HYPOTHESIS`] sentinel instead.

use crate::header::{strip_line_breaks, Header};
use std::fmt;
use tracing::warn;

/// Sentinel sent in place of a hypothesis when the participant is unsure
pub const UNKNOWN_HYPOTHESIS: &str = "Not Sure";

/// Side of an FD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Lhs,
    Rhs,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Lhs => Side::Rhs,
            Side::Rhs => Side::Lhs,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Lhs => f.write_str("LHS"),
            Side::Rhs => f.write_str("RHS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    key: String,
    label: String,
    side: Option<Side>,
}

/// Column → side assignment plus comment and "unknown" flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdHypothesis {
    slots: Vec<Slot>,
    comment: String,
    unknown: bool,
}

impl FdHypothesis {
    /// Fresh hypothesis with every column N/A
    pub fn new(header: &Header) -> Self {
        Self {
            slots: header
                .columns()
                .iter()
                .map(|c| Slot {
                    key: c.key().to_string(),
                    label: c.label().to_string(),
                    side: None,
                })
                .collect(),
            comment: String::new(),
            unknown: false,
        }
    }

    /// Side of a column; `Some(None)` is N/A, `None` means not in the header
    pub fn side(&self, column: &str) -> Option<Option<Side>> {
        let key = strip_line_breaks(column);
        self.slots.iter().find(|s| s.key == key).map(|s| s.side)
    }

    /// Put exactly `selection` on `side`
    ///
    /// Selected columns move to `side`; columns previously on `side` but not
    /// selected revert to N/A; columns on the opposite side are untouched. A
    /// selected column that currently sits on the opposite side is skipped.
    /// Returns the skipped column names.
    pub fn assign<I, S>(&mut self, side: Side, selection: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted: Vec<String> = Vec::new();
        let mut skipped = Vec::new();
        for name in selection {
            let key = strip_line_breaks(name.as_ref());
            match self.side(&key) {
                None => {
                    warn!(column = %key, "Ignoring unknown column in FD selection");
                    skipped.push(key);
                }
                Some(Some(current)) if current == side.opposite() => {
                    warn!(column = %key, side = %current, "Column already on the opposite side");
                    skipped.push(key);
                }
                Some(_) => accepted.push(key),
            }
        }

        for slot in self.slots.iter_mut() {
            if accepted.contains(&slot.key) {
                slot.side = Some(side);
            } else if slot.side == Some(side) {
                slot.side = None;
            }
        }
        skipped
    }

    fn on_side(&self, side: Side) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(move |s| s.side == Some(side))
    }

    /// Column keys on a side, sorted
    pub fn columns_on(&self, side: Side) -> Vec<&str> {
        let mut columns: Vec<&str> = self.on_side(side).map(|s| s.key.as_str()).collect();
        columns.sort_unstable();
        columns
    }

    /// Raw header labels on a side, sorted
    pub fn labels_on(&self, side: Side) -> Vec<&str> {
        let mut labels: Vec<&str> = self.on_side(side).map(|s| s.label.as_str()).collect();
        labels.sort_unstable();
        labels
    }

    /// Columns a picker for `side` may offer, in header order
    pub fn options_for(&self, side: Side) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.side != Some(side.opposite()))
            .map(|s| s.key.as_str())
            .collect()
    }

    /// At least one column on each side
    pub fn is_valid(&self) -> bool {
        !self.columns_on(Side::Lhs).is_empty() && !self.columns_on(Side::Rhs).is_empty()
    }

    /// Valid, or explicitly unknown
    pub fn is_submittable(&self) -> bool {
        self.unknown || self.is_valid()
    }

    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    pub fn set_unknown(&mut self, unknown: bool) {
        self.unknown = unknown;
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// `(lhs…) => (rhs…)` over header labels, regardless of the unknown flag
    pub fn canonical_form(&self) -> String {
        format!(
            "({}) => ({})",
            self.labels_on(Side::Lhs).join(", "),
            self.labels_on(Side::Rhs).join(", ")
        )
    }

    /// Text sent to the backend
    pub fn to_wire(&self) -> String {
        if self.unknown {
            UNKNOWN_HYPOTHESIS.to_string()
        } else {
            self.canonical_form()
        }
    }
}

impl fmt::Display for FdHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypothesis() -> FdHypothesis {
        FdHypothesis::new(&Header::new(["C", "A", "B"]))
    }

    #[test]
    fn test_serialize_single_column_sides() {
        let mut h = hypothesis();
        h.assign(Side::Lhs, ["A"]);
        h.assign(Side::Rhs, ["B"]);
        assert_eq!(h.to_wire(), "(A) => (B)");
        assert_eq!(h.side("C"), Some(None));
    }

    #[test]
    fn test_serialize_sorts_each_side() {
        let mut h = hypothesis();
        h.assign(Side::Lhs, ["B", "A"]);
        h.assign(Side::Rhs, ["C"]);
        assert_eq!(h.to_wire(), "(A, B) => (C)");
    }

    #[test]
    fn test_unknown_overrides_serialization() {
        let mut h = hypothesis();
        h.assign(Side::Lhs, ["A"]);
        h.assign(Side::Rhs, ["B"]);
        h.set_unknown(true);
        assert_eq!(h.to_wire(), UNKNOWN_HYPOTHESIS);
        assert_eq!(h.canonical_form(), "(A) => (B)");
        assert!(h.is_submittable());
    }

    #[test]
    fn test_deselected_columns_revert_to_na() {
        let mut h = hypothesis();
        h.assign(Side::Lhs, ["A", "B"]);
        h.assign(Side::Lhs, ["B"]);
        assert_eq!(h.side("A"), Some(None));
        assert_eq!(h.side("B"), Some(Some(Side::Lhs)));
    }

    #[test]
    fn test_opposite_side_is_untouched_and_guarded() {
        let mut h = hypothesis();
        h.assign(Side::Rhs, ["C"]);
        let skipped = h.assign(Side::Lhs, ["A", "C"]);
        assert_eq!(skipped, vec!["C".to_string()]);
        assert_eq!(h.side("C"), Some(Some(Side::Rhs)));
        assert_eq!(h.side("A"), Some(Some(Side::Lhs)));

        // Clearing the LHS leaves the RHS alone
        h.assign(Side::Lhs, Vec::<String>::new());
        assert_eq!(h.side("C"), Some(Some(Side::Rhs)));
        assert_eq!(h.side("A"), Some(None));
    }

    #[test]
    fn test_validity_requires_both_sides() {
        let mut h = hypothesis();
        assert!(!h.is_valid());
        h.assign(Side::Lhs, ["A"]);
        assert!(!h.is_valid());
        assert!(!h.is_submittable());
        h.assign(Side::Rhs, ["B"]);
        assert!(h.is_valid());
    }

    #[test]
    fn test_picker_options_exclude_opposite_side() {
        let mut h = hypothesis();
        h.assign(Side::Rhs, ["A"]);
        assert_eq!(h.options_for(Side::Lhs), vec!["C", "B"]);
        assert_eq!(h.options_for(Side::Rhs), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_unknown_columns_are_ignored() {
        let mut h = hypothesis();
        let skipped = h.assign(Side::Lhs, ["Z"]);
        assert_eq!(skipped, vec!["Z".to_string()]);
        assert!(h.columns_on(Side::Lhs).is_empty());
    }

    #[test]
    fn test_serialize_uses_raw_labels() {
        let mut h = FdHypothesis::new(&Header::new(["id", "home\ntown", "zip\r\n"]));
        h.assign(Side::Lhs, ["hometown"]);
        h.assign(Side::Rhs, ["zip"]);
        assert_eq!(h.side("home\ntown"), Some(Some(Side::Lhs)));
        assert_eq!(h.columns_on(Side::Lhs), vec!["hometown"]);
        assert_eq!(h.to_wire(), "(home\ntown) => (zip\r\n)");
    }
}
