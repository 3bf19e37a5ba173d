//! Sample decoding and normalization
//!
//! A raw sample arrives as a JSON object mapping row keys to records. Each
//! record maps column names to null, numbers, strings or booleans. The
//! normalized sample holds a purely textual grid suitable for display and
//! for use as a sort key, with every row carrying its true backend
//! identifier.
//!
//! # Normalization rules (per cell)
//! - null or absent → `""`
//! - non-string → canonical string form
//! - finite integral number text (`"3.0"`, `3`, `3.0`) → integer text (`"3"`)
//!
//! The `id` column is left untouched in the [`LayoutKind::Interact`] layout and
//! typed like any other column in the [`LayoutKind::Clean`] layout.

use crate::header::{Column, Header, ID_COLUMN};
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// True backend identifier of a sample row
///
/// Integer-like identifiers are canonicalized (`"007"` and `7` are the same
/// row) since the backend emits them as integers in feedback records and as
/// strings in object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(String);

impl RowId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        let trimmed = raw.trim();
        match trimmed
            .parse::<i64>()
            .or_else(|_| collapse_integral(trimmed).parse::<i64>())
        {
            Ok(n) => RowId(n.to_string()),
            Err(_) => RowId(raw.to_string()),
        }
    }

    /// Build from a JSON scalar; null and containers have no identity
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RowId::new(s)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(RowId(i.to_string())),
                None => Some(RowId::new(collapse_integral(&n.to_string()))),
            },
            Value::Bool(b) => Some(RowId(b.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RowId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RowId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid row identifier: {}", value)))
    }
}

/// Which of the two screen layouts the sample is reconciled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// `id` kept raw, hidden from the grid, row identity read from `id`
    #[default]
    Interact,
    /// `id` is an ordinary column, row identity is the sample row key
    Clean,
}

/// Layout rules applied during normalization and feedback lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLayout {
    #[serde(default)]
    pub kind: LayoutKind,
    /// Whether feedback records are also expected for the `id` column
    #[serde(default = "default_id_in_feedback")]
    pub id_in_feedback: bool,
}

fn default_id_in_feedback() -> bool {
    true
}

impl Default for SampleLayout {
    fn default() -> Self {
        Self::interact()
    }
}

impl SampleLayout {
    /// Interact screen: `id` hidden, but every row still carries `id` feedback
    pub fn interact() -> Self {
        Self {
            kind: LayoutKind::Interact,
            id_in_feedback: true,
        }
    }

    /// Same layout with the `id` feedback requirement dropped
    pub fn without_id_feedback(self) -> Self {
        Self {
            id_in_feedback: false,
            ..self
        }
    }

    pub fn clean() -> Self {
        Self {
            kind: LayoutKind::Clean,
            id_in_feedback: false,
        }
    }

    pub fn hides_id(&self) -> bool {
        self.kind == LayoutKind::Interact
    }

    /// Columns shown in the grid, in header order
    pub fn display_columns<'h>(&self, header: &'h Header) -> Vec<&'h Column> {
        header
            .columns()
            .iter()
            .filter(|c| !(self.hides_id() && c.is_id()))
            .collect()
    }

    /// Columns every row must have a feedback record for
    pub fn feedback_columns(&self, header: &Header) -> Vec<Column> {
        let mut columns: Vec<Column> = if self.id_in_feedback {
            header.columns().to_vec()
        } else {
            self.display_columns(header).into_iter().cloned().collect()
        };
        if self.id_in_feedback && !header.contains_id() {
            columns.insert(0, Column::new(ID_COLUMN));
        }
        columns
    }
}

/// One undecoded sample row
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub key: String,
    pub cells: Map<String, Value>,
}

/// Raw sample in row order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSample {
    rows: Vec<RawRow>,
}

impl RawSample {
    /// Build from a decoded row map
    ///
    /// Rows are ordered the way a JavaScript object enumerates its keys:
    /// array-index keys ascending numerically, then the remaining keys.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let mut rows = Vec::with_capacity(map.len());
        for (key, value) in map {
            match value {
                Value::Object(cells) => rows.push(RawRow { key, cells }),
                other => {
                    return Err(Error::InvalidInput(format!(
                        "sample row {:?} is not an object: {}",
                        key, other
                    )))
                }
            }
        }
        rows.sort_by(|a, b| js_key_order(&a.key, &b.key));
        Ok(Self { rows })
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(Error::InvalidInput(format!(
                "sample is not an object: {}",
                other
            ))),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn array_index(key: &str) -> Option<u32> {
    if key == "0" {
        return Some(0);
    }
    if key.starts_with('0') || key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|n| *n != u32::MAX)
}

fn js_key_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (array_index(a), array_index(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Integer form of plain decimal text with no fractional value, exactly
fn exact_integral(text: &str) -> Option<String> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if !fraction.bytes().all(|b| b == b'0') {
        return None;
    }
    whole.parse::<i128>().ok().map(|v| v.to_string())
}

/// Replace integral number text with its integer form
///
/// Plain decimal integers are rewritten exactly; other finite numbers go
/// through `f64`. Anything that does not parse as a finite number is
/// returned unchanged.
pub fn collapse_integral(text: &str) -> String {
    if let Some(exact) = exact_integral(text) {
        return exact;
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v.ceil() == v => {
            if v == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", v)
            }
        }
        _ => text.to_string(),
    }
}

/// Normalize one raw cell value
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => collapse_integral(s),
        Value::Number(n) => collapse_integral(&n.to_string()),
        other => collapse_integral(&other.to_string()),
    }
}

fn verbatim_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One normalized row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    key: String,
    id: RowId,
    cells: BTreeMap<String, String>,
}

impl Row {
    /// Key of the row in the backend's sample object
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True backend identifier
    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Display value for a header column; absent cells read as `""`
    pub fn value(&self, column: &Column) -> &str {
        self.cells
            .get(column.label())
            .or_else(|| self.cells.get(column.key()))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn cells(&self) -> &BTreeMap<String, String> {
        &self.cells
    }
}

/// Normalized sample in backend row order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    rows: Vec<Row>,
}

impl Sample {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Textual form of the sample, re-readable by [`normalize`]
    pub fn to_raw(&self) -> RawSample {
        let rows = self
            .rows
            .iter()
            .map(|row| RawRow {
                key: row.key.clone(),
                cells: row
                    .cells
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            })
            .collect();
        RawSample { rows }
    }
}

/// Normalize a raw sample for the given layout
///
/// Fails only when a row has no usable identity (Interact layout row
/// without an `id` cell).
pub fn normalize(raw: &RawSample, layout: &SampleLayout) -> Result<Sample> {
    let mut rows = Vec::with_capacity(raw.len());
    for raw_row in raw.rows() {
        let mut cells = BTreeMap::new();
        for (column, value) in &raw_row.cells {
            let text = if layout.hides_id() && column == ID_COLUMN {
                verbatim_value(value)
            } else {
                normalize_value(value)
            };
            cells.insert(column.clone(), text);
        }

        let id = match layout.kind {
            LayoutKind::Interact => raw_row
                .cells
                .get(ID_COLUMN)
                .and_then(RowId::from_value)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("sample row {:?} has no id", raw_row.key))
                })?,
            LayoutKind::Clean => RowId::new(&raw_row.key),
        };

        rows.push(Row {
            key: raw_row.key.clone(),
            id,
            cells,
        });
    }
    Ok(Sample { rows })
}
