//! Scenario column header
//!
//! The backend sends column names that may carry embedded `\n`/`\r`
//! characters. The raw name is kept for display; the stripped name is the
//! join key used against feedback records and hypothesis assignments.

use serde::{Deserialize, Serialize};

/// Name of the identifier column carried by every sample row
pub const ID_COLUMN: &str = "id";

/// Remove line-break characters from a column name
pub fn strip_line_breaks(name: &str) -> String {
    name.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// One header column: display label plus stripped join key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    label: String,
    key: String,
}

impl Column {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let key = strip_line_breaks(&label);
        Self { label, key }
    }

    /// Name as sent by the backend
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Name with line breaks stripped
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_id(&self) -> bool {
        self.key == ID_COLUMN
    }
}

/// Ordered column header for one scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Header {
    columns: Vec<Column>,
}

impl Header {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: labels.into_iter().map(Column::new).collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Look up a column by label or by stripped key
    pub fn find(&self, name: &str) -> Option<&Column> {
        let key = strip_line_breaks(name);
        self.columns
            .iter()
            .find(|c| c.label == name)
            .or_else(|| self.columns.iter().find(|c| c.key == key))
    }

    /// Stripped keys in header order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.key.as_str())
    }

    pub fn contains_id(&self) -> bool {
        self.columns.iter().any(Column::is_id)
    }
}

impl From<Vec<String>> for Header {
    fn from(labels: Vec<String>) -> Self {
        Header::new(labels)
    }
}

impl From<Header> for Vec<String> {
    fn from(header: Header) -> Self {
        header.columns.into_iter().map(|c| c.label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_breaks() {
        assert_eq!(strip_line_breaks("owner\r\n"), "owner");
        assert_eq!(strip_line_breaks("ma\nnager"), "manager");
        assert_eq!(strip_line_breaks("plain"), "plain");
    }

    #[test]
    fn test_find_by_label_or_key() {
        let header = Header::new(["name", "type\n", "manager"]);
        assert_eq!(header.find("type\n").map(Column::key), Some("type"));
        assert_eq!(header.find("type").map(Column::label), Some("type\n"));
        assert!(header.find("owner").is_none());
    }

    #[test]
    fn test_header_json_round_trip_keeps_labels() {
        let header: Header = serde_json::from_str(r#"["a\r", "b"]"#).unwrap();
        assert_eq!(header.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        let text = serde_json::to_string(&header).unwrap();
        assert_eq!(text, r#"["a\r","b"]"#);
    }
}
