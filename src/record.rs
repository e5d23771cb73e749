// 📄 Raw Records - one spreadsheet row each
// Loosely typed on purpose: column presence is checked, never assumed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column holding the date the patient was seen.
pub const DATE_SEEN: &str = "Date seen";

/// Form submission timestamp column. Interchangeable with `DATE_SEEN`.
pub const TIMESTAMP: &str = "Timestamp";

/// Header used for the computed fee in the display table.
pub const FEE_COLUMN: &str = "Fee";

// ============================================================================
// RAW RECORD
// ============================================================================

/// RawRecord - one row as delivered by the record source
///
/// Field access never panics: a missing column reads as absent (`get`) or
/// empty (`get_or_empty`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Position in the source (1-based, header excluded)
    pub row: usize,

    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new(row: usize) -> Self {
        RawRecord {
            row,
            fields: HashMap::new(),
        }
    }

    /// Build a record from (column, value) pairs.
    pub fn from_pairs<K, V, I>(row: usize, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        RawRecord {
            row,
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder pattern: set a field
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: &str) {
        self.fields.insert(column.to_string(), value.to_string());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn get_or_empty(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn has(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Values in the order of `headers`, empty for absent columns.
    pub fn values_in<'a>(&'a self, headers: &[String]) -> Vec<&'a str> {
        headers.iter().map(|h| self.get_or_empty(h)).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// RecordSnapshot - the full row set returned by one fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Column names in source order
    pub headers: Vec<String>,

    /// Rows in source order
    pub records: Vec<RawRecord>,
}

impl RecordSnapshot {
    pub fn new(headers: Vec<String>, records: Vec<RawRecord>) -> Self {
        RecordSnapshot { headers, records }
    }

    /// Snapshot whose headers are the union of the records' columns,
    /// sorted so output is deterministic.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut headers: Vec<String> = records
            .iter()
            .flat_map(|r| r.fields.keys().cloned())
            .collect();
        headers.sort();
        headers.dedup();
        RecordSnapshot { headers, records }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ============================================================================
// COLUMN MAP
// ============================================================================

/// Which source columns carry which meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub name: String,
    pub encounter_type: String,
    /// Column driving period assignment (`DATE_SEEN` or `TIMESTAMP`)
    pub date: String,
    pub finalized: String,
}

impl ColumnMap {
    /// Default column names with a different date column.
    pub fn with_date_field(date_field: &str) -> Self {
        ColumnMap {
            date: date_field.to_string(),
            ..ColumnMap::default()
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            name: "name".to_string(),
            encounter_type: "Type of encounter".to_string(),
            date: DATE_SEEN.to_string(),
            finalized: "finalized report ?".to_string(),
        }
    }
}
