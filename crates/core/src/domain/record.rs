use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One scalar spreadsheet cell as it arrives from ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text cells holding a plain number (optionally
    /// with a decimal comma) are accepted too, since uploads mix both.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .or_else(|| trimmed.replace(',', ".").parse::<f64>().ok())
                    .filter(|value| value.is_finite())
            }
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Display text used for substring matching. `None` for null cells.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A row from an uploaded sheet: ordered header -> cell mapping.
///
/// The header set is whatever the upload carried. Nothing here assumes a
/// fixed schema; lookups return `Option` and callers decide how to degrade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LooseRecord {
    pub row_index: usize,
    pub fields: IndexMap<String, CellValue>,
}

impl LooseRecord {
    pub fn new(row_index: usize) -> Self {
        Self { row_index, fields: IndexMap::new() }
    }

    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.get(column)
    }

    /// Non-blank display text of a column.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).filter(|value| !value.is_blank()).and_then(CellValue::display_text)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(CellValue::as_number)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// All rows of a single upload. Batches are kept apart so a newer upload never
/// silently replaces an older one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBatch {
    pub batch_id: String,
    pub records: Vec<LooseRecord>,
}

impl RecordBatch {
    pub fn new(batch_id: impl Into<String>, records: Vec<LooseRecord>) -> Self {
        Self { batch_id: batch_id.into(), records }
    }
}
