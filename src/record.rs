// 📄 Record Model - Scalar values and regulation records
// Named identity fields + an open map for everything the rules don't know about

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

// ============================================================================
// SCALAR VALUE
// ============================================================================

/// Untyped scalar as produced by extraction.
///
/// Date-like values travel as `String`. Arrays and objects are not scalars and
/// fail to deserialize.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in log lines and failure reasons
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// String form used for identity comparison. Null becomes "".
    /// Integral floats keep their decimal point ("2024.0").
    pub fn to_key_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{:?}", f),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_key_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

static NULL: Value = Value::Null;

// ============================================================================
// RECORD
// ============================================================================

/// Fields every upstream record carries (possibly null). Identity and entity
/// scoping are computed from these.
pub const NAMED_FIELDS: [&str; 4] = ["title", "created_at", "entity", "external_link"];

/// One regulation record.
///
/// The four named fields are always present (`Null` when unknown); every other
/// field lands in `extra` and passes through validation untouched unless a rule
/// names it. Serializes as one flat object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub title: Value,

    #[serde(default)]
    pub created_at: Value,

    #[serde(default)]
    pub entity: Value,

    #[serde(default)]
    pub external_link: Value,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from (name, value) pairs
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut record = Record::new();
        for (name, value) in fields {
            record.set(name, value);
        }
        record
    }

    /// Builder: set one field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value.into());
        self
    }

    /// Field value by name; absent fields read as `Null`
    pub fn get(&self, name: &str) -> &Value {
        match name {
            "title" => &self.title,
            "created_at" => &self.created_at,
            "entity" => &self.entity,
            "external_link" => &self.external_link,
            other => self.extra.get(other).unwrap_or(&NULL),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match name.as_str() {
            "title" => self.title = value,
            "created_at" => self.created_at = value,
            "entity" => self.entity = value,
            "external_link" => self.external_link = value,
            _ => {
                self.extra.insert(name, value);
            }
        }
    }

    /// Named fields first, then extension fields in key order
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        NAMED_FIELDS
            .iter()
            .copied()
            .chain(self.extra.keys().map(String::as_str))
    }

    /// Does this record belong to `entity`?
    pub fn belongs_to(&self, entity: &str) -> bool {
        self.entity.as_str() == Some(entity)
    }
}

// ============================================================================
// BATCH FILES
// ============================================================================

/// Load a raw batch. `.csv` files are read as CSV, anything else as a JSON array.
pub fn load_records(path: &Path) -> Result<Vec<Record>, LoadError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        load_csv(path)?
    } else {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        records_from_json(&content)?
    };

    info!(path = %path.display(), count = records.len(), "loaded record batch");
    Ok(records)
}

pub fn records_from_json(content: &str) -> Result<Vec<Record>, LoadError> {
    Ok(serde_json::from_str(content)?)
}

/// CSV cells are all strings; empty cells become `Null`.
pub fn load_csv(path: &Path) -> Result<Vec<Record>, LoadError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let record = Record::from_fields(headers.iter().zip(row.iter()).map(|(name, cell)| {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            (name, value)
        }));
        records.push(record);
    }

    Ok(records)
}

/// Write a batch as a pretty JSON array (stage hand-off format)
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), LoadError> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).map_err(|source| LoadError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_record_splits_named_and_extra_fields() {
        let json = r#"[{
            "title": "Decreto 123",
            "created_at": "2024-01-01",
            "entity": "ANI",
            "rtype_id": 14,
            "is_active": true,
            "summary": null
        }]"#;

        let records = records_from_json(json).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.title, Value::from("Decreto 123"));
        assert_eq!(record.external_link, Value::Null, "absent named field reads as null");
        assert_eq!(record.get("rtype_id"), &Value::Int(14));
        assert_eq!(record.get("is_active"), &Value::Bool(true));
        assert_eq!(record.get("summary"), &Value::Null);
        assert_eq!(record.get("never_seen"), &Value::Null);
    }

    #[test]
    fn test_json_rejects_nested_values() {
        let json = r#"[{"title": "x", "tags": ["a", "b"]}]"#;
        assert!(matches!(records_from_json(json), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = Record::new()
            .with("title", "Resolución 9")
            .with("gtype", "link");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title"], "Resolución 9");
        assert_eq!(json["gtype"], "link");
        assert!(json["external_link"].is_null());
    }

    #[test]
    fn test_field_names_order() {
        let record = Record::new().with("zeta", 1i64).with("alpha", 2i64);
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(
            names,
            vec!["title", "created_at", "entity", "external_link", "alpha", "zeta"]
        );
    }

    #[test]
    fn test_key_string_forms() {
        assert_eq!(Value::Null.to_key_string(), "");
        assert_eq!(Value::Int(2024).to_key_string(), "2024");
        assert_eq!(Value::Bool(false).to_key_string(), "false");
        assert_eq!(Value::Float(2024.0).to_key_string(), "2024.0");
        assert_eq!(Value::Float(0.25).to_key_string(), "0.25");
        assert_eq!(Value::from("  x ").to_key_string(), "  x ");
    }

    #[test]
    fn test_load_csv_empty_cells_are_null() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "title,created_at,external_link,rtype_id").unwrap();
        writeln!(file, "Decreto 1,2024-01-01,,14").unwrap();
        file.flush().unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_link, Value::Null);
        assert_eq!(records[0].get("rtype_id"), &Value::from("14"));
    }

    #[test]
    fn test_write_then_load_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validated.json");
        let records = vec![Record::new().with("title", "A").with("rtype_id", 15i64)];

        write_records(&path, &records).unwrap();
        let loaded = load_records(&path).unwrap();

        assert_eq!(loaded, records);
    }
}
