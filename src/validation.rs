// 📐 Record Validation - Apply field rules to raw records
// Invalid optional field → null. Invalid required field → whole record discarded.

use crate::error::ConfigError;
use crate::record::{Record, Value};
use crate::rules::{FieldType, Rule, RuleSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// FIELD FAILURE
// ============================================================================

/// Why one field did not pass. Local to the validator: it either nulls the
/// field or becomes the discard reason, and is never raised.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFailure {
    Missing,
    Coercion {
        expected: FieldType,
        found: &'static str,
    },
    Pattern {
        pattern: String,
    },
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldFailure::Missing => write!(f, "value is missing"),
            FieldFailure::Coercion { expected, found } => {
                write!(f, "cannot coerce {} to {}", found, expected.name())
            }
            FieldFailure::Pattern { pattern } => write!(f, "does not match {}", pattern),
        }
    }
}

// ============================================================================
// COERCION
// ============================================================================

/// Coerce `value` to `target`, or `None` if there is no reading of it.
///
/// Values already of the target type come back unchanged. Null never coerces.
/// Floats truncate toward zero when read as `Int`.
pub fn coerce(value: &Value, target: FieldType) -> Option<Value> {
    match (target, value) {
        (_, Value::Null) => None,

        (FieldType::String, Value::String(_)) => Some(value.clone()),
        (FieldType::String, other) => Some(Value::String(other.to_key_string())),

        (FieldType::Int, Value::Int(_)) => Some(value.clone()),
        (FieldType::Int, Value::Float(f)) => {
            let in_range = *f >= i64::MIN as f64 && *f < i64::MAX as f64;
            (f.is_finite() && in_range).then(|| Value::Int(f.trunc() as i64))
        }
        (FieldType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Int),
        (FieldType::Int, Value::Bool(b)) => Some(Value::Int(i64::from(*b))),

        (FieldType::Float, Value::Float(_)) => Some(value.clone()),
        (FieldType::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float),
        (FieldType::Float, Value::Bool(b)) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),

        (FieldType::Bool, Value::Bool(_)) => Some(value.clone()),
        (FieldType::Bool, Value::Int(0)) => Some(Value::Bool(false)),
        (FieldType::Bool, Value::Int(1)) => Some(Value::Bool(true)),
        (FieldType::Bool, Value::Int(_) | Value::Float(_)) => None,
        (FieldType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
    }
}

/// Check one value against one rule; returns the (possibly coerced) value
pub fn check_field(value: &Value, rule: &Rule) -> Result<Value, FieldFailure> {
    if value.is_null() {
        return Err(FieldFailure::Missing);
    }

    let value = match rule.field_type {
        Some(target) => coerce(value, target).ok_or(FieldFailure::Coercion {
            expected: target,
            found: value.kind(),
        })?,
        None => value.clone(),
    };

    if let (Some(pattern), Some(text)) = (&rule.pattern, value.as_str()) {
        if !rule.matches_pattern(text) {
            return Err(FieldFailure::Pattern {
                pattern: pattern.as_str().to_string(),
            });
        }
    }

    Ok(value)
}

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Cleaned copy of the input
    Valid(Record),

    /// A required field failed
    Discarded { field: String, reason: FieldFailure },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Validation::Valid(record) => Some(record),
            Validation::Discarded { .. } => None,
        }
    }
}

/// Outcome of validating a batch
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Retained records, in input order
    pub records: Vec<Record>,
    pub received: usize,
    pub discarded: usize,
}

impl ValidationReport {
    pub fn valid(&self) -> usize {
        self.records.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "received: {} | discarded: {} | valid: {}",
            self.received,
            self.discarded,
            self.valid()
        )
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct Validator {
    rules: RuleSet,
}

impl Validator {
    pub fn new(rules: RuleSet) -> Self {
        Validator { rules }
    }

    /// Validate one record. Independent of every other record in the batch.
    pub fn validate(&self, record: &Record) -> Validation {
        let mut cleaned = record.clone();

        for (field, rule) in self.rules.iter() {
            match check_field(record.get(field), rule) {
                Ok(value) => cleaned.set(field, value),
                Err(reason) if rule.required => {
                    return Validation::Discarded {
                        field: field.to_string(),
                        reason,
                    };
                }
                Err(_) => cleaned.set(field, Value::Null),
            }
        }

        Validation::Valid(cleaned)
    }

    pub fn validate_batch(&self, records: &[Record]) -> ValidationReport {
        let mut report = ValidationReport {
            received: records.len(),
            ..Default::default()
        };

        for (index, record) in records.iter().enumerate() {
            match self.validate(record) {
                Validation::Valid(cleaned) => report.records.push(cleaned),
                Validation::Discarded { field, reason } => {
                    debug!(index, field = %field, %reason, "record discarded");
                    report.discarded += 1;
                }
            }
        }

        info!(
            received = report.received,
            discarded = report.discarded,
            valid = report.valid(),
            "validation finished"
        );
        report
    }
}

/// Load rules from `rules_path` and validate the batch.
///
/// A rules failure aborts before any record is looked at.
pub fn run_validation(records: &[Record], rules_path: &Path) -> Result<ValidationReport, ConfigError> {
    let rules = RuleSet::from_file(rules_path)?;
    Ok(Validator::new(rules).validate_batch(records))
}

// ============================================================================
// TESTS
// ============================================================================
