//! # Value Ordering
//!
//! Comparison rules shared by filters, sorting and aggregation.
//!
//! Sorting needs a total order across mixed types, so values are ranked by
//! type first: missing/null < number < string < object < array < boolean.
//! Filters instead need *coerced* comparison: query strings arrive as text,
//! so a string operand is cast to the stored value's type before comparing.

use std::cmp::Ordering;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::Document;

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    let a = a.as_f64().unwrap_or(0.0);
    let b = b.as_f64().unwrap_or(0.0);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Total order over optional JSON values, used for sorting.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => compare_numbers(a, b),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let cmp = compare_values(Some(x), Some(y));
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            a.len().cmp(&b.len())
        }
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                let cmp = ka.cmp(kb).then_with(|| compare_values(Some(va), Some(vb)));
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => Ordering::Equal,
    }
}

/// Compare a stored value with a filter operand, casting a text operand to the
/// stored value's type. Returns `None` when the two cannot be compared.
pub fn compare_coerced(stored: &Value, operand: &Value) -> Option<Ordering> {
    match (stored, operand) {
        (Value::Number(a), Value::Number(b)) => Some(compare_numbers(a, b)),
        (Value::Number(a), Value::String(b)) => {
            let b = b.trim().parse::<f64>().ok()?;
            a.as_f64()?.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::String(b)) => match b.as_str() {
            "true" => Some(a.cmp(&true)),
            "false" => Some(a.cmp(&false)),
            _ => None,
        },
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

/// Parsed sort order, most significant key first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

impl SortSpec {
    /// Parse a space-separated sort string such as `price -ratingsAverage`.
    pub fn parse(spec: &str) -> StoreResult<Self> {
        let mut keys = Vec::new();

        for token in spec.split_whitespace() {
            let (field, ascending) = match token.strip_prefix('-') {
                Some(field) => (field, false),
                None => (token.strip_prefix('+').unwrap_or(token), true),
            };

            if field.is_empty() {
                return Err(StoreError::invalid_query(format!(
                    "Invalid sort key: {}",
                    token
                )));
            }

            keys.push(SortKey {
                field: field.to_string(),
                ascending,
            });
        }

        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compare two documents by every key in turn
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.keys {
            let cmp = compare_values(a.get(&key.field), b.get(&key.field));
            let cmp = if key.ascending { cmp } else { cmp.reverse() };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }

    /// Stable sort of a document list
    pub fn apply(&self, docs: &mut [Document]) {
        if !self.is_empty() {
            docs.sort_by(|a, b| self.compare(a, b));
        }
    }
}
