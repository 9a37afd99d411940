//! # Aggregation Pipeline
//!
//! A small, explicit aggregation pipeline: an ordered list of stages run one
//! after the other over the documents of a collection.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike};
use serde_json::{Map, Value};

use super::errors::StoreResult;
use super::filter::FilterSet;
use super::order::{compare_values, SortSpec};
use super::Document;

/// How documents are bucketed by a group stage
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// Single bucket for every document
    Null,

    /// Bucket by a field's value
    Field(String),

    /// Bucket by a string field, upper-cased
    Upper(String),

    /// Bucket by the month (1-12) of an RFC 3339 date field
    Month(String),
}

impl GroupKey {
    fn key_for(&self, doc: &Document) -> Value {
        match self {
            GroupKey::Null => Value::Null,
            GroupKey::Field(field) => doc.get(field).cloned().unwrap_or(Value::Null),
            GroupKey::Upper(field) => match doc.get(field) {
                Some(Value::String(s)) => Value::String(s.to_uppercase()),
                Some(other) => other.clone(),
                None => Value::Null,
            },
            GroupKey::Month(field) => doc
                .get(field)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|date| Value::from(date.month()))
                .unwrap_or(Value::Null),
        }
    }
}

/// Group accumulators
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Mean of numeric values
    Avg(String),
    /// Smallest value
    Min(String),
    /// Largest value
    Max(String),
    /// Sum of numeric values
    Sum(String),
    /// Number of documents
    Count,
    /// All values, in document order
    Push(String),
}

impl Accumulator {
    fn accumulate(&self, docs: &[&Document]) -> Value {
        match self {
            Accumulator::Avg(field) => {
                let values: Vec<f64> = numbers(docs, field).collect();
                if values.is_empty() {
                    Value::Null
                } else {
                    number_value(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            Accumulator::Sum(field) => number_value(numbers(docs, field).sum()),
            Accumulator::Count => Value::from(docs.len()),
            Accumulator::Min(field) => extreme(docs, field, Ordering::Less),
            Accumulator::Max(field) => extreme(docs, field, Ordering::Greater),
            Accumulator::Push(field) => Value::Array(
                docs.iter()
                    .filter_map(|doc| doc.get(field).cloned())
                    .collect(),
            ),
        }
    }
}

fn numbers<'a>(docs: &'a [&'a Document], field: &'a str) -> impl Iterator<Item = f64> + 'a {
    docs.iter()
        .filter_map(move |doc| doc.get(field).and_then(Value::as_f64))
}

fn extreme(docs: &[&Document], field: &str, wanted: Ordering) -> Value {
    docs.iter()
        .filter_map(|doc| doc.get(field))
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare_values(Some(v), Some(b)) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

/// Render a float as an integer JSON number when it has no fractional part
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// A group stage: bucket documents and compute accumulators per bucket.
/// Output documents carry the bucket key as `_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: GroupKey,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl Group {
    pub fn by(key: GroupKey) -> Self {
        Self {
            key,
            accumulators: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.into(), accumulator));
        self
    }

    fn run(&self, docs: Vec<Document>) -> Vec<Document> {
        // Buckets keep first-seen order
        let mut buckets: Vec<(Value, Vec<&Document>)> = Vec::new();
        for doc in &docs {
            let key = self.key.key_for(doc);
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(doc),
                None => buckets.push((key, vec![doc])),
            }
        }

        buckets
            .into_iter()
            .map(|(key, members)| {
                let mut out = Map::new();
                out.insert("_id".to_string(), key);
                for (name, acc) in &self.accumulators {
                    out.insert(name.clone(), acc.accumulate(&members));
                }
                out
            })
            .collect()
    }
}

/// Pipeline stages
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching a filter document
    Match(Document),

    /// One output document per element of an array field
    Unwind(String),

    /// Bucket and accumulate
    Group(Group),

    /// Copy `source` into a new field `name`
    AddField { name: String, source: String },

    /// Remove fields
    Unset(Vec<String>),

    /// Sort by a sort string (`-field` for descending)
    Sort(String),

    /// Keep at most this many documents
    Limit(usize),
}

/// An ordered list of stages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Insert a stage before every other stage
    pub fn prepend(&mut self, stage: Stage) {
        self.stages.insert(0, stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run the pipeline over a snapshot of documents
    pub fn run(&self, mut docs: Vec<Document>) -> StoreResult<Vec<Document>> {
        for stage in &self.stages {
            docs = match stage {
                Stage::Match(conditions) => {
                    let filter = FilterSet::from_document(conditions)?;
                    docs.into_iter().filter(|d| filter.matches(d)).collect()
                }
                Stage::Unwind(field) => unwind(docs, field),
                Stage::Group(group) => group.run(docs),
                Stage::AddField { name, source } => docs
                    .into_iter()
                    .map(|mut d| {
                        let value = d.get(source).cloned().unwrap_or(Value::Null);
                        d.insert(name.clone(), value);
                        d
                    })
                    .collect(),
                Stage::Unset(fields) => docs
                    .into_iter()
                    .map(|mut d| {
                        for field in fields {
                            d.remove(field);
                        }
                        d
                    })
                    .collect(),
                Stage::Sort(spec) => {
                    SortSpec::parse(spec)?.apply(&mut docs);
                    docs
                }
                Stage::Limit(n) => {
                    docs.truncate(*n);
                    docs
                }
            };
        }

        Ok(docs)
    }
}

fn unwind(docs: Vec<Document>, field: &str) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.get(field) {
            Some(Value::Array(items)) => {
                for item in items {
                    let mut copy = doc.clone();
                    copy.insert(field.to_string(), item.clone());
                    out.push(copy);
                }
            }
            // Missing, null and empty arrays produce nothing
            None | Some(Value::Null) => {}
            Some(_) => out.push(doc),
        }
    }
    out
}
