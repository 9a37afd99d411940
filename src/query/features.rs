//! # Query Features
//!
//! Turns the query string of a list request into a refined
//! [`RecordSelection`]: filter, sort, field selection and pagination, each
//! applied by its own chainable step.
//!
//! ```ignore
//! let tours = QueryFeatures::new(model.find(), &spec)
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .into_selection()
//!     .exec()
//!     .await?;
//! ```
//!
//! The steps may be called in any order, but `filter` should come before
//! `paginate` so skip/limit count filtered records.

use serde_json::Value;

use super::selection::RecordSelection;
use super::spec::{QuerySpec, QueryValue};
use crate::store::Document;

/// Parameters with their own meaning, never treated as filters
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Comparison operators accepted in bracket syntax; rewritten with a `$` prefix
pub const COMPARISON_OPERATORS: [&str; 4] = ["gte", "gt", "lte", "lt"];

/// Newest first when no sort is requested
pub const DEFAULT_SORT: &str = "-createdAt";

/// The version field is never exposed unless asked for
pub const DEFAULT_PROJECTION: &str = "-__v";

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;

/// Query-string driven refinements of a record selection
#[derive(Debug)]
pub struct QueryFeatures<'a> {
    query: RecordSelection,
    spec: &'a QuerySpec,
}

impl<'a> QueryFeatures<'a> {
    pub fn new(query: RecordSelection, spec: &'a QuerySpec) -> Self {
        Self { query, spec }
    }

    /// Apply every non-reserved parameter as a filter condition
    pub fn filter(mut self) -> Self {
        let conditions: Document = self
            .spec
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), to_condition(value)))
            .collect();

        tracing::trace!(conditions = ?conditions, "query filter");
        self.query = self.query.find(conditions);
        self
    }

    /// Sort by `sort=price,-ratingsAverage`, newest first by default
    pub fn sort(mut self) -> Self {
        let order = match non_empty(self.spec.text("sort")) {
            Some(sort) => comma_to_space(sort),
            None => DEFAULT_SORT.to_string(),
        };
        self.query = self.query.sort(&order);
        self
    }

    /// Restrict fields with `fields=name,price`, hiding `__v` by default
    pub fn limit_fields(mut self) -> Self {
        let fields = match non_empty(self.spec.text("fields")) {
            Some(fields) => comma_to_space(fields),
            None => DEFAULT_PROJECTION.to_string(),
        };
        self.query = self.query.select(&fields);
        self
    }

    /// Apply `page` and `limit`. Out-of-range pages simply come back empty.
    pub fn paginate(mut self) -> Self {
        let page = number_or(self.spec.text("page"), DEFAULT_PAGE);
        let limit = number_or(self.spec.text("limit"), DEFAULT_LIMIT);
        let skip = page.saturating_sub(1).saturating_mul(limit);

        self.query = self.query.skip(skip).limit(limit);
        self
    }

    pub fn selection(&self) -> &RecordSelection {
        &self.query
    }

    /// Hand the refined selection back for execution
    pub fn into_selection(self) -> RecordSelection {
        self.query
    }
}

fn to_condition(value: &QueryValue) -> Value {
    match value {
        QueryValue::Text(text) => Value::String(text.clone()),
        QueryValue::Nested(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| (rewrite_operator(key), to_condition(inner)))
                .collect(),
        ),
    }
}

fn rewrite_operator(key: &str) -> String {
    if COMPARISON_OPERATORS.contains(&key) {
        format!("${}", key)
    } else {
        key.to_string()
    }
}

/// A parameter with no list entries (`sort=`, `fields=,`) counts as absent
fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| s.split(',').any(|item| !item.trim().is_empty()))
}

fn comma_to_space(list: &str) -> String {
    list.split(',').collect::<Vec<_>>().join(" ")
}

/// Lenient numeric coercion: non-numeric input and zero fall back to the
/// default, fractions are truncated.
fn number_or(raw: Option<&str>, default: i64) -> i64 {
    let parsed = raw
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .map(|n| n.trunc() as i64);

    match parsed {
        Some(0) | None => default,
        Some(n) => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use serde_json::json;

    async fn selection() -> RecordSelection {
        let db = Database::in_memory().await.unwrap();
        RecordSelection::new(db.collection("tours").await.unwrap())
    }

    #[tokio::test]
    async fn test_filter_drops_reserved_keys() {
        let spec = QuerySpec::from_pairs([
            ("difficulty", "easy"),
            ("page", "2"),
            ("sort", "price"),
            ("limit", "10"),
            ("fields", "name"),
        ]);

        let features = QueryFeatures::new(selection().await, &spec).filter();
        let conditions = features.selection().conditions();

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions["difficulty"], json!("easy"));
    }

    #[tokio::test]
    async fn test_filter_rewrites_comparison_operators() {
        let spec = QuerySpec::from_pairs([
            ("price[gte]", "500"),
            ("duration[lt]", "10"),
            ("ratingsAverage[ne]", "4"),
        ]);

        let features = QueryFeatures::new(selection().await, &spec).filter();
        let conditions = features.selection().conditions();

        assert_eq!(conditions["price"], json!({"$gte": "500"}));
        assert_eq!(conditions["duration"], json!({"$lt": "10"}));
        assert_eq!(conditions["ratingsAverage"], json!({"ne": "4"}));
    }

    #[tokio::test]
    async fn test_sort_default_and_custom() {
        let empty = QuerySpec::new();
        let features = QueryFeatures::new(selection().await, &empty).sort();
        assert_eq!(features.selection().sort_order(), Some("-createdAt"));

        let spec = QuerySpec::from_pairs([("sort", "price,-ratingsAverage")]);
        let features = QueryFeatures::new(selection().await, &spec).sort();
        assert_eq!(features.selection().sort_order(), Some("price -ratingsAverage"));
    }

    #[tokio::test]
    async fn test_limit_fields_default_and_custom() {
        let empty = QuerySpec::new();
        let features = QueryFeatures::new(selection().await, &empty).limit_fields();
        assert_eq!(features.selection().projection(), Some("-__v"));

        let spec = QuerySpec::from_pairs([("fields", "name,duration,price")]);
        let features = QueryFeatures::new(selection().await, &spec).limit_fields();
        assert_eq!(features.selection().projection(), Some("name duration price"));
    }

    #[tokio::test]
    async fn test_paginate() {
        let spec = QuerySpec::from_pairs([("page", "3"), ("limit", "10")]);
        let features = QueryFeatures::new(selection().await, &spec).paginate();
        assert_eq!(features.selection().skip_count(), 20);
        assert_eq!(features.selection().limit_count(), Some(10));

        let empty = QuerySpec::new();
        let features = QueryFeatures::new(selection().await, &empty).paginate();
        assert_eq!(features.selection().skip_count(), 0);
        assert_eq!(features.selection().limit_count(), Some(100));
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(number_or(Some("7"), 1), 7);
        assert_eq!(number_or(Some(" 7 "), 1), 7);
        assert_eq!(number_or(Some("abc"), 1), 1);
        assert_eq!(number_or(Some("0"), 100), 100);
        assert_eq!(number_or(Some(""), 100), 100);
        assert_eq!(number_or(Some("2.9"), 1), 2);
        assert_eq!(number_or(Some("-3"), 1), -3);
        assert_eq!(number_or(None, 100), 100);
    }
}
