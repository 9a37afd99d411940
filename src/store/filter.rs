//! # Filter Expressions
//!
//! Compiles filter documents (`{"price": {"$gte": "500"}, "difficulty": "easy"}`)
//! into a list of expressions combined with AND logic, and evaluates them
//! against stored documents.

use std::cmp::Ordering;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::order::compare_coerced;
use super::Document;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equals
    Eq,

    /// Not equals (also matches documents without the field)
    Ne,

    /// Greater than
    Gt,

    /// Greater than or equal
    Gte,

    /// Less than
    Lt,

    /// Less than or equal
    Lte,

    /// Value in list
    In,

    /// Value not in list
    Nin,
}

impl FilterOperator {
    /// Look up an operator by its `$`-prefixed name
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "$eq" => FilterOperator::Eq,
            "$ne" => FilterOperator::Ne,
            "$gt" => FilterOperator::Gt,
            "$gte" => FilterOperator::Gte,
            "$lt" => FilterOperator::Lt,
            "$lte" => FilterOperator::Lte,
            "$in" => FilterOperator::In,
            "$nin" => FilterOperator::Nin,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "$eq",
            FilterOperator::Ne => "$ne",
            FilterOperator::Gt => "$gt",
            FilterOperator::Gte => "$gte",
            FilterOperator::Lt => "$lt",
            FilterOperator::Lte => "$lte",
            FilterOperator::In => "$in",
            FilterOperator::Nin => "$nin",
        }
    }
}

/// A filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Check if a document matches this filter.
    ///
    /// Array fields match when any element matches, except for equality
    /// against a whole array.
    pub fn matches(&self, doc: &Document) -> bool {
        let stored = doc.get(&self.field);

        match self.operator {
            FilterOperator::Eq => equals(stored, &self.value),
            FilterOperator::Ne => !equals(stored, &self.value),
            FilterOperator::In => in_list(stored, &self.value),
            FilterOperator::Nin => !in_list(stored, &self.value),
            FilterOperator::Gt => compares(stored, &self.value, |o| o == Ordering::Greater),
            FilterOperator::Gte => compares(stored, &self.value, |o| o != Ordering::Less),
            FilterOperator::Lt => compares(stored, &self.value, |o| o == Ordering::Less),
            FilterOperator::Lte => compares(stored, &self.value, |o| o != Ordering::Greater),
        }
    }
}

fn scalar_equals(stored: &Value, operand: &Value) -> bool {
    compare_coerced(stored, operand) == Some(Ordering::Equal)
}

fn equals(stored: Option<&Value>, operand: &Value) -> bool {
    match stored {
        None => operand.is_null(),
        Some(Value::Array(items)) if !operand.is_array() => {
            items.iter().any(|item| scalar_equals(item, operand))
        }
        Some(stored) => scalar_equals(stored, operand),
    }
}

fn in_list(stored: Option<&Value>, operand: &Value) -> bool {
    match operand {
        Value::Array(candidates) => candidates.iter().any(|c| equals(stored, c)),
        other => equals(stored, other),
    }
}

fn compares(stored: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match stored {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare_coerced(item, operand).is_some_and(&accept)),
        Some(stored) => compare_coerced(stored, operand).is_some_and(accept),
    }
}

/// A set of filters combined with AND logic
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub filters: Vec<FilterExpr>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    /// Compile a filter document.
    ///
    /// A field whose value is an object with at least one `$` key is an
    /// operator document, and every key in it must be a known operator, so
    /// `{"$gte": 1, "max": 2}` is rejected. Any other value (objects without
    /// `$` keys included) is matched by equality.
    pub fn from_document(conditions: &Document) -> StoreResult<Self> {
        let mut set = Self::new();

        for (field, condition) in conditions {
            if field.starts_with('$') {
                return Err(StoreError::invalid_query(format!(
                    "unknown top level operator: {}",
                    field
                )));
            }

            match condition {
                Value::Object(ops) if is_operator_document(ops) => {
                    for (key, value) in ops {
                        let operator = FilterOperator::from_key(key).ok_or_else(|| {
                            StoreError::invalid_query(format!("unknown operator: {}", key))
                        })?;
                        set.filters.push(FilterExpr::new(field, operator, value.clone()));
                    }
                }
                other => set
                    .filters
                    .push(FilterExpr::new(field, FilterOperator::Eq, other.clone())),
            }
        }

        Ok(set)
    }

    /// Check if a document matches all filters
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

fn is_operator_document(ops: &Document) -> bool {
    !ops.is_empty() && ops.keys().any(|k| k.starts_with('$'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_eq_filter() {
        let filter = FilterExpr::new("difficulty", FilterOperator::Eq, json!("easy"));

        assert!(filter.matches(&doc(json!({"difficulty": "easy"}))));
        assert!(!filter.matches(&doc(json!({"difficulty": "medium"}))));
        assert!(!filter.matches(&doc(json!({}))));
    }

    #[test]
    fn test_text_operand_is_cast_to_number() {
        let filter = FilterExpr::new("duration", FilterOperator::Eq, json!("5"));
        assert!(filter.matches(&doc(json!({"duration": 5}))));

        let gte = FilterExpr::new("price", FilterOperator::Gte, json!("500"));
        assert!(gte.matches(&doc(json!({"price": 500}))));
        assert!(gte.matches(&doc(json!({"price": 997}))));
        assert!(!gte.matches(&doc(json!({"price": 497}))));
    }

    #[test]
    fn test_ne_matches_missing_field() {
        let filter = FilterExpr::new("secretTour", FilterOperator::Ne, json!(true));

        assert!(filter.matches(&doc(json!({"name": "a"}))));
        assert!(filter.matches(&doc(json!({"secretTour": false}))));
        assert!(!filter.matches(&doc(json!({"secretTour": true}))));
    }

    #[test]
    fn test_array_field_matches_any_element() {
        let filter = FilterExpr::new("images", FilterOperator::Eq, json!("tour-1-1.jpg"));
        assert!(filter.matches(&doc(json!({"images": ["tour-1-1.jpg", "tour-1-2.jpg"]}))));
        assert!(!filter.matches(&doc(json!({"images": ["tour-2-1.jpg"]}))));
    }

    #[test]
    fn test_in_filter() {
        let filter = FilterExpr::new("difficulty", FilterOperator::In, json!(["easy", "medium"]));

        assert!(filter.matches(&doc(json!({"difficulty": "easy"}))));
        assert!(!filter.matches(&doc(json!({"difficulty": "difficult"}))));
    }

    #[test]
    fn test_from_document() {
        let conditions = doc(json!({
            "difficulty": "easy",
            "price": {"$gte": "400", "$lt": "1000"}
        }));
        let set = FilterSet::from_document(&conditions).unwrap();
        assert_eq!(set.filters.len(), 3);

        assert!(set.matches(&doc(json!({"difficulty": "easy", "price": 400}))));
        assert!(!set.matches(&doc(json!({"difficulty": "easy", "price": 1000}))));
        assert!(!set.matches(&doc(json!({"difficulty": "medium", "price": 500}))));
    }

    #[test]
    fn test_plain_nested_object_is_equality() {
        let conditions = doc(json!({"price": {"ne": "5"}}));
        let set = FilterSet::from_document(&conditions).unwrap();
        assert_eq!(set.filters[0].operator, FilterOperator::Eq);
        assert!(!set.matches(&doc(json!({"price": 5}))));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let conditions = doc(json!({"price": {"$near": "5"}}));
        assert!(matches!(
            FilterSet::from_document(&conditions),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_mixed_operator_document_rejected() {
        let conditions = doc(json!({"price": {"$gte": 1, "max": 2}}));
        let err = FilterSet::from_document(&conditions).unwrap_err();
        assert!(err.to_string().contains("unknown operator: max"));
    }
}
