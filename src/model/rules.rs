//! # Validation Rules
//!
//! Declarative `(field, rule, message)` triples checked before every write.
//! A message may contain `{VALUE}`, replaced by the offending value.
//!
//! Every rule except `Required` passes when the field is absent or null.

use serde_json::Value;

use super::errors::FieldError;
use crate::store::Document;

/// Custom rule: receives the field value and the whole document
pub type CustomCheck = fn(&Value, &Document) -> bool;

/// What a rule checks
#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// Present, not null, not an empty string
    Required,
    /// String of at least this many characters
    MinLength(usize),
    /// String of at most this many characters
    MaxLength(usize),
    /// Number not below this value
    Min(f64),
    /// Number not above this value
    Max(f64),
    /// String from a fixed set
    OneOf(&'static [&'static str]),
    /// Arbitrary predicate
    Custom(CustomCheck),
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::MinLength(_) => "minlength",
            RuleKind::MaxLength(_) => "maxlength",
            RuleKind::Min(_) => "min",
            RuleKind::Max(_) => "max",
            RuleKind::OneOf(_) => "enum",
            RuleKind::Custom(_) => "user defined",
        }
    }
}

/// One validation rule
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub field: &'static str,
    pub kind: RuleKind,
    pub message: &'static str,
}

impl Rule {
    pub const fn new(field: &'static str, kind: RuleKind, message: &'static str) -> Self {
        Self {
            field,
            kind,
            message,
        }
    }

    /// Check the rule against a document
    pub fn check(&self, doc: &Document) -> Result<(), FieldError> {
        let value = doc.get(self.field);

        let passed = match (self.kind, value) {
            (RuleKind::Required, None | Some(Value::Null)) => false,
            (RuleKind::Required, Some(Value::String(s))) => !s.is_empty(),
            (RuleKind::Required, Some(_)) => true,
            (_, None | Some(Value::Null)) => true,
            (RuleKind::MinLength(n), Some(v)) => v.as_str().map_or(true, |s| s.chars().count() >= n),
            (RuleKind::MaxLength(n), Some(v)) => v.as_str().map_or(true, |s| s.chars().count() <= n),
            (RuleKind::Min(min), Some(v)) => v.as_f64().map_or(true, |n| n >= min),
            (RuleKind::Max(max), Some(v)) => v.as_f64().map_or(true, |n| n <= max),
            (RuleKind::OneOf(allowed), Some(v)) => v.as_str().is_some_and(|s| allowed.contains(&s)),
            (RuleKind::Custom(check), Some(v)) => check(v, doc),
        };

        if passed {
            Ok(())
        } else {
            Err(FieldError::new(
                self.field,
                self.kind.name(),
                self.render_message(value),
            ))
        }
    }

    fn render_message(&self, value: Option<&Value>) -> String {
        if !self.message.contains("{VALUE}") {
            return self.message.to_string();
        }
        let shown = match value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "undefined".to_string(),
        };
        self.message.replace("{VALUE}", &shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required() {
        let rule = Rule::new("name", RuleKind::Required, "A tour must have a name!");
        assert!(rule.check(&doc(json!({"name": "x"}))).is_ok());
        assert!(rule.check(&doc(json!({}))).is_err());
        assert!(rule.check(&doc(json!({"name": null}))).is_err());
        assert!(rule.check(&doc(json!({"name": ""}))).is_err());
    }

    #[test]
    fn test_optional_rules_skip_missing() {
        let rule = Rule::new("rating", RuleKind::Min(1.0), "Rating must be above 1.0!");
        assert!(rule.check(&doc(json!({}))).is_ok());
        assert!(rule.check(&doc(json!({"rating": 1}))).is_ok());

        let err = rule.check(&doc(json!({"rating": 0.5}))).unwrap_err();
        assert_eq!(err.rule, "min");
        assert_eq!(err.message, "Rating must be above 1.0!");
    }

    #[test]
    fn test_lengths_count_characters() {
        let rule = Rule::new("name", RuleKind::MaxLength(5), "too long");
        assert!(rule.check(&doc(json!({"name": "ééééé"}))).is_ok());
        assert!(rule.check(&doc(json!({"name": "ékéééé"}))).is_err());
    }

    #[test]
    fn test_one_of() {
        let rule = Rule::new("difficulty", RuleKind::OneOf(&["easy", "medium"]), "bad");
        assert!(rule.check(&doc(json!({"difficulty": "easy"}))).is_ok());
        assert!(rule.check(&doc(json!({"difficulty": "hard"}))).is_err());
    }

    #[test]
    fn test_custom_with_value_in_message() {
        fn below_price(value: &Value, doc: &Document) -> bool {
            match (value.as_f64(), doc.get("price").and_then(Value::as_f64)) {
                (Some(discount), Some(price)) => discount < price,
                _ => false,
            }
        }

        let rule = Rule::new(
            "priceDiscount",
            RuleKind::Custom(below_price),
            "Discount price ({VALUE}) should be below regular price!",
        );

        assert!(rule.check(&doc(json!({"price": 100, "priceDiscount": 50}))).is_ok());
        let err = rule
            .check(&doc(json!({"price": 100, "priceDiscount": 150})))
            .unwrap_err();
        assert_eq!(err.message, "Discount price (150) should be below regular price!");
    }
}
