//! # Schema
//!
//! Field declarations for a model: kinds, trimming and defaults, plus the
//! rule table and virtual fields. Casting is strict about shape: undeclared
//! input fields are dropped and values that cannot be cast to the declared
//! kind are reported as validation errors.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use super::errors::{FieldError, ValidationErrors};
use super::rules::Rule;
use crate::store::pipeline::number_value;
use crate::store::{Document, ID_FIELD};

/// Version field maintained by the model
pub const VERSION_FIELD: &str = "__v";

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// Stored as an RFC 3339 UTC string with milliseconds
    Date,
    StringArray,
    DateArray,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "Number",
            FieldKind::Boolean => "Boolean",
            FieldKind::Date => "Date",
            FieldKind::StringArray => "[string]",
            FieldKind::DateArray => "[Date]",
        }
    }
}

/// Produces a default value when a field is absent on creation
pub type DefaultFn = fn() -> Value;

/// One declared field
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub trim: bool,
    pub default: Option<DefaultFn>,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            trim: false,
            default: None,
        }
    }

    pub const fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    pub const fn with_default(mut self, default: DefaultFn) -> Self {
        self.default = Some(default);
        self
    }

    /// Cast an input value to this field's kind
    pub fn cast(&self, value: &Value) -> Result<Value, FieldError> {
        let cast = match self.kind {
            FieldKind::String => cast_string(value, self.trim),
            FieldKind::Number => cast_number(value),
            FieldKind::Boolean => cast_boolean(value),
            FieldKind::Date => cast_date(value),
            FieldKind::StringArray => cast_array(value, |v| cast_string(v, self.trim)),
            FieldKind::DateArray => cast_array(value, cast_date),
        };

        cast.ok_or_else(|| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            FieldError::new(
                self.name,
                "cast",
                format!(
                    "Cast to {} failed for value \"{}\" at path \"{}\"",
                    self.kind.name(),
                    shown,
                    self.name
                ),
            )
        })
    }
}

fn cast_string(value: &Value, trim: bool) -> Option<Value> {
    let text = match value {
        Value::Null => return Some(Value::Null),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => return None,
    };
    Some(Value::String(if trim { text.trim().to_string() } else { text }))
}

fn cast_number(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Number(_) => Some(value.clone()),
        Value::String(s) if s.trim().is_empty() => Some(Value::Null),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(number_value),
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn cast_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(Value::Bool(true)),
            Some(x) if x == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn cast_date(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::String(s) => parse_date(s).map(|d| Value::String(format_date(&d))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|d| Value::String(format_date(&d))),
        _ => None,
    }
}

fn cast_array(value: &Value, cast: impl Fn(&Value) -> Option<Value>) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Array(items) => items.iter().map(cast).collect::<Option<Vec<_>>>().map(Value::Array),
        scalar => cast(scalar).map(|v| Value::Array(vec![v])),
    }
}

/// Parse the date forms accepted on input
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d,%H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical stored form of a date; sorts lexically in time order
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Field computed on output, never stored
#[derive(Debug, Clone, Copy)]
pub struct VirtualField {
    pub name: &'static str,
    pub compute: fn(&Document) -> Option<Value>,
}

/// Whether defaults are applied while casting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastMode {
    /// New document: `_id` may be supplied, defaults are filled in
    Create,
    /// Partial update: only supplied fields, `_id` is ignored
    Update,
}

/// A model's declared shape and rules
#[derive(Debug, Clone)]
pub struct Schema {
    pub model: &'static str,
    pub fields: Vec<FieldDef>,
    pub rules: Vec<Rule>,
    pub unique: Vec<&'static str>,
    pub virtuals: Vec<VirtualField>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Cast raw input into a document of declared fields
    pub fn cast(&self, input: &Value, mode: CastMode) -> Result<Document, ValidationErrors> {
        let mut errors = ValidationErrors::new(self.model);

        let Some(input) = input.as_object() else {
            errors.push(FieldError::new("$root", "cast", "Expected a JSON object"));
            return Err(errors);
        };

        let mut doc = Document::new();
        for (key, value) in input {
            if key == ID_FIELD {
                if mode == CastMode::Create {
                    doc.insert(key.clone(), value.clone());
                }
                continue;
            }

            match self.field(key) {
                Some(def) => match def.cast(value) {
                    Ok(cast) => {
                        doc.insert(key.clone(), cast);
                    }
                    Err(e) => errors.push(e),
                },
                None => tracing::trace!(model = self.model, field = %key, "dropping undeclared field"),
            }
        }

        if mode == CastMode::Create {
            for def in &self.fields {
                if let (Some(default), false) = (def.default, doc.contains_key(def.name)) {
                    doc.insert(def.name.to_string(), default());
                }
            }
        }

        errors.into_result().map(|()| doc)
    }

    /// Run the rule table. With `paths`, only rules on those fields run.
    pub fn validate(&self, doc: &Document, paths: Option<&[String]>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new(self.model);

        for rule in &self.rules {
            if let Some(paths) = paths {
                if !paths.iter().any(|p| p == rule.field) {
                    continue;
                }
            }
            if let Err(e) = rule.check(doc) {
                errors.push(e);
            }
        }

        errors.into_result()
    }

    /// Add virtual fields for output
    pub fn apply_virtuals(&self, doc: &mut Document) {
        for virtual_field in &self.virtuals {
            if let Some(value) = (virtual_field.compute)(doc) {
                doc.insert(virtual_field.name.to_string(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rules::RuleKind;
    use serde_json::json;

    fn schema() -> Schema {
        Schema {
            model: "Item",
            fields: vec![
                FieldDef::new("name", FieldKind::String).trimmed(),
                FieldDef::new("price", FieldKind::Number),
                FieldDef::new("hidden", FieldKind::Boolean).with_default(|| json!(false)),
                FieldDef::new("startDates", FieldKind::DateArray),
            ],
            rules: vec![
                Rule::new("name", RuleKind::Required, "name required"),
                Rule::new("price", RuleKind::Min(0.0), "price negative"),
            ],
            unique: vec!["name"],
            virtuals: vec![VirtualField {
                name: "double",
                compute: |doc| doc.get("price").and_then(Value::as_f64).map(|p| number_value(p * 2.0)),
            }],
        }
    }

    #[test]
    fn test_cast_create() {
        let doc = schema()
            .cast(
                &json!({"name": "  Box  ", "price": "12", "color": "red", "startDates": ["2021-06-19,10:00"]}),
                CastMode::Create,
            )
            .unwrap();

        assert_eq!(doc["name"], json!("Box"));
        assert_eq!(doc["price"], json!(12));
        assert_eq!(doc["hidden"], json!(false));
        assert_eq!(doc["startDates"], json!(["2021-06-19T10:00:00.000Z"]));
        assert!(doc.get("color").is_none());
    }

    #[test]
    fn test_cast_update_skips_defaults_and_id() {
        let doc = schema()
            .cast(&json!({"price": 3, "_id": "x"}), CastMode::Update)
            .unwrap();
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_cast_errors() {
        let err = schema()
            .cast(&json!({"price": "cheap"}), CastMode::Create)
            .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(
            err.errors[0].message,
            "Cast to Number failed for value \"cheap\" at path \"price\""
        );

        assert!(schema().cast(&json!([1, 2]), CastMode::Create).is_err());
    }

    #[test]
    fn test_validate_paths() {
        let doc = json!({"price": -1}).as_object().cloned().unwrap();
        let err = schema().validate(&doc, None).unwrap_err();
        assert_eq!(err.errors.len(), 2);

        let only_price = vec!["price".to_string()];
        let err = schema().validate(&doc, Some(&only_price)).unwrap_err();
        assert_eq!(err.messages(), vec!["price negative"]);
    }

    #[test]
    fn test_virtuals() {
        let mut doc = json!({"price": 4}).as_object().cloned().unwrap();
        schema().apply_virtuals(&mut doc);
        assert_eq!(doc["double"], json!(8));
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = "2021-03-21T00:00:00.000Z";
        for input in ["2021-03-21", "2021-03-21T00:00:00Z", "2021-03-21,00:00"] {
            assert_eq!(format_date(&parse_date(input).unwrap()), expected);
        }
        assert!(parse_date("March").is_none());
    }
}
