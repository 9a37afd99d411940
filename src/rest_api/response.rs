//! # Response Formatting
//!
//! The `{status, results?, data}` envelope every successful response uses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

/// Success envelope
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(skip)]
    pub code: StatusCode,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    pub data: Value,
}

impl Envelope {
    /// `data: {key: value}`
    pub fn single(key: &str, value: Value) -> Self {
        Self {
            code: StatusCode::OK,
            status: "success",
            results: None,
            data: keyed(key, value),
        }
    }

    /// `results: n, data: {key: [...]}`
    pub fn list(key: &str, items: Vec<Value>) -> Self {
        Self {
            results: Some(items.len()),
            ..Self::single(key, Value::Array(items))
        }
    }

    /// `data: null`
    pub fn empty() -> Self {
        Self {
            code: StatusCode::OK,
            status: "success",
            results: None,
            data: Value::Null,
        }
    }

    pub fn with_status(mut self, code: StatusCode) -> Self {
        self.code = code;
        self
    }
}

fn keyed(key: &str, value: Value) -> Value {
    let mut data = Map::new();
    data.insert(key.to_string(), value);
    Value::Object(data)
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_envelope_serialization() {
        let envelope = Envelope::list("tours", vec![json!({"name": "a"}), json!({"name": "b"})]);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({
                "status": "success",
                "results": 2,
                "data": {"tours": [{"name": "a"}, {"name": "b"}]}
            })
        );
    }

    #[test]
    fn test_single_and_empty_envelopes() {
        let created = Envelope::single("tour", json!({"name": "a"})).with_status(StatusCode::CREATED);
        assert_eq!(created.code, StatusCode::CREATED);

        let json = serde_json::to_value(&created).unwrap();
        assert!(json.get("results").is_none());
        assert_eq!(json["data"]["tour"]["name"], "a");

        let json = serde_json::to_value(Envelope::empty()).unwrap();
        assert_eq!(json, json!({"status": "success", "data": null}));
    }
}
