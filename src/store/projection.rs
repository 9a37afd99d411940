//! Field projection.
//!
//! Projection strings are space separated. A leading `-` excludes a field;
//! anything else includes it. Inclusion always keeps `_id` unless `-_id` is
//! given, and that is the only exclusion allowed alongside inclusions.

use super::errors::{StoreError, StoreResult};
use super::Document;

const ID_FIELD: &str = "_id";

/// Parsed projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only these fields (plus `_id` when `keep_id`)
    Include { fields: Vec<String>, keep_id: bool },

    /// Drop these fields
    Exclude(Vec<String>),
}

impl Projection {
    /// Parse a projection string. Empty input yields `None`.
    pub fn parse(spec: &str) -> StoreResult<Option<Self>> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for token in spec.split_whitespace() {
            match token.strip_prefix('-') {
                Some("") => {
                    return Err(StoreError::invalid_query("Invalid projection: -"));
                }
                Some(field) => exclude.push(field.to_string()),
                None => include.push(token.strip_prefix('+').unwrap_or(token).to_string()),
            }
        }

        if include.is_empty() && exclude.is_empty() {
            return Ok(None);
        }

        if include.is_empty() {
            return Ok(Some(Projection::Exclude(exclude)));
        }

        let keep_id = !exclude.iter().any(|f| f == ID_FIELD);
        if exclude.iter().any(|f| f != ID_FIELD) {
            return Err(StoreError::invalid_query(
                "Projection cannot have a mix of inclusion and exclusion",
            ));
        }

        Ok(Some(Projection::Include {
            fields: include,
            keep_id,
        }))
    }

    /// Apply the projection to one document
    pub fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::Include { fields, keep_id } => doc
                .into_iter()
                .filter(|(k, _)| (*keep_id && k == ID_FIELD) || fields.contains(k))
                .collect(),
            Projection::Exclude(fields) => doc
                .into_iter()
                .filter(|(k, _)| !fields.contains(k))
                .collect(),
        }
    }
}
