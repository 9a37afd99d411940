//! # Model Errors
//!
//! Validation failures are collected per field so a client sees every
//! problem with a document at once.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// One failed rule or cast on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path (`$root` for the document itself)
    pub field: String,

    /// Rule that failed, e.g. `required`, `minlength`, `cast`
    pub rule: &'static str,

    /// Human readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

/// Every field error found while validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub model: &'static str,
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Messages only, in rule order
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed: ", self.model)?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Input failed casting or a validation rule
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The store rejected or failed the operation
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_field() {
        let mut errors = ValidationErrors::new("Tour");
        errors.push(FieldError::new("name", "required", "A tour must have a name!"));
        errors.push(FieldError::new("price", "required", "A tour must have a price!"));

        assert_eq!(
            errors.to_string(),
            "Tour validation failed: name: A tour must have a name!, price: A tour must have a price!"
        );
        assert!(errors.clone().into_result().is_err());
        assert!(ValidationErrors::new("Tour").into_result().is_ok());
    }
}
