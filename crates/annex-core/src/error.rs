//! Field-scoped validation errors
//!
//! Upload validation reports errors against the field that caused them
//! (`context`, `file`, ...) together with a stable machine-readable code, so
//! API layers can render structured 4xx responses without parsing messages.

use std::collections::HashMap;

use thiserror::Error;

/// A single validation failure on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Stable machine-readable code, e.g. `invalid_mime_type`.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Validation errors collection, keyed by field name.
#[derive(Error, Debug, Default, Clone)]
#[error("Validation errors: {errors:?}")]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> errors
    pub errors: HashMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-entry collection. The lifecycle engine validates
    /// fail-fast, so most instances carry exactly one error.
    pub fn single(
        field: impl Into<String>,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        let mut errors = Self::new();
        errors.add(field, code, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, code: &'static str, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(FieldError::new(code, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Check if a specific code was reported for a field
    pub fn has_code(&self, field: &str, code: &str) -> bool {
        self.errors
            .get(field)
            .map(|errs| errs.iter().any(|e| e.code == code))
            .unwrap_or(false)
    }

    /// Get errors for a specific field
    pub fn get(&self, field: &str) -> Option<&Vec<FieldError>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        for (field, field_errors) in &self.errors {
            for err in field_errors {
                messages.push(format!("{} {}", field, err.message));
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_by_default() {
        let errors = ValidationErrors::new();
        assert!(errors.is_empty());
        assert!(!errors.has_error("file"));
    }

    #[test]
    fn test_single() {
        let errors = ValidationErrors::single("file", "too_large", "File size 42 too large!");
        assert!(!errors.is_empty());
        assert!(errors.has_error("file"));
        assert!(errors.has_code("file", "too_large"));
        assert!(!errors.has_code("file", "too_small"));
        assert!(!errors.has_code("context", "too_large"));
    }

    #[test]
    fn test_merge_and_messages() {
        let mut errors = ValidationErrors::single("context", "invalid_context", "bad context");
        errors.merge(ValidationErrors::single("file", "invalid_extension", "bad extension"));

        assert_eq!(errors.full_messages().len(), 2);
        assert!(errors.has_code("context", "invalid_context"));
        assert!(errors.has_code("file", "invalid_extension"));
    }
}
