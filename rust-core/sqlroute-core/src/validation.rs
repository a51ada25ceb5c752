//! # Validation Module
//!
//! Structured validation errors for catalog input.
//!
//! Endpoint definitions are author-trusted, but malformed ones (bad token
//! names, duplicate keys, unknown verbs) are rejected before they reach the
//! catalog so that dispatch never sees them.

use serde::Serialize;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value doesn't match pattern
    InvalidFormat,
    /// Value is not unique
    NotUnique,
    /// Value is not in allowed set
    InvalidChoice,
    /// Value references something that does not exist
    UnknownReference,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    /// Field name (e.g., "path", "params[0].key")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} is required"),
            field: field_str,
            code: ValidationCode::Required,
        }
    }

    /// Create an "invalid format" error
    pub fn invalid_format(field: impl Into<String>, expected: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be {expected}"),
            field: field_str,
            code: ValidationCode::InvalidFormat,
        }
    }

    /// Create a "duplicate value" error
    pub fn not_unique(field: impl Into<String>, value: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} '{value}' is declared more than once"),
            field: field_str,
            code: ValidationCode::NotUnique,
        }
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;
