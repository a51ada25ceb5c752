//! # Endpoint Definitions
//!
//! Catalog records pairing an HTTP method and path template with a SQL
//! template and typed parameter declarations.
//!
//! Definitions are owned by the catalog; dispatch reads a fresh snapshot per
//! request and treats it as immutable.

use crate::router::Method;
use crate::template::{extract_tokens, is_identifier};
use crate::types::ParamType;
use crate::validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Where a declared parameter's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    /// Path template capture
    Path,
    /// Query string (default)
    #[default]
    Query,
    /// Decoded request body
    Body,
    /// Request header
    Header,
}

impl ParamSource {
    /// Parse a source name; unknown names read from the query string
    #[must_use]
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "path" => Self::Path,
            "body" => Self::Body,
            "header" | "headers" => Self::Header,
            _ => Self::Query,
        }
    }
}

impl<'de> Deserialize<'de> for ParamSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_name(&s))
    }
}

/// Typed parameter declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Identifier, unique within its endpoint
    pub key: String,
    /// Value source
    #[serde(default, alias = "location")]
    pub source: ParamSource,
    /// Declared type
    #[serde(default, rename = "type")]
    pub param_type: ParamType,
    /// Whether a value must be present after default resolution
    #[serde(default)]
    pub required: bool,
    /// Fallback used when the source yields nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterDeclaration {
    /// Declaration with the given key, source and type; optional, no default
    pub fn new(key: impl Into<String>, source: ParamSource, param_type: ParamType) -> Self {
        Self {
            key: key.into(),
            source,
            param_type,
            required: false,
            default: None,
        }
    }

    /// Mark as required
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Stored endpoint definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    /// Catalog identity
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// HTTP verb; absent is compared as `GET`
    #[serde(default)]
    pub method: Option<String>,
    /// Path template, e.g. `/users/{id}`
    pub path: String,
    /// SQL template, e.g. `SELECT * FROM users WHERE id = {id}`
    #[serde(default)]
    pub sql: Option<String>,
    /// Parameter declarations, in insertion order
    #[serde(default)]
    pub params: Vec<ParameterDeclaration>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl EndpointDefinition {
    /// Create a definition with no declarations
    pub fn new(id: i64, method: Option<&str>, path: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id,
            name: None,
            method: method.map(str::to_string),
            path: path.into(),
            sql: Some(sql.into()),
            params: Vec::new(),
            created_at: None,
        }
    }

    /// Add a parameter declaration
    #[must_use]
    pub fn with_param(mut self, param: ParameterDeclaration) -> Self {
        self.params.push(param);
        self
    }

    /// Upper-cased method used for comparison
    #[must_use]
    pub fn effective_method(&self) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("GET")
            .trim()
            .to_uppercase()
    }

    /// Declaration for `key`, if any
    #[must_use]
    pub fn declaration(&self, key: &str) -> Option<&ParameterDeclaration> {
        self.params.iter().find(|p| p.key == key)
    }
}

/// Create/update payload for an endpoint definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointInput {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// HTTP verb
    #[serde(default)]
    pub method: Option<String>,
    /// Path template
    #[serde(default)]
    pub path: String,
    /// SQL template
    #[serde(default)]
    pub sql: Option<String>,
    /// Parameter declarations
    #[serde(default)]
    pub params: Vec<ParameterDeclaration>,
}

impl EndpointInput {
    /// Check the definition is well formed
    ///
    /// # Errors
    ///
    /// Returns every problem found: missing path, malformed or repeated path
    /// tokens, unknown method, invalid or duplicate keys, and `path`-sourced
    /// keys absent from the template.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();

        if self.path.trim().is_empty() {
            errors.add_required("path");
        }

        let path_tokens = extract_tokens(&self.path);
        if path_tokens.len() != crate::template::token_regex().find_iter(&self.path).count() {
            errors.add(FieldError::new(
                "path",
                "path tokens must be unique",
                ValidationCode::NotUnique,
            ));
        }
        let brace_count = self.path.matches('{').count();
        if brace_count != crate::template::token_regex().find_iter(&self.path).count() {
            errors.add(FieldError::invalid_format(
                "path",
                "a template whose placeholders are {identifier}",
            ));
        }

        if let Some(method) = self.method.as_deref().filter(|m| !m.trim().is_empty()) {
            if Method::from_name(method).is_none() {
                errors.add(FieldError::new(
                    "method",
                    format!("unsupported method '{method}'"),
                    ValidationCode::InvalidChoice,
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, param) in self.params.iter().enumerate() {
            let field = format!("params[{i}].key");
            if !is_identifier(&param.key) {
                errors.add(FieldError::invalid_format(&field, "an identifier"));
            } else if !seen.insert(param.key.as_str()) {
                errors.add(FieldError::not_unique(&field, &param.key));
            }
            if param.source == ParamSource::Path && !path_tokens.contains(&param.key) {
                errors.add(FieldError::new(
                    &field,
                    format!("'{}' is not a token of the path template", param.key),
                    ValidationCode::UnknownReference,
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
