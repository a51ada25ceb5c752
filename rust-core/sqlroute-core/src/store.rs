//! # Storage Collaborator
//!
//! The engine reads the endpoint catalog and executes statements only through
//! [`Store`], so it can run against a real database pool or an in-memory fake.

use crate::database::DbValue;
use crate::endpoint::EndpointDefinition;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// One result record; key order is the store's column order
pub type Record = IndexMap<String, DbValue>;

/// Failure reported by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreError {
    /// Human-readable message
    pub message: String,
    /// Vendor error code, e.g. SQLSTATE
    pub code: Option<String>,
    /// Structured metadata (table, constraint, ...)
    pub meta: Option<Value>,
}

impl StoreError {
    /// Error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            meta: None,
        }
    }

    /// Details for the response body: the code if known, else the metadata
    #[must_use]
    pub fn details(&self) -> Value {
        self.code.as_ref().map_or_else(
            || self.meta.clone().unwrap_or(Value::Null),
            |code| Value::String(code.clone()),
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

/// Catalog snapshot and statement execution
#[async_trait]
pub trait Store: Send + Sync {
    /// Every endpoint definition, in catalog order
    async fn list_all(&self) -> Result<Vec<EndpointDefinition>, StoreError>;

    /// Run a row-returning statement
    async fn execute_query(&self, sql: &str) -> Result<Vec<Record>, StoreError>;

    /// Run a mutating statement; the result is store-specific
    /// (an affected-row count for SQL databases)
    async fn execute_statement(&self, sql: &str) -> Result<Value, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_prefers_code() {
        let err = StoreError {
            message: "duplicate key".to_string(),
            code: Some("23505".to_string()),
            meta: Some(json!({"constraint": "users_pkey"})),
        };
        assert_eq!(err.details(), json!("23505"));
    }

    #[test]
    fn test_details_falls_back_to_meta() {
        let err = StoreError {
            message: "x".to_string(),
            code: None,
            meta: Some(json!({"table": "t"})),
        };
        assert_eq!(err.details(), json!({"table": "t"}));
        assert_eq!(StoreError::new("y").details(), Value::Null);
    }
}
