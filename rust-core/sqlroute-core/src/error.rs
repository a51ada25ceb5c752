//! # Error Handling
//!
//! Centralized error types for sqlroute core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Every variant maps to an HTTP status through [`Error::status_code`] and to a
//! JSON body through [`Error::to_body`], so handlers can short-circuit with `?`
//! and let the server render the failure.

use crate::validation::ValidationErrors;
use serde_json::{json, Value};
use thiserror::Error;

/// Result type alias for sqlroute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the sqlroute runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No endpoint definition matched the request
    #[error("Endpoint not found")]
    RouteNotFound {
        /// The normalized path that wasn't matched
        path: String,
        /// Match trace, present only when diagnostics were requested
        debug: Option<Value>,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A required parameter had no value after default resolution
    #[error("Missing required parameter: {key}")]
    MissingRequiredParameter {
        /// Declared parameter key
        key: String,
    },

    /// A value could not be converted to its declared type
    #[error("{reason} for {key}")]
    InvalidCoercion {
        /// Declared parameter key
        key: String,
        /// Declared type name
        expected: &'static str,
        /// Conversion failure description
        reason: String,
    },

    /// The matched endpoint carries no SQL template
    #[error("Endpoint has no SQL defined")]
    NoStatementDefined,

    /// The store rejected a query or statement
    #[error("{context}")]
    Execution {
        /// "Query failed" or "Execution failed"
        context: &'static str,
        /// Store-reported message
        message: String,
        /// Store-reported code or metadata
        details: Value,
    },

    /// A SQL function definition was rejected by the database
    #[error("{context}")]
    FunctionRejected {
        /// What was being attempted
        context: &'static str,
        /// Store-reported message
        reason: String,
    },

    /// Catalog record does not exist
    #[error("Not found")]
    NotFound,

    /// Catalog input failed validation
    #[error("Validation failed")]
    Validation(ValidationErrors),

    /// Request could not be interpreted
    #[error("{0}")]
    BadRequest(String),

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error outside of dispatched statement execution
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// HTTP status code for this error
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } | Self::NotFound => 404,
            Self::MissingRequiredParameter { .. }
            | Self::InvalidCoercion { .. }
            | Self::NoStatementDefined
            | Self::Execution { .. }
            | Self::FunctionRejected { .. }
            | Self::Validation(_)
            | Self::BadRequest(_)
            | Self::InvalidRoutePattern { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::BindError { .. }
            | Self::Http(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Database { .. } => 500,
        }
    }

    /// Whether this error belongs to the domain taxonomy (answered directly)
    /// rather than an unexpected failure
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        self.status_code() < 500
    }

    /// JSON response body for this error
    #[must_use]
    pub fn to_body(&self) -> Value {
        match self {
            Self::RouteNotFound {
                debug: Some(debug), ..
            } => json!({ "message": self.to_string(), "debug": debug }),
            Self::Execution {
                message, details, ..
            } => json!({
                "message": self.to_string(),
                "error": { "message": message, "details": details },
            }),
            Self::FunctionRejected { reason, .. } => json!({
                "message": self.to_string(),
                "error": reason,
            }),
            Self::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors.errors,
            }),
            Self::BindError { .. }
            | Self::Http(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Database { .. } => json!({ "message": "Internal Server Error" }),
            _ => json!({ "message": self.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_error() {
        let err = Error::RouteNotFound {
            path: "/unknown".to_string(),
            debug: None,
        };
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_body(), json!({ "message": "Endpoint not found" }));
    }

    #[test]
    fn test_route_not_found_with_debug() {
        let err = Error::RouteNotFound {
            path: "/unknown".to_string(),
            debug: Some(json!({ "trace": [] })),
        };
        assert_eq!(err.to_body()["debug"], json!({ "trace": [] }));
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:8000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8000"));
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_domain());
    }

    #[test]
    fn test_missing_parameter_names_key() {
        let err = Error::MissingRequiredParameter {
            key: "limit".to_string(),
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Missing required parameter: limit");
    }

    #[test]
    fn test_invalid_coercion_message() {
        let err = Error::InvalidCoercion {
            key: "x".to_string(),
            expected: "number",
            reason: "Invalid number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid number for x");
        assert!(err.is_domain());
    }

    #[test]
    fn test_execution_body_carries_details() {
        let err = Error::Execution {
            context: "Query failed",
            message: "no such table: t".to_string(),
            details: json!("1"),
        };
        let body = err.to_body();
        assert_eq!(body["message"], "Query failed");
        assert_eq!(body["error"]["message"], "no such table: t");
        assert_eq!(body["error"]["details"], "1");
    }

    #[test]
    fn test_function_rejected_body() {
        let err = Error::FunctionRejected {
            context: "Failed to create function",
            reason: "syntax error".to_string(),
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.to_body(),
            json!({ "message": "Failed to create function", "error": "syntax error" })
        );
    }
}
