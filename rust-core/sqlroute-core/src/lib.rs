//! # sqlroute Core
//!
//! Runtime library for sqlroute, a database-backed HTTP API builder.
//! Endpoint definitions (method, path template, SQL template, typed
//! parameters) live in a catalog table; requests under the API prefix are
//! matched against them and turned into SQL executions.
//!
//! ## Request pipeline
//!
//! ```text
//! request ─► selector ─► params::resolve ─► params::type_values
//!         ─► literal::substitute ─► executor ─► Store
//! ```
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper
//! - `router` - Management routes using matchit (radix trie)
//! - `dispatch` - Dynamic endpoint engine
//! - `selector` - Length-ordered candidate matching with a trace
//! - `template` - Path template compilation and token extraction
//! - `params` - Parameter gathering, defaults and typing
//! - `types` - Parameter types and coercion
//! - `literal` - SQL literal rendering and substitution
//! - `executor` - Statement classification and result shaping
//! - `store` - Storage collaborator trait
//! - `database` - SQLx database connectivity (SQLite, PostgreSQL)
//! - `catalog` - Endpoint and SQL-function persistence
//! - `endpoint` - Endpoint definitions and their validation
//! - `request` - HTTP request wrapper with headers and query parsing
//! - `middleware` - Request/response middleware system
//! - `json` - JSON parsing with simd-json
//! - `validation` - Structured validation errors
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod database;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod json;
pub mod literal;
pub mod middleware;
pub mod params;
pub mod request;
pub mod router;
pub mod selector;
pub mod server;
pub mod store;
pub mod template;
pub mod types;
pub mod validation;

pub use catalog::{SqlFunction, SqlFunctionInput};
pub use database::{DatabasePool, DbValue};
pub use dispatch::Engine;
pub use endpoint::{EndpointDefinition, EndpointInput, ParamSource, ParameterDeclaration};
pub use error::{Error, Result};
pub use executor::{StatementKind, StatementOutcome};
pub use json::{parse_json, to_json};
pub use middleware::{CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain};
pub use request::ApiRequest;
pub use router::{Method, Router};
pub use server::{ApiResponse, Server, ServerConfig};
pub use store::{Record, Store, StoreError};
pub use types::{ParamType, ParamValue};
pub use validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
