//! # Dispatch Engine
//!
//! Turns a request below the dynamic prefix into a statement execution:
//! snapshot the catalog, select a definition, resolve and type its
//! parameters, substitute them into the SQL template and run it.

use crate::error::{Error, Result};
use crate::executor::{execute, StatementOutcome};
use crate::literal::substitute;
use crate::params::{resolve, type_values, ValueSource};
use crate::selector::select;
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Request-side inputs of a dispatch
pub trait DispatchRequest: ValueSource {
    /// Whether the match trace should accompany a "not found" failure
    fn debug_requested(&self) -> bool;
}

impl DispatchRequest for crate::request::ApiRequest {
    fn debug_requested(&self) -> bool {
        Self::debug_requested(self)
    }
}

/// Dynamic endpoint engine over a [`Store`]
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
}

impl Engine {
    /// Create an engine reading and executing through `store`
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Serve `method` + `path` (relative to the dynamic prefix)
    ///
    /// # Errors
    ///
    /// - `Error::RouteNotFound` when no definition matches
    /// - `Error::MissingRequiredParameter` / `Error::InvalidCoercion` from
    ///   parameter resolution
    /// - `Error::NoStatementDefined` when the match has no SQL
    /// - `Error::Execution` when the store rejects the statement
    /// - `Error::Database` when the catalog cannot be read
    pub async fn dispatch(&self, method: &str, path: &str, request: &impl DispatchRequest) -> Result<StatementOutcome> {
        let definitions = self.store.list_all().await.map_err(|e| {
            error!(error = %e, "Failed to load endpoint catalog");
            Error::Database { message: e.message }
        })?;

        let selection = select(method, path, &definitions);
        let Some(selected) = selection.selected.as_ref() else {
            debug!(path = %selection.requested_path, method = %selection.method, "No endpoint matched");
            return Err(Error::RouteNotFound {
                path: selection.requested_path.clone(),
                debug: request.debug_requested().then(|| selection.debug_payload()),
            });
        };
        let definition = selected.definition;

        let raw = resolve(definition, &selected.path_params, request)?;
        let typed = type_values(definition, raw)?;

        let template = definition
            .sql
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(Error::NoStatementDefined)?;
        let sql = substitute(definition, template, &typed);

        info!(
            endpoint_id = definition.id,
            method = %selection.method,
            path = %selection.requested_path,
            "Dispatching endpoint"
        );
        execute(self.store.as_ref(), &sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DbValue;
    use crate::endpoint::{EndpointDefinition, ParamSource, ParameterDeclaration};
    use crate::store::{Record, StoreError};
    use crate::types::ParamType;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory catalog that records every statement it is asked to run
    #[derive(Default)]
    struct MemoryStore {
        definitions: Vec<EndpointDefinition>,
        executed: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        fn with(definitions: Vec<EndpointDefinition>) -> Arc<Self> {
            Arc::new(Self {
                definitions,
                ..Default::default()
            })
        }

        fn last_sql(&self) -> Option<String> {
            self.executed.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn list_all(&self) -> std::result::Result<Vec<EndpointDefinition>, StoreError> {
            Ok(self.definitions.clone())
        }

        async fn execute_query(&self, sql: &str) -> std::result::Result<Vec<Record>, StoreError> {
            self.executed.lock().unwrap().push(sql.to_string());
            let mut record = Record::new();
            record.insert("ok".to_string(), DbValue::Int(1));
            Ok(vec![record])
        }

        async fn execute_statement(&self, sql: &str) -> std::result::Result<Value, StoreError> {
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(json!(1))
        }
    }

    #[derive(Default)]
    struct FakeRequest {
        query: HashMap<String, Value>,
        body: Value,
    }

    impl ValueSource for FakeRequest {
        fn query(&self, key: &str) -> Option<Value> {
            self.query.get(key).cloned()
        }

        fn body(&self, key: &str) -> Option<Value> {
            self.body.get(key).cloned()
        }

        fn header(&self, _key: &str) -> Option<Value> {
            None
        }
    }

    impl DispatchRequest for FakeRequest {
        fn debug_requested(&self) -> bool {
            self.query.get("_dbg").and_then(Value::as_str) == Some("1")
        }
    }

    fn insert_items() -> EndpointDefinition {
        EndpointDefinition::new(1, Some("POST"), "/items", "INSERT INTO t(x) VALUES ({x})")
            .with_param(ParameterDeclaration::new("x", ParamSource::Body, ParamType::Number).required())
    }

    #[tokio::test]
    async fn test_mutation_dispatch() {
        let store = MemoryStore::with(vec![insert_items()]);
        let engine = Engine::new(store.clone());
        let req = FakeRequest {
            body: json!({"x": 5}),
            ..Default::default()
        };

        let outcome = engine.dispatch("POST", "/items", &req).await.unwrap();
        assert_eq!(serde_json::to_value(outcome).unwrap(), json!({"result": 1}));
        assert_eq!(store.last_sql().as_deref(), Some("INSERT INTO t(x) VALUES (5)"));
    }

    #[tokio::test]
    async fn test_missing_required_never_executes() {
        let store = MemoryStore::with(vec![insert_items()]);
        let engine = Engine::new(store.clone());

        let err = engine
            .dispatch("POST", "/items", &FakeRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequiredParameter { ref key } if key == "x"));
        assert!(store.last_sql().is_none());
    }

    #[tokio::test]
    async fn test_query_dispatch_with_path_capture() {
        let def = EndpointDefinition::new(2, None, "/users/{id}", "SELECT * FROM users WHERE id = {id}")
            .with_param(ParameterDeclaration::new("id", ParamSource::Path, ParamType::Number));
        let store = MemoryStore::with(vec![def]);
        let engine = Engine::new(store.clone());

        let outcome = engine.dispatch("GET", "/users/42", &FakeRequest::default()).await.unwrap();
        assert!(matches!(outcome, StatementOutcome::Rows { .. }));
        assert_eq!(store.last_sql().as_deref(), Some("SELECT * FROM users WHERE id = 42"));
    }

    #[tokio::test]
    async fn test_heuristic_dispatch_quotes_text() {
        let def = EndpointDefinition::new(3, None, "/by-name/{name}", "SELECT * FROM u WHERE name = {name}");
        let store = MemoryStore::with(vec![def]);
        let engine = Engine::new(store.clone());

        engine
            .dispatch("GET", "/by-name/O%27Brien", &FakeRequest::default())
            .await
            .unwrap();
        assert_eq!(
            store.last_sql().as_deref(),
            Some("SELECT * FROM u WHERE name = 'O''Brien'")
        );
    }

    #[tokio::test]
    async fn test_not_found_with_and_without_trace() {
        let store = MemoryStore::with(vec![insert_items()]);
        let engine = Engine::new(store);

        let err = engine
            .dispatch("GET", "/nothing", &FakeRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RouteNotFound { debug: None, .. }));

        let mut req = FakeRequest::default();
        req.query.insert("_dbg".to_string(), json!("1"));
        let err = engine.dispatch("POST", "/nothing", &req).await.unwrap_err();
        let body = err.to_body();
        assert_eq!(body["debug"]["requestedPath"], "/nothing");
        assert_eq!(body["debug"]["method"], "POST");
        assert_eq!(body["debug"]["trace"][0]["id"], 1);
    }

    #[tokio::test]
    async fn test_no_statement_defined() {
        let mut def = EndpointDefinition::new(4, None, "/empty", "");
        def.sql = None;
        let engine = Engine::new(MemoryStore::with(vec![def]));

        let err = engine.dispatch("GET", "/empty", &FakeRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::NoStatementDefined));
        assert_eq!(err.status_code(), 400);
    }
}
