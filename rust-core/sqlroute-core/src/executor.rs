//! # Statement Executor
//!
//! Runs a substituted statement against the [`Store`] and shapes the result.
//! Statements whose trimmed text begins with the `select` keyword (any case)
//! are queries and render as `{columns, rows}`; everything else is a
//! mutation and renders as `{result}`.

use crate::database::DbValue;
use crate::error::{Error, Result};
use crate::store::{Record, Store};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// How a statement is run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Row-returning query
    Query,
    /// Anything else
    Mutation,
}

/// Classify a statement by its leading keyword
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    let trimmed = sql.trim_start();
    let Some(head) = trimmed.get(..6) else {
        return StatementKind::Mutation;
    };
    let boundary = trimmed[6..]
        .chars()
        .next()
        .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));

    if head.eq_ignore_ascii_case("select") && boundary {
        StatementKind::Query
    } else {
        StatementKind::Mutation
    }
}

/// Result of a dispatched statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatementOutcome {
    /// Tabular query result
    Rows {
        /// Column names, in the order of the first record
        columns: Vec<String>,
        /// Row values aligned with `columns`
        rows: Vec<Vec<DbValue>>,
    },
    /// Mutation result as reported by the store
    Mutation {
        /// Store-specific descriptor
        result: Value,
    },
}

/// Shape records into columns and aligned rows
///
/// Column order comes from the first record; keys a later record lacks
/// render as null.
#[must_use]
pub fn shape_rows(records: &[Record]) -> StatementOutcome {
    let columns: Vec<String> = records
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default();

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).cloned().unwrap_or(DbValue::Null))
                .collect()
        })
        .collect();

    StatementOutcome::Rows { columns, rows }
}

/// Run `sql` and shape the outcome
///
/// # Errors
///
/// Returns `Error::Execution` with the store's message and details.
pub async fn execute(store: &dyn Store, sql: &str) -> Result<StatementOutcome> {
    let kind = classify(sql);
    debug!(?kind, sql, "Executing statement");

    match kind {
        StatementKind::Query => {
            let records = store.execute_query(sql).await.map_err(|e| {
                warn!(error = %e, "Query failed");
                Error::Execution {
                    context: "Query failed",
                    details: e.details(),
                    message: e.message,
                }
            })?;
            Ok(shape_rows(&records))
        }
        StatementKind::Mutation => {
            let result = store.execute_statement(sql).await.map_err(|e| {
                warn!(error = %e, "Execution failed");
                Error::Execution {
                    context: "Execution failed",
                    details: e.details(),
                    message: e.message,
                }
            })?;
            Ok(StatementOutcome::Mutation { result })
        }
    }
}
