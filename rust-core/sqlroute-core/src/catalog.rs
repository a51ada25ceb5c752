//! # Catalog
//!
//! Persistence for endpoint definitions and SQL functions.
//!
//! Both tables use portable column types (`TEXT` for JSON parameter lists and
//! ISO-8601 timestamps) so the same row decoding serves SQLite and
//! PostgreSQL. Statements are written with `?` placeholders and renumbered
//! for PostgreSQL.

use crate::database::{store_error, with_pool, DatabasePool};
use crate::endpoint::{EndpointDefinition, EndpointInput, ParameterDeclaration};
use crate::error::{Error, Result};
use crate::types::format_iso;
use crate::validation::{ValidationErrors, ValidationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{ColumnIndex, Decode, Row, Type};
use tracing::{info, warn};

macro_rules! endpoint_columns {
    () => {
        "id, name, method, path, sql, params, created_at"
    };
}

macro_rules! function_columns {
    () => {
        "id, name, query, created_at"
    };
}

const SQLITE_SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS endpoints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        method TEXT,
        path TEXT NOT NULL,
        sql TEXT,
        params TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sql_functions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

const POSTGRES_SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS endpoints (
        id BIGSERIAL PRIMARY KEY,
        name TEXT,
        method TEXT,
        path TEXT NOT NULL,
        sql TEXT,
        params TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sql_functions (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

const LIST_ENDPOINTS_NEWEST: &str = concat!(
    "SELECT ",
    endpoint_columns!(),
    " FROM endpoints ORDER BY created_at DESC, id DESC"
);
const LIST_ENDPOINTS_CATALOG: &str =
    concat!("SELECT ", endpoint_columns!(), " FROM endpoints ORDER BY id");
const GET_ENDPOINT: &str = concat!("SELECT ", endpoint_columns!(), " FROM endpoints WHERE id = ?");
const INSERT_ENDPOINT: &str = concat!(
    "INSERT INTO endpoints (name, method, path, sql, params, created_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING ",
    endpoint_columns!()
);
const UPDATE_ENDPOINT: &str = concat!(
    "UPDATE endpoints SET name = ?, method = ?, path = ?, sql = ?, params = ? WHERE id = ? RETURNING ",
    endpoint_columns!()
);
const DELETE_ENDPOINT: &str =
    concat!("DELETE FROM endpoints WHERE id = ? RETURNING ", endpoint_columns!());

const LIST_FUNCTIONS: &str = concat!(
    "SELECT ",
    function_columns!(),
    " FROM sql_functions ORDER BY created_at DESC, id DESC"
);
const GET_FUNCTION: &str = concat!("SELECT ", function_columns!(), " FROM sql_functions WHERE id = ?");
const INSERT_FUNCTION: &str = concat!(
    "INSERT INTO sql_functions (name, query, created_at) VALUES (?, ?, ?) RETURNING ",
    function_columns!()
);
const UPDATE_FUNCTION: &str = concat!(
    "UPDATE sql_functions SET name = ?, query = ? WHERE id = ? RETURNING ",
    function_columns!()
);
const DELETE_FUNCTION: &str =
    concat!("DELETE FROM sql_functions WHERE id = ? RETURNING ", function_columns!());

/// Rewrite `?` placeholders as `$1, $2, ...`
fn numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    for c in sql.chars() {
        if c == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(c);
        }
    }
    out
}

fn db_error(e: &sqlx::Error) -> Error {
    Error::Database {
        message: e.to_string(),
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Decode an endpoint row selected with the endpoint column list
fn endpoint_from_row<'r, R>(row: &'r R) -> Result<EndpointDefinition>
where
    R: Row,
    usize: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
{
    let id: i64 = row.try_get(0).map_err(|e| db_error(&e))?;
    let params_text: Option<String> = row.try_get(5).map_err(|e| db_error(&e))?;
    let params: Vec<ParameterDeclaration> = match params_text.as_deref() {
        None | Some("") => Vec::new(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            warn!(endpoint_id = id, error = %e, "Ignoring unreadable parameter declarations");
            Vec::new()
        }),
    };
    let created_at: Option<String> = row.try_get(6).map_err(|e| db_error(&e))?;

    Ok(EndpointDefinition {
        id,
        name: row.try_get(1).map_err(|e| db_error(&e))?,
        method: row.try_get(2).map_err(|e| db_error(&e))?,
        path: row.try_get(3).map_err(|e| db_error(&e))?,
        sql: row.try_get(4).map_err(|e| db_error(&e))?,
        params,
        created_at: parse_timestamp(created_at.as_deref()),
    })
}

/// Decode a SQL function row selected with the function column list
fn function_from_row<'r, R>(row: &'r R) -> Result<SqlFunction>
where
    R: Row,
    usize: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
{
    let created_at: Option<String> = row.try_get(3).map_err(|e| db_error(&e))?;
    Ok(SqlFunction {
        id: row.try_get(0).map_err(|e| db_error(&e))?,
        name: row.try_get(1).map_err(|e| db_error(&e))?,
        query: row.try_get(2).map_err(|e| db_error(&e))?,
        created_at: parse_timestamp(created_at.as_deref()),
    })
}

/// Create the catalog tables if they do not exist
///
/// # Errors
///
/// Returns `Error::Database` if a DDL statement fails.
pub async fn ensure_schema(pool: &DatabasePool) -> Result<()> {
    let statements = if pool.is_postgres() {
        POSTGRES_SCHEMA
    } else {
        SQLITE_SCHEMA
    };
    for ddl in statements {
        pool.execute(ddl).await.map_err(|e| Error::Database {
            message: e.message,
        })?;
    }
    info!("Catalog schema ready");
    Ok(())
}

/// Endpoints, newest first
///
/// # Errors
///
/// Returns `Error::Database` on driver failure.
pub async fn list_endpoints(pool: &DatabasePool) -> Result<Vec<EndpointDefinition>> {
    fetch_endpoints(pool, LIST_ENDPOINTS_NEWEST).await
}

/// Endpoints in catalog (insertion) order, as dispatch sees them
///
/// # Errors
///
/// Returns `Error::Database` on driver failure.
pub async fn list_in_catalog_order(pool: &DatabasePool) -> Result<Vec<EndpointDefinition>> {
    fetch_endpoints(pool, LIST_ENDPOINTS_CATALOG).await
}

async fn fetch_endpoints(pool: &DatabasePool, query: &str) -> Result<Vec<EndpointDefinition>> {
    with_pool!(pool, sqlite: query, postgres: query, |p, sql| {
        let rows = sqlx::query(sql).fetch_all(p).await.map_err(|e| db_error(&e))?;
        rows.iter().map(endpoint_from_row).collect()
    })
}

/// One endpoint by id
///
/// # Errors
///
/// Returns `Error::NotFound` if no endpoint has this id.
pub async fn get_endpoint(pool: &DatabasePool, id: i64) -> Result<EndpointDefinition> {
    let row = with_pool!(pool, sqlite: GET_ENDPOINT, postgres: &numbered(GET_ENDPOINT), |p, sql| {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(p)
            .await
            .map_err(|e| db_error(&e))?;
        row.as_ref().map(endpoint_from_row).transpose()?
    });
    row.ok_or(Error::NotFound)
}

/// Validate and store a new endpoint
///
/// # Errors
///
/// Returns `Error::Validation` for malformed input.
pub async fn create_endpoint(pool: &DatabasePool, input: &EndpointInput) -> Result<EndpointDefinition> {
    input.validate().map_err(Error::Validation)?;
    let params = serde_json::to_string(&input.params)?;
    let now = format_iso(&Utc::now());

    let created = with_pool!(pool, sqlite: INSERT_ENDPOINT, postgres: &numbered(INSERT_ENDPOINT), |p, sql| {
        let row = sqlx::query(sql)
            .bind(&input.name)
            .bind(&input.method)
            .bind(&input.path)
            .bind(&input.sql)
            .bind(&params)
            .bind(&now)
            .fetch_one(p)
            .await
            .map_err(|e| db_error(&e))?;
        endpoint_from_row(&row)?
    });
    info!(endpoint_id = created.id, path = %created.path, "Endpoint created");
    Ok(created)
}

/// Validate and replace an endpoint
///
/// # Errors
///
/// Returns `Error::Validation` for malformed input or `Error::NotFound` if no
/// endpoint has this id.
pub async fn update_endpoint(pool: &DatabasePool, id: i64, input: &EndpointInput) -> Result<EndpointDefinition> {
    input.validate().map_err(Error::Validation)?;
    let params = serde_json::to_string(&input.params)?;

    let updated = with_pool!(pool, sqlite: UPDATE_ENDPOINT, postgres: &numbered(UPDATE_ENDPOINT), |p, sql| {
        let row = sqlx::query(sql)
            .bind(&input.name)
            .bind(&input.method)
            .bind(&input.path)
            .bind(&input.sql)
            .bind(&params)
            .bind(id)
            .fetch_optional(p)
            .await
            .map_err(|e| db_error(&e))?;
        row.as_ref().map(endpoint_from_row).transpose()?
    });
    let updated = updated.ok_or(Error::NotFound)?;
    info!(endpoint_id = id, "Endpoint updated");
    Ok(updated)
}

/// Remove an endpoint, returning the removed record
///
/// # Errors
///
/// Returns `Error::NotFound` if no endpoint has this id.
pub async fn delete_endpoint(pool: &DatabasePool, id: i64) -> Result<EndpointDefinition> {
    let deleted = with_pool!(pool, sqlite: DELETE_ENDPOINT, postgres: &numbered(DELETE_ENDPOINT), |p, sql| {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(p)
            .await
            .map_err(|e| db_error(&e))?;
        row.as_ref().map(endpoint_from_row).transpose()?
    });
    let deleted = deleted.ok_or(Error::NotFound)?;
    info!(endpoint_id = id, "Endpoint deleted");
    Ok(deleted)
}

/// Stored SQL function (DDL applied to the database when saved)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlFunction {
    /// Catalog identity
    pub id: i64,
    /// Display name
    pub name: String,
    /// Statement that defines the function
    pub query: String,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Create/update payload for a SQL function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlFunctionInput {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Statement that defines the function
    #[serde(default)]
    pub query: String,
}

impl SqlFunctionInput {
    /// Check both fields are present
    ///
    /// # Errors
    ///
    /// Returns the missing fields.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add_required("name");
        }
        if self.query.trim().is_empty() {
            errors.add_required("query");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// SQL functions, newest first
///
/// # Errors
///
/// Returns `Error::Database` on driver failure.
pub async fn list_functions(pool: &DatabasePool) -> Result<Vec<SqlFunction>> {
    with_pool!(pool, sqlite: LIST_FUNCTIONS, postgres: LIST_FUNCTIONS, |p, sql| {
        let rows = sqlx::query(sql).fetch_all(p).await.map_err(|e| db_error(&e))?;
        rows.iter().map(function_from_row).collect()
    })
}

/// One SQL function by id
///
/// # Errors
///
/// Returns `Error::NotFound` if no function has this id.
pub async fn get_function(pool: &DatabasePool, id: i64) -> Result<SqlFunction> {
    let row = with_pool!(pool, sqlite: GET_FUNCTION, postgres: &numbered(GET_FUNCTION), |p, sql| {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(p)
            .await
            .map_err(|e| db_error(&e))?;
        row.as_ref().map(function_from_row).transpose()?
    });
    row.ok_or(Error::NotFound)
}

/// Apply a function definition and record it, atomically
///
/// The definition statement and the insert share one transaction; if either
/// fails, neither takes effect.
///
/// # Errors
///
/// Returns `Error::FunctionRejected` with the database message on failure.
pub async fn create_function(pool: &DatabasePool, input: &SqlFunctionInput) -> Result<SqlFunction> {
    const CONTEXT: &str = "Failed to create function in database or persist record";
    input.validate().map_err(Error::Validation)?;
    let now = format_iso(&Utc::now());
    let reject = |e: sqlx::Error| Error::FunctionRejected {
        context: CONTEXT,
        reason: store_error(&e).message,
    };

    let created = with_pool!(pool, sqlite: INSERT_FUNCTION, postgres: &numbered(INSERT_FUNCTION), |p, sql| {
        let mut tx = p.begin().await.map_err(reject)?;
        sqlx::query(&input.query).execute(&mut *tx).await.map_err(reject)?;
        let row = sqlx::query(sql)
            .bind(&input.name)
            .bind(&input.query)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await
            .map_err(reject)?;
        let created = function_from_row(&row)?;
        tx.commit().await.map_err(reject)?;
        created
    });
    info!(function_id = created.id, name = %created.name, "SQL function created");
    Ok(created)
}

/// Re-apply a function definition and update its record, atomically
///
/// # Errors
///
/// Returns `Error::FunctionRejected` if the statement fails, or
/// `Error::NotFound` (with nothing applied) if no function has this id.
pub async fn update_function(pool: &DatabasePool, id: i64, input: &SqlFunctionInput) -> Result<SqlFunction> {
    const CONTEXT: &str = "Failed to apply function SQL in database or update record";
    input.validate().map_err(Error::Validation)?;
    let reject = |e: sqlx::Error| Error::FunctionRejected {
        context: CONTEXT,
        reason: store_error(&e).message,
    };

    let updated = with_pool!(pool, sqlite: UPDATE_FUNCTION, postgres: &numbered(UPDATE_FUNCTION), |p, sql| {
        let mut tx = p.begin().await.map_err(reject)?;
        sqlx::query(&input.query).execute(&mut *tx).await.map_err(reject)?;
        let row = sqlx::query(sql)
            .bind(&input.name)
            .bind(&input.query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(reject)?;
        let Some(row) = row else {
            return Err(Error::NotFound);
        };
        let updated = function_from_row(&row)?;
        tx.commit().await.map_err(reject)?;
        updated
    });
    info!(function_id = id, "SQL function updated");
    Ok(updated)
}

/// Remove a SQL function record, returning it
///
/// Only the record is removed; the database object it defined is left alone.
///
/// # Errors
///
/// Returns `Error::NotFound` if no function has this id.
pub async fn delete_function(pool: &DatabasePool, id: i64) -> Result<SqlFunction> {
    let deleted = with_pool!(pool, sqlite: DELETE_FUNCTION, postgres: &numbered(DELETE_FUNCTION), |p, sql| {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(p)
            .await
            .map_err(|e| db_error(&e))?;
        row.as_ref().map(function_from_row).transpose()?
    });
    let deleted = deleted.ok_or(Error::NotFound)?;
    info!(function_id = id, "SQL function deleted");
    Ok(deleted)
}
