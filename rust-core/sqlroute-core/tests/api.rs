//! End-to-end tests through the server's request pipeline on in-memory SQLite.

use serde_json::{json, Value};
use sqlroute_core::server::Bytes;
use sqlroute_core::{catalog, ApiResponse, DatabasePool, Method, Server, ServerConfig};
use std::collections::HashMap;

async fn server() -> (Server, DatabasePool) {
    let pool = DatabasePool::connect_sqlite("sqlite::memory:", Some(1))
        .await
        .unwrap();
    catalog::ensure_schema(&pool).await.unwrap();
    pool.execute("CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, x INTEGER, label TEXT)")
        .await
        .unwrap();
    let server = Server::new(pool.clone(), ServerConfig::default()).unwrap();
    (server, pool)
}

async fn call(server: &Server, method: Method, path: &str, body: Option<Value>) -> ApiResponse {
    let body = body.map(|b| Bytes::from(b.to_string()));
    server.test_request(method, path, HashMap::new(), body).await
}

async fn create_endpoint(server: &Server, definition: Value) -> i64 {
    let res = call(server, Method::Post, "/api/endpoints", Some(definition)).await;
    assert_eq!(res.status, 201, "{}", res.body);
    res.json_body().unwrap()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_insert_through_dynamic_endpoint() {
    let (server, pool) = server().await;
    create_endpoint(
        &server,
        json!({
            "name": "add item",
            "method": "POST",
            "path": "/items",
            "sql": "INSERT INTO items(x) VALUES ({x})",
            "params": [{"key": "x", "source": "body", "type": "number", "required": true}]
        }),
    )
    .await;

    let res = call(&server, Method::Post, "/api/api-builder/items", Some(json!({"x": 5}))).await;
    assert_eq!(res.status, 200, "{}", res.body);
    assert_eq!(res.json_body().unwrap(), json!({"result": 1}));

    let rows = pool.fetch_all("SELECT x FROM items").await.unwrap();
    assert_eq!(rows.len(), 1);

    let res = call(&server, Method::Post, "/api/api-builder/items", Some(json!({}))).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.json_body().unwrap()["message"], "Missing required parameter: x");
    assert_eq!(pool.fetch_all("SELECT x FROM items").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_query_shape_and_quoting() {
    let (server, pool) = server().await;
    pool.execute("INSERT INTO items(x, label) VALUES (1, 'O''Brien'), (2, 'plain')")
        .await
        .unwrap();
    create_endpoint(
        &server,
        json!({
            "path": "/items/by-label",
            "sql": "SELECT id, x, label FROM items WHERE label = {label}",
            "params": [{"key": "label", "source": "query", "type": "string", "required": true}]
        }),
    )
    .await;

    let res = call(&server, Method::Get, "/api/api-builder/items/by-label?label=O%27Brien", None).await;
    assert_eq!(res.status, 200, "{}", res.body);
    assert_eq!(
        res.json_body().unwrap(),
        json!({"columns": ["id", "x", "label"], "rows": [[1, 1, "O'Brien"]]})
    );

    let res = call(
        &server,
        Method::Get,
        "/api/api-builder/items/by-label?label=x%27%20OR%20%271%27%3D%271",
        None,
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json_body().unwrap()["rows"], json!([]));
}

#[tokio::test]
async fn test_path_capture_without_declarations() {
    let (server, pool) = server().await;
    pool.execute("INSERT INTO items(x) VALUES (10), (20)").await.unwrap();
    create_endpoint(
        &server,
        json!({"method": "get", "path": "/items/{id}", "sql": "SELECT x FROM items WHERE id = {id}"}),
    )
    .await;

    let res = call(&server, Method::Get, "/api/api-builder/items/2", None).await;
    assert_eq!(res.json_body().unwrap(), json!({"columns": ["x"], "rows": [[20]]}));
}

#[tokio::test]
async fn test_not_found_and_debug_trace() {
    let (server, _pool) = server().await;
    let id = create_endpoint(&server, json!({"path": "/items/{id}", "sql": "SELECT {id}"})).await;

    let res = call(&server, Method::Get, "/api/api-builder/other", None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.json_body().unwrap(), json!({"message": "Endpoint not found"}));

    let res = call(&server, Method::Get, "/api/api-builder/other?_dbg=true", None).await;
    assert_eq!(res.status, 404);
    let body = res.json_body().unwrap();
    assert_eq!(body["debug"]["requestedPath"], "/other");
    assert_eq!(body["debug"]["method"], "GET");
    assert_eq!(body["debug"]["trace"][0]["id"], id);
    assert_eq!(body["debug"]["trace"][0]["matched"], false);
}

#[tokio::test]
async fn test_extension_method_is_not_found() {
    let (server, _pool) = server().await;
    create_endpoint(&server, json!({"path": "/items", "sql": "SELECT 1"})).await;

    let res = call(&server, Method::Extension, "/api/api-builder/items", None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.json_body().unwrap(), json!({"message": "Endpoint not found"}));

    let res = call(&server, Method::Extension, "/api/endpoints", None).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_execution_failure_is_reported() {
    let (server, _pool) = server().await;
    create_endpoint(&server, json!({"path": "/broken", "sql": "SELECT * FROM missing_table"})).await;

    let res = call(&server, Method::Get, "/api/api-builder/broken", None).await;
    assert_eq!(res.status, 400);
    let body = res.json_body().unwrap();
    assert_eq!(body["message"], "Query failed");
    assert!(body["error"]["message"].as_str().unwrap().contains("missing_table"));
}

#[tokio::test]
async fn test_endpoint_catalog_crud() {
    let (server, _pool) = server().await;
    let id = create_endpoint(&server, json!({"path": "/a", "sql": "SELECT 1"})).await;

    let res = call(&server, Method::Get, &format!("/api/endpoints/{id}"), None).await;
    assert_eq!(res.json_body().unwrap()["path"], "/a");

    let res = call(
        &server,
        Method::Put,
        &format!("/api/endpoints/{id}"),
        Some(json!({"path": "/b", "sql": "SELECT 2"})),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json_body().unwrap()["path"], "/b");

    let res = call(&server, Method::Get, "/api/endpoints", None).await;
    assert_eq!(res.json_body().unwrap().as_array().map(Vec::len), Some(1));

    let res = call(&server, Method::Delete, &format!("/api/endpoints/{id}"), None).await;
    assert_eq!(res.json_body().unwrap()["id"], id);

    let res = call(&server, Method::Get, &format!("/api/endpoints/{id}"), None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.json_body().unwrap(), json!({"message": "Not found"}));
}

#[tokio::test]
async fn test_endpoint_validation() {
    let (server, _pool) = server().await;
    let res = call(
        &server,
        Method::Post,
        "/api/endpoints",
        Some(json!({"method": "FETCH", "path": "/x/{bad-token}"})),
    )
    .await;
    assert_eq!(res.status, 400);
    let body = res.json_body().unwrap();
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn test_sql_runner() {
    let (server, _pool) = server().await;

    let res = call(&server, Method::Post, "/api/sql-functions/run", Some(json!({"sql": "  "}))).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.json_body().unwrap()["message"], "Missing sql in request body");

    let res = call(
        &server,
        Method::Post,
        "/api/sql-functions/run",
        Some(json!({"sql": "INSERT INTO items(x) VALUES (7)"})),
    )
    .await;
    assert_eq!(res.json_body().unwrap(), json!({"result": 1}));

    let res = call(
        &server,
        Method::Post,
        "/api/sql-functions/run",
        Some(json!({"sql": "select x from items"})),
    )
    .await;
    assert_eq!(res.json_body().unwrap(), json!({"columns": ["x"], "rows": [[7]]}));

    let res = call(
        &server,
        Method::Post,
        "/api/sql-functions/run",
        Some(json!({"sql": "UPDATE nowhere SET a = 1"})),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.json_body().unwrap()["message"], "Execution failed");
}

#[tokio::test]
async fn test_sql_function_catalog() {
    let (server, _pool) = server().await;

    let res = call(
        &server,
        Method::Post,
        "/api/sql-functions",
        Some(json!({"name": "big_items", "query": "CREATE VIEW big_items AS SELECT * FROM items WHERE x > 100"})),
    )
    .await;
    assert_eq!(res.status, 201, "{}", res.body);
    let id = res.json_body().unwrap()["id"].as_i64().unwrap();

    let res = call(
        &server,
        Method::Post,
        "/api/sql-functions",
        Some(json!({"name": "bad", "query": "CREATE VIEW bad AS SELEC"})),
    )
    .await;
    assert_eq!(res.status, 400);
    assert!(res.json_body().unwrap()["error"].is_string());

    let res = call(&server, Method::Get, "/api/sql-functions", None).await;
    assert_eq!(res.json_body().unwrap().as_array().map(Vec::len), Some(1));

    let res = call(&server, Method::Delete, &format!("/api/sql-functions/{id}"), None).await;
    assert_eq!(res.json_body().unwrap()["name"], "big_items");
}

#[tokio::test]
async fn test_request_id_and_payload_limit() {
    let pool = DatabasePool::connect_sqlite("sqlite::memory:", Some(1))
        .await
        .unwrap();
    catalog::ensure_schema(&pool).await.unwrap();
    let config = ServerConfig {
        max_body_size: 16,
        ..ServerConfig::default()
    };
    let server = Server::new(pool, config).unwrap();

    let mut headers = HashMap::new();
    headers.insert("x-request-id".to_string(), "req-1".to_string());
    let res = server.test_request(Method::Get, "/api/endpoints", headers, None).await;
    assert_eq!(res.header("x-request-id"), Some("req-1"));

    let res = call(&server, Method::Get, "/api/endpoints", None).await;
    assert!(res.header("x-request-id").is_some());

    let res = call(
        &server,
        Method::Post,
        "/api/sql-functions/run",
        Some(json!({"sql": "SELECT 'this body is too long'"})),
    )
    .await;
    assert_eq!(res.status, 413);
}
