//! # HTTP Server
//!
//! HTTP server built on Hyper and Tokio.
//! Implements graceful shutdown with signal handling.
//!
//! ## Key Features
//!
//! - Fixed management routes (endpoint and SQL-function catalogs, ad-hoc
//!   runner) and a catch-all prefix served by the dispatch [`Engine`]
//! - Request ids generated or echoed through `x-request-id`
//! - Domain failures answered with their own status and JSON body
//! - Graceful shutdown on Ctrl-C with a bounded drain of open connections

use crate::catalog::{self, SqlFunctionInput};
use crate::database::DatabasePool;
use crate::dispatch::Engine;
use crate::endpoint::EndpointInput;
use crate::error::{Error, Result};
use crate::executor;
use crate::json::{parse_json, to_json};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::request::ApiRequest;
use crate::router::{Match, Method, Route, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Default mount point of dynamic endpoints
pub const DEFAULT_API_PREFIX: &str = "/api/api-builder";

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Path prefix under which dynamic endpoints are served
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

/// HTTP response produced by handlers and middleware
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl ApiResponse {
    /// JSON response with the given status
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            ..Self::default()
        }
    }

    /// 200 response serializing `value`
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `value` cannot be serialized.
    pub fn ok<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            body: to_json(value)?,
            ..Self::default()
        })
    }

    /// Response with no body
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Response for a failed request
    #[must_use]
    pub fn from_error(err: &Error) -> Self {
        if err.is_domain() {
            debug!(status = err.status_code(), error = %err, "Request rejected");
        } else {
            error!(error = %err, "Request failed");
        }
        Self::json(err.status_code(), &err.to_body())
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Header value by exact name
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` if the body is not JSON.
    pub fn json_body(&self) -> Result<Value> {
        parse_json(&self.body)
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder().status(status);
        if !self.body.is_empty() {
            builder = builder.header("Content-Type", &self.content_type);
        }
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder.body(Full::new(Bytes::from(self.body))).unwrap_or_else(|e| {
            error!(error = %e, "Failed to build response");
            let mut fallback = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

/// Shared state handed to every connection
#[derive(Clone)]
struct App {
    router: Router,
    pool: DatabasePool,
    engine: Engine,
    middleware: MiddlewareChain,
}

/// HTTP server for the endpoint catalog and dynamic dispatch
pub struct Server {
    config: ServerConfig,
    app: App,
}

impl Server {
    /// Create a server over `pool`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the API prefix collides with a
    /// management route.
    pub fn new(pool: DatabasePool, config: ServerConfig) -> Result<Self> {
        let router = Router::with_api(&config.api_prefix)?;
        let engine = Engine::new(Arc::new(pool.clone()));
        Ok(Self {
            config,
            app: App {
                router,
                pool,
                engine,
                middleware: MiddlewareChain::new(),
            },
        })
    }

    /// Server configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.app.middleware.add(middleware);
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound, or
    /// `Error::Io` if accepting connections fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        info!(address = %addr, prefix = %self.config.api_prefix, "Server listening");

        let app = Arc::new(self.app.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let app = app.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let app = app.clone();
                            async move { handle_request(req, &app, remote_addr, max_body_size).await }
                        });
                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!(remote = %remote_addr, error = %err, "Error serving connection");
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            info!(
                open_connections = active.load(Ordering::Relaxed),
                "Shutdown timeout reached, closing remaining connections"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    ///
    /// `path` may carry a query string.
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ApiResponse {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return ApiResponse::from_error(&Error::PayloadTooLarge {
                    limit: self.config.max_body_size,
                    actual: b.len(),
                });
            }
        }
        let mut req = ApiRequest::new(method, path, headers, body);
        process_request(&mut req, &self.app).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

/// Core request processing logic (network agnostic)
async fn process_request(req: &mut ApiRequest, app: &App) -> ApiResponse {
    if req.header("x-request-id").is_none() {
        req.set_header("x-request-id", &generate_request_id());
    }
    let req: &ApiRequest = req;

    let mut response = match app.middleware.run_before(req) {
        MiddlewareResult::Continue => match app.router.match_route(req.method, &req.path) {
            Ok(matched) => route_request(app, &matched, req)
                .await
                .unwrap_or_else(|e| ApiResponse::from_error(&e)),
            Err(e) => ApiResponse::from_error(&e),
        },
        MiddlewareResult::Respond(resp) => resp,
    };

    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    app.middleware.run_after(req, &mut response);
    response
}

/// Decode the request body into a catalog payload
fn input<T: DeserializeOwned>(req: &ApiRequest) -> Result<T> {
    serde_json::from_value(req.body_json().clone())
        .map_err(|e| Error::BadRequest(format!("Invalid request body: {e}")))
}

async fn route_request(app: &App, matched: &Match<'_>, req: &ApiRequest) -> Result<ApiResponse> {
    let pool = &app.pool;
    match matched.route {
        Route::ListEndpoints => ApiResponse::ok(&catalog::list_endpoints(pool).await?),
        Route::GetEndpoint => ApiResponse::ok(&catalog::get_endpoint(pool, matched.id()?).await?),
        Route::CreateEndpoint => {
            let input: EndpointInput = input(req)?;
            Ok(ApiResponse::ok(&catalog::create_endpoint(pool, &input).await?)?.with_status(201))
        }
        Route::UpdateEndpoint => {
            let id = matched.id()?;
            let input: EndpointInput = input(req)?;
            ApiResponse::ok(&catalog::update_endpoint(pool, id, &input).await?)
        }
        Route::DeleteEndpoint => ApiResponse::ok(&catalog::delete_endpoint(pool, matched.id()?).await?),
        Route::ListFunctions => ApiResponse::ok(&catalog::list_functions(pool).await?),
        Route::GetFunction => ApiResponse::ok(&catalog::get_function(pool, matched.id()?).await?),
        Route::CreateFunction => {
            let input: SqlFunctionInput = input(req)?;
            Ok(ApiResponse::ok(&catalog::create_function(pool, &input).await?)?.with_status(201))
        }
        Route::UpdateFunction => {
            let id = matched.id()?;
            let input: SqlFunctionInput = input(req)?;
            ApiResponse::ok(&catalog::update_function(pool, id, &input).await?)
        }
        Route::DeleteFunction => ApiResponse::ok(&catalog::delete_function(pool, matched.id()?).await?),
        Route::RunSql => {
            let sql = req
                .body_json()
                .get("sql")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::BadRequest("Missing sql in request body".to_string()))?;
            ApiResponse::ok(&executor::execute(pool, sql).await?)
        }
        Route::Dispatch => {
            let path = format!("/{}", matched.rest());
            let outcome = app.engine.dispatch(req.method_name(), &path, req).await?;
            ApiResponse::ok(&outcome)
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    app: &App,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match ApiRequest::from_hyper_with_limit(req, max_body_size).await {
        Ok(mut api_request) => {
            debug!(remote = %remote_addr, path = %api_request.path, "Accepted request");
            process_request(&mut api_request, app).await
        }
        Err(e) => ApiResponse::from_error(&e),
    };
    Ok(response.into_hyper())
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
