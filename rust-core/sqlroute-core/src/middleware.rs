//! # Middleware System
//!
//! Request/response interception for logging and CORS.
//!
//! Middlewares run in registration order before the handler and in reverse
//! order after it. Any middleware may short-circuit with its own response.

use crate::request::ApiRequest;
use crate::router::Method;
use crate::server::ApiResponse;
use std::sync::Arc;
use tracing::info;

/// Middleware trait for request/response interception
pub trait Middleware: Send + Sync {
    /// Called before the request handler
    ///
    /// Can return early with a response.
    fn before_request(&self, _req: &ApiRequest) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the request handler
    ///
    /// Can modify the response or perform logging.
    fn after_response(&self, _req: &ApiRequest, _res: &mut ApiResponse) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(ApiResponse),
}

/// Middleware chain for processing requests
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Execute `before_request` for all middlewares
    pub fn run_before(&self, req: &ApiRequest) -> MiddlewareResult {
        for mw in &self.middlewares {
            match mw.before_request(req) {
                MiddlewareResult::Continue => continue,
                result => return result,
            }
        }
        MiddlewareResult::Continue
    }

    /// Execute `after_response` for all middlewares (in reverse order)
    pub fn run_after(&self, req: &ApiRequest, res: &mut ApiResponse) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Names of the registered middlewares, in order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Logging middleware - structured request/response events
#[derive(Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn before_request(&self, req: &ApiRequest) -> MiddlewareResult {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = req.method_name(),
            path = %req.path,
            request_id = %request_id,
            "Request received"
        );
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &ApiRequest, res: &mut ApiResponse) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = req.method_name(),
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// CORS middleware - adds Cross-Origin Resource Sharing headers and answers
/// preflight requests
#[derive(Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization, X-Request-Id".to_string(),
        }
    }
}

impl CorsMiddleware {
    /// Create a new CORS middleware with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Set allowed headers
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }

    /// Get the Access-Control-Allow-Origin header value
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl Middleware for CorsMiddleware {
    fn before_request(&self, req: &ApiRequest) -> MiddlewareResult {
        if req.method == Method::Options && req.header("access-control-request-method").is_some() {
            return MiddlewareResult::Respond(ApiResponse::empty(204));
        }
        MiddlewareResult::Continue
    }

    fn after_response(&self, _req: &ApiRequest, res: &mut ApiResponse) {
        res.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
    }

    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }
}
