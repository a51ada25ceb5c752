//! # Fixed Route Table
//!
//! Radix-trie routing using `matchit` for the static management surface:
//! endpoint catalog CRUD, SQL-function CRUD, the ad-hoc runner, and the
//! catch-all prefix that hands requests to dynamic dispatch.
//!
//! Dynamic endpoint matching itself lives in [`crate::selector`]; it cannot use
//! a trie because its ordering rule is part of observable behavior.

use crate::error::{Error, Result};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
    /// Any non-standard method; only the dynamic prefix accepts it
    Extension,
}

impl Method {
    /// Every standard method
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Head,
        Self::Options,
    ];

    /// Parse a method name (case-insensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Map a hyper method
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Self {
        Self::from_name(method.as_str()).unwrap_or(Self::Extension)
    }

    /// Upper-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Extension => "EXTENSION",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations reachable through the fixed route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `GET /api/endpoints`
    ListEndpoints,
    /// `GET /api/endpoints/{id}`
    GetEndpoint,
    /// `POST /api/endpoints`
    CreateEndpoint,
    /// `PUT /api/endpoints/{id}`
    UpdateEndpoint,
    /// `DELETE /api/endpoints/{id}`
    DeleteEndpoint,
    /// `GET /api/sql-functions`
    ListFunctions,
    /// `GET /api/sql-functions/{id}`
    GetFunction,
    /// `POST /api/sql-functions`
    CreateFunction,
    /// `PUT /api/sql-functions/{id}`
    UpdateFunction,
    /// `DELETE /api/sql-functions/{id}`
    DeleteFunction,
    /// `POST /api/sql-functions/run`
    RunSql,
    /// Any method under the dynamic prefix
    Dispatch,
}

/// Matched route with extracted path parameters
#[derive(Debug)]
pub struct Match<'a> {
    /// The matched operation
    pub route: Route,
    /// Extracted path parameters
    pub params: HashMap<&'a str, &'a str>,
}

impl<'a> Match<'a> {
    /// Get a path parameter parsed as a catalog id
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when the parameter is absent or not an integer.
    pub fn id(&self) -> Result<i64> {
        self.params
            .get("id")
            .and_then(|raw| raw.parse::<i64>().ok())
            .ok_or(Error::NotFound)
    }

    /// Remainder of the path below the dynamic prefix
    #[must_use]
    pub fn rest(&self) -> &'a str {
        self.params.get("rest").copied().unwrap_or("")
    }
}

/// Route table keyed by method
#[derive(Clone)]
pub struct Router {
    method_routes: HashMap<Method, MatchitRouter<Route>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            method_routes: HashMap::new(),
        }
    }

    /// Build the management surface with dynamic dispatch under `prefix`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the prefix conflicts with a
    /// management route.
    pub fn with_api(prefix: &str) -> Result<Self> {
        let mut router = Self::new();
        router.add_route(Method::Get, "/api/endpoints", Route::ListEndpoints)?;
        router.add_route(Method::Post, "/api/endpoints", Route::CreateEndpoint)?;
        router.add_route(Method::Get, "/api/endpoints/{id}", Route::GetEndpoint)?;
        router.add_route(Method::Put, "/api/endpoints/{id}", Route::UpdateEndpoint)?;
        router.add_route(Method::Delete, "/api/endpoints/{id}", Route::DeleteEndpoint)?;
        router.add_route(Method::Get, "/api/sql-functions", Route::ListFunctions)?;
        router.add_route(Method::Post, "/api/sql-functions", Route::CreateFunction)?;
        router.add_route(Method::Post, "/api/sql-functions/run", Route::RunSql)?;
        router.add_route(Method::Get, "/api/sql-functions/{id}", Route::GetFunction)?;
        router.add_route(Method::Put, "/api/sql-functions/{id}", Route::UpdateFunction)?;
        router.add_route(Method::Delete, "/api/sql-functions/{id}", Route::DeleteFunction)?;

        let prefix = prefix.trim_end_matches('/');
        for method in Method::ALL.into_iter().chain([Method::Extension]) {
            router.add_route(method, prefix, Route::Dispatch)?;
            router.add_route(method, &format!("{prefix}/{{*rest}}"), Route::Dispatch)?;
        }
        Ok(router)
    }

    /// Register a route with the given method and path pattern
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing one.
    pub fn add_route(&mut self, method: Method, path: &str, route: Route) -> Result<()> {
        self.method_routes
            .entry(method)
            .or_insert_with(MatchitRouter::new)
            .insert(path, route)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route<'a>(&'a self, method: Method, path: &'a str) -> Result<Match<'a>> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
            debug: None,
        };

        let matched = self
            .method_routes
            .get(&method)
            .ok_or_else(not_found)?
            .at(path)
            .map_err(|_| not_found())?;

        Ok(Match {
            route: *matched.value,
            params: matched.params.iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> Router {
        Router::with_api("/api/api-builder").unwrap()
    }

    #[test]
    fn test_method_from_name() {
        assert_eq!(Method::from_name("get"), Some(Method::Get));
        assert_eq!(Method::from_name("PATCH"), Some(Method::Patch));
        assert_eq!(Method::from_name("FETCH"), None);
        assert_eq!(Method::from_name("extension"), None);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_method_from_hyper() {
        assert_eq!(Method::from_hyper(&hyper::Method::PUT), Method::Put);
        let purge = hyper::Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(Method::from_hyper(&purge), Method::Extension);
    }

    #[test]
    fn test_extension_method_reaches_dispatch_only() {
        let router = api();
        let m = router
            .match_route(Method::Extension, "/api/api-builder/cache/users")
            .unwrap();
        assert_eq!(m.route, Route::Dispatch);
        assert_eq!(m.rest(), "cache/users");
        assert!(router.match_route(Method::Extension, "/api/endpoints").is_err());
    }

    #[test]
    fn test_catalog_routes() {
        let router = api();

        let m = router.match_route(Method::Get, "/api/endpoints").unwrap();
        assert_eq!(m.route, Route::ListEndpoints);

        let m = router.match_route(Method::Put, "/api/endpoints/12").unwrap();
        assert_eq!(m.route, Route::UpdateEndpoint);
        assert_eq!(m.id().unwrap(), 12);
    }

    #[test]
    fn test_static_beats_param() {
        let router = api();
        let m = router.match_route(Method::Post, "/api/sql-functions/run").unwrap();
        assert_eq!(m.route, Route::RunSql);

        let m = router.match_route(Method::Get, "/api/sql-functions/run").unwrap();
        assert_eq!(m.route, Route::GetFunction);
        assert!(m.id().is_err());
    }

    #[test]
    fn test_dispatch_catch_all() {
        let router = api();
        for method in Method::ALL {
            let m = router
                .match_route(method, "/api/api-builder/users/42/posts")
                .unwrap();
            assert_eq!(m.route, Route::Dispatch);
            assert_eq!(m.rest(), "users/42/posts");
        }

        let m = router.match_route(Method::Get, "/api/api-builder").unwrap();
        assert_eq!(m.route, Route::Dispatch);
        assert_eq!(m.rest(), "");
    }

    #[test]
    fn test_route_not_found() {
        let router = api();
        assert!(router.match_route(Method::Get, "/nonexistent").is_err());
    }

    #[test]
    fn test_method_not_allowed() {
        let router = api();
        let result = router.match_route(Method::Patch, "/api/endpoints");
        assert!(result.is_err());
    }
}
