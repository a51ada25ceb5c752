//! # Candidate Selector
//!
//! Picks the endpoint definition that serves a request.
//!
//! Eligible definitions (same method, absent method compared as `GET`) are
//! ordered by descending length of their normalized path template, ties kept
//! in catalog order, and tried in that order. The first matcher that accepts
//! the normalized request path wins.
//!
//! Template length is a coarse specificity proxy: a long literal template can
//! lose to a shorter template with more placeholders, and vice versa. The
//! ordering is kept as-is for compatibility with existing catalogs.

use crate::endpoint::EndpointDefinition;
use crate::template::compile_matcher;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Normalize a request path or path template
///
/// Ensures a single leading slash, collapses repeated slashes and strips one
/// trailing slash unless the path is the root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// An eligible definition with its normalized template
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Catalog definition
    pub definition: &'a EndpointDefinition,
    /// Normalized path template
    pub template: String,
}

/// Method-filtered definitions in match order
///
/// Sorting is stable, so equal-length templates stay in catalog order.
#[must_use]
pub fn order_candidates<'a>(method: &str, definitions: &'a [EndpointDefinition]) -> Vec<Candidate<'a>> {
    let method = method.to_uppercase();
    let mut candidates: Vec<Candidate<'a>> = definitions
        .iter()
        .filter(|d| d.effective_method() == method)
        .map(|d| Candidate {
            definition: d,
            template: normalize_path(&d.path),
        })
        .collect();
    candidates.sort_by(|a, b| b.template.len().cmp(&a.template.len()));
    candidates
}

/// One attempted candidate, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Definition id
    pub id: i64,
    /// Normalized path template
    pub path: String,
    /// Compared method
    pub method: String,
    /// Compiled pattern, empty if compilation failed
    pub pattern: String,
    /// Whether the matcher accepted the request path
    pub matched: bool,
}

/// A matched definition and its path captures
#[derive(Debug, Clone)]
pub struct Selected<'a> {
    /// Matched definition
    pub definition: &'a EndpointDefinition,
    /// Captured path parameters (undecoded)
    pub path_params: HashMap<String, String>,
}

/// Result of a selection pass
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Normalized request path
    pub requested_path: String,
    /// Upper-cased request method
    pub method: String,
    /// The winner, if any
    pub selected: Option<Selected<'a>>,
    /// Candidates tried, in order
    pub trace: Vec<TraceEntry>,
}

impl Selection<'_> {
    /// Diagnostic payload for a "not found" response
    #[must_use]
    pub fn debug_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "requestedPath": self.requested_path,
            "method": self.method,
            "trace": self.trace,
        })
    }
}

/// Find the definition serving `method` + `raw_path`
#[must_use]
pub fn select<'a>(method: &str, raw_path: &str, definitions: &'a [EndpointDefinition]) -> Selection<'a> {
    let requested_path = normalize_path(raw_path);
    let method = method.to_uppercase();
    let mut trace = Vec::new();
    let mut selected = None;

    for candidate in order_candidates(&method, definitions) {
        let id = candidate.definition.id;
        let matcher = match compile_matcher(&candidate.template) {
            Ok(m) => m,
            Err(e) => {
                warn!(endpoint_id = id, error = %e, "Skipping endpoint with invalid path template");
                trace.push(TraceEntry {
                    id,
                    path: candidate.template,
                    method: method.clone(),
                    pattern: String::new(),
                    matched: false,
                });
                continue;
            }
        };

        let captures = matcher.captures(&requested_path);
        debug!(
            endpoint_id = id,
            template = %candidate.template,
            pattern = matcher.pattern(),
            matched = captures.is_some(),
            "Tried candidate"
        );
        trace.push(TraceEntry {
            id,
            path: candidate.template,
            method: method.clone(),
            pattern: matcher.pattern().to_string(),
            matched: captures.is_some(),
        });

        if let Some(path_params) = captures {
            selected = Some(Selected {
                definition: candidate.definition,
                path_params,
            });
            break;
        }
    }

    Selection {
        requested_path,
        method,
        selected,
        trace,
    }
}
