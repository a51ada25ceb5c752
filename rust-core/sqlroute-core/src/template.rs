//! # Template Compiler
//!
//! Turns `{token}`-bearing path templates into anchored matchers with named
//! captures, and lists the tokens a SQL template references.
//!
//! Token syntax is `{identifier}` with identifier `[A-Za-z_][A-Za-z0-9_]*`.
//! Everything outside a token is matched literally.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Shared token pattern, compiled once
pub(crate) fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("token pattern is valid")
    })
}

/// Whether `name` is a valid token identifier
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compiled path template
///
/// Matches the entire normalized path; each token captures one segment of
/// non-slash characters.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathMatcher {
    /// Original template text
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Compiled pattern, e.g. `^/users/(?P<id>[^/]+)$`
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Capture names in template order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Match a normalized path, returning captured segments by name
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    /// Whether the path matches at all
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Compile a path template into a [`PathMatcher`]
///
/// Literal text is escaped, tokens become `[^/]+` named groups, and the
/// pattern is anchored at both ends.
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a token name repeats within the
/// template.
pub fn compile_matcher(template: &str) -> Result<PathMatcher> {
    let mut pattern = String::with_capacity(template.len() + 16);
    let mut names: Vec<String> = Vec::new();
    let mut last = 0;

    pattern.push('^');
    for caps in token_regex().captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if names.iter().any(|n| n == name) {
            return Err(Error::InvalidRoutePattern {
                pattern: template.to_string(),
                reason: format!("token '{name}' appears more than once"),
            });
        }
        pattern.push_str(&regex::escape(&template[last..whole.start()]));
        pattern.push_str(&format!("(?P<{name}>[^/]+)"));
        names.push(name.to_string());
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| Error::InvalidRoutePattern {
        pattern: template.to_string(),
        reason: e.to_string(),
    })?;

    Ok(PathMatcher {
        template: template.to_string(),
        regex,
        names,
    })
}

/// Tokens referenced by a template, in first-occurrence order, without
/// duplicates
#[must_use]
pub fn extract_tokens(template: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in token_regex().captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !out.iter().any(|n| n == name.as_str()) {
                out.push(name.as_str().to_string());
            }
        }
    }
    out
}
