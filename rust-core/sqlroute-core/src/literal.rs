//! # SQL Literal Formatter
//!
//! Renders typed values as SQL literals and substitutes them into statement
//! templates. Statements are built as text rather than bound as prepared
//! parameters, so [`format_literal`] is the only escaping step: every
//! substituted value, declared or inferred, goes through [`substitute`], which
//! calls it.

use crate::endpoint::EndpointDefinition;
use crate::params::TypedValues;
use crate::template::token_regex;
use crate::types::{parse_bool, parse_number, ParamType, ParamValue};
use regex::Captures;
use serde_json::Value;

/// SQL null literal
pub const NULL_LITERAL: &str = "NULL";

/// Single-quoted string literal with embedded quotes doubled
#[must_use]
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Render `value` as a SQL literal
///
/// `declared` selects the rendering; without it the value's own variant does.
/// Never fails: values that cannot honor the requested rendering fall back to
/// a quoted string.
#[must_use]
pub fn format_literal(value: &ParamValue, declared: Option<ParamType>) -> String {
    let Some(kind) = declared.or_else(|| value.natural_type()) else {
        return NULL_LITERAL.to_string();
    };
    if value.is_null() {
        return NULL_LITERAL.to_string();
    }

    match kind {
        ParamType::Number => match value {
            ParamValue::Number(n) => n.to_string(),
            other => parse_number(&other.as_text())
                .map_or_else(|| quote(&other.as_text()), |n| n.to_string()),
        },
        ParamType::Boolean => {
            let truthy = match value {
                ParamValue::Bool(b) => *b,
                other => parse_bool(&other.as_text()).unwrap_or(false),
            };
            String::from(if truthy { "TRUE" } else { "FALSE" })
        }
        ParamType::Json => match value {
            ParamValue::Json(Value::String(s)) => quote(s),
            ParamValue::Json(v) => quote(&v.to_string()),
            other => quote(&other.as_text()),
        },
        ParamType::String | ParamType::Date => quote(&value.as_text()),
    }
}

/// Replace every `{key}` token in `sql` with its formatted literal
///
/// Tokens are replaced in a single pass, so text inside a substituted literal
/// is never re-scanned. Tokens with no value are left verbatim.
#[must_use]
pub fn substitute(definition: &EndpointDefinition, sql: &str, values: &TypedValues) -> String {
    token_regex()
        .replace_all(sql, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let Some(key) = caps.get(1).map(|m| m.as_str()) else {
                return whole.to_string();
            };
            values.get(key).map_or_else(
                || whole.to_string(),
                |value| {
                    let declared = definition.declaration(key).map(|d| d.param_type);
                    format_literal(value, declared)
                },
            )
        })
        .into_owned()
}
