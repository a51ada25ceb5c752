//! # Parameter Resolver
//!
//! Builds the per-request value map in two phases:
//!
//! 1. [`resolve`] gathers raw values from path captures and each declaration's
//!    source, applies defaults and required-ness, and normalizes them
//!    (first element of arrays, lenient URL-decoding and trimming).
//! 2. [`type_values`] turns raw values into [`ParamValue`]s, either by
//!    declared coercion or, for endpoints with no declarations, by heuristic
//!    inference on the tokens the SQL template uses.

use crate::endpoint::{EndpointDefinition, ParamSource};
use crate::error::{Error, Result};
use crate::template::extract_tokens;
use crate::types::{coerce, coerce_heuristic, ParamValue};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::HashMap;

/// Raw values keyed by parameter name
pub type RawValues = HashMap<String, Value>;

/// Typed values keyed by parameter name
pub type TypedValues = HashMap<String, ParamValue>;

/// Request-side lookups used by the resolver
pub trait ValueSource {
    /// Query string value; repeated keys yield an array
    fn query(&self, key: &str) -> Option<Value>;

    /// Top-level field of the decoded body
    fn body(&self, key: &str) -> Option<Value>;

    /// Header value by exact name, then lower-cased name
    fn header(&self, key: &str) -> Option<Value>;
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// URL-decode, returning the input unchanged if the result is not UTF-8
#[must_use]
pub fn safe_decode(s: &str) -> String {
    percent_decode_str(s)
        .decode_utf8()
        .map_or_else(|_| s.to_string(), std::borrow::Cow::into_owned)
}

/// Reduce arrays to their first element and decode/trim strings
///
/// Returns `None` for an empty array.
#[must_use]
pub fn normalize_raw_value(value: Value) -> Option<Value> {
    let value = match value {
        Value::Array(items) => items.into_iter().next()?,
        other => other,
    };
    Some(match value {
        Value::String(s) => Value::String(safe_decode(&s).trim().to_string()),
        other => other,
    })
}

/// Gather raw values for a matched definition
///
/// # Errors
///
/// Returns `Error::MissingRequiredParameter` when a required declaration has
/// no value and no default.
pub fn resolve(
    definition: &EndpointDefinition,
    path_params: &HashMap<String, String>,
    source: &impl ValueSource,
) -> Result<RawValues> {
    let mut values: RawValues = path_params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    for decl in &definition.params {
        if values.contains_key(&decl.key) {
            continue;
        }

        let mut raw = match decl.source {
            ParamSource::Path => path_params.get(&decl.key).cloned().map(Value::String),
            ParamSource::Query => source.query(&decl.key),
            ParamSource::Body => source.body(&decl.key),
            ParamSource::Header => source.header(&decl.key),
        };
        if is_empty(raw.as_ref()) {
            if let Some(default) = &decl.default {
                raw = Some(default.clone());
            }
        }
        if is_empty(raw.as_ref()) && decl.required {
            return Err(Error::MissingRequiredParameter {
                key: decl.key.clone(),
            });
        }
        if let Some(raw) = raw {
            values.insert(decl.key.clone(), raw);
        }
    }

    Ok(values
        .into_iter()
        .filter_map(|(k, v)| normalize_raw_value(v).map(|v| (k, v)))
        .collect())
}

/// Convert raw values into typed values
///
/// Endpoints with declarations use declared coercion; endpoints without any
/// use heuristic inference.
///
/// # Errors
///
/// Returns `Error::MissingRequiredParameter` if normalization emptied a
/// required value, or `Error::InvalidCoercion` if a declared conversion fails.
pub fn type_values(definition: &EndpointDefinition, raw: RawValues) -> Result<TypedValues> {
    if definition.params.is_empty() {
        let sql = definition.sql.as_deref().unwrap_or_default();
        Ok(type_heuristic(sql, raw))
    } else {
        type_declared(definition, raw)
    }
}

/// Declared coercion
///
/// Declared keys without a value become `Null`; undeclared keys (such as
/// extra path captures) are kept as text.
///
/// # Errors
///
/// See [`type_values`].
pub fn type_declared(definition: &EndpointDefinition, mut raw: RawValues) -> Result<TypedValues> {
    let mut typed = TypedValues::with_capacity(raw.len());

    for decl in &definition.params {
        let value = raw.remove(&decl.key);
        let value = if is_empty(value.as_ref()) {
            if decl.required {
                return Err(Error::MissingRequiredParameter {
                    key: decl.key.clone(),
                });
            }
            match &decl.default {
                Some(default) => coerce(default, decl.param_type).map_err(|e| e.for_key(&decl.key))?,
                None => ParamValue::Null,
            }
        } else {
            let value = value.unwrap_or(Value::Null);
            coerce(&value, decl.param_type).map_err(|e| e.for_key(&decl.key))?
        };
        typed.insert(decl.key.clone(), value);
    }

    typed.extend(raw.into_iter().map(|(k, v)| (k, ParamValue::from_json(v))));
    Ok(typed)
}

/// Heuristic inference for endpoints without declarations
///
/// Only text values whose key appears as a token in `sql` are inferred;
/// everything else is lifted as-is.
#[must_use]
pub fn type_heuristic(sql: &str, raw: RawValues) -> TypedValues {
    let tokens = extract_tokens(sql);
    raw.into_iter()
        .map(|(k, v)| {
            let typed = match v {
                Value::String(s) if tokens.contains(&k) => coerce_heuristic(&s),
                other => ParamValue::from_json(other),
            };
            (k, typed)
        })
        .collect()
}
