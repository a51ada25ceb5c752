//! # JSON Module
//!
//! JSON parsing using simd-json, serialization using serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Parse a JSON string to a typed value using simd-json
///
/// # Errors
///
/// Returns `Error::BadRequest` if parsing fails.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes in place using simd-json
///
/// The buffer is used as scratch space and is left modified.
///
/// # Errors
///
/// Returns `Error::BadRequest` if parsing fails.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Decode a request body into the object that body-sourced parameters read
///
/// Empty, non-JSON and non-object bodies decode to an empty object.
#[must_use]
pub fn decode_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }
    let mut scratch = body.to_vec();
    match parse_json_bytes::<Value>(&mut scratch) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => Value::Object(Map::new()),
    }
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct RunRequest {
        sql: String,
    }

    #[test]
    fn test_parse_json_object() {
        let req: RunRequest = parse_json(r#"{"sql": "SELECT 1"}"#).unwrap();
        assert_eq!(req.sql, "SELECT 1");
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<RunRequest> = parse_json("not valid json");
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(br#"{"x": 5, "name": "a"}"#), json!({"x": 5, "name": "a"}));
        assert_eq!(decode_body(b""), json!({}));
        assert_eq!(decode_body(b"  \n"), json!({}));
        assert_eq!(decode_body(b"x=5"), json!({}));
        assert_eq!(decode_body(b"[1, 2]"), json!({}));
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&json!({"result": 1})).unwrap();
        assert_eq!(json, r#"{"result":1}"#);
    }
}
