//! Utility functions for the Stacks agent server

use serde::de::DeserializeOwned;
use serde_json::{from_value, Map, Value};

use crate::error::ValidationError;
use crate::rpc::protocol::{error_codes, Response};

/// Helper function to extract a required argument from a JSON-RPC params object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Helper function to extract an optional argument, treating a wrong type as absent
pub fn get_optional_arg<T: DeserializeOwned>(args: &Value, key: &str) -> Option<T> {
    args.get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| from_value(v.clone()).ok())
}

/// `contractName` -> `contract_name`
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `contract_name` -> `contractName`
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Looks up a camelCase key, falling back to its snake_case spelling.
pub fn lookup<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key)
        .or_else(|| obj.get(&camel_to_snake(key)))
        .filter(|v| !v.is_null())
}

/// Required non-empty string field of a tool payload.
pub fn required_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, ValidationError> {
    match lookup(obj, key) {
        None => Err(ValidationError::missing(key)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ValidationError::new(key, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(s.trim()),
        Some(_) => Err(ValidationError::new(key, "expected a string")),
    }
}

/// Optional string field; present-but-wrong-type is an error.
pub fn optional_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match lookup(obj, key) {
        None => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ValidationError::new(key, "expected a string")),
    }
}

/// Optional array field, defaulting to empty.
pub fn optional_array(obj: &Map<String, Value>, key: &str) -> Result<Vec<Value>, ValidationError> {
    match lookup(obj, key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(ValidationError::new(key, "expected an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_case_conversions() {
        assert_eq!(camel_to_snake("postConditions"), "post_conditions");
        assert_eq!(snake_to_camel("clarity_version"), "clarityVersion");
    }

    #[test]
    fn lookup_accepts_both_spellings() {
        let obj = json!({ "contract_name": "pool", "functionName": "swap" });
        let obj = obj.as_object().unwrap();
        assert_eq!(required_str(obj, "contractName"), Ok("pool"));
        assert_eq!(required_str(obj, "functionName"), Ok("swap"));
        assert_eq!(
            required_str(obj, "recipient"),
            Err(ValidationError::missing("recipient"))
        );
    }

    #[test]
    fn wrong_types_are_reported_on_the_field() {
        let obj = json!({ "memo": 7, "args": "nope" });
        let obj = obj.as_object().unwrap();
        assert_eq!(optional_str(obj, "memo").unwrap_err().field, "memo");
        assert_eq!(optional_array(obj, "args").unwrap_err().field, "args");
        assert_eq!(optional_array(obj, "postConditions"), Ok(vec![]));
    }
}
