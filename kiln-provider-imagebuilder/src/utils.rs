//! Helpers for moving values between attribute maps and API structs

use std::collections::HashMap;

use kiln_core::resource::Value;

/// String attribute, if set and non-empty
pub fn get_string(attributes: &HashMap<String, Value>, key: &str) -> Option<String> {
    match attributes.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub fn get_bool(attributes: &HashMap<String, Value>, key: &str) -> Option<bool> {
    attributes.get(key).and_then(Value::as_bool)
}

pub fn get_int(attributes: &HashMap<String, Value>, key: &str) -> Option<i64> {
    attributes.get(key).and_then(Value::as_int)
}

/// Items of a nested block attribute
pub fn block_items<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> Vec<&'a HashMap<String, Value>> {
    match attributes.get(key) {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Map(fields) => Some(fields),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// First item of a nested block attribute (for blocks limited to one item)
pub fn first_block<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> Option<&'a HashMap<String, Value>> {
    block_items(attributes, key).into_iter().next()
}

/// Insert a string attribute when present
pub fn set_string(attributes: &mut HashMap<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        attributes.insert(key.to_string(), Value::String(v));
    }
}

pub fn set_bool(attributes: &mut HashMap<String, Value>, key: &str, value: Option<bool>) {
    if let Some(v) = value {
        attributes.insert(key.to_string(), Value::Bool(v));
    }
}

/// Wrap a map as a single-item block
pub fn single_block(fields: HashMap<String, Value>) -> Value {
    Value::List(vec![Value::Map(fields)])
}

/// Fresh idempotency token for a create call
pub fn client_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
