//! Host value model and AttributeValue conversions.
//!
//! This module handles the conversion between plain host values and
//! DynamoDB `AttributeValue` types, in both directions, plus a
//! serde_json bridge for document-style items.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::errors::Error;

/// One stored record: a string-keyed attribute map, as the SDK expects it.
pub type Item = HashMap<String, AttributeValue>;

/// One stored record as ordered attribute pairs. Unlike [`Item`], a row
/// keeps a deterministic attribute order, which tabular extraction
/// relies on for its column ordering.
pub type Row = Vec<(String, AttributeValue)>;

/// A plain host value, one step removed from the wire representation.
///
/// Numbers are kept in their decimal-string form; callers parse them to a
/// concrete numeric type via [`FromValue`] when they need one. `Map`
/// preserves insertion order, which matters for column ordering in
/// tabular extraction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Binary(Vec<u8>),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<Vec<u8>>),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Build a number value from anything numeric.
    pub fn number(n: impl ToString) -> Self {
        Value::Number(n.to_string())
    }

    /// True if this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Convert a host value to a DynamoDB AttributeValue.
///
/// This is a total function: every `Value` maps to exactly one variant.
/// Scalars map directly; lists and maps recurse structurally.
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.clone()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Binary(b) => AttributeValue::B(Blob::new(b.clone())),
        Value::StringSet(ss) => AttributeValue::Ss(ss.clone()),
        Value::NumberSet(ns) => AttributeValue::Ns(ns.clone()),
        Value::BinarySet(bs) => {
            AttributeValue::Bs(bs.iter().map(|b| Blob::new(b.clone())).collect())
        }
        Value::List(list) => AttributeValue::L(list.iter().map(to_attribute_value).collect()),
        Value::Map(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB AttributeValue back to a host value.
///
/// Variants are checked in a fixed order: null, string, number, boolean,
/// binary, string-set, number-set, binary-set, list, map. An attribute
/// with no recognized populated variant is a decoding error, never a
/// silent null.
pub fn from_attribute_value(value: &AttributeValue) -> Result<Value, Error> {
    match value {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => Ok(Value::Number(n.clone())),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::B(b) => Ok(Value::Binary(b.as_ref().to_vec())),
        AttributeValue::Ss(ss) => Ok(Value::StringSet(ss.clone())),
        AttributeValue::Ns(ns) => Ok(Value::NumberSet(ns.clone())),
        AttributeValue::Bs(bs) => Ok(Value::BinarySet(
            bs.iter().map(|b| b.as_ref().to_vec()).collect(),
        )),
        AttributeValue::L(list) => Ok(Value::List(
            list.iter()
                .map(from_attribute_value)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        AttributeValue::M(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (k, v) in map {
                entries.push((k.clone(), from_attribute_value(v)?));
            }
            Ok(Value::Map(entries))
        }
        _ => Err(Error::Decoding("Unsupported Attribute type".to_string())),
    }
}

// ============================================================================
// Scalar conversions
// ============================================================================

/// Coercion from a decoded [`Value`] to a concrete scalar type.
///
/// Coercion always goes through the string/number-string form: a number
/// attribute parses via the target type's own string-parsing rule, and a
/// string attribute holding digits coerces to a numeric type the same way.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::String(s) | Value::Number(s) => Ok(s),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(Error::Decoding(format!("expected string, got {:?}", other))),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::Decoding(format!("invalid boolean: {}", s))),
            other => Err(Error::Decoding(format!("expected boolean, got {:?}", other))),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Binary(b) => Ok(b),
            other => Err(Error::Decoding(format!("expected binary, got {:?}", other))),
        }
    }
}

impl FromValue for chrono::DateTime<chrono::Utc> {
    fn from_value(value: Value) -> Result<Self, Error> {
        let s = String::from_value(value)?;
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| Error::Decoding(format!("invalid datetime '{}': {}", s, e)))
    }
}

macro_rules! from_value_number {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, Error> {
                    match value {
                        Value::Number(s) | Value::String(s) => s.parse().map_err(|_| {
                            Error::Decoding(format!(
                                "invalid {}: {}",
                                stringify!($ty),
                                s
                            ))
                        }),
                        other => Err(Error::Decoding(format!(
                            "expected number, got {:?}",
                            other
                        ))),
                    }
                }
            }
        )*
    };
}

from_value_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Value::String(dt.to_rfc3339())
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n.to_string())
                }
            }
        )*
    };
}

value_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

// ============================================================================
// serde_json bridge
// ============================================================================

/// Convert a JSON value to a host value.
///
/// JSON has no binary or set forms, so the result only uses the null,
/// boolean, number, string, list, and map variants.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.to_string()),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(value_from_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), value_from_json(v)))
                .collect(),
        ),
    }
}

/// Convert a host value to JSON. Binary values and binary sets are
/// base64-encoded; string and number sets become arrays.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => match serde_json::from_str::<serde_json::Number>(n) {
            Ok(num) => serde_json::Value::Number(num),
            Err(_) => serde_json::Value::String(n.clone()),
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Binary(b) => serde_json::Value::String(BASE64.encode(b)),
        Value::StringSet(ss) => serde_json::Value::Array(
            ss.iter()
                .map(|s| serde_json::Value::String(s.clone()))
                .collect(),
        ),
        Value::NumberSet(ns) => serde_json::Value::Array(
            ns.iter()
                .map(|n| value_to_json(&Value::Number(n.clone())))
                .collect(),
        ),
        Value::BinarySet(bs) => serde_json::Value::Array(
            bs.iter()
                .map(|b| serde_json::Value::String(BASE64.encode(b)))
                .collect(),
        ),
        Value::List(list) => serde_json::Value::Array(list.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

/// Build an item from a JSON object. Any other JSON root is an encoding
/// error naming the unsupported shape.
pub fn item_from_json(json: &serde_json::Value) -> Result<Item, Error> {
    let map = json.as_object().ok_or_else(|| {
        Error::Encoding(format!("expected a JSON object, got {}", json_kind(json)))
    })?;

    Ok(map
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute_value(&value_from_json(v))))
        .collect())
}

/// Convert an item back to a JSON object.
pub fn item_to_json(item: &Item) -> Result<serde_json::Value, Error> {
    let mut map = serde_json::Map::with_capacity(item.len());
    for (k, v) in item {
        map.insert(k.clone(), value_to_json(&from_attribute_value(v)?));
    }
    Ok(serde_json::Value::Object(map))
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
