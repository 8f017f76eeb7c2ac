//! Stored values and their text encoding.
//!
//! Values are kept in the store as text. Strings are written verbatim,
//! numbers as their decimal representation and records as compact JSON.
//!
//! # Read-side coercion
//!
//! When a read asks for structured parsing, every stored text is offered to
//! the JSON parser, whether or not it was written as a record:
//!
//! | stored text | decoded as |
//! |---|---|
//! | `{"a":1}`, `[1,2]` | [`Value::Record`] |
//! | `25` | [`Value::Integer`] |
//! | `2.5` | [`Value::Float`] |
//! | `"quoted"` | [`Value::Text`] without the quotes |
//! | anything else (`hello`, `true`, `null`) | [`Value::Text`], unchanged |
//!
//! So a string `"123"` written as text reads back as the integer `123`.
//! Callers that need the written type back use
//! [`CrudEngine::fetch_as`](crate::engine::CrudEngine::fetch_as) or read
//! with parsing disabled.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{KvError, KvResult};

/// A value held under a key
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    /// Structured record: a JSON mapping or sequence
    Record(serde_json::Value),
}

impl Value {
    /// Build a value from any serializable type.
    ///
    /// Mappings and sequences become records; scalars take the form a
    /// structured read would give them back as.
    pub fn record<T: Serialize + ?Sized>(value: &T) -> KvResult<Self> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(|e| KvError::serialization("<record>", e.to_string()))
    }

    /// Text form written to the store.
    pub fn encode(&self) -> KvResult<String> {
        match self {
            Value::Text(text) => Ok(text.clone()),
            Value::Integer(n) => Ok(n.to_string()),
            Value::Float(f) if !f.is_finite() => Err(KvError::serialization(
                "<float>",
                format!("non-finite number {} cannot be stored", f),
            )),
            Value::Float(f) => serde_json::to_string(f)
                .map_err(|e| KvError::serialization("<float>", e.to_string())),
            Value::Record(record) => serde_json::to_string(record)
                .map_err(|e| KvError::serialization("<record>", e.to_string())),
        }
    }

    /// Decode stored text. With `parse_structured` off the text is returned
    /// as-is; otherwise the coercion rules in the module docs apply.
    pub fn decode(raw: String, parse_structured: bool) -> Self {
        if !parse_structured {
            return Value::Text(raw);
        }

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(record @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                Value::Record(record)
            }
            Ok(serde_json::Value::Number(n)) => number(&n).unwrap_or(Value::Text(raw)),
            Ok(serde_json::Value::String(text)) => Value::Text(text),
            Ok(_) | Err(_) => Value::Text(raw),
        }
    }

    /// Decode stored text into a caller-declared type.
    ///
    /// JSON is tried first; plain text that is not valid JSON is offered to
    /// `T` as a JSON string so that `String` targets accept unquoted text.
    pub fn decode_as<T: DeserializeOwned>(key: &str, raw: &str) -> KvResult<T> {
        serde_json::from_str::<T>(raw).or_else(|json_err| {
            serde_json::from_value::<T>(serde_json::Value::String(raw.to_string()))
                .map_err(|_| KvError::serialization(key, json_err.to_string()))
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
}

// Integers beyond i64 have no exact numeric form and yield None
fn number(n: &serde_json::Number) -> Option<Value> {
    match (n.as_i64(), n.is_f64()) {
        (Some(i), _) => Some(Value::Integer(i)),
        (None, true) => n.as_f64().map(Value::Float),
        (None, false) => None,
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&String> for Value {
    fn from(text: &String) -> Self {
        Value::Text(text.clone())
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Integer(i64::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            record @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                Value::Record(record)
            }
            serde_json::Value::String(text) => Value::Text(text),
            serde_json::Value::Number(n) => {
                number(&n).unwrap_or_else(|| Value::Text(n.to_string()))
            }
            // Literals read back as their text
            other @ (serde_json::Value::Bool(_) | serde_json::Value::Null) => {
                Value::Text(other.to_string())
            }
        }
    }
}
