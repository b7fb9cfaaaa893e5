//! In-memory representation of a decoded pickle graph.

use std::borrow::Cow;
use std::mem;
use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};

use crate::reducers::Reduced;

/// A value produced by the unpickler.
///
/// Leaf variants come straight from opcodes; [`Value::Object`] is produced
/// by a reducer (or the unresolved placeholder) and always carries a
/// non-empty type name.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integers wider than 64 bits (`LONG`, `LONG1`, `LONG4`).
    BigInt(i128),
    Float(f64),
    Str(String),
    /// Byte payloads are shared, so memo back-references and array bodies
    /// never duplicate them.
    Bytes(Arc<[u8]>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Insertion-ordered mapping; keys are arbitrary values.
    Dict(Vec<(Value, Value)>),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    /// A `module.qualname` reference pushed by `GLOBAL`/`STACK_GLOBAL`.
    Global(String),
    Object(Box<Object>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Global(_) => "global",
            Value::Object(_) => "object",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::BigInt(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Raw bytes of a `bytes` value, or of a Python 2 `str` decoded as
    /// latin-1. Text containing code points above U+00FF has no byte form.
    pub fn as_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            Value::Bytes(b) => Some(Cow::Borrowed(&b[..])),
            Value::Str(s) => s
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect::<Option<Vec<u8>>>()
                .map(Cow::Owned),
            _ => None,
        }
    }

    /// Shared byte payload of a `bytes` value; latin-1 text is converted
    /// into a fresh buffer.
    pub fn to_shared_bytes(&self) -> Option<Arc<[u8]>> {
        match self {
            Value::Bytes(b) => Some(Arc::clone(b)),
            other => other.as_bytes().map(Arc::from),
        }
    }

    /// Elements of a list or tuple.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Looks up a string key in a dict value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Shape-like sequence of non-negative integers.
    pub fn as_shape(&self) -> Option<Vec<usize>> {
        self.as_sequence()?
            .iter()
            .map(|dim| dim.as_i64().and_then(|d| usize::try_from(d).ok()))
            .collect()
    }

    /// JSON rendering used for attribute display and schema comparison.
    ///
    /// Bytes become arrays of octets, objects become a map with a
    /// `__type__` key followed by their fields.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::None => JsonValue::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::BigInt(i) => JsonValue::String(i.to_string()),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::Global(name) => json!(name),
            Value::Bytes(b) => json!(&b[..]),
            Value::List(items)
            | Value::Tuple(items)
            | Value::Set(items)
            | Value::FrozenSet(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dict(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match key {
                        Value::Str(s) => s.clone(),
                        other => other.to_json().to_string(),
                    };
                    map.insert(key, value.to_json());
                }
                JsonValue::Object(map)
            }
            Value::Object(obj) => {
                let mut map = Map::new();
                map.insert("__type__".to_owned(), json!(obj.type_name));
                for (key, value) in obj.fields() {
                    map.insert(key, value.to_json());
                }
                JsonValue::Object(map)
            }
        }
    }
}

impl Value {
    /// Approximate memory owned by this value alone, excluding nested
    /// values and shared byte payloads.
    pub(crate) fn shallow_size(&self) -> usize {
        mem::size_of::<Value>()
            + match self {
                Value::Str(s) | Value::Global(s) => s.len(),
                Value::Object(obj) => mem::size_of::<Object>() + obj.type_name.len(),
                _ => 0,
            }
    }

    /// Appends the values nested directly inside this one to `out`.
    pub(crate) fn extend_children<'v>(&'v self, out: &mut Vec<&'v Value>) {
        match self {
            Value::List(items)
            | Value::Tuple(items)
            | Value::Set(items)
            | Value::FrozenSet(items) => out.extend(items),
            Value::Dict(entries) => out.extend(entries.iter().flat_map(|(k, v)| [k, v])),
            Value::Object(obj) => out.extend(obj.body.children()),
            _ => {}
        }
    }
}

/// A reconstructed object: a type name plus the reducer-specific body.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_name: String,
    pub body: Reduced,
}

impl Object {
    pub fn new(type_name: impl Into<String>, body: Reduced) -> Self {
        Self {
            type_name: type_name.into(),
            body,
        }
    }

    /// An object whose type name has no registered reducer.
    pub fn unresolved(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Reduced::Unresolved)
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.body, Reduced::Unresolved)
    }

    /// Field name/value view of the object, in declaration order.
    pub fn fields(&self) -> Vec<(String, Value)> {
        self.body.fields()
    }

    /// Looks up a single field by name.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
