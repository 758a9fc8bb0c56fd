//! JSON-like values with shared, copy-on-write containers.
//!
//! Objects and lists live behind an [`Arc`], so cloning a [`Value`] never
//! copies a container. Mutation goes through [`Value::set_path`], which uses
//! [`Arc::make_mut`]: a container is duplicated only while some other value
//! (typically the parent snapshot) still shares it, and repeated writes along
//! the same path reuse the copy made by the first one.
//!
//! [`Value::Absent`] stands for "no value here": a hole in a sparse list, or
//! a slot whose referenced node has no data. It is distinct from `Null`, is
//! treated as missing by every lookup, and never appears in serialized
//! output (holes serialize as `null`, absent object entries are omitted).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

use crate::schema::PathSegment;

/// Object payload of a [`Value`].
pub type ObjectMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Absent,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Arc<Vec<Value>>),
    Object(Arc<ObjectMap>),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Self::Object(Arc::default())
    }

    pub fn from_object(map: ObjectMap) -> Self {
        Self::Object(Arc::new(map))
    }

    pub fn from_list(items: Vec<Value>) -> Self {
        Self::List(Arc::new(items))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `null` or absent.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Null | Self::Absent)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Mutable access to an object's entries, detaching it from any sharers.
    pub fn as_object_mut(&mut self) -> Option<&mut ObjectMap> {
        match self {
            Self::Object(map) => Some(Arc::make_mut(map)),
            _ => None,
        }
    }

    /// Present value of an object entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()
            .and_then(|map| map.get(key))
            .filter(|value| !value.is_absent())
    }

    /// Whether an object has a present entry for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Present value at `path`, or `None` if any step is missing.
    pub fn get_path(&self, path: &[PathSegment]) -> Option<&Value> {
        let mut current = self;
        for segment in path {
            current = match (current, segment) {
                (Self::Object(map), PathSegment::Key(key)) => map.get(key)?,
                (Self::List(items), PathSegment::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        if current.is_absent() {
            None
        } else {
            Some(current)
        }
    }

    /// Sets `value` at `path`, creating (or replacing non-container) slots
    /// along the way. Lists are padded with [`Value::Absent`].
    pub fn set_path(&mut self, path: &[PathSegment], value: Value) {
        let Some((head, rest)) = path.split_first() else {
            *self = value;
            return;
        };

        match head {
            PathSegment::Key(key) => {
                let mut map = match std::mem::take(self) {
                    Self::Object(map) => map,
                    _ => Arc::default(),
                };
                Arc::make_mut(&mut map)
                    .entry(key.clone())
                    .or_default()
                    .set_path(rest, value);
                *self = Self::Object(map);
            }
            PathSegment::Index(index) => {
                let mut list = match std::mem::take(self) {
                    Self::List(list) => list,
                    _ => Arc::default(),
                };
                let items = Arc::make_mut(&mut list);
                if items.len() <= *index {
                    items.resize(index + 1, Self::Absent);
                }
                items[*index].set_path(rest, value);
                *self = Self::List(list);
            }
        }
    }

    /// Whether both values share the same container allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Absent => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Converts into a plain JSON value. Absent values become `null`
    /// (or are dropped, inside objects).
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Absent | Self::Null => JsonValue::Null,
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Number(value) => JsonValue::Number(value.clone()),
            Self::String(value) => JsonValue::String(value.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(map) => JsonValue::Object(
                map.iter()
                    .filter(|(_, value)| !value.is_absent())
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(value),
            JsonValue::Number(value) => Self::Number(value),
            JsonValue::String(value) => Self::String(value),
            JsonValue::Array(items) => {
                Self::from_list(items.into_iter().map(Value::from).collect())
            }
            JsonValue::Object(map) => Self::from_object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<ObjectMap> for Value {
    fn from(map: ObjectMap) -> Self {
        Self::from_object(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent | Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(value) => value.serialize(serializer),
            Self::String(value) => serializer.serialize_str(value),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(None)?;
                for (key, value) in map.iter().filter(|(_, value)| !value.is_absent()) {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Value::from)
    }
}
