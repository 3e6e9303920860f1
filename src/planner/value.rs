//! Field values carried by planned changes.
//!
//! Resource-type planners describe the fields of a change as a map of
//! [`Value`]s. Forward references are a first-class variant so the resolver
//! and the serializer can match on them instead of sniffing strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::reference::RefPlaceholder;

/// Field name to value map of a change. Ordered for deterministic output.
pub type FieldMap = BTreeMap<String, Value>;

/// A field value.
///
/// Serializes to plain JSON; references become `__REF__:<ref>#<field>` strings
/// and are recognised again on the way back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// Explicitly cleared value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(serde_json::Number),
    /// String value.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested object.
    Map(BTreeMap<String, Value>),
    /// Forward reference to another declarative resource.
    Reference(RefPlaceholder),
}

impl Value {
    /// Returns the string content, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the placeholder, if this is a forward reference.
    #[must_use]
    pub const fn as_reference(&self) -> Option<&RefPlaceholder> {
        match self {
            Self::Reference(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    /// Returns true for an explicitly cleared value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Looks up a nested value by dot-separated path (`"config.auth.type"`).
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Self> {
        path.split('.').try_fold(self, |current, segment| match current {
            Self::Map(map) => map.get(segment),
            _ => None,
        })
    }

    /// Renders scalar values as plain strings; composite values as JSON.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::Reference(placeholder) => placeholder.to_string(),
            Self::List(_) | Self::Map(_) => serde_json::Value::from(self.clone()).to_string(),
        }
    }
}

/// Looks up a value in a field map by dot-separated path.
#[must_use]
pub fn field_at_path<'a>(fields: &'a FieldMap, path: &str) -> Option<&'a Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = fields.get(head)?;
    match rest {
        Some(rest) => value.get_path(rest),
        None => Some(value),
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => {
                RefPlaceholder::parse(&s).map_or(Self::String(s), Self::Reference)
            }
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Reference(placeholder) => Self::String(placeholder.to_string()),
            Value::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
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

impl From<RefPlaceholder> for Value {
    fn from(value: RefPlaceholder) -> Self {
        Self::Reference(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, Self::String(v))).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

/// A field that distinguishes "not specified" from "explicitly cleared".
///
/// Deserializes a missing key as [`Nullable::Absent`] (requires
/// `#[serde(default)]` at the field site), `null` as [`Nullable::Null`], and
/// anything else as [`Nullable::Value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nullable<T> {
    /// The field was not specified.
    Absent,
    /// The field was explicitly cleared.
    Null,
    /// The field has a value.
    Value(T),
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Nullable<T> {
    /// Returns true if the field was not specified.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the value, if present.
    #[must_use]
    pub const fn as_option(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Null => None,
        }
    }

    /// Converts to a field value: `None` when absent, [`Value::Null`] when cleared.
    #[must_use]
    pub fn to_field_value(&self, convert: impl FnOnce(&T) -> Value) -> Option<Value> {
        match self {
            Self::Absent => None,
            Self::Null => Some(Value::Null),
            Self::Value(v) => Some(convert(v)),
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent | Self::Null => serializer.serialize_none(),
            Self::Value(v) => serializer.serialize_some(v),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Value))
    }
}
