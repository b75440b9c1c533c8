//! Mapping between typed records and document values.
//!
//! [`NewValue`] is the shape of a value about to be written: the request
//! builder turns it into a make operation followed by the operations for its
//! contents. [`Schema`] converts typed records to and from that shape; every
//! serde-serializable type gets an implementation through `serde_json`.

use std::collections::BTreeMap;

use serde::{Serialize, de::DeserializeOwned};

use super::{Counter, SchemaError, Value};
use crate::op::{ObjType, ScalarValue};

/// A value to be written into the document.
#[derive(Debug, Clone, PartialEq)]
pub enum NewValue {
    Scalar(ScalarValue),
    Map(BTreeMap<String, NewValue>),
    Table(BTreeMap<String, NewValue>),
    List(Vec<NewValue>),
}

impl NewValue {
    /// An empty map.
    pub fn map() -> Self {
        NewValue::Map(BTreeMap::new())
    }

    /// An empty table.
    pub fn table() -> Self {
        NewValue::Table(BTreeMap::new())
    }

    /// An empty list.
    pub fn list() -> Self {
        NewValue::List(Vec::new())
    }

    /// A counter starting at `value`.
    pub fn counter(value: i64) -> Self {
        NewValue::Scalar(ScalarValue::Counter(value))
    }

    /// A timestamp in milliseconds since the Unix epoch.
    pub fn timestamp(millis: i64) -> Self {
        NewValue::Scalar(ScalarValue::Timestamp(millis))
    }

    /// Add a property to a map or table value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<NewValue>) -> Self {
        if let NewValue::Map(entries) | NewValue::Table(entries) = &mut self {
            entries.insert(key.into(), value.into());
        }
        self
    }

    pub fn obj_type(&self) -> Option<ObjType> {
        match self {
            NewValue::Scalar(_) => None,
            NewValue::Map(_) => Some(ObjType::Map),
            NewValue::Table(_) => Some(ObjType::Table),
            NewValue::List(_) => Some(ObjType::List),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NewValue::Scalar(value) => value.type_name(),
            NewValue::Map(_) => "map",
            NewValue::Table(_) => "table",
            NewValue::List(_) => "list",
        }
    }

    /// Convert a JSON value. Null object properties are treated as absent.
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => NewValue::Scalar(ScalarValue::Null),
            Json::Bool(b) => NewValue::Scalar(ScalarValue::Bool(*b)),
            Json::Number(n) => NewValue::Scalar(if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                ScalarValue::Uint(u)
            } else {
                ScalarValue::F64(n.as_f64().unwrap_or_default())
            }),
            Json::String(s) => NewValue::Scalar(ScalarValue::Str(s.clone())),
            Json::Array(items) => NewValue::List(items.iter().map(NewValue::from_json).collect()),
            Json::Object(props) => NewValue::Map(
                props
                    .iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (key.clone(), NewValue::from_json(value)))
                    .collect(),
            ),
        }
    }
}

macro_rules! scalar_new_value {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for NewValue {
                fn from(value: $ty) -> Self {
                    NewValue::Scalar(value.into())
                }
            }
        )+
    };
}

scalar_new_value!(ScalarValue, &str, String, i64, i32, u64, f64, bool);

impl From<Counter> for NewValue {
    fn from(counter: Counter) -> Self {
        NewValue::counter(counter.value())
    }
}

/// A typed record that can be stored in and read back from a document.
pub trait Schema: Sized {
    fn encode(&self) -> Result<NewValue, SchemaError>;

    fn decode(value: &Value) -> Result<Self, SchemaError>;
}

impl<T: Serialize + DeserializeOwned> Schema for T {
    fn encode(&self) -> Result<NewValue, SchemaError> {
        let json = serde_json::to_value(self).map_err(|e| SchemaError::Encode {
            type_name: std::any::type_name::<T>(),
            reason: e.to_string(),
        })?;
        Ok(NewValue::from_json(&json))
    }

    fn decode(value: &Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value.to_json()).map_err(|e| SchemaError::Decode {
            type_name: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }
}
