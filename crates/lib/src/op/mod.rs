//! Operation vocabulary shared by the request builder and the engine.
//!
//! An [`Op`] is one atomic mutation of one location. Operations are grouped
//! into a [`Request`] by a local mutation session; the engine turns a request
//! into a hashed change and reports it back as a [`Change`] when decoded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ElemId, ObjectId, OpId};

pub mod change;
pub mod request;

pub use change::Change;
pub use request::Request;

/// What an operation does at its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Set,
    Del,
    Inc,
    MakeMap,
    MakeList,
    MakeTable,
}

impl Action {
    /// The kind of object created by a make action.
    pub fn obj_type(&self) -> Option<ObjType> {
        match self {
            Action::MakeMap => Some(ObjType::Map),
            Action::MakeList => Some(ObjType::List),
            Action::MakeTable => Some(ObjType::Table),
            _ => None,
        }
    }

    pub fn is_make(&self) -> bool {
        self.obj_type().is_some()
    }
}

/// Kind of a composite object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjType {
    Map,
    Table,
    List,
}

impl ObjType {
    /// The action that creates an object of this kind.
    pub fn make_action(&self) -> Action {
        match self {
            ObjType::Map => Action::MakeMap,
            ObjType::Table => Action::MakeTable,
            ObjType::List => Action::MakeList,
        }
    }

    pub fn is_map_like(&self) -> bool {
        matches!(self, ObjType::Map | ObjType::Table)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjType::Map => "map",
            ObjType::Table => "table",
            ObjType::List => "list",
        }
    }
}

impl fmt::Display for ObjType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datatype annotation carried alongside a primitive value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Int,
    Uint,
    Float64,
    Counter,
    Timestamp,
}

/// A primitive value stored at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    F64(f64),
    Str(String),
    /// Initial value of a counter; increments accumulate on top of it
    Counter(i64),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
}

impl ScalarValue {
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            ScalarValue::Int(_) => Some(DataType::Int),
            ScalarValue::Uint(_) => Some(DataType::Uint),
            ScalarValue::F64(_) => Some(DataType::Float64),
            ScalarValue::Counter(_) => Some(DataType::Counter),
            ScalarValue::Timestamp(_) => Some(DataType::Timestamp),
            ScalarValue::Null | ScalarValue::Bool(_) | ScalarValue::Str(_) => None,
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, ScalarValue::Counter(_))
    }

    /// Integral view used for increment deltas.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(n) | ScalarValue::Counter(n) | ScalarValue::Timestamp(n) => Some(*n),
            ScalarValue::Uint(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "bool",
            ScalarValue::Int(_) => "int",
            ScalarValue::Uint(_) => "uint",
            ScalarValue::F64(_) => "float64",
            ScalarValue::Str(_) => "string",
            ScalarValue::Counter(_) => "counter",
            ScalarValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            ScalarValue::Null => Json::Null,
            ScalarValue::Bool(b) => Json::Bool(*b),
            ScalarValue::Int(n) | ScalarValue::Counter(n) | ScalarValue::Timestamp(n) => {
                Json::from(*n)
            }
            ScalarValue::Uint(n) => Json::from(*n),
            ScalarValue::F64(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            ScalarValue::Str(s) => Json::String(s.clone()),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("null"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Int(n) | ScalarValue::Counter(n) | ScalarValue::Timestamp(n) => {
                write!(f, "{n}")
            }
            ScalarValue::Uint(n) => write!(f, "{n}"),
            ScalarValue::F64(x) => write!(f, "{x}"),
            ScalarValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Str(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Str(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Int(n)
    }
}

impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self {
        ScalarValue::Int(n as i64)
    }
}

impl From<u64> for ScalarValue {
    fn from(n: u64) -> Self {
        ScalarValue::Uint(n)
    }
}

impl From<f64> for ScalarValue {
    fn from(x: f64) -> Self {
        ScalarValue::F64(x)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

/// Location of an operation within its object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Key {
    /// A property of a map or table
    Map(String),
    /// A list element; for insertions, the element to insert after
    Seq(ElemId),
}

impl Key {
    pub fn as_map(&self) -> Option<&str> {
        match self {
            Key::Map(key) => Some(key),
            Key::Seq(_) => None,
        }
    }

    pub fn as_elem(&self) -> Option<&ElemId> {
        match self {
            Key::Seq(elem) => Some(elem),
            Key::Map(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Map(key) => f.write_str(key),
            Key::Seq(elem) => elem.fmt(f),
        }
    }
}

/// A single operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Op {
    pub action: Action,
    pub obj: ObjectId,
    pub key: Key,
    /// Whether this op inserts a new list element after `key`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insert: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScalarValue>,
    /// Ids of the operations this one supersedes
    pub pred: Vec<OpId>,
}

impl Op {
    pub fn datatype(&self) -> Option<DataType> {
        self.value.as_ref().and_then(ScalarValue::datatype)
    }
}
