//! Typed read access to table objects.
//!
//! A table is a map from generated row ids to row maps. Rows added
//! concurrently by different replicas never collide because every row gets a
//! fresh UUID.

use std::{fmt, marker::PhantomData, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MapObject, Schema, SchemaError, Segment, Value};
use crate::ids::ObjectId;

/// Primary key of a table row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Generate a fresh row id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RowId> for Segment {
    fn from(id: RowId) -> Self {
        Segment::Key(id.0)
    }
}

impl From<&RowId> for Segment {
    fn from(id: &RowId) -> Self {
        Segment::Key(id.0.clone())
    }
}

/// A decoded table row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    pub id: RowId,
    pub value: T,
}

/// Read-only typed view of a table object.
#[derive(Debug, Clone)]
pub struct Table<T> {
    object: Arc<MapObject>,
    _row: PhantomData<fn() -> T>,
}

impl<T: Schema> Table<T> {
    /// View `value` as a table; fails if it is any other kind of value.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::Table(object) => Ok(Self {
                object: Arc::clone(object),
                _row: PhantomData,
            }),
            other => Err(SchemaError::TypeMismatch {
                expected: "table",
                found: other.type_name(),
            }),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        self.object.object_id()
    }

    /// Row ids in ascending order.
    pub fn ids(&self) -> Vec<RowId> {
        self.object.keys().map(RowId::from).collect()
    }

    pub fn count(&self) -> usize {
        self.object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_empty()
    }

    /// Decode one row, if present.
    pub fn row(&self, id: &RowId) -> Result<Option<Row<T>>, SchemaError> {
        self.object
            .get(id.as_str())
            .map(|value| {
                Ok(Row {
                    id: id.clone(),
                    value: T::decode(value)?,
                })
            })
            .transpose()
    }

    /// Decode all rows in row id order.
    pub fn rows(&self) -> Result<Vec<Row<T>>, SchemaError> {
        self.object
            .iter()
            .map(|(id, value)| {
                Ok(Row {
                    id: RowId::from(id),
                    value: T::decode(value)?,
                })
            })
            .collect()
    }

    /// Id of the map object backing a row.
    pub fn row_object_id(&self, id: &RowId) -> Option<&ObjectId> {
        self.object.get(id.as_str()).and_then(Value::object_id)
    }
}
