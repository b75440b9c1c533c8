//! Materialized values, objects and conflict sets.
//!
//! Composite values are held behind [`Arc`] so that snapshots share every
//! subtree a patch did not touch.

use std::{collections::BTreeMap, sync::Arc};

use super::Counter;
use crate::{
    ids::{Actor, ObjectId, OpId},
    op::{ObjType, ScalarValue},
};

/// A materialized value at some location of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Any primitive except counters
    Primitive(ScalarValue),
    Counter(Counter),
    Map(Arc<MapObject>),
    Table(Arc<MapObject>),
    List(Arc<ListObject>),
}

impl Value {
    /// Materialize a primitive as stored by the engine.
    pub fn from_scalar(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Counter(n) => Value::Counter(Counter::new(n)),
            other => Value::Primitive(other),
        }
    }

    pub fn obj_type(&self) -> Option<ObjType> {
        match self {
            Value::Map(_) => Some(ObjType::Map),
            Value::Table(_) => Some(ObjType::Table),
            Value::List(_) => Some(ObjType::List),
            Value::Primitive(_) | Value::Counter(_) => None,
        }
    }

    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::Map(map) | Value::Table(map) => Some(&map.object_id),
            Value::List(list) => Some(&list.object_id),
            Value::Primitive(_) | Value::Counter(_) => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.obj_type().is_some()
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Value::Primitive(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Primitive(ScalarValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_counter(&self) -> Option<&Counter> {
        match self {
            Value::Counter(counter) => Some(counter),
            _ => None,
        }
    }

    /// The map behind a map or table value.
    pub fn as_map(&self) -> Option<&MapObject> {
        match self {
            Value::Map(map) | Value::Table(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListObject> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Primitive(value) => value.type_name(),
            Value::Counter(_) => "counter",
            Value::Map(_) => "map",
            Value::Table(_) => "table",
            Value::List(_) => "list",
        }
    }

    /// Whether both values are the same shared object.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Map(a), Value::Map(b)) | (Value::Table(a), Value::Table(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Render the primary view of this value as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Primitive(value) => value.to_json(),
            Value::Counter(counter) => serde_json::Value::from(counter.value()),
            Value::Map(map) | Value::Table(map) => map.to_json(),
            Value::List(list) => list.to_json(),
        }
    }
}

/// One value of a conflict set, tagged with the operation that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub op_id: OpId,
    pub value: Value,
}

impl Entry {
    pub fn new(op_id: OpId, value: Value) -> Self {
        Self { op_id, value }
    }
}

/// All concurrently-written values at one location, keyed by writing actor.
///
/// The primary value is the one written by the greatest actor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conflicts {
    entries: BTreeMap<Actor, Entry>,
}

impl Conflicts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(entry: Entry) -> Self {
        let mut conflicts = Self::new();
        conflicts.insert(entry);
        conflicts
    }

    /// Insert an entry under the actor of its op id.
    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.op_id.actor().clone(), entry);
    }

    pub fn primary(&self) -> Option<&Entry> {
        self.entries.values().next_back()
    }

    pub(crate) fn primary_mut(&mut self) -> Option<&mut Entry> {
        self.entries.values_mut().next_back()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.entries.values_mut()
    }

    pub fn get(&self, actor: &Actor) -> Option<&Entry> {
        self.entries.get(actor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Actor, &Entry)> {
        self.entries.iter()
    }

    /// Ids of every operation in the set, in operation order.
    pub fn op_ids(&self) -> Vec<OpId> {
        let mut ids: Vec<OpId> = self.entries.values().map(|e| e.op_id.clone()).collect();
        ids.sort();
        ids
    }

    /// Find the entry holding the object with the given id.
    pub fn find_object(&self, object_id: &ObjectId) -> Option<&Value> {
        self.entries
            .values()
            .map(|entry| &entry.value)
            .find(|value| value.object_id() == Some(object_id))
    }

    /// Clone the values of the set, keyed by actor.
    pub fn to_values(&self) -> BTreeMap<Actor, Value> {
        self.entries
            .iter()
            .map(|(actor, entry)| (actor.clone(), entry.value.clone()))
            .collect()
    }
}

/// A map or table object.
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub(crate) object_id: ObjectId,
    pub(crate) props: BTreeMap<String, Conflicts>,
}

impl MapObject {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            props: BTreeMap::new(),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Primary value of a property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props
            .get(key)
            .and_then(Conflicts::primary)
            .map(|entry| &entry.value)
    }

    pub fn conflicts(&self, key: &str) -> Option<&Conflicts> {
        self.props.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.props.iter().filter_map(|(key, conflicts)| {
            conflicts.primary().map(|entry| (key.as_str(), &entry.value))
        })
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(key, value)| (key.to_string(), value.to_json()))
                .collect(),
        )
    }
}

/// An element of a list, named by the operation that inserted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ListElem {
    pub(crate) elem_id: OpId,
    pub(crate) conflicts: Conflicts,
}

impl ListElem {
    pub fn elem_id(&self) -> &OpId {
        &self.elem_id
    }

    pub fn conflicts(&self) -> &Conflicts {
        &self.conflicts
    }

    pub fn value(&self) -> Option<&Value> {
        self.conflicts.primary().map(|entry| &entry.value)
    }
}

/// A list object.
#[derive(Debug, Clone, PartialEq)]
pub struct ListObject {
    pub(crate) object_id: ObjectId,
    pub(crate) elems: Vec<ListElem>,
}

impl ListObject {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            elems: Vec::new(),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elems.get(index).and_then(ListElem::value)
    }

    pub fn elem(&self, index: usize) -> Option<&ListElem> {
        self.elems.get(index)
    }

    pub fn elems(&self) -> &[ListElem] {
        &self.elems
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elems.iter().filter_map(ListElem::value)
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.iter().map(Value::to_json).collect())
    }
}
