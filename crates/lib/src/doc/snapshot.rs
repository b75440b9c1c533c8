use std::{collections::BTreeMap, sync::Arc};

use super::{
    Conflicts, ListObject, MapObject, Value,
    path::{Path, Segment},
};
use crate::ids::{Actor, ChangeHash, ObjectId};

/// Immutable materialized document state.
///
/// Besides the root map, a snapshot records the bookkeeping the request
/// builder needs to number its next batch: the highest operation counter
/// seen, the per-actor change sequence numbers and the current heads.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub(crate) root: Arc<MapObject>,
    pub(crate) max_op: u64,
    pub(crate) clock: BTreeMap<Actor, u64>,
    pub(crate) deps: Vec<ChangeHash>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// A snapshot of an empty document.
    pub fn empty() -> Self {
        Self {
            root: Arc::new(MapObject::new(ObjectId::Root)),
            max_op: 0,
            clock: BTreeMap::new(),
            deps: Vec::new(),
        }
    }

    pub fn root(&self) -> &Arc<MapObject> {
        &self.root
    }

    /// The root map as a [`Value`].
    pub fn root_value(&self) -> Value {
        Value::Map(Arc::clone(&self.root))
    }

    pub fn max_op(&self) -> u64 {
        self.max_op
    }

    pub fn clock(&self) -> &BTreeMap<Actor, u64> {
        &self.clock
    }

    /// Last change sequence number known for `actor`.
    pub fn seq_of(&self, actor: &Actor) -> u64 {
        self.clock.get(actor).copied().unwrap_or(0)
    }

    pub fn deps(&self) -> &[ChangeHash] {
        &self.deps
    }

    /// Primary value at `path`.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.conflict_set(path)
            .and_then(Conflicts::primary)
            .map(|entry| &entry.value)
    }

    /// All concurrent values at `path`, only when there is more than one.
    pub fn conflicts(&self, path: &Path) -> Option<BTreeMap<Actor, Value>> {
        self.conflict_set(path)
            .filter(|conflicts| conflicts.len() > 1)
            .map(Conflicts::to_values)
    }

    /// The raw conflict set at `path`.
    pub fn conflict_set(&self, path: &Path) -> Option<&Conflicts> {
        lookup_conflicts(&self.root, path)
    }

    /// Resolve the object at `path` following primary values.
    pub fn object(&self, path: &Path) -> Option<ObjectRef<'_>> {
        lookup_object(&self.root, path)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }
}

/// Borrowed view of a composite object.
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    Map(&'a MapObject),
    List(&'a ListObject),
}

impl ObjectRef<'_> {
    pub fn object_id(&self) -> &ObjectId {
        match self {
            ObjectRef::Map(map) => &map.object_id,
            ObjectRef::List(list) => &list.object_id,
        }
    }
}

/// Resolve the object at `path` below `root`, following primary values.
pub(crate) fn lookup_object<'a>(root: &'a MapObject, path: &Path) -> Option<ObjectRef<'a>> {
    let mut current = ObjectRef::Map(root);
    for segment in path.segments() {
        let value = match (current, segment) {
            (ObjectRef::Map(map), Segment::Key(key)) => map.get(key)?,
            (ObjectRef::List(list), Segment::Index(index)) => list.get(*index)?,
            _ => return None,
        };
        current = match value {
            Value::Map(map) | Value::Table(map) => ObjectRef::Map(map),
            Value::List(list) => ObjectRef::List(list),
            Value::Primitive(_) | Value::Counter(_) => return None,
        };
    }
    Some(current)
}

/// The conflict set at `path` below `root`.
pub(crate) fn lookup_conflicts<'a>(root: &'a MapObject, path: &Path) -> Option<&'a Conflicts> {
    let (parent, last) = path.split_last()?;
    match (lookup_object(root, &parent)?, last) {
        (ObjectRef::Map(map), Segment::Key(key)) => map.props.get(key),
        (ObjectRef::List(list), Segment::Index(index)) => {
            list.elems.get(*index).map(|elem| &elem.conflicts)
        }
        _ => None,
    }
}
