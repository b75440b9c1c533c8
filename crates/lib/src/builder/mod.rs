//! Change request builder.
//!
//! A mutation session runs against a private working copy of a snapshot.
//! Every mutation is recorded as operations and applied to the working copy
//! immediately, so later mutations in the same session observe earlier ones.
//! The session yields at most one [`Request`]; a session that records no
//! operations yields nothing.
//!
//! ```
//! use accord::{builder::RequestBuilder, doc::Snapshot, path, Actor};
//!
//! let snapshot = Snapshot::empty();
//! let actor: Actor = "aaaa".parse()?;
//! let request = RequestBuilder::new(&snapshot, actor)
//!     .build(|tx| {
//!         tx.set(path!["bird"], "magpie")?;
//!         Ok(())
//!     })?
//!     .expect("one op was recorded");
//! assert_eq!(request.seq, 1);
//! assert_eq!(request.start_op, 1);
//! assert_eq!(request.ops.len(), 1);
//! # Ok::<(), accord::Error>(())
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::{
    doc::{
        Conflicts, Entry, ListElem, ListObject, MapObject, NewValue, Path, Schema, Segment,
        Snapshot, Value, lookup_conflicts,
    },
    ids::{Actor, ElemId, ObjectId, OpId},
    op::{Action, Key, ObjType, Op, Request, ScalarValue},
};

mod errors;
mod table;

pub use errors::ChangeError;
pub use table::TableMut;

/// Captures one local mutation session against a snapshot.
pub struct RequestBuilder<'a> {
    snapshot: &'a Snapshot,
    actor: Actor,
    time: i64,
    message: Option<String>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(snapshot: &'a Snapshot, actor: Actor) -> Self {
        Self {
            snapshot,
            actor,
            time: 0,
            message: None,
        }
    }

    /// Timestamp recorded in the request, in milliseconds.
    pub fn time(mut self, millis: i64) -> Self {
        self.time = millis;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Run `f` against a working copy and collect the recorded operations.
    ///
    /// Returns `Ok(None)` if the session recorded nothing. If `f` fails, the
    /// error is returned and no request is produced.
    pub fn build<F>(self, f: F) -> crate::Result<Option<Request>>
    where
        F: FnOnce(&mut Transaction) -> crate::Result<()>,
    {
        let start_op = self.snapshot.max_op() + 1;
        let mut tx = Transaction {
            root: Arc::clone(self.snapshot.root()),
            log: OpLog {
                actor: self.actor.clone(),
                start_op,
                ops: Vec::new(),
            },
        };
        f(&mut tx)?;

        if tx.log.ops.is_empty() {
            debug!(actor = %self.actor, "Mutation session recorded no operations");
            return Ok(None);
        }

        let request = Request {
            start_op,
            deps: self.snapshot.deps().to_vec(),
            message: self.message,
            time: self.time,
            seq: self.snapshot.seq_of(&self.actor) + 1,
            actor: self.actor,
            ops: tx.log.ops,
        };
        debug!(
            actor = %request.actor,
            seq = request.seq,
            start_op = request.start_op,
            ops = request.ops.len(),
            "Built change request"
        );
        Ok(Some(request))
    }
}

/// Allocates operation ids and records emitted operations.
struct OpLog {
    actor: Actor,
    start_op: u64,
    ops: Vec<Op>,
}

impl OpLog {
    fn push(&mut self, op: Op) -> OpId {
        let id = OpId::new(self.start_op + self.ops.len() as u64, self.actor.clone());
        self.ops.push(op);
        id
    }

    /// Emit the operations that write `value` at `key` of `obj`.
    ///
    /// Composite values produce their make operation first, then their
    /// contents depth-first. Returns the id of the outermost operation and
    /// the materialized value.
    fn write(
        &mut self,
        obj: &ObjectId,
        key: Key,
        insert: bool,
        pred: Vec<OpId>,
        value: &NewValue,
    ) -> (OpId, Value) {
        let (action, scalar) = match value {
            NewValue::Scalar(scalar) => (Action::Set, Some(scalar.clone())),
            NewValue::Map(_) => (Action::MakeMap, None),
            NewValue::Table(_) => (Action::MakeTable, None),
            NewValue::List(_) => (Action::MakeList, None),
        };
        let id = self.push(Op {
            action,
            obj: obj.clone(),
            key,
            insert,
            value: scalar,
            pred,
        });
        let object_id = ObjectId::Op(id.clone());

        let materialized = match value {
            NewValue::Scalar(scalar) => Value::from_scalar(scalar.clone()),
            NewValue::Map(entries) | NewValue::Table(entries) => {
                let mut map = MapObject::new(object_id.clone());
                for (child_key, child) in entries {
                    let (child_id, child_value) = self.write(
                        &object_id,
                        Key::Map(child_key.clone()),
                        false,
                        Vec::new(),
                        child,
                    );
                    map.props.insert(
                        child_key.clone(),
                        Conflicts::single(Entry::new(child_id, child_value)),
                    );
                }
                if matches!(value, NewValue::Table(_)) {
                    Value::Table(Arc::new(map))
                } else {
                    Value::Map(Arc::new(map))
                }
            }
            NewValue::List(items) => {
                let mut list = ListObject::new(object_id.clone());
                let mut previous = ElemId::Head;
                for item in items {
                    let (elem_id, item_value) =
                        self.write(&object_id, Key::Seq(previous), true, Vec::new(), item);
                    previous = ElemId::Op(elem_id.clone());
                    list.elems.push(ListElem {
                        elem_id: elem_id.clone(),
                        conflicts: Conflicts::single(Entry::new(elem_id, item_value)),
                    });
                }
                Value::List(Arc::new(list))
            }
        };
        (id, materialized)
    }

    fn delete(&mut self, obj: &ObjectId, key: Key, pred: Vec<OpId>) {
        self.push(Op {
            action: Action::Del,
            obj: obj.clone(),
            key,
            insert: false,
            value: None,
            pred,
        });
    }
}

/// A mutable view of the object a mutation targets.
enum Target<'a> {
    Map {
        map: &'a mut MapObject,
        obj_type: ObjType,
    },
    List(&'a mut ListObject),
}

impl Target<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            Target::Map { obj_type, .. } => obj_type.as_str(),
            Target::List(_) => "list",
        }
    }
}

/// Walk `path` in the working copy, copying shared objects on the way down.
fn resolve_mut<'a>(root: &'a mut Arc<MapObject>, path: &Path) -> Result<Target<'a>, ChangeError> {
    let mut current = Target::Map {
        map: Arc::make_mut(root),
        obj_type: ObjType::Map,
    };
    for (depth, segment) in path.segments().iter().enumerate() {
        let conflicts = match (current, segment) {
            (Target::Map { map, .. }, Segment::Key(key)) => map.props.get_mut(key),
            (Target::List(list), Segment::Index(index)) => {
                list.elems.get_mut(*index).map(|elem| &mut elem.conflicts)
            }
            (target, _) => {
                return Err(ChangeError::TypeMismatch {
                    path: path.prefix(depth),
                    expected: if matches!(segment, Segment::Index(_)) {
                        "list"
                    } else {
                        "map"
                    },
                    found: target.type_name(),
                });
            }
        };
        let entry = conflicts
            .and_then(Conflicts::primary_mut)
            .ok_or_else(|| ChangeError::StaleReference {
                path: path.prefix(depth + 1),
            })?;
        current = match &mut entry.value {
            Value::Map(map) => Target::Map {
                map: Arc::make_mut(map),
                obj_type: ObjType::Map,
            },
            Value::Table(map) => Target::Map {
                map: Arc::make_mut(map),
                obj_type: ObjType::Table,
            },
            Value::List(list) => Target::List(Arc::make_mut(list)),
            other => {
                return Err(ChangeError::TypeMismatch {
                    path: path.prefix(depth + 1),
                    expected: "object",
                    found: other.type_name(),
                });
            }
        };
    }
    Ok(current)
}

/// Whether writing `value` over `existing` would change nothing.
fn is_redundant(existing: Option<&Conflicts>, value: &NewValue) -> bool {
    let (Some(existing), NewValue::Scalar(scalar)) = (existing, value) else {
        return false;
    };
    existing.len() == 1
        && existing
            .primary()
            .is_some_and(|entry| entry.value == Value::from_scalar(scalar.clone()))
}

fn split(path: &Path) -> Result<(Path, Segment), ChangeError> {
    path.split_last()
        .map(|(parent, last)| (parent, last.clone()))
        .ok_or_else(|| ChangeError::InvalidPath {
            reason: "the root map cannot be replaced or deleted".to_string(),
        })
}

/// A mutation session's working copy.
pub struct Transaction {
    root: Arc<MapObject>,
    log: OpLog,
}

impl Transaction {
    pub fn actor(&self) -> &Actor {
        &self.log.actor
    }

    /// Number of operations recorded so far.
    pub fn op_count(&self) -> usize {
        self.log.ops.len()
    }

    /// Primary value at `path`, including this session's mutations.
    pub fn get(&self, path: impl Into<Path>) -> Option<&Value> {
        lookup_conflicts(&self.root, &path.into())
            .and_then(Conflicts::primary)
            .map(|entry| &entry.value)
    }

    /// Working copy rendered as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }

    /// Write `value` at `path`.
    ///
    /// The write supersedes every value currently at the location. Writing
    /// a primitive equal to the single value already there records nothing.
    /// List indices must refer to an existing element; use
    /// [`Transaction::insert`] to grow a list.
    pub fn set(&mut self, path: impl Into<Path>, value: impl Into<NewValue>) -> Result<(), ChangeError> {
        let path = path.into();
        let value = value.into();
        let (parent, last) = split(&path)?;

        match (resolve_mut(&mut self.root, &parent)?, last) {
            (Target::Map { map, obj_type }, Segment::Key(key)) => {
                if obj_type == ObjType::Table && !matches!(value, NewValue::Map(_)) {
                    return Err(ChangeError::TypeMismatch {
                        path,
                        expected: "map",
                        found: value.type_name(),
                    });
                }
                let existing = map.props.get(&key);
                if is_redundant(existing, &value) {
                    return Ok(());
                }
                let pred = existing.map(Conflicts::op_ids).unwrap_or_default();
                let (id, materialized) =
                    self.log
                        .write(&map.object_id, Key::Map(key.clone()), false, pred, &value);
                map.props
                    .insert(key, Conflicts::single(Entry::new(id, materialized)));
            }
            (Target::List(list), Segment::Index(index)) => {
                let len = list.elems.len();
                let elem = list
                    .elems
                    .get_mut(index)
                    .ok_or(ChangeError::IndexOutOfBounds {
                        path: parent.clone(),
                        index,
                        len,
                    })?;
                if is_redundant(Some(&elem.conflicts), &value) {
                    return Ok(());
                }
                let key = Key::Seq(ElemId::Op(elem.elem_id.clone()));
                let pred = elem.conflicts.op_ids();
                let (id, materialized) = self.log.write(&list.object_id, key, false, pred, &value);
                elem.conflicts = Conflicts::single(Entry::new(id, materialized));
            }
            (target, last) => return Err(mismatch(parent, &last, &target)),
        }
        Ok(())
    }

    /// Encode `record` and write it at `path`.
    pub fn set_record<T: Schema>(&mut self, path: impl Into<Path>, record: &T) -> Result<(), ChangeError> {
        let value = record.encode().map_err(|e| ChangeError::Encoding {
            reason: e.to_string(),
        })?;
        self.set(path, value)
    }

    /// Write every property of `record` into the root map.
    pub fn set_root<T: Schema>(&mut self, record: &T) -> Result<(), ChangeError> {
        match record.encode().map_err(|e| ChangeError::Encoding {
            reason: e.to_string(),
        })? {
            NewValue::Map(entries) => {
                for (key, value) in entries {
                    self.set(Path::root().push(key), value)?;
                }
                Ok(())
            }
            other => Err(ChangeError::TypeMismatch {
                path: Path::root(),
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Remove the value at `path`.
    ///
    /// Deleting a map key that does not exist records nothing.
    pub fn delete(&mut self, path: impl Into<Path>) -> Result<(), ChangeError> {
        let path = path.into();
        let (parent, last) = split(&path)?;

        match (resolve_mut(&mut self.root, &parent)?, last) {
            (Target::Map { map, .. }, Segment::Key(key)) => {
                if let Some(existing) = map.props.remove(&key) {
                    self.log
                        .delete(&map.object_id, Key::Map(key), existing.op_ids());
                }
            }
            (Target::List(list), Segment::Index(index)) => {
                if index >= list.elems.len() {
                    return Err(ChangeError::IndexOutOfBounds {
                        path: parent,
                        index,
                        len: list.elems.len(),
                    });
                }
                let elem = list.elems.remove(index);
                self.log.delete(
                    &list.object_id,
                    Key::Seq(ElemId::Op(elem.elem_id)),
                    elem.conflicts.op_ids(),
                );
            }
            (target, last) => return Err(mismatch(parent, &last, &target)),
        }
        Ok(())
    }

    /// Insert `value` into the list at `path` so that it ends up at `index`.
    pub fn insert(
        &mut self,
        path: impl Into<Path>,
        index: usize,
        value: impl Into<NewValue>,
    ) -> Result<(), ChangeError> {
        let path = path.into();
        let value = value.into();
        let list = match resolve_mut(&mut self.root, &path)? {
            Target::List(list) => list,
            other => {
                return Err(ChangeError::TypeMismatch {
                    path,
                    expected: "list",
                    found: other.type_name(),
                });
            }
        };
        let len = list.elems.len();
        if index > len {
            return Err(ChangeError::IndexOutOfBounds { path, index, len });
        }

        let reference = match index {
            0 => ElemId::Head,
            _ => ElemId::Op(list.elems[index - 1].elem_id.clone()),
        };
        let (id, materialized) =
            self.log
                .write(&list.object_id, Key::Seq(reference), true, Vec::new(), &value);
        list.elems.insert(
            index,
            ListElem {
                elem_id: id.clone(),
                conflicts: Conflicts::single(Entry::new(id, materialized)),
            },
        );
        Ok(())
    }

    /// Append `value` to the list at `path`.
    pub fn push(&mut self, path: impl Into<Path>, value: impl Into<NewValue>) -> Result<(), ChangeError> {
        let path = path.into();
        let len = match self.get(&path) {
            Some(Value::List(list)) => list.len(),
            Some(other) => {
                return Err(ChangeError::TypeMismatch {
                    path,
                    expected: "list",
                    found: other.type_name(),
                });
            }
            None => return Err(ChangeError::StaleReference { path }),
        };
        self.insert(path, len, value)
    }

    /// Add `delta` to the counter at `path`.
    pub fn increment(&mut self, path: impl Into<Path>, delta: i64) -> Result<(), ChangeError> {
        let path = path.into();
        let (parent, last) = split(&path)?;

        let (obj, key, conflicts) = match (resolve_mut(&mut self.root, &parent)?, last) {
            (Target::Map { map, .. }, Segment::Key(key)) => (
                map.object_id.clone(),
                Key::Map(key.clone()),
                map.props.get_mut(&key),
            ),
            (Target::List(list), Segment::Index(index)) => {
                let elem = list.elems.get_mut(index);
                let key = elem
                    .as_ref()
                    .map(|elem| Key::Seq(ElemId::Op(elem.elem_id.clone())));
                match key {
                    Some(key) => (
                        list.object_id.clone(),
                        key,
                        elem.map(|elem| &mut elem.conflicts),
                    ),
                    None => (list.object_id.clone(), Key::Seq(ElemId::Head), None),
                }
            }
            (target, last) => return Err(mismatch(parent, &last, &target)),
        };

        let conflicts = conflicts.ok_or_else(|| ChangeError::StaleReference { path: path.clone() })?;
        if !matches!(conflicts.primary().map(|e| &e.value), Some(Value::Counter(_))) {
            return Err(ChangeError::NotACounter { path });
        }

        let mut pred = Vec::new();
        for entry in conflicts.entries_mut() {
            if let Value::Counter(counter) = &mut entry.value {
                counter.increment(delta);
                pred.push(entry.op_id.clone());
            }
        }
        pred.sort();
        self.log.push(Op {
            action: Action::Inc,
            obj,
            key,
            insert: false,
            value: Some(ScalarValue::Int(delta)),
            pred,
        });
        Ok(())
    }

    /// Mutable access to the table at `path`.
    pub fn table(&mut self, path: impl Into<Path>) -> Result<TableMut<'_>, ChangeError> {
        let path = path.into();
        match self.get(&path) {
            Some(Value::Table(_)) => Ok(TableMut::new(self, path)),
            Some(other) => Err(ChangeError::TypeMismatch {
                path,
                expected: "table",
                found: other.type_name(),
            }),
            None => Err(ChangeError::StaleReference { path }),
        }
    }
}

fn mismatch(parent: Path, last: &Segment, target: &Target<'_>) -> ChangeError {
    ChangeError::TypeMismatch {
        path: parent,
        expected: match last {
            Segment::Key(_) => "map",
            Segment::Index(_) => "list",
        },
        found: target.type_name(),
    }
}
