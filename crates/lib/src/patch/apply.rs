//! Materializing patches into snapshots.
//!
//! Application is a pure function of the previous snapshot and the patch.
//! Only objects on the path to a changed location are copied; every other
//! subtree is shared with the previous snapshot.

use std::sync::Arc;

use tracing::trace;

use super::{ConflictDiff, Diff, Edit, ListDiff, MapDiff, Patch, PatchError};
use crate::{
    doc::{Conflicts, Entry, ListElem, ListObject, MapObject, Snapshot, Value},
    ids::ObjectId,
    op::ObjType,
};

/// Apply `patch` on top of `snapshot`, producing the next snapshot.
///
/// Fails with [`PatchError::MalformedPatch`] if the patch does not fit the
/// snapshot's structure; `snapshot` itself is never modified.
pub fn apply_patch(snapshot: &Snapshot, patch: &Patch) -> Result<Snapshot, PatchError> {
    if !patch.diffs.object_id.is_root() || patch.diffs.obj_type != ObjType::Map {
        return Err(PatchError::malformed(
            &patch.diffs.object_id,
            "patch must be rooted at the root map",
        ));
    }

    let root = apply_map_diff(Some(&snapshot.root), &patch.diffs)?;

    let mut clock = snapshot.clock.clone();
    for (actor, seq) in &patch.clock {
        let entry = clock.entry(actor.clone()).or_insert(0);
        *entry = (*entry).max(*seq);
    }

    trace!(
        keys = patch.diffs.props.len(),
        max_op = patch.max_op,
        "Applied patch"
    );

    Ok(Snapshot {
        root,
        max_op: snapshot.max_op.max(patch.max_op),
        clock,
        deps: patch.deps.clone(),
    })
}

fn apply_map_diff(
    existing: Option<&Arc<MapObject>>,
    diff: &MapDiff,
) -> Result<Arc<MapObject>, PatchError> {
    if let Some(existing) = existing
        && diff.props.is_empty()
    {
        return Ok(Arc::clone(existing));
    }

    let mut map = match existing {
        Some(existing) => MapObject::clone(existing),
        None => MapObject::new(diff.object_id.clone()),
    };

    for (key, conflicts) in &diff.props {
        if conflicts.is_empty() {
            map.props.remove(key);
            continue;
        }
        let updated = apply_conflicts(&diff.object_id, map.props.get(key), conflicts)?;
        map.props.insert(key.clone(), updated);
    }

    Ok(Arc::new(map))
}

fn apply_list_diff(
    existing: Option<&Arc<ListObject>>,
    diff: &ListDiff,
) -> Result<Arc<ListObject>, PatchError> {
    if let Some(existing) = existing
        && diff.edits.is_empty()
        && diff.props.is_empty()
    {
        return Ok(Arc::clone(existing));
    }

    let object_id = &diff.object_id;
    let mut list = match existing {
        Some(existing) => ListObject::clone(existing),
        None => ListObject::new(object_id.clone()),
    };

    for edit in &diff.edits {
        match edit {
            Edit::Insert { index, elem_id } => {
                if *index > list.elems.len() {
                    return Err(PatchError::malformed(
                        object_id,
                        format!("insert at {index} beyond length {}", list.elems.len()),
                    ));
                }
                list.elems.insert(
                    *index,
                    ListElem {
                        elem_id: elem_id.clone(),
                        conflicts: Conflicts::new(),
                    },
                );
            }
            Edit::Remove { index } => {
                if *index >= list.elems.len() {
                    return Err(PatchError::malformed(
                        object_id,
                        format!("remove at {index} beyond length {}", list.elems.len()),
                    ));
                }
                list.elems.remove(*index);
            }
        }
    }

    for (index, conflicts) in &diff.props {
        let len = list.elems.len();
        let elem = list.elems.get_mut(*index).ok_or_else(|| {
            PatchError::malformed(object_id, format!("index {index} beyond length {len}"))
        })?;
        if conflicts.is_empty() {
            return Err(PatchError::malformed(
                object_id,
                format!("element {index} has no values; deletions must use a remove edit"),
            ));
        }
        elem.conflicts = apply_conflicts(object_id, Some(&elem.conflicts), conflicts)?;
    }

    if let Some(index) = list.elems.iter().position(|e| e.conflicts.is_empty()) {
        return Err(PatchError::malformed(
            object_id,
            format!("inserted element {index} has no value"),
        ));
    }

    Ok(Arc::new(list))
}

/// Build the new conflict set of one location.
///
/// Nested objects already present in `previous` are updated in place of
/// being rebuilt, so their untouched contents stay shared.
fn apply_conflicts(
    owner: &ObjectId,
    previous: Option<&Conflicts>,
    diffs: &ConflictDiff,
) -> Result<Conflicts, PatchError> {
    let mut conflicts = Conflicts::new();
    for (actor, diff) in diffs {
        let entry = match diff {
            Diff::Value(value) => {
                Entry::new(value.op_id.clone(), Value::from_scalar(value.value.clone()))
            }
            Diff::Map(map) => {
                let op_id = nested_op_id(owner, &map.object_id)?;
                let existing = previous.and_then(|p| p.find_object(&map.object_id));
                let value = match (map.obj_type, existing) {
                    (ObjType::Map, None) => Value::Map(apply_map_diff(None, map)?),
                    (ObjType::Map, Some(Value::Map(current))) => {
                        Value::Map(apply_map_diff(Some(current), map)?)
                    }
                    (ObjType::Table, None) => Value::Table(apply_map_diff(None, map)?),
                    (ObjType::Table, Some(Value::Table(current))) => {
                        Value::Table(apply_map_diff(Some(current), map)?)
                    }
                    (ObjType::List, _) => {
                        return Err(PatchError::malformed(
                            &map.object_id,
                            "map diff declares a list object",
                        ));
                    }
                    (declared, Some(current)) => {
                        return Err(PatchError::malformed(
                            &map.object_id,
                            format!("object is a {}, patch describes a {declared}", current.type_name()),
                        ));
                    }
                };
                Entry::new(op_id, value)
            }
            Diff::List(list) => {
                let op_id = nested_op_id(owner, &list.object_id)?;
                let value = match previous.and_then(|p| p.find_object(&list.object_id)) {
                    None => Value::List(apply_list_diff(None, list)?),
                    Some(Value::List(current)) => Value::List(apply_list_diff(Some(current), list)?),
                    Some(current) => {
                        return Err(PatchError::malformed(
                            &list.object_id,
                            format!("object is a {}, patch describes a list", current.type_name()),
                        ));
                    }
                };
                Entry::new(op_id, value)
            }
        };

        if entry.op_id.actor() != actor {
            return Err(PatchError::malformed(
                owner,
                format!("value {} listed under actor {actor}", entry.op_id),
            ));
        }
        conflicts.insert(entry);
    }
    Ok(conflicts)
}

fn nested_op_id(owner: &ObjectId, object_id: &ObjectId) -> Result<crate::ids::OpId, PatchError> {
    object_id
        .op_id()
        .cloned()
        .ok_or_else(|| PatchError::malformed(owner, "root object nested inside the document"))
}
