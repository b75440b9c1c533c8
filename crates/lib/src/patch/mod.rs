//! Patches: the engine's description of what a batch of changes did.
//!
//! A [`Patch`] carries a diff tree rooted at the document's root map. Every
//! touched location maps to its complete new conflict set, keyed by actor.
//! An empty conflict set means the location was deleted. Nested object diffs
//! only list what changed inside them; everything else is left as it was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ids::{Actor, ChangeHash, ObjectId, OpId},
    op::{ObjType, ScalarValue},
};

mod apply;
mod errors;

pub use apply::apply_patch;
pub use errors::PatchError;

/// New conflict set of one location, keyed by writing actor.
pub type ConflictDiff = BTreeMap<Actor, Diff>;

/// The result of applying changes, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Set when the patch acknowledges a local change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Highest change sequence number applied per actor
    pub clock: BTreeMap<Actor, u64>,
    /// Document heads after the patch
    pub deps: Vec<ChangeHash>,
    pub max_op: u64,
    pub diffs: MapDiff,
}

impl Patch {
    /// Whether the patch changes no content.
    pub fn is_empty(&self) -> bool {
        self.diffs.props.is_empty()
    }

    /// Flatten every value written by the patch into `path -> value` pairs.
    ///
    /// Paths use the raw map keys and list indices of the diff tree, so
    /// conflicting values appear once per actor, suffixed with `@actor`.
    pub fn changed_properties(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        collect_map(&self.diffs, "", &mut out);
        out
    }
}

fn collect_conflicts(prefix: &str, conflicts: &ConflictDiff, out: &mut BTreeMap<String, String>) {
    let suffix = |actor: &Actor| {
        if conflicts.len() > 1 {
            format!("{prefix}@{actor}")
        } else {
            prefix.to_string()
        }
    };
    if conflicts.is_empty() {
        out.insert(prefix.to_string(), "<deleted>".to_string());
    }
    for (actor, diff) in conflicts {
        match diff {
            Diff::Value(value) => {
                out.insert(suffix(actor), value.value.to_string());
            }
            Diff::Map(map) => collect_map(map, &suffix(actor), out),
            Diff::List(list) => {
                for (index, conflicts) in &list.props {
                    collect_conflicts(&format!("{}[{index}]", suffix(actor)), conflicts, out);
                }
            }
        }
    }
}

fn collect_map(diff: &MapDiff, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (key, conflicts) in &diff.props {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        collect_conflicts(&path, conflicts, out);
    }
}

/// Diff of a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Diff {
    Map(MapDiff),
    List(ListDiff),
    Value(ValueDiff),
}

impl Diff {
    /// Id of the operation that wrote this value.
    pub fn op_id(&self) -> Option<&OpId> {
        match self {
            Diff::Map(map) => map.object_id.op_id(),
            Diff::List(list) => list.object_id.op_id(),
            Diff::Value(value) => Some(&value.op_id),
        }
    }
}

/// Changes inside a map or table object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDiff {
    pub object_id: ObjectId,
    pub obj_type: ObjType,
    #[serde(default)]
    pub props: BTreeMap<String, ConflictDiff>,
}

impl MapDiff {
    /// A root diff that changes nothing.
    pub fn empty() -> Self {
        Self::new(ObjectId::Root, ObjType::Map)
    }

    pub fn new(object_id: ObjectId, obj_type: ObjType) -> Self {
        Self {
            object_id,
            obj_type,
            props: BTreeMap::new(),
        }
    }
}

/// Changes inside a list object.
///
/// `edits` are applied first, in order, against the element sequence; `props`
/// then refers to post-edit indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDiff {
    pub object_id: ObjectId,
    #[serde(default)]
    pub edits: Vec<Edit>,
    #[serde(default)]
    pub props: BTreeMap<usize, ConflictDiff>,
}

impl ListDiff {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            edits: Vec::new(),
            props: BTreeMap::new(),
        }
    }
}

/// A structural change to a list's element sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Edit {
    #[serde(rename_all = "camelCase")]
    Insert { index: usize, elem_id: OpId },
    Remove { index: usize },
}

/// A primitive written by one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueDiff {
    pub op_id: OpId,
    pub value: ScalarValue,
}
