//! The operation set: current CRDT state of every object.
//!
//! Each location keeps the operations that are currently visible there; an
//! operation stops being visible once a later operation lists it as a
//! predecessor. List elements are ordered with the RGA rule: a new element
//! goes directly after its reference element, skipping any elements with a
//! greater id inserted there concurrently.
//!
//! While applying operations the set records what was touched so that a
//! patch covering exactly those locations can be generated afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::{
    engine::EngineError,
    ids::{ElemId, ObjectId, OpId},
    op::{Action, Key, ObjType, Op, ScalarValue},
    patch::{ConflictDiff, Diff, Edit, ListDiff, MapDiff, ValueDiff},
};

#[derive(Debug, Clone)]
enum Stored {
    Scalar(ScalarValue),
    /// The object whose id is the id of this record
    Object,
}

#[derive(Debug, Clone)]
struct OpRecord {
    id: OpId,
    value: Stored,
}

#[derive(Debug, Clone)]
struct Element {
    id: OpId,
    values: Vec<OpRecord>,
}

impl Element {
    fn is_visible(&self) -> bool {
        !self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ObjState {
    obj_type: ObjType,
    /// Location of this object in its parent
    parent: Option<(ObjectId, Key)>,
    props: BTreeMap<String, Vec<OpRecord>>,
    elems: Vec<Element>,
}

impl ObjState {
    fn new(obj_type: ObjType, parent: Option<(ObjectId, Key)>) -> Self {
        Self {
            obj_type,
            parent,
            props: BTreeMap::new(),
            elems: Vec::new(),
        }
    }

    fn has_elem(&self, id: &OpId) -> bool {
        self.elems.iter().any(|e| &e.id == id)
    }

    fn visible_elems(&self) -> Vec<OpId> {
        self.elems
            .iter()
            .filter(|e| e.is_visible())
            .map(|e| e.id.clone())
            .collect()
    }
}

/// Locations touched while applying a batch of changes.
#[derive(Debug, Default)]
pub(super) struct Touched {
    keys: HashMap<ObjectId, BTreeSet<String>>,
    elems: HashMap<ObjectId, HashSet<OpId>>,
    /// Visible elements of each touched list before its first modification
    lists_before: HashMap<ObjectId, Vec<OpId>>,
    created: HashSet<ObjectId>,
}

impl Touched {
    pub(super) fn is_empty(&self) -> bool {
        self.keys.is_empty()
            && self.elems.is_empty()
            && self.lists_before.is_empty()
            && self.created.is_empty()
    }

    fn objects(&self) -> impl Iterator<Item = &ObjectId> {
        self.keys
            .keys()
            .chain(self.elems.keys())
            .chain(self.lists_before.keys())
            .chain(self.created.iter())
    }
}

/// What a diff covers.
struct Scope<'a> {
    touched: &'a Touched,
    full: bool,
    /// Child locations on the path to a touched object, per parent
    dirty_children: HashMap<ObjectId, HashSet<Key>>,
}

impl Scope<'_> {
    fn covers_everything(&self, id: &ObjectId) -> bool {
        self.full || self.touched.created.contains(id)
    }
}

#[derive(Debug, Clone)]
pub(super) struct OpSet {
    objects: HashMap<ObjectId, ObjState>,
    max_op: u64,
}

impl Default for OpSet {
    fn default() -> Self {
        Self {
            objects: HashMap::from([(ObjectId::Root, ObjState::new(ObjType::Map, None))]),
            max_op: 0,
        }
    }
}

impl OpSet {
    pub(super) fn max_op(&self) -> u64 {
        self.max_op
    }

    /// Check that a batch of operations can be applied in order.
    ///
    /// Objects and elements created earlier in the batch may be referenced
    /// by later operations.
    pub(super) fn validate<'o>(
        &self,
        ops: impl Iterator<Item = (OpId, &'o Op)>,
    ) -> Result<(), EngineError> {
        let mut created: HashMap<ObjectId, ObjType> = HashMap::new();
        let mut inserted: HashSet<OpId> = HashSet::new();

        for (id, op) in ops {
            let obj_type = self
                .objects
                .get(&op.obj)
                .map(|o| o.obj_type)
                .or_else(|| created.get(&op.obj).copied())
                .ok_or_else(|| EngineError::failure(format!("Op {id} targets unknown object {}", op.obj)))?;

            match (&op.key, obj_type) {
                (Key::Map(_), t) if t.is_map_like() => {
                    if op.insert {
                        return Err(EngineError::failure(format!("Op {id} inserts into a {t}")));
                    }
                }
                (Key::Seq(elem), ObjType::List) => {
                    match elem {
                        ElemId::Head if !op.insert => {
                            return Err(EngineError::failure(format!("Op {id} updates _head")));
                        }
                        ElemId::Head => {}
                        ElemId::Op(elem) => {
                            let known = inserted.contains(elem)
                                || self.objects.get(&op.obj).is_some_and(|o| o.has_elem(elem));
                            if !known {
                                return Err(EngineError::failure(format!(
                                    "Op {id} references unknown element {elem}"
                                )));
                            }
                        }
                    }
                    if op.insert {
                        inserted.insert(id.clone());
                    }
                }
                (key, t) => {
                    return Err(EngineError::failure(format!(
                        "Op {id} uses key {key} on a {t}"
                    )));
                }
            }

            match op.action {
                Action::Set if op.value.is_none() => {
                    return Err(EngineError::failure(format!("Op {id} sets no value")));
                }
                Action::Inc if op.value.as_ref().and_then(ScalarValue::as_i64).is_none() => {
                    return Err(EngineError::failure(format!("Op {id} increments by a non-integer")));
                }
                Action::Del | Action::Inc if op.insert => {
                    return Err(EngineError::failure(format!("Op {id} cannot insert")));
                }
                _ => {}
            }
            if let Some(t) = op.action.obj_type() {
                created.insert(ObjectId::Op(id), t);
            }
        }
        Ok(())
    }

    /// Apply one validated operation.
    pub(super) fn apply_op(&mut self, id: OpId, op: &Op, touched: &mut Touched) {
        if matches!(op.key, Key::Seq(_))
            && !touched.created.contains(&op.obj)
            && !touched.lists_before.contains_key(&op.obj)
            && let Some(list) = self.objects.get(&op.obj)
        {
            touched
                .lists_before
                .insert(op.obj.clone(), list.visible_elems());
        }

        let record = match (op.action, &op.value) {
            (Action::Set, Some(value)) => Some(OpRecord {
                id: id.clone(),
                value: Stored::Scalar(value.clone()),
            }),
            (action, _) if action.is_make() => Some(OpRecord {
                id: id.clone(),
                value: Stored::Object,
            }),
            _ => None,
        };

        let Some(obj) = self.objects.get_mut(&op.obj) else {
            return;
        };
        let location = match &op.key {
            Key::Map(key) => {
                touched
                    .keys
                    .entry(op.obj.clone())
                    .or_default()
                    .insert(key.clone());
                let values = obj.props.entry(key.clone()).or_default();
                update(values, op, record);
                if values.is_empty() {
                    obj.props.remove(key);
                }
                Key::Map(key.clone())
            }
            Key::Seq(elem) => {
                let target = if op.insert {
                    let pos = rga_position(&obj.elems, elem, &id);
                    obj.elems.insert(
                        pos,
                        Element {
                            id: id.clone(),
                            values: Vec::new(),
                        },
                    );
                    id.clone()
                } else {
                    match elem {
                        ElemId::Op(elem) => elem.clone(),
                        ElemId::Head => return,
                    }
                };
                if let Some(element) = obj.elems.iter_mut().find(|e| e.id == target) {
                    update(&mut element.values, op, record);
                }
                touched
                    .elems
                    .entry(op.obj.clone())
                    .or_default()
                    .insert(target.clone());
                Key::Seq(ElemId::Op(target))
            }
        };

        if let Some(obj_type) = op.action.obj_type() {
            let object_id = ObjectId::Op(id.clone());
            self.objects.insert(
                object_id.clone(),
                ObjState::new(obj_type, Some((op.obj.clone(), location))),
            );
            touched.created.insert(object_id);
        }
        self.max_op = self.max_op.max(id.counter());
    }

    /// Diff covering the locations in `touched` and the path to each of them.
    pub(super) fn diff(&self, touched: &Touched) -> MapDiff {
        let mut dirty: HashSet<ObjectId> = HashSet::new();
        let mut dirty_children: HashMap<ObjectId, HashSet<Key>> = HashMap::new();
        for obj in touched.objects() {
            let mut current = obj.clone();
            while dirty.insert(current.clone()) {
                let Some((parent, key)) = self.objects.get(&current).and_then(|o| o.parent.clone())
                else {
                    break;
                };
                dirty_children.entry(parent.clone()).or_default().insert(key);
                current = parent;
            }
        }

        if !dirty.contains(&ObjectId::Root) {
            return MapDiff::empty();
        }
        let scope = Scope {
            touched,
            full: false,
            dirty_children,
        };
        self.map_diff(&ObjectId::Root, &scope)
    }

    /// Diff that builds the whole document from nothing.
    pub(super) fn full_diff(&self) -> MapDiff {
        let touched = Touched::default();
        let scope = Scope {
            touched: &touched,
            full: true,
            dirty_children: HashMap::new(),
        };
        self.map_diff(&ObjectId::Root, &scope)
    }

    fn object_diff(&self, id: &ObjectId, scope: &Scope<'_>) -> Diff {
        match self.objects.get(id).map(|o| o.obj_type) {
            Some(ObjType::List) => Diff::List(self.list_diff(id, scope)),
            _ => Diff::Map(self.map_diff(id, scope)),
        }
    }

    fn map_diff(&self, id: &ObjectId, scope: &Scope<'_>) -> MapDiff {
        let Some(obj) = self.objects.get(id) else {
            return MapDiff::new(id.clone(), ObjType::Map);
        };
        let mut diff = MapDiff::new(id.clone(), obj.obj_type);

        let keys: BTreeSet<String> = if scope.covers_everything(id) {
            obj.props.keys().cloned().collect()
        } else {
            let touched = scope.touched.keys.get(id).into_iter().flatten().cloned();
            let dirty = scope
                .dirty_children
                .get(id)
                .into_iter()
                .flatten()
                .filter_map(|key| key.as_map().map(str::to_string));
            touched.chain(dirty).collect()
        };

        for key in keys {
            let values = obj.props.get(&key).map(Vec::as_slice).unwrap_or_default();
            diff.props.insert(key, self.conflict_diff(values, scope));
        }
        diff
    }

    fn list_diff(&self, id: &ObjectId, scope: &Scope<'_>) -> ListDiff {
        let mut diff = ListDiff::new(id.clone());
        let Some(obj) = self.objects.get(id) else {
            return diff;
        };

        let after = obj.visible_elems();
        let everything = scope.covers_everything(id);
        let before = if everything {
            Vec::new()
        } else {
            scope
                .touched
                .lists_before
                .get(id)
                .cloned()
                .unwrap_or_else(|| after.clone())
        };
        diff.edits = list_edits(&before, &after);

        let mut emit: HashSet<&OpId> = HashSet::new();
        if !everything {
            emit.extend(scope.touched.elems.get(id).into_iter().flatten());
            emit.extend(
                scope
                    .dirty_children
                    .get(id)
                    .into_iter()
                    .flatten()
                    .filter_map(|key| match key.as_elem() {
                        Some(ElemId::Op(elem)) => Some(elem),
                        _ => None,
                    }),
            );
        }

        for (index, elem) in obj.elems.iter().filter(|e| e.is_visible()).enumerate() {
            if everything || emit.contains(&elem.id) {
                diff.props
                    .insert(index, self.conflict_diff(&elem.values, scope));
            }
        }
        diff
    }

    fn conflict_diff(&self, values: &[OpRecord], scope: &Scope<'_>) -> ConflictDiff {
        let mut out = ConflictDiff::new();
        for record in values {
            // Two values from one actor can only come from replicas sharing
            // an actor id; the later operation wins.
            if out
                .get(record.id.actor())
                .and_then(Diff::op_id)
                .is_some_and(|existing| existing > &record.id)
            {
                continue;
            }
            let diff = match &record.value {
                Stored::Scalar(value) => Diff::Value(ValueDiff {
                    op_id: record.id.clone(),
                    value: value.clone(),
                }),
                Stored::Object => self.object_diff(&ObjectId::Op(record.id.clone()), scope),
            };
            out.insert(record.id.actor().clone(), diff);
        }
        out
    }
}

/// Apply an operation to the values at one location.
fn update(values: &mut Vec<OpRecord>, op: &Op, record: Option<OpRecord>) {
    if op.action == Action::Inc {
        let delta = op.value.as_ref().and_then(ScalarValue::as_i64).unwrap_or(0);
        for existing in values.iter_mut() {
            if op.pred.contains(&existing.id)
                && let Stored::Scalar(ScalarValue::Counter(n)) = &mut existing.value
            {
                *n = n.wrapping_add(delta);
            }
        }
        return;
    }
    values.retain(|existing| !op.pred.contains(&existing.id));
    if let Some(record) = record {
        values.push(record);
    }
}

/// Index at which an element with id `id` inserted after `reference` goes.
fn rga_position(elems: &[Element], reference: &ElemId, id: &OpId) -> usize {
    let mut pos = match reference {
        ElemId::Head => 0,
        ElemId::Op(reference) => elems
            .iter()
            .position(|e| &e.id == reference)
            .map_or(elems.len(), |p| p + 1),
    };
    while pos < elems.len() && elems[pos].id > *id {
        pos += 1;
    }
    pos
}

/// Edits turning the element sequence `before` into `after`.
///
/// Both sequences are subsequences of the same total element order, so all
/// removals are emitted first (back to front) followed by all insertions
/// (front to back).
fn list_edits(before: &[OpId], after: &[OpId]) -> Vec<Edit> {
    let before_set: HashSet<&OpId> = before.iter().collect();
    let after_set: HashSet<&OpId> = after.iter().collect();

    let removals = before
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, id)| !after_set.contains(id))
        .map(|(index, _)| Edit::Remove { index });
    let insertions = after
        .iter()
        .enumerate()
        .filter(|(_, id)| !before_set.contains(id))
        .map(|(index, id)| Edit::Insert {
            index,
            elem_id: id.clone(),
        });
    removals.chain(insertions).collect()
}
