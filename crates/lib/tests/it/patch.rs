use std::collections::BTreeMap;

use accord::{
    ObjectId, OpId,
    engine::DocumentEngine,
    doc::{NewValue, Snapshot, Value},
    op::{ObjType, ScalarValue},
    patch::{Diff, Edit, ListDiff, MapDiff, Patch, ValueDiff, apply_patch},
    path,
};

use crate::helpers::{actor, new_doc};

fn value(counter: u64, hex: &str, value: impl Into<ScalarValue>) -> Diff {
    Diff::Value(ValueDiff {
        op_id: OpId::new(counter, actor(hex)),
        value: value.into(),
    })
}

fn patch(diffs: MapDiff) -> Patch {
    Patch {
        actor: None,
        seq: None,
        clock: BTreeMap::new(),
        deps: Vec::new(),
        max_op: 0,
        diffs,
    }
}

#[test]
fn concurrent_writes_keep_every_value() {
    let mut diffs = MapDiff::empty();
    diffs.props.insert(
        "bird".to_string(),
        BTreeMap::from([
            (actor("aa"), value(1, "aa", "wren")),
            (actor("bb"), value(1, "bb", "robin")),
        ]),
    );

    let snapshot = apply_patch(&Snapshot::empty(), &patch(diffs)).unwrap();
    assert_eq!(
        snapshot.get(&path!["bird"]).and_then(Value::as_str),
        Some("robin")
    );
    let conflicts = snapshot.conflicts(&path!["bird"]).unwrap();
    assert_eq!(conflicts.len(), 2);
    assert_eq!(conflicts[&actor("aa")].as_str(), Some("wren"));
}

#[test]
fn empty_conflict_set_deletes_the_key() {
    let mut first = MapDiff::empty();
    first
        .props
        .insert("bird".to_string(), BTreeMap::from([(actor("aa"), value(1, "aa", "wren"))]));
    let snapshot = apply_patch(&Snapshot::empty(), &patch(first)).unwrap();

    let mut second = MapDiff::empty();
    second.props.insert("bird".to_string(), BTreeMap::new());
    let snapshot = apply_patch(&snapshot, &patch(second)).unwrap();
    assert!(snapshot.get(&path!["bird"]).is_none());
}

#[test]
fn deleted_key_comes_back_without_stale_values() {
    let mut first = MapDiff::empty();
    first.props.insert(
        "bird".to_string(),
        BTreeMap::from([
            (actor("aa"), value(1, "aa", "wren")),
            (actor("bb"), value(1, "bb", "robin")),
        ]),
    );
    let snapshot = apply_patch(&Snapshot::empty(), &patch(first)).unwrap();

    let mut deletion = MapDiff::empty();
    deletion.props.insert("bird".to_string(), BTreeMap::new());
    let snapshot = apply_patch(&snapshot, &patch(deletion)).unwrap();

    let mut readd = MapDiff::empty();
    readd
        .props
        .insert("bird".to_string(), BTreeMap::from([(actor("cc"), value(3, "cc", "magpie"))]));
    let snapshot = apply_patch(&snapshot, &patch(readd)).unwrap();

    let bird = path!["bird"];
    assert_eq!(snapshot.get(&bird).and_then(Value::as_str), Some("magpie"));
    assert!(snapshot.conflicts(&bird).is_none());
    let entries = snapshot.conflict_set(&bird).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries.op_ids(), vec![OpId::new(3, actor("cc"))]);
    assert!(entries.get(&actor("aa")).is_none());
    assert!(entries.get(&actor("bb")).is_none());
}

#[test]
fn applying_a_patch_twice_gives_the_same_snapshot() {
    let mut base_diffs = MapDiff::empty();
    base_diffs
        .props
        .insert("bird".to_string(), BTreeMap::from([(actor("aa"), value(1, "aa", "wren"))]));
    let base = apply_patch(&Snapshot::empty(), &patch(base_diffs)).unwrap();

    let list_id = ObjectId::Op(OpId::new(2, actor("bb")));
    let mut list = ListDiff::new(list_id);
    list.edits = vec![Edit::Insert {
        index: 0,
        elem_id: OpId::new(3, actor("bb")),
    }];
    list.props.insert(0, BTreeMap::from([(actor("bb"), value(3, "bb", "seed"))]));
    let mut diffs = MapDiff::empty();
    diffs
        .props
        .insert("feeder".to_string(), BTreeMap::from([(actor("bb"), Diff::List(list))]));
    diffs.props.insert(
        "bird".to_string(),
        BTreeMap::from([
            (actor("aa"), value(1, "aa", "wren")),
            (actor("bb"), value(4, "bb", "robin")),
        ]),
    );
    let update = patch(diffs);

    let once = apply_patch(&base, &update).unwrap();
    let twice = apply_patch(&base, &update).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.to_json(), serde_json::json!({"bird": "robin", "feeder": ["seed"]}));
    assert_eq!(base.to_json(), serde_json::json!({"bird": "wren"}));
}

#[test]
fn list_edits_then_props() {
    let list_id = ObjectId::Op(OpId::new(1, actor("aa")));
    let mut list = ListDiff::new(list_id.clone());
    list.edits = vec![
        Edit::Insert {
            index: 0,
            elem_id: OpId::new(2, actor("aa")),
        },
        Edit::Insert {
            index: 1,
            elem_id: OpId::new(3, actor("aa")),
        },
    ];
    list.props.insert(0, BTreeMap::from([(actor("aa"), value(2, "aa", "wren"))]));
    list.props.insert(1, BTreeMap::from([(actor("aa"), value(3, "aa", "robin"))]));

    let mut diffs = MapDiff::empty();
    diffs
        .props
        .insert("birds".to_string(), BTreeMap::from([(actor("aa"), Diff::List(list))]));
    let snapshot = apply_patch(&Snapshot::empty(), &patch(diffs)).unwrap();
    assert_eq!(snapshot.to_json(), serde_json::json!({"birds": ["wren", "robin"]}));

    let mut removal = ListDiff::new(list_id);
    removal.edits = vec![Edit::Remove { index: 0 }];
    let mut diffs = MapDiff::empty();
    diffs
        .props
        .insert("birds".to_string(), BTreeMap::from([(actor("aa"), Diff::List(removal))]));
    let snapshot = apply_patch(&snapshot, &patch(diffs)).unwrap();
    assert_eq!(snapshot.to_json(), serde_json::json!({"birds": ["robin"]}));
}

#[test]
fn removing_beyond_the_list_is_malformed() {
    let mut list = ListDiff::new(ObjectId::Op(OpId::new(1, actor("aa"))));
    list.edits = vec![Edit::Remove { index: 4 }];
    let mut diffs = MapDiff::empty();
    diffs
        .props
        .insert("birds".to_string(), BTreeMap::from([(actor("aa"), Diff::List(list))]));

    let err = apply_patch(&Snapshot::empty(), &patch(diffs)).unwrap_err();
    assert!(accord::Error::from(err).is_malformed_patch());
}

#[test]
fn non_root_patch_is_malformed() {
    let diffs = MapDiff::new(ObjectId::Op(OpId::new(1, actor("aa"))), ObjType::Map);
    assert!(apply_patch(&Snapshot::empty(), &patch(diffs)).is_err());
}

#[test]
fn untouched_subtrees_are_shared() {
    let mut doc = new_doc("aa");
    doc.change(|tx| {
        tx.set("nest", NewValue::map().with("species", "wren"))?;
        tx.set("feeder", NewValue::map().with("seed", "millet"))?;
        Ok(())
    })
    .unwrap();
    let before = doc.snapshot().clone();

    doc.change(|tx| Ok(tx.set(path!["feeder", "seed"], "suet")?))
        .unwrap();
    let after = doc.snapshot();

    let nest_before = before.get(&path!["nest"]).unwrap();
    let nest_after = after.get(&path!["nest"]).unwrap();
    assert!(nest_before.ptr_eq(nest_after));
    assert!(!before.get(&path!["feeder"]).unwrap().ptr_eq(after.get(&path!["feeder"]).unwrap()));
}

#[test]
fn engine_patches_report_changed_properties() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    let patch = doc.engine().get_patch().unwrap();
    let changed = patch.changed_properties();
    assert_eq!(changed.get("bird").map(String::as_str), Some("wren"));
}
