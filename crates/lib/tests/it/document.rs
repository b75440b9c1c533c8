use accord::{Document, doc::NewValue, path};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use crate::helpers::{actor, new_doc, options};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Aviary {
    name: String,
    birds: Vec<String>,
}

fn aviary() -> Aviary {
    Aviary {
        name: "garden".to_string(),
        birds: vec!["wren".to_string(), "robin".to_string()],
    }
}

#[test]
fn from_schema_records_one_initialization_change() {
    let doc: Document = Document::from_schema(&aviary(), options("aa")).unwrap();
    let changes = doc.all_changes().unwrap();
    assert_eq!(changes.len(), 1);

    let change = doc.decode_change(&changes[0]).unwrap();
    assert_eq!(change.message.as_deref(), Some("Initialization"));
    assert_eq!(change.seq, 1);
    assert_eq!(doc.content::<Aviary>().unwrap(), aviary());
}

#[test]
fn typed_content_after_edits() {
    let mut doc: Document = Document::from_schema(&aviary(), options("aa")).unwrap();
    doc.change(|tx| {
        tx.push("birds", "magpie")?;
        tx.delete(path!["birds", 0])?;
        Ok(())
    })
    .unwrap();
    let content: Aviary = doc.content().unwrap();
    assert_eq!(content.birds, vec!["robin", "magpie"]);
}

#[test]
fn forks_diverge_and_merge() {
    let mut base = new_doc("aa");
    base.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    let mut other = base.fork_as(actor("bb"));

    base.change(|tx| Ok(tx.set("feeder", "seed")?)).unwrap();
    other.change(|tx| Ok(tx.set("bath", "water")?)).unwrap();
    assert!(base.get("bath").is_none());

    base.merge(&other).unwrap();
    other.merge(&base).unwrap();
    assert_eq!(base.to_json(), other.to_json());
    assert_eq!(base.get_heads(), other.get_heads());
    assert_eq!(base.get_heads().len(), 2);
}

#[test]
fn fork_gets_a_fresh_actor() {
    let base = new_doc("aa");
    let fork = base.fork();
    assert_ne!(fork.actor(), base.actor());
}

#[test]
fn concurrent_writes_conflict_identically_on_both_sides() {
    let mut a = new_doc("aa");
    a.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    let mut b = a.fork_as(actor("bb"));

    a.change(|tx| Ok(tx.set("bird", "robin")?)).unwrap();
    b.change(|tx| Ok(tx.set("bird", "magpie")?)).unwrap();

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    // The highest actor wins the primary value.
    assert_eq!(a.get("bird").and_then(|v| v.as_str()), Some("magpie"));
    assert_eq!(a.conflicts("bird"), b.conflicts("bird"));
    let conflicts = a.conflicts("bird").unwrap();
    assert_eq!(conflicts[&actor("aa")].as_str(), Some("robin"));
    assert_eq!(conflicts[&actor("bb")].as_str(), Some("magpie"));

    // Writing again resolves the conflict.
    a.change(|tx| Ok(tx.set("bird", "robin")?)).unwrap();
    assert!(a.conflicts("bird").is_none());
}

#[test]
fn changes_arriving_out_of_order_are_queued() {
    let mut source = new_doc("aa");
    for bird in ["wren", "robin", "magpie"] {
        source.change(|tx| Ok(tx.set("bird", bird)?)).unwrap();
    }
    let changes = source.all_changes().unwrap();

    let mut target = new_doc("bb");
    target.apply_changes(&changes[2..]).unwrap();
    assert!(target.get("bird").is_none());
    assert_eq!(target.queued_changes().len(), 1);
    assert_eq!(target.get_missing_deps().len(), 1);

    target.apply_changes(&changes[..2]).unwrap();
    assert!(target.queued_changes().is_empty());
    assert_eq!(target.get("bird").and_then(|v| v.as_str()), Some("magpie"));
}

#[test]
fn rejected_batch_leaves_document_unchanged() {
    let mut a = new_doc("aa");
    a.change(|tx| Ok(tx.set("x", 1)?)).unwrap();
    let good = a.all_changes().unwrap().remove(0);

    // A change from "cc" claiming to be its fifth.
    let mut c = new_doc("cc");
    c.change(|tx| Ok(tx.set("y", 2)?)).unwrap();
    let mut record: serde_json::Value =
        serde_json::from_slice(&c.all_changes().unwrap()[0]).unwrap();
    record["seq"] = 5.into();
    let bad = serde_json::to_vec(&record).unwrap();

    let mut b = new_doc("bb");
    let err = b.apply_changes(&[good.clone(), bad]).unwrap_err();
    assert!(err.is_engine_failure());
    assert_eq!(b.to_json(), serde_json::json!({}));
    assert!(b.get_heads().is_empty());
    assert!(b.queued_changes().is_empty());

    b.apply_changes(&[good]).unwrap();
    assert_eq!(b.to_json(), serde_json::json!({ "x": 1 }));
    let rebuilt: Document = Document::with_engine(b.engine().clone(), options("bb")).unwrap();
    assert_eq!(rebuilt.to_json(), b.to_json());
}

#[test]
fn changes_since_heads() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("a", 1)?)).unwrap();
    let heads = doc.get_heads();
    doc.change(|tx| Ok(tx.set("b", 2)?)).unwrap();
    doc.change(|tx| Ok(tx.set("c", 3)?)).unwrap();

    let changes = doc.get_changes_since(&heads).unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(doc.decode_change(&changes[0]).unwrap().seq, 2);
}

#[test]
fn queued_changes_survive_a_restart() {
    let mut source = new_doc("aa");
    source.change(|tx| Ok(tx.set("a", 1)?)).unwrap();
    source.change(|tx| Ok(tx.set("b", 2)?)).unwrap();
    let changes = source.all_changes().unwrap();

    let mut target = new_doc("bb");
    target.apply_changes(&changes[1..]).unwrap();
    let queued = target.queued_changes();
    let saved = target.save().unwrap();

    let mut restored: Document = Document::load(&saved, options("bb")).unwrap();
    restored.set_queued_changes(queued).unwrap();
    restored.apply_changes(&changes[..1]).unwrap();
    assert_eq!(restored.to_json(), source.to_json());
}

#[test]
fn save_to_disk_and_load() {
    let mut doc = new_doc("aa");
    doc.change(|tx| {
        tx.set("nest", NewValue::map().with("eggs", 4))?;
        tx.set("birds", NewValue::list())?;
        tx.push("birds", "wren")?;
        Ok(())
    })
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("aviary.accord");
    std::fs::write(&file, doc.save().unwrap()).unwrap();

    let bytes = std::fs::read(&file).unwrap();
    let loaded: Document = Document::load(&bytes, options("aa")).unwrap();
    assert_eq!(loaded.to_json(), doc.to_json());
    assert_eq!(loaded.save().unwrap(), bytes);
    assert_eq!(loaded.snapshot().max_op(), doc.snapshot().max_op());
}

#[test]
fn loading_garbage_fails() {
    let err = Document::<accord::engine::MemoryEngine>::load(b"not a document", options("aa"))
        .unwrap_err();
    assert_eq!(err.module(), "engine");
}

#[derive(Debug, Clone)]
enum Edit {
    Set(usize, i64),
    Delete(usize),
}

fn edit() -> impl Strategy<Value = (bool, Edit)> {
    let edit = prop_oneof![
        (0..3usize, any::<i64>()).prop_map(|(key, value)| Edit::Set(key, value)),
        (0..3usize).prop_map(Edit::Delete),
    ];
    (any::<bool>(), edit)
}

const KEYS: [&str; 3] = ["wren", "robin", "magpie"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn merging_is_commutative(edits in prop::collection::vec(edit(), 1..12)) {
        let mut base = new_doc("aa");
        base.change(|tx| {
            for key in KEYS {
                tx.set(key, 0)?;
            }
            Ok(())
        })
        .unwrap();
        let mut left = base.fork_as(actor("bb"));
        let mut right = base.fork_as(actor("cc"));

        for (on_left, edit) in edits {
            let doc = if on_left { &mut left } else { &mut right };
            doc.change(|tx| {
                match edit {
                    Edit::Set(key, value) => tx.set(KEYS[key], value)?,
                    Edit::Delete(key) => tx.delete(KEYS[key])?,
                }
                Ok(())
            })
            .unwrap();
        }

        let mut left_then_right = left.fork_as(actor("dd"));
        left_then_right.merge(&right).unwrap();
        let mut right_then_left = right.fork_as(actor("ee"));
        right_then_left.merge(&left).unwrap();

        prop_assert_eq!(left_then_right.to_json(), right_then_left.to_json());
        prop_assert_eq!(left_then_right.get_heads(), right_then_left.get_heads());
        for key in KEYS {
            prop_assert_eq!(left_then_right.conflicts(key), right_then_left.conflicts(key));
        }
    }
}
