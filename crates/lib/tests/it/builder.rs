use accord::{
    Error, ObjectId, OpId,
    builder::{ChangeError, RequestBuilder},
    doc::{NewValue, Snapshot},
    ids::ElemId,
    op::{Action, Key, ScalarValue},
    path,
};

use crate::helpers::{actor, new_doc};

#[test]
fn consecutive_requests_advance_start_op_and_seq() {
    let mut doc = new_doc("aa");
    let first = doc
        .change(|tx| {
            tx.set("title", "birds")?;
            tx.set("count", 2)?;
            Ok(())
        })
        .unwrap()
        .unwrap();
    assert_eq!((first.start_op, first.seq), (1, 1));
    assert!(first.deps.is_empty());
    let heads = doc.get_heads();

    let second = doc
        .change(|tx| Ok(tx.set("count", 3)?))
        .unwrap()
        .unwrap();
    assert_eq!(second.start_op, first.start_op + first.ops.len() as u64);
    assert_eq!(second.seq, 2);
    assert_eq!(second.deps, heads);
    assert_eq!(second.ops[0].pred, vec![OpId::new(2, actor("aa"))]);
}

#[test]
fn request_times_come_from_the_clock() {
    let mut doc = new_doc("aa");
    let first = doc.change(|tx| Ok(tx.set("a", 1)?)).unwrap().unwrap();
    let second = doc.change(|tx| Ok(tx.set("b", 1)?)).unwrap().unwrap();
    assert!(second.time > first.time);
}

#[test]
fn deleting_a_key_names_its_writer() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    let request = doc.change(|tx| Ok(tx.delete("bird")?)).unwrap().unwrap();

    assert_eq!(request.ops.len(), 1);
    let op = &request.ops[0];
    assert_eq!(op.action, Action::Del);
    assert_eq!(op.key, Key::Map("bird".to_string()));
    assert_eq!(op.pred, vec![OpId::new(1, actor("aa"))]);
    assert!(doc.get("bird").is_none());
}

#[test]
fn rewriting_the_same_value_records_nothing() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    let request = doc.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    assert!(request.is_none());
}

#[test]
fn list_inserts_reference_their_predecessor() {
    let snapshot = Snapshot::empty();
    let request = RequestBuilder::new(&snapshot, actor("aa"))
        .build(|tx| {
            tx.set("birds", NewValue::list())?;
            tx.push("birds", "wren")?;
            tx.push("birds", "robin")?;
            tx.insert("birds", 0, "magpie")?;
            Ok(())
        })
        .unwrap()
        .unwrap();

    let list = ObjectId::Op(OpId::new(1, actor("aa")));
    let inserts: Vec<_> = request.ops.iter().filter(|op| op.insert).collect();
    assert_eq!(inserts.len(), 3);
    assert!(inserts.iter().all(|op| op.obj == list));
    assert_eq!(inserts[0].key, Key::Seq(ElemId::Head));
    assert_eq!(inserts[1].key, Key::Seq(ElemId::Op(OpId::new(2, actor("aa")))));
    assert_eq!(inserts[2].key, Key::Seq(ElemId::Head));
}

#[test]
fn nested_values_are_written_depth_first() {
    let snapshot = Snapshot::empty();
    let request = RequestBuilder::new(&snapshot, actor("aa"))
        .build(|tx| {
            let nest = NewValue::map()
                .with("species", "wren")
                .with("eggs", NewValue::List(vec!["white".into(), "speckled".into()]));
            tx.set("nest", nest)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

    let actions: Vec<Action> = request.ops.iter().map(|op| op.action).collect();
    assert_eq!(
        actions,
        vec![Action::MakeMap, Action::MakeList, Action::Set, Action::Set, Action::Set]
    );
    assert_eq!(request.ops[4].value, Some(ScalarValue::from("wren")));
}

#[test]
fn writes_below_a_missing_key_are_stale() {
    let mut doc = new_doc("aa");
    let err = doc
        .change(|tx| Ok(tx.set(path!["nest", "species"], "wren")?))
        .unwrap_err();
    assert!(err.is_stale_reference());
}

#[test]
fn inserting_past_the_end_is_rejected() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("birds", NewValue::list())?)).unwrap();
    let err = doc
        .change(|tx| Ok(tx.insert("birds", 2, "wren")?))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Change(ChangeError::IndexOutOfBounds { index: 2, len: 0, .. })
    ));
}

#[test]
fn failed_session_leaves_the_document_alone() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();
    let before = doc.snapshot().clone();

    let result = doc.change(|tx| {
        tx.set("bird", "robin")?;
        tx.set(path!["bird", "species"], "robin")?;
        Ok(())
    });
    assert!(result.is_err());
    assert_eq!(doc.snapshot(), &before);
}

#[test]
fn root_cannot_be_deleted() {
    let snapshot = Snapshot::empty();
    let err = RequestBuilder::new(&snapshot, actor("aa"))
        .build(|tx| Ok(tx.delete(accord::doc::Path::root())?))
        .unwrap_err();
    assert!(matches!(err, Error::Change(ChangeError::InvalidPath { .. })));
}
