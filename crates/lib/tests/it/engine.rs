use accord::{
    Document,
    builder::RequestBuilder,
    doc::{NewValue, Snapshot},
    engine::{DocumentEngine, MemoryEngine},
    patch::apply_patch,
};

use crate::helpers::{actor, new_doc, options};

#[test]
fn requests_must_follow_the_actor_sequence() {
    let snapshot = Snapshot::empty();
    let mut request = RequestBuilder::new(&snapshot, actor("aa"))
        .build(|tx| Ok(tx.set("bird", "wren")?))
        .unwrap()
        .unwrap();
    request.seq = 2;

    let mut engine = MemoryEngine::new();
    let err = engine.apply_local_change(&request).unwrap_err();
    assert!(err.is_engine_failure());
    assert!(err.to_string().contains("Mismatched sequence number"));
    assert_eq!(engine.change_count(), 0);
}

#[test]
fn requests_must_follow_the_op_counter() {
    let snapshot = Snapshot::empty();
    let mut request = RequestBuilder::new(&snapshot, actor("aa"))
        .build(|tx| Ok(tx.set("bird", "wren")?))
        .unwrap()
        .unwrap();
    request.start_op = 7;

    let err = MemoryEngine::new().apply_local_change(&request).unwrap_err();
    assert!(err.is_engine_failure());
}

#[test]
fn full_patch_matches_incremental_snapshot() {
    let mut doc = new_doc("aa");
    doc.change(|tx| {
        tx.set("nest", NewValue::map().with("eggs", 3))?;
        tx.set("birds", NewValue::list())?;
        tx.push("birds", "wren")?;
        tx.push("birds", "robin")?;
        tx.set("visits", NewValue::counter(1))?;
        Ok(())
    })
    .unwrap();
    doc.change(|tx| {
        tx.delete(accord::path!["birds", 0])?;
        tx.increment("visits", 2)?;
        Ok(())
    })
    .unwrap();

    let patch = doc.engine().get_patch().unwrap();
    let rebuilt = apply_patch(&Snapshot::empty(), &patch).unwrap();
    assert_eq!(rebuilt.to_json(), doc.to_json());
    assert_eq!(rebuilt.max_op(), doc.snapshot().max_op());
    assert_eq!(rebuilt.deps(), doc.snapshot().deps());
    assert_eq!(rebuilt.clock(), doc.snapshot().clock());
}

#[test]
fn wrapping_an_engine_materializes_it() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();

    let engine = doc.engine().fork();
    let wrapped = Document::with_engine(engine, options("bb")).unwrap();
    assert_eq!(wrapped.to_json(), doc.to_json());
    assert_eq!(wrapped.snapshot().seq_of(&actor("aa")), 1);
}

#[test]
fn decoding_rejects_garbage() {
    let engine = MemoryEngine::new();
    assert!(engine.decode_change(b"{").unwrap_err().is_decode_error());
    assert!(engine.decode_sync_message(b"{").unwrap_err().is_decode_error());
    assert!(MemoryEngine::load(b"[]").is_err());
}

#[test]
fn decoded_changes_describe_their_request() {
    let mut doc = new_doc("aa");
    let request = doc
        .change_with_message("first sighting", |tx| Ok(tx.set("bird", "wren")?))
        .unwrap()
        .unwrap();

    let changes = doc.all_changes().unwrap();
    let change = doc.decode_change(&changes[0]).unwrap();
    assert_eq!(change.actor, request.actor);
    assert_eq!(change.seq, request.seq);
    assert_eq!(change.start_op, request.start_op);
    assert_eq!(change.time, request.time);
    assert_eq!(change.message.as_deref(), Some("first sighting"));
    assert_eq!(vec![change.hash], doc.get_heads());
}

#[test]
fn missing_dependencies_include_unknown_heads() {
    let mut source = new_doc("aa");
    source.change(|tx| Ok(tx.set("bird", "wren")?)).unwrap();

    let engine = MemoryEngine::new();
    assert_eq!(engine.get_missing_deps(&source.get_heads()), source.get_heads());
    assert!(engine.get_missing_deps(&[]).is_empty());
}
