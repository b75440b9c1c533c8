use accord::{Error, builder::ChangeError, doc::NewValue, path};
use proptest::prelude::*;

use crate::helpers::{actor, new_doc};

#[test]
fn increments_accumulate() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("visits", NewValue::counter(10))?))
        .unwrap();
    let request = doc
        .change(|tx| {
            tx.increment("visits", 3)?;
            tx.increment("visits", -1)?;
            let counter = tx.get("visits").and_then(|v| v.as_counter()).copied().unwrap();
            assert_eq!(counter.committed(), 10);
            assert_eq!(counter.pending(), 2);
            Ok(())
        })
        .unwrap()
        .unwrap();

    assert_eq!(request.ops.len(), 2);
    assert!(request.ops.iter().all(|op| op.pred == vec![accord::OpId::new(1, actor("aa"))]));
    assert_eq!(doc.counter("visits"), Some(12));
}

#[test]
fn counters_in_lists() {
    let mut doc = new_doc("aa");
    doc.change(|tx| {
        tx.set("tallies", NewValue::list())?;
        tx.push("tallies", NewValue::counter(0))?;
        Ok(())
    })
    .unwrap();
    doc.change(|tx| Ok(tx.increment(path!["tallies", 0], 4)?))
        .unwrap();
    assert_eq!(doc.counter(path!["tallies", 0]), Some(4));
}

#[test]
fn overflowing_increments_wrap_on_every_replica() {
    let mut a = new_doc("aa");
    a.change(|tx| Ok(tx.set("visits", NewValue::counter(i64::MAX))?))
        .unwrap();
    let mut b = a.fork_as(actor("bb"));

    a.change(|tx| Ok(tx.increment("visits", 1)?)).unwrap();
    assert_eq!(a.counter("visits"), Some(i64::MIN));

    b.merge(&a).unwrap();
    assert_eq!(b.counter("visits"), Some(i64::MIN));
}

#[test]
fn incrementing_a_plain_number_fails() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("visits", 1)?)).unwrap();
    let err = doc
        .change(|tx| Ok(tx.increment("visits", 1)?))
        .unwrap_err();
    assert!(matches!(err, Error::Change(ChangeError::NotACounter { .. })));
}

#[test]
fn overwriting_a_counter_drops_concurrent_increments() {
    let mut a = new_doc("aa");
    a.change(|tx| Ok(tx.set("visits", NewValue::counter(1))?))
        .unwrap();
    let mut b = a.fork_as(actor("bb"));

    a.change(|tx| Ok(tx.set("visits", NewValue::counter(100))?))
        .unwrap();
    b.change(|tx| Ok(tx.increment("visits", 5)?)).unwrap();
    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    assert_eq!(a.counter("visits"), Some(100));
    assert_eq!(b.counter("visits"), Some(100));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_increments_sum(
        left in prop::collection::vec(-50i64..50, 0..6),
        right in prop::collection::vec(-50i64..50, 0..6),
    ) {
        let mut a = new_doc("aa");
        a.change(|tx| Ok(tx.set("visits", NewValue::counter(0))?)).unwrap();
        let mut b = a.fork_as(actor("bb"));

        for delta in &left {
            a.change(|tx| Ok(tx.increment("visits", *delta)?)).unwrap();
        }
        for delta in &right {
            b.change(|tx| Ok(tx.increment("visits", *delta)?)).unwrap();
        }
        a.merge(&b).unwrap();
        b.merge(&a).unwrap();

        let expected: i64 = left.iter().chain(&right).sum();
        prop_assert_eq!(a.counter("visits"), Some(expected));
        prop_assert_eq!(b.counter("visits"), Some(expected));
    }
}
