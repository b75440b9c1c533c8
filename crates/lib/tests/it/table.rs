use accord::{
    Error,
    builder::ChangeError,
    doc::{NewValue, RowId},
    path,
};
use serde::{Deserialize, Serialize};

use crate::helpers::{actor, new_doc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sighting {
    species: String,
    count: u32,
}

fn sighting(species: &str, count: u32) -> Sighting {
    Sighting {
        species: species.to_string(),
        count,
    }
}

fn doc_with_table() -> accord::Document {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("sightings", NewValue::table())?))
        .unwrap();
    doc
}

#[test]
fn added_rows_are_readable() {
    let mut doc = doc_with_table();
    let mut id = None;
    doc.change(|tx| {
        id = Some(tx.table("sightings")?.add(&sighting("wren", 2))?);
        Ok(())
    })
    .unwrap();
    let id = id.unwrap();

    let table = doc.table::<Sighting>("sightings").unwrap();
    assert_eq!(table.count(), 1);
    assert_eq!(table.ids(), vec![id.clone()]);
    let row = table.row(&id).unwrap().unwrap();
    assert_eq!(row.value, sighting("wren", 2));
    assert!(table.row(&RowId::from("missing")).unwrap().is_none());
}

#[test]
fn row_fields_update_in_place() {
    let mut doc = doc_with_table();
    let id = RowId::from("row1");
    doc.change(|tx| {
        tx.table("sightings")?.add_with_id(id.clone(), &sighting("robin", 1))?;
        Ok(())
    })
    .unwrap();

    let request = doc
        .change(|tx| Ok(tx.set(path!["sightings", &id, "count"], 5)?))
        .unwrap()
        .unwrap();
    assert_eq!(request.ops.len(), 1);

    doc.change(|tx| Ok(tx.table("sightings")?.set_field(&id, "species", "redbreast")?))
        .unwrap();
    let row = doc
        .table::<Sighting>("sightings")
        .unwrap()
        .row(&id)
        .unwrap()
        .unwrap();
    assert_eq!(row.value, sighting("redbreast", 5));
}

#[test]
fn removing_rows() {
    let mut doc = doc_with_table();
    let id = RowId::from("row1");
    doc.change(|tx| {
        let mut table = tx.table("sightings")?;
        table.add_with_id(id.clone(), &sighting("wren", 1))?;
        table.add(&sighting("robin", 1))?;
        assert_eq!(table.count(), 2);
        Ok(())
    })
    .unwrap();

    doc.change(|tx| Ok(tx.table("sightings")?.remove_row(&id)?))
        .unwrap();
    let table = doc.table::<Sighting>("sightings").unwrap();
    assert_eq!(table.count(), 1);
    assert!(!table.ids().contains(&id));

    let err = doc
        .change(|tx| Ok(tx.table("sightings")?.remove_row(&id)?))
        .unwrap_err();
    assert!(err.is_stale_reference());
}

#[test]
fn rows_must_be_maps() {
    let mut doc = doc_with_table();
    let err = doc
        .change(|tx| Ok(tx.set(path!["sightings", "row1"], 3)?))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Change(ChangeError::TypeMismatch { expected: "map", .. })
    ));
}

#[test]
fn concurrent_additions_merge_without_conflicts() {
    let mut a = doc_with_table();
    let mut b = a.fork_as(actor("bb"));

    a.change(|tx| Ok(tx.table("sightings")?.add(&sighting("wren", 1)).map(drop)?))
        .unwrap();
    b.change(|tx| Ok(tx.table("sightings")?.add(&sighting("robin", 2)).map(drop)?))
        .unwrap();
    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    let rows_a = a.table::<Sighting>("sightings").unwrap().rows().unwrap();
    let rows_b = b.table::<Sighting>("sightings").unwrap().rows().unwrap();
    assert_eq!(rows_a.len(), 2);
    assert_eq!(rows_a, rows_b);
    for row in &rows_a {
        assert!(a.conflicts(path!["sightings", &row.id]).is_none());
    }
}

#[test]
fn table_view_rejects_other_objects() {
    let mut doc = new_doc("aa");
    doc.change(|tx| Ok(tx.set("sightings", NewValue::map())?))
        .unwrap();
    let err = doc.table::<Sighting>("sightings").unwrap_err();
    assert!(err.is_type_error());
}
