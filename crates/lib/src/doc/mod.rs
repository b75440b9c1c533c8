//! Materialized documents.
//!
//! A [`Snapshot`] is the immutable, structurally-shared view of a document
//! produced by applying patches. [`Document`] owns a snapshot together with
//! the engine that produced it and is the entry point for local mutation,
//! merging, persistence and sync.

mod counter;
mod document;
mod errors;
pub mod path;
mod schema;
mod snapshot;
mod table;
mod value;

pub use counter::Counter;
pub use document::{Document, DocumentOptions};
pub use errors::SchemaError;
pub use path::{Path, Segment};
pub use schema::{NewValue, Schema};
pub use snapshot::{ObjectRef, Snapshot};
pub(crate) use snapshot::lookup_conflicts;
pub use table::{Row, RowId, Table};
pub use value::{Conflicts, Entry, ListElem, ListObject, MapObject, Value};
