//!
//! Accord: the replication core of a collaborative CRDT document model.
//!
//! The crate turns local mutations into causally-ordered operation batches,
//! materializes diffs produced by a document engine into a structured snapshot
//! that preserves concurrent-write conflicts, and drives the peer-to-peer sync
//! protocol that exchanges only the changes a peer is missing.
//!
//! ## Core Concepts
//!
//! * **Identity (`ids`)**: [`Actor`], [`OpId`], [`ObjectId`], [`ElemId`] and
//!   [`ChangeHash`] name replicas, operations, objects and changes.
//! * **Operations (`op`)**: [`op::Op`], [`op::Request`] and [`op::Change`] are the
//!   vocabulary of a local mutation batch.
//! * **Patches (`patch`)**: [`patch::Patch`] and its diff tree describe what a
//!   batch of changes did; [`patch::apply_patch`] materializes it.
//! * **Documents (`doc`)**: [`doc::Snapshot`] is the materialized state with its
//!   conflict sets; [`Document`] wires builder, engine and applier together.
//! * **Builder (`builder`)**: [`builder::RequestBuilder`] captures one mutation
//!   session and emits at most one request.
//! * **Engine (`engine`)**: [`engine::DocumentEngine`] is the narrow contract to
//!   the CRDT merge engine; [`engine::MemoryEngine`] is the bundled in-memory
//!   implementation.
//! * **Sync (`sync`)**: [`sync::SyncCoordinator`] runs the per-peer protocol state
//!   machine over a [`sync::SyncState`].

pub mod builder;
pub mod clock;
pub mod doc;
pub mod engine;
pub mod ids;
pub mod op;
pub mod patch;
pub mod sync;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use doc::{Document, DocumentOptions};
pub use ids::{Actor, ChangeHash, ElemId, ObjectId, OpId};

/// Result type used throughout the Accord library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Accord library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Malformed identifiers
    #[error(transparent)]
    Id(ids::IdError),

    /// Structured errors raised while building a change request
    #[error(transparent)]
    Change(builder::ChangeError),

    /// Structured errors raised while applying a patch
    #[error(transparent)]
    Patch(patch::PatchError),

    /// Errors surfaced from the document engine
    #[error(transparent)]
    Engine(engine::EngineError),

    /// Structured sync coordinator errors
    #[error(transparent)]
    Sync(sync::SyncError),

    /// Typed schema encode/decode errors
    #[error(transparent)]
    Schema(doc::SchemaError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Serialize(_) => "serialize",
            Error::Id(_) => "ids",
            Error::Change(_) => "builder",
            Error::Patch(_) => "patch",
            Error::Engine(_) => "engine",
            Error::Sync(_) => "sync",
            Error::Schema(_) => "schema",
        }
    }

    /// Check if a mutation targeted a path invalidated by a concurrent deletion.
    ///
    /// This is recoverable: the caller should re-derive the path from the
    /// current snapshot and retry.
    pub fn is_stale_reference(&self) -> bool {
        match self {
            Error::Change(err) => err.is_stale_reference(),
            _ => false,
        }
    }

    /// Check if this error means the engine and the materialized snapshot
    /// have diverged.
    pub fn is_malformed_patch(&self) -> bool {
        matches!(self, Error::Patch(_))
    }

    /// Check if this error is an opaque failure reported by the engine.
    pub fn is_engine_failure(&self) -> bool {
        match self {
            Error::Engine(err) => err.is_failure(),
            _ => false,
        }
    }

    /// Check if this error came from decoding bytes produced elsewhere.
    pub fn is_decode_error(&self) -> bool {
        match self {
            Error::Serialize(_) | Error::Id(_) => true,
            Error::Engine(err) => err.is_decode_error(),
            Error::Sync(err) => err.is_decode_error(),
            Error::Schema(err) => err.is_decode_error(),
            _ => false,
        }
    }

    /// Check if this error is a type mismatch between a path and the object
    /// it resolves to.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Change(err) => err.is_type_error(),
            Error::Schema(err) => err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error is builder-related.
    pub fn is_change_error(&self) -> bool {
        matches!(self, Error::Change(_))
    }

    /// Check if this error is sync-related.
    pub fn is_sync_error(&self) -> bool {
        matches!(self, Error::Sync(_))
    }
}
