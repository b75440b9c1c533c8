//! The document engine contract.
//!
//! The engine owns the authoritative CRDT state: it assigns change hashes,
//! resolves concurrent operations, queues changes whose dependencies have
//! not arrived, and computes the patches the rest of the crate materializes.
//! Everything else in the crate talks to it through [`DocumentEngine`].
//!
//! [`MemoryEngine`] is the bundled implementation.

use std::fmt::Debug;

use crate::{
    Result,
    ids::ChangeHash,
    op::{Change, Request},
    patch::Patch,
    sync::{SyncMessage, SyncState},
};

mod errors;
mod memory;

pub use errors::EngineError;
pub use memory::MemoryEngine;

/// Operations a CRDT engine must provide.
///
/// Changes cross this boundary as opaque encoded bytes produced by the
/// engine itself.
pub trait DocumentEngine: Send + Debug {
    /// Apply a locally built request.
    ///
    /// The request's `seq` must follow the actor's last change and its
    /// `start_op` must follow the highest operation counter seen.
    fn apply_local_change(&mut self, request: &Request) -> Result<Patch>;

    /// Apply encoded changes from other replicas.
    ///
    /// Changes whose dependencies are missing are queued rather than
    /// rejected, and applied as soon as their dependencies arrive.
    /// Duplicates are ignored.
    fn apply_changes(&mut self, changes: &[Vec<u8>]) -> Result<Patch>;

    /// A patch that builds the current document from an empty snapshot.
    fn get_patch(&self) -> Result<Patch>;

    /// All changes not reachable from `have_deps`, in application order.
    fn get_changes(&self, have_deps: &[ChangeHash]) -> Result<Vec<Vec<u8>>>;

    /// Hashes of the changes no other change depends on, sorted.
    fn get_heads(&self) -> Vec<ChangeHash>;

    /// Dependencies of queued changes, plus any of `heads`, that are not
    /// known yet.
    fn get_missing_deps(&self, heads: &[ChangeHash]) -> Vec<ChangeHash>;

    /// Next sync message for a peer, or `None` if there is nothing to send.
    fn generate_sync_message(&self, state: &mut SyncState) -> Result<Option<Vec<u8>>>;

    /// Handle a sync message; returns a patch if new changes were applied.
    fn receive_sync_message(
        &mut self,
        state: &mut SyncState,
        message: &[u8],
    ) -> Result<Option<Patch>>;

    /// Encoded changes waiting on missing dependencies.
    fn queued_changes(&self) -> Vec<Vec<u8>>;

    /// Replace the dependency queue, applying whatever became ready.
    fn set_queued_changes(&mut self, changes: Vec<Vec<u8>>) -> Result<Patch>;

    fn decode_change(&self, change: &[u8]) -> Result<Change>;

    fn decode_sync_message(&self, message: &[u8]) -> Result<SyncMessage>;

    /// Serialize every applied change. Queued changes are not included.
    fn save(&self) -> Result<Vec<u8>>;

    fn load(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;

    /// An independent copy of this engine.
    fn fork(&self) -> Self
    where
        Self: Sized;
}
