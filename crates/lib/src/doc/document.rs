//! The document facade.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::{debug, info};

use super::{Path, Schema, SchemaError, Snapshot, Table, Value};
use crate::{
    Result,
    builder::{RequestBuilder, Transaction},
    clock::{Clock, SystemClock},
    engine::{DocumentEngine, MemoryEngine},
    ids::{Actor, ChangeHash},
    op::{Change, Request},
    patch::{Patch, apply_patch},
    sync::{SyncCoordinator, SyncMessage},
};

/// Options for creating or loading a [`Document`].
#[derive(Clone, Default)]
pub struct DocumentOptions {
    actor: Option<Actor>,
    clock: Option<Arc<dyn Clock>>,
    message: Option<String>,
}

impl DocumentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed actor instead of a random one.
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Time source used to stamp change requests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Message attached to changes made without an explicit one.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Debug for DocumentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentOptions")
            .field("actor", &self.actor)
            .field("clock", &self.clock.is_some())
            .field("message", &self.message)
            .finish()
    }
}

/// A replicated document: an engine plus the snapshot materialized from it.
///
/// Every mutation goes through [`Document::change`]: the session is captured
/// as a [`Request`], applied by the engine, and the returned patch is folded
/// into the snapshot. Remote changes and sync messages take the same path
/// from the engine's patch onwards, so the snapshot always matches the
/// engine's state.
pub struct Document<E: DocumentEngine = MemoryEngine> {
    engine: E,
    snapshot: Snapshot,
    actor: Actor,
    clock: Arc<dyn Clock>,
    message: Option<String>,
}

impl<E: DocumentEngine> fmt::Debug for Document<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("actor", &self.actor)
            .field("heads", &self.snapshot.deps())
            .field("max_op", &self.snapshot.max_op())
            .finish_non_exhaustive()
    }
}

impl<E: DocumentEngine + Default> Document<E> {
    /// An empty document.
    pub fn new(options: DocumentOptions) -> Self {
        Self::from_parts(E::default(), Snapshot::empty(), options)
    }

    /// A document whose initial content is `content`, recorded as a single
    /// "Initialization" change.
    pub fn from_schema<T: Schema>(content: &T, options: DocumentOptions) -> Result<Self> {
        let mut doc = Self::new(options);
        doc.change_with_message("Initialization", |tx| Ok(tx.set_root(content)?))?;
        Ok(doc)
    }

    /// A document built from encoded changes.
    pub fn from_changes(changes: &[Vec<u8>], options: DocumentOptions) -> Result<Self> {
        let mut doc = Self::new(options);
        doc.apply_changes(changes)?;
        Ok(doc)
    }
}

impl<E: DocumentEngine> Document<E> {
    /// Wrap an existing engine, materializing its current content.
    pub fn with_engine(engine: E, options: DocumentOptions) -> Result<Self> {
        let patch = engine.get_patch()?;
        let snapshot = apply_patch(&Snapshot::empty(), &patch)?;
        Ok(Self::from_parts(engine, snapshot, options))
    }

    /// Load a document saved with [`Document::save`].
    pub fn load(bytes: &[u8], options: DocumentOptions) -> Result<Self> {
        let engine = E::load(bytes)?;
        let doc = Self::with_engine(engine, options)?;
        info!(actor = %doc.actor, heads = doc.snapshot.deps().len(), "Loaded document");
        Ok(doc)
    }

    fn from_parts(engine: E, snapshot: Snapshot, options: DocumentOptions) -> Self {
        Self {
            engine,
            snapshot,
            actor: options.actor.unwrap_or_else(Actor::random),
            clock: options.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            message: options.message,
        }
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        self.engine.save()
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Run a mutation session.
    ///
    /// Returns the request that was applied, or `None` when the session made
    /// no effective change. A failing session leaves the document untouched.
    pub fn change<F>(&mut self, f: F) -> Result<Option<Request>>
    where
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        let message = self.message.clone();
        self.run_change(message, f)
    }

    pub fn change_with_message<F>(
        &mut self,
        message: impl Into<String>,
        f: F,
    ) -> Result<Option<Request>>
    where
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        self.run_change(Some(message.into()), f)
    }

    fn run_change<F>(&mut self, message: Option<String>, f: F) -> Result<Option<Request>>
    where
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        let mut builder =
            RequestBuilder::new(&self.snapshot, self.actor.clone()).time(self.clock.now_millis());
        if let Some(message) = message {
            builder = builder.message(message);
        }
        let Some(request) = builder.build(f)? else {
            return Ok(None);
        };

        let patch = self.engine.apply_local_change(&request)?;
        self.apply(&patch)?;
        Ok(Some(request))
    }

    fn apply(&mut self, patch: &Patch) -> Result<()> {
        self.snapshot = apply_patch(&self.snapshot, patch)?;
        Ok(())
    }

    /// Import every change of `other` this document does not have yet.
    pub fn merge<F: DocumentEngine>(&mut self, other: &Document<F>) -> Result<()> {
        let changes = other.engine.get_changes(&self.engine.get_heads())?;
        debug!(actor = %self.actor, from = %other.actor, changes = changes.len(), "Merging document");
        self.apply_changes(&changes)
    }

    /// An independent copy of this document with a fresh actor.
    pub fn fork(&self) -> Self {
        Self {
            engine: self.engine.fork(),
            snapshot: self.snapshot.clone(),
            actor: Actor::random(),
            clock: Arc::clone(&self.clock),
            message: self.message.clone(),
        }
    }

    /// Like [`Document::fork`] but with the given actor.
    pub fn fork_as(&self, actor: Actor) -> Self {
        Self {
            actor,
            ..self.fork()
        }
    }

    pub fn all_changes(&self) -> Result<Vec<Vec<u8>>> {
        self.engine.get_changes(&[])
    }

    /// Changes made after `heads`.
    pub fn get_changes_since(&self, heads: &[ChangeHash]) -> Result<Vec<Vec<u8>>> {
        self.engine.get_changes(heads)
    }

    /// Apply encoded changes from another replica.
    ///
    /// Changes with missing dependencies are held back until those arrive.
    pub fn apply_changes(&mut self, changes: &[Vec<u8>]) -> Result<()> {
        let patch = self.engine.apply_changes(changes)?;
        self.apply(&patch)
    }

    pub fn get_heads(&self) -> Vec<ChangeHash> {
        self.engine.get_heads()
    }

    /// Hashes this document needs before its queued changes can apply.
    pub fn get_missing_deps(&self) -> Vec<ChangeHash> {
        self.engine.get_missing_deps(&[])
    }

    pub fn generate_sync_message(&self, sync: &mut SyncCoordinator) -> Result<Option<Vec<u8>>> {
        sync.generate_message(&self.engine)
    }

    /// Handle a sync message, folding any merged changes into the snapshot.
    pub fn receive_sync_message(&mut self, sync: &mut SyncCoordinator, message: &[u8]) -> Result<()> {
        if let Some(patch) = sync.receive_message(&mut self.engine, message)? {
            self.apply(&patch)?;
        }
        Ok(())
    }

    pub fn queued_changes(&self) -> Vec<Vec<u8>> {
        self.engine.queued_changes()
    }

    pub fn set_queued_changes(&mut self, changes: Vec<Vec<u8>>) -> Result<()> {
        let patch = self.engine.set_queued_changes(changes)?;
        self.apply(&patch)
    }

    /// The whole document decoded as `T`.
    pub fn content<T: Schema>(&self) -> Result<T> {
        Ok(T::decode(&self.snapshot.root_value())?)
    }

    pub fn get(&self, path: impl Into<Path>) -> Option<&Value> {
        self.snapshot.get(&path.into())
    }

    /// All concurrent values at `path`, if there is more than one.
    pub fn conflicts(&self, path: impl Into<Path>) -> Option<BTreeMap<Actor, Value>> {
        self.snapshot.conflicts(&path.into())
    }

    /// Typed view of the table at `path`.
    pub fn table<T: Schema>(&self, path: impl Into<Path>) -> Result<Table<T>> {
        let path = path.into();
        let value = self.snapshot.get(&path).ok_or_else(|| SchemaError::TypeMismatch {
            expected: "table",
            found: "nothing",
        })?;
        Ok(Table::from_value(value)?)
    }

    /// Current value of the counter at `path`.
    pub fn counter(&self, path: impl Into<Path>) -> Option<i64> {
        self.get(path)
            .and_then(Value::as_counter)
            .map(|counter| counter.value())
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.snapshot.to_json()
    }

    pub fn decode_change(&self, change: &[u8]) -> Result<Change> {
        self.engine.decode_change(change)
    }

    pub fn decode_sync_message(&self, message: &[u8]) -> Result<SyncMessage> {
        self.engine.decode_sync_message(message)
    }
}

impl<E: DocumentEngine + Default> Default for Document<E> {
    fn default() -> Self {
        Self::new(DocumentOptions::default())
    }
}
