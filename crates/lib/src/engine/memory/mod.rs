//! In-memory reference implementation of [`DocumentEngine`].
//!
//! Keeps the full change history, the operation set derived from it and a
//! queue of changes waiting for their dependencies. Changes are applied
//! strictly in causal order; a change is ready once every hash it depends
//! on has been applied.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info, trace, warn};

use super::{DocumentEngine, EngineError};
use crate::{
    Result,
    ids::{Actor, ChangeHash},
    op::{Change, Request},
    patch::{MapDiff, Patch},
    sync::{SyncMessage, SyncState},
};

mod bloom;
mod opset;
mod persistence;
mod sync;

use opset::{OpSet, Touched};
use persistence::{ChangeRecord, StoredChange};

/// A document engine holding everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    opset: OpSet,
    /// Applied changes in application order
    history: Vec<StoredChange>,
    by_hash: HashMap<ChangeHash, usize>,
    heads: BTreeSet<ChangeHash>,
    clock: BTreeMap<Actor, u64>,
    queue: Vec<StoredChange>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of applied changes.
    pub fn change_count(&self) -> usize {
        self.history.len()
    }

    pub fn clock(&self) -> &BTreeMap<Actor, u64> {
        &self.clock
    }

    fn is_known(&self, hash: &ChangeHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    fn change_by_hash(&self, hash: &ChangeHash) -> Option<&StoredChange> {
        self.by_hash.get(hash).map(|&index| &self.history[index])
    }

    /// Apply a change whose dependencies must all be present.
    fn apply_stored(&mut self, change: StoredChange, touched: &mut Touched) -> Result<()> {
        let missing: Vec<ChangeHash> = change
            .record
            .deps
            .iter()
            .filter(|dep| !self.is_known(dep))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::CausalGap {
                hash: change.hash,
                missing,
            }
            .into());
        }

        let record = &change.record;
        let expected = self.clock.get(&record.actor).copied().unwrap_or(0) + 1;
        if record.seq != expected {
            return Err(EngineError::failure(format!(
                "Mismatched sequence number for {}: expected {expected}, got {}",
                record.actor, record.seq
            ))
            .into());
        }

        self.opset.validate(record.ops_with_ids())?;
        for (id, op) in record.ops_with_ids() {
            self.opset.apply_op(id, op, touched);
        }

        self.clock.insert(record.actor.clone(), record.seq);
        for dep in &record.deps {
            self.heads.remove(dep);
        }
        self.heads.insert(change.hash);
        self.by_hash.insert(change.hash, self.history.len());
        trace!(hash = %change.hash, actor = %record.actor, seq = record.seq, "Applied change");
        self.history.push(change);
        Ok(())
    }

    /// Apply queued changes until none is ready.
    ///
    /// A change from `incoming` that fails to apply aborts the drain with its
    /// error. A change queued by an earlier call is discarded instead, so it
    /// cannot block the changes that unblocked it.
    fn drain_queue(
        &mut self,
        incoming: &HashSet<ChangeHash>,
        touched: &mut Touched,
    ) -> Result<()> {
        let known: Vec<ChangeHash> = self
            .queue
            .iter()
            .filter(|c| self.is_known(&c.hash))
            .map(|c| c.hash)
            .collect();
        self.queue.retain(|c| !known.contains(&c.hash));

        while let Some(pos) = self
            .queue
            .iter()
            .position(|c| c.record.deps.iter().all(|dep| self.is_known(dep)))
        {
            let change = self.queue.remove(pos);
            if self.is_known(&change.hash) {
                continue;
            }
            let hash = change.hash;
            if let Err(err) = self.apply_stored(change, touched) {
                if incoming.contains(&hash) {
                    return Err(err);
                }
                warn!(hash = %hash, error = %err, "Discarding queued change that failed to apply");
            }
        }

        if !self.queue.is_empty() {
            debug!(
                queued = self.queue.len(),
                "Changes waiting on missing dependencies"
            );
        }
        Ok(())
    }

    /// Enqueue `changes` and drain the queue as one unit.
    ///
    /// Works on a copy of the engine; nothing changes unless every ready
    /// change applies.
    fn apply_batch(&mut self, changes: Vec<StoredChange>, replace_queue: bool) -> Result<Patch> {
        let incoming: HashSet<ChangeHash> = changes.iter().map(|c| c.hash).collect();
        let mut staged = self.clone();
        if replace_queue {
            staged.queue.clear();
        }
        staged.enqueue(changes);

        let mut touched = Touched::default();
        staged.drain_queue(&incoming, &mut touched)?;
        let patch = staged.make_patch(&touched, None);
        *self = staged;
        Ok(patch)
    }

    fn make_patch(&self, touched: &Touched, local: Option<(&Actor, u64)>) -> Patch {
        Patch {
            actor: local.map(|(actor, _)| actor.clone()),
            seq: local.map(|(_, seq)| seq),
            clock: self.clock.clone(),
            deps: self.get_heads(),
            max_op: self.opset.max_op(),
            diffs: if touched.is_empty() {
                MapDiff::empty()
            } else {
                self.opset.diff(touched)
            },
        }
    }

    fn decode_all(changes: &[Vec<u8>]) -> Result<Vec<StoredChange>> {
        changes
            .iter()
            .map(|bytes| StoredChange::decode(bytes).map_err(Into::into))
            .collect()
    }

    /// Enqueue changes that are neither applied nor already queued.
    fn enqueue(&mut self, changes: Vec<StoredChange>) {
        for change in changes {
            if self.is_known(&change.hash) || self.queue.iter().any(|c| c.hash == change.hash) {
                trace!(hash = %change.hash, "Skipping duplicate change");
                continue;
            }
            self.queue.push(change);
        }
    }

    /// Hashes of every applied change reachable from `heads`.
    fn ancestors(&self, heads: &[ChangeHash]) -> HashSet<ChangeHash> {
        let mut seen = HashSet::new();
        let mut stack: Vec<ChangeHash> = heads.iter().filter(|h| self.is_known(h)).copied().collect();
        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            if let Some(change) = self.change_by_hash(&hash) {
                stack.extend(change.record.deps.iter().copied());
            }
        }
        seen
    }

    /// Applied changes not reachable from `have_deps`, in application order.
    fn changes_since(&self, have_deps: &[ChangeHash]) -> Vec<&StoredChange> {
        let seen = self.ancestors(have_deps);
        self.history
            .iter()
            .filter(|change| !seen.contains(&change.hash))
            .collect()
    }
}

impl DocumentEngine for MemoryEngine {
    fn apply_local_change(&mut self, request: &Request) -> Result<Patch> {
        let expected_seq = self.clock.get(&request.actor).copied().unwrap_or(0) + 1;
        if request.seq != expected_seq {
            return Err(EngineError::failure(format!(
                "Mismatched sequence number: expected {expected_seq}, got {}",
                request.seq
            ))
            .into());
        }
        if request.start_op != self.opset.max_op() + 1 {
            return Err(EngineError::failure(format!(
                "Mismatched start op: expected {}, got {}",
                self.opset.max_op() + 1,
                request.start_op
            ))
            .into());
        }
        if request.ops.is_empty() {
            return Err(EngineError::failure("Change request has no operations").into());
        }
        if let Some(dep) = request.deps.iter().find(|dep| !self.is_known(dep)) {
            return Err(EngineError::failure(format!("Change request depends on unknown change {dep}")).into());
        }

        let change = StoredChange::from_record(ChangeRecord {
            actor: request.actor.clone(),
            seq: request.seq,
            start_op: request.start_op,
            time: request.time,
            message: request.message.clone(),
            deps: self.get_heads(),
            ops: request.ops.clone(),
        })?;
        let hash = change.hash;

        let mut touched = Touched::default();
        self.apply_stored(change, &mut touched)?;
        self.drain_queue(&HashSet::new(), &mut touched)?;

        debug!(
            hash = %hash,
            actor = %request.actor,
            seq = request.seq,
            ops = request.ops.len(),
            "Applied local change"
        );
        Ok(self.make_patch(&touched, Some((&request.actor, request.seq))))
    }

    fn apply_changes(&mut self, changes: &[Vec<u8>]) -> Result<Patch> {
        let decoded = Self::decode_all(changes)?;
        let before = self.history.len();
        let patch = self.apply_batch(decoded, false)?;

        debug!(
            received = changes.len(),
            applied = self.history.len() - before,
            queued = self.queue.len(),
            "Applied remote changes"
        );
        Ok(patch)
    }

    fn get_patch(&self) -> Result<Patch> {
        Ok(Patch {
            actor: None,
            seq: None,
            clock: self.clock.clone(),
            deps: self.get_heads(),
            max_op: self.opset.max_op(),
            diffs: self.opset.full_diff(),
        })
    }

    fn get_changes(&self, have_deps: &[ChangeHash]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .changes_since(have_deps)
            .into_iter()
            .map(|change| change.bytes.clone())
            .collect())
    }

    fn get_heads(&self) -> Vec<ChangeHash> {
        self.heads.iter().copied().collect()
    }

    fn get_missing_deps(&self, heads: &[ChangeHash]) -> Vec<ChangeHash> {
        let queued: HashSet<ChangeHash> = self.queue.iter().map(|c| c.hash).collect();
        let mut missing = BTreeSet::new();
        for change in &self.queue {
            for dep in &change.record.deps {
                if !self.is_known(dep) && !queued.contains(dep) {
                    missing.insert(*dep);
                }
            }
        }
        for head in heads {
            if !self.is_known(head) {
                missing.insert(*head);
            }
        }
        missing.into_iter().collect()
    }

    fn generate_sync_message(&self, state: &mut SyncState) -> Result<Option<Vec<u8>>> {
        self.generate_sync(state)
    }

    fn receive_sync_message(
        &mut self,
        state: &mut SyncState,
        message: &[u8],
    ) -> Result<Option<Patch>> {
        self.receive_sync(state, message)
    }

    fn queued_changes(&self) -> Vec<Vec<u8>> {
        self.queue.iter().map(|change| change.bytes.clone()).collect()
    }

    fn set_queued_changes(&mut self, changes: Vec<Vec<u8>>) -> Result<Patch> {
        let decoded = Self::decode_all(&changes)?;
        self.apply_batch(decoded, true)
    }

    fn decode_change(&self, change: &[u8]) -> Result<Change> {
        Ok(StoredChange::decode(change)?.to_change())
    }

    fn decode_sync_message(&self, message: &[u8]) -> Result<SyncMessage> {
        Ok(SyncMessage::decode(message)?)
    }

    fn save(&self) -> Result<Vec<u8>> {
        Ok(persistence::encode_document(self.history.iter())?)
    }

    fn load(bytes: &[u8]) -> Result<Self> {
        let changes = persistence::decode_document(bytes)?;
        let mut engine = Self::new();
        engine.apply_changes(&changes)?;
        if !engine.queue.is_empty() {
            return Err(EngineError::Load {
                reason: format!("{} changes have missing dependencies", engine.queue.len()),
            }
            .into());
        }
        info!(changes = engine.history.len(), "Loaded document");
        Ok(engine)
    }

    fn fork(&self) -> Self {
        self.clone()
    }
}
