//! Sync protocol for the in-memory engine.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use super::{MemoryEngine, bloom::BloomFilter};
use crate::{
    Result,
    engine::DocumentEngine,
    ids::ChangeHash,
    patch::Patch,
    sync::{Have, SyncMessage, SyncState},
};

impl MemoryEngine {
    pub(super) fn generate_sync(&self, state: &mut SyncState) -> Result<Option<Vec<u8>>> {
        let our_heads = self.get_heads();
        let our_need = self.get_missing_deps(state.their_heads.as_deref().unwrap_or_default());

        // Missing dependencies the peer already advertised as heads are most
        // likely Bloom false positives; ask for those alone first.
        let mut our_have = Vec::new();
        let need_is_their_heads = state
            .their_heads
            .as_ref()
            .is_none_or(|theirs| our_need.iter().all(|hash| theirs.contains(hash)));
        if need_is_their_heads {
            our_have.push(self.make_have(&state.shared_heads));
        }

        if let Some(first) = state.their_have.as_ref().and_then(|have| have.first())
            && !first.last_sync.iter().all(|hash| self.is_known(hash))
        {
            debug!("Peer reports unknown sync point, requesting a full resync");
            let reset = SyncMessage {
                heads: our_heads,
                need: Vec::new(),
                have: vec![Have::default()],
                changes: Vec::new(),
            };
            return Ok(Some(reset.encode()?));
        }

        let mut changes_to_send = match (&state.their_have, &state.their_need) {
            (Some(have), Some(need)) => self.changes_to_send(have, need)?,
            _ => Vec::new(),
        };

        let heads_unchanged = state.last_sent_heads == our_heads;
        let heads_equal = state.their_heads.as_ref() == Some(&our_heads);
        if heads_unchanged && heads_equal && changes_to_send.is_empty() {
            trace!("Peer is in sync; nothing to send");
            return Ok(None);
        }

        changes_to_send.retain(|(hash, _)| !state.sent_hashes.contains(hash));
        state.sent_hashes.extend(changes_to_send.iter().map(|(hash, _)| *hash));
        state.last_sent_heads = our_heads.clone();

        let message = SyncMessage {
            heads: our_heads,
            need: our_need,
            have: our_have,
            changes: changes_to_send.into_iter().map(|(_, bytes)| bytes).collect(),
        };
        debug!(
            heads = message.heads.len(),
            need = message.need.len(),
            changes = message.changes.len(),
            "Generated sync message"
        );
        Ok(Some(message.encode()?))
    }

    pub(super) fn receive_sync(
        &mut self,
        state: &mut SyncState,
        message: &[u8],
    ) -> Result<Option<Patch>> {
        let message = SyncMessage::decode(message)?;
        for have in &message.have {
            BloomFilter::from_bytes(&have.bloom)?;
        }
        let before_heads = self.get_heads();
        let mut shared_heads = state.shared_heads.clone();
        let mut last_sent_heads = state.last_sent_heads.clone();
        let mut sent_hashes = state.sent_hashes.clone();

        let mut patch = None;
        if !message.changes.is_empty() {
            let applied = self.apply_changes(&message.changes)?;
            let after_heads = self.get_heads();
            shared_heads = advance_heads(&before_heads, &after_heads, &shared_heads);
            if after_heads != before_heads {
                patch = Some(applied);
            }
        }

        if message.changes.is_empty() && message.heads == before_heads {
            last_sent_heads = message.heads.clone();
        }

        let known_heads: Vec<ChangeHash> = message
            .heads
            .iter()
            .filter(|head| self.is_known(head))
            .copied()
            .collect();
        if known_heads.len() == message.heads.len() {
            shared_heads = message.heads.clone();
            if message.heads.is_empty() {
                last_sent_heads = Vec::new();
                sent_hashes.clear();
            }
        } else {
            let merged: BTreeSet<ChangeHash> =
                known_heads.into_iter().chain(shared_heads).collect();
            shared_heads = merged.into_iter().collect();
        }

        *state = SyncState {
            shared_heads,
            last_sent_heads,
            their_heads: Some(message.heads),
            their_need: Some(message.need),
            their_have: Some(message.have),
            sent_hashes,
        };
        Ok(patch)
    }

    /// Summary of the changes added since `last_sync`.
    fn make_have(&self, last_sync: &[ChangeHash]) -> Have {
        let hashes: Vec<ChangeHash> = self
            .changes_since(last_sync)
            .into_iter()
            .map(|change| change.hash)
            .collect();
        Have {
            last_sync: last_sync.to_vec(),
            bloom: BloomFilter::from_hashes(&hashes).to_bytes(),
        }
    }

    /// Changes the peer is missing according to its summaries and requests.
    fn changes_to_send(
        &self,
        have: &[Have],
        need: &[ChangeHash],
    ) -> Result<Vec<(ChangeHash, Vec<u8>)>> {
        if have.is_empty() {
            return Ok(need
                .iter()
                .filter_map(|hash| self.change_by_hash(hash))
                .map(|change| (change.hash, change.bytes.clone()))
                .collect());
        }

        let mut last_sync = BTreeSet::new();
        let mut filters = Vec::with_capacity(have.len());
        for h in have {
            last_sync.extend(h.last_sync.iter().copied());
            filters.push(BloomFilter::from_bytes(&h.bloom)?);
        }
        let last_sync: Vec<ChangeHash> = last_sync.into_iter().collect();
        let changes = self.changes_since(&last_sync);

        let mut change_hashes = HashSet::new();
        let mut dependents: HashMap<ChangeHash, Vec<ChangeHash>> = HashMap::new();
        let mut to_send = HashSet::new();
        for change in &changes {
            change_hashes.insert(change.hash);
            for dep in &change.record.deps {
                dependents.entry(*dep).or_default().push(change.hash);
            }
            if filters.iter().all(|filter| !filter.contains_hash(&change.hash)) {
                to_send.insert(change.hash);
            }
        }

        // Anything built on a change the peer lacks is missing too.
        let mut stack: Vec<ChangeHash> = to_send.iter().copied().collect();
        while let Some(hash) = stack.pop() {
            for dependent in dependents.get(&hash).into_iter().flatten() {
                if to_send.insert(*dependent) {
                    stack.push(*dependent);
                }
            }
        }

        let mut out = Vec::new();
        for hash in need {
            to_send.insert(*hash);
            if !change_hashes.contains(hash)
                && let Some(change) = self.change_by_hash(hash)
            {
                out.push((change.hash, change.bytes.clone()));
            }
        }
        out.extend(
            changes
                .into_iter()
                .filter(|change| to_send.contains(&change.hash))
                .map(|change| (change.hash, change.bytes.clone())),
        );
        Ok(out)
    }
}

/// Shared heads after applying changes that moved our heads from `old` to `new`.
fn advance_heads(
    old: &[ChangeHash],
    new: &[ChangeHash],
    shared: &[ChangeHash],
) -> Vec<ChangeHash> {
    let added = new.iter().filter(|head| !old.contains(head));
    let kept = shared.iter().filter(|head| new.contains(head));
    let advanced: BTreeSet<ChangeHash> = added.chain(kept).copied().collect();
    advanced.into_iter().collect()
}
