//! Per-peer sync state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Have, SyncError};
use crate::ids::ChangeHash;

/// Current format version of persisted sync state.
const STATE_VERSION: u8 = 0;

/// What this replica knows about one peer's document.
///
/// Only `shared_heads` survives persistence; everything else describes the
/// current session and starts over when the connection is re-established.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Heads both sides are known to have
    pub shared_heads: Vec<ChangeHash>,
    /// Our heads as of the last message we sent
    pub last_sent_heads: Vec<ChangeHash>,
    /// The peer's heads as of its last message
    pub their_heads: Option<Vec<ChangeHash>>,
    /// Hashes the peer explicitly asked for
    pub their_need: Option<Vec<ChangeHash>>,
    /// The peer's summaries of what it has
    pub their_have: Option<Vec<Have>>,
    /// Changes already sent to the peer this session
    pub sent_hashes: BTreeSet<ChangeHash>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSyncState {
    #[serde(rename = "_v", default)]
    version: u8,
    shared_heads: Vec<ChangeHash>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the durable part of the state.
    pub fn encode(&self) -> Vec<u8> {
        let persisted = PersistedSyncState {
            version: STATE_VERSION,
            shared_heads: self.shared_heads.clone(),
        };
        // A struct of strings always serializes.
        serde_json::to_vec(&persisted).unwrap_or_default()
    }

    /// Restore state written by [`SyncState::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        let persisted: PersistedSyncState =
            serde_json::from_slice(bytes).map_err(|e| SyncError::InvalidState {
                reason: e.to_string(),
            })?;
        if persisted.version != STATE_VERSION {
            return Err(SyncError::UnsupportedVersion {
                version: persisted.version,
            });
        }
        Ok(Self {
            shared_heads: persisted.shared_heads,
            ..Self::default()
        })
    }
}
