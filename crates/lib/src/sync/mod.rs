//! Peer-to-peer synchronization.
//!
//! Two replicas converge by exchanging [`SyncMessage`]s until neither has
//! anything left to send. Each side keeps one [`SyncState`] per peer; the
//! [`SyncCoordinator`] wraps that state with the session bookkeeping and
//! makes sure it only advances once a message has been fully handled.
//!
//! A message advertises the sender's heads, the hashes it knows it needs,
//! a Bloom-filter summary of the changes it has since the last shared heads,
//! and any changes it believes the peer is missing.

use serde::{Deserialize, Serialize};

use crate::ids::ChangeHash;

mod coordinator;
mod error;
mod state;

pub use coordinator::{SyncCoordinator, SyncPhase};
pub use error::SyncError;
pub use state::SyncState;

/// Summary of the changes a peer has added since `last_sync`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Have {
    pub last_sync: Vec<ChangeHash>,
    /// Encoded Bloom filter over the hashes of those changes
    pub bloom: Vec<u8>,
}

/// One message of the sync protocol.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    pub heads: Vec<ChangeHash>,
    pub need: Vec<ChangeHash>,
    pub have: Vec<Have>,
    /// Encoded changes
    pub changes: Vec<Vec<u8>>,
}

impl SyncMessage {
    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(|e| SyncError::Decode {
            reason: e.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::Decode {
            reason: e.to_string(),
        })
    }
}
