use tracing::{debug, info, warn};

use super::SyncState;
use crate::{Result, engine::DocumentEngine, patch::Patch};

/// Where a sync session with one peer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No message exchanged yet
    #[default]
    Idle,
    /// Messages are still flowing
    Advancing,
    /// The last generate call found nothing to send
    Converged,
}

/// Drives the sync protocol with a single peer.
///
/// The coordinator owns the peer's [`SyncState`]. Engine calls run against a
/// copy of the state which replaces the current one only when the call
/// succeeds, so a failed message leaves the state exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct SyncCoordinator {
    state: SyncState,
    phase: SyncPhase,
    rounds: u64,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SyncState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Restore a coordinator from persisted state.
    ///
    /// Unreadable state is discarded with a warning; the session then
    /// starts from scratch, which costs a few extra round trips but never
    /// loses data.
    pub fn restore(bytes: &[u8]) -> Self {
        match SyncState::decode(bytes) {
            Ok(state) => Self::with_state(state),
            Err(err) => {
                warn!(error = %err, "Discarding unreadable sync state");
                Self::new()
            }
        }
    }

    /// Persist the durable part of the sync state.
    pub fn encode_state(&self) -> Vec<u8> {
        self.state.encode()
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn is_converged(&self) -> bool {
        self.phase == SyncPhase::Converged
    }

    /// Number of messages generated so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Forget session state after a disconnect, keeping the shared heads.
    pub fn reset_session(&mut self) {
        self.state = SyncState {
            shared_heads: std::mem::take(&mut self.state.shared_heads),
            ..SyncState::default()
        };
        self.phase = SyncPhase::Idle;
    }

    /// Produce the next message for the peer, if there is anything to say.
    pub fn generate_message<E: DocumentEngine + ?Sized>(
        &mut self,
        engine: &E,
    ) -> Result<Option<Vec<u8>>> {
        let mut next = self.state.clone();
        let message = engine.generate_sync_message(&mut next)?;
        self.state = next;

        match message {
            Some(bytes) => {
                self.rounds += 1;
                self.phase = SyncPhase::Advancing;
                debug!(round = self.rounds, bytes = bytes.len(), "Generated sync message");
                Ok(Some(bytes))
            }
            None => {
                if self.phase != SyncPhase::Converged {
                    info!(rounds = self.rounds, "Sync converged");
                }
                self.phase = SyncPhase::Converged;
                Ok(None)
            }
        }
    }

    /// Handle a message from the peer.
    ///
    /// Returns the patch for any changes it merged into the document.
    pub fn receive_message<E: DocumentEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        message: &[u8],
    ) -> Result<Option<Patch>> {
        let mut next = self.state.clone();
        let patch = engine.receive_sync_message(&mut next, message)?;
        self.state = next;
        self.phase = SyncPhase::Advancing;
        debug!(
            bytes = message.len(),
            merged = patch.is_some(),
            "Received sync message"
        );
        Ok(patch)
    }
}
