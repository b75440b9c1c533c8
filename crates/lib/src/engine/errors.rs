//! Error types for document engines.

use thiserror::Error;

use crate::ids::ChangeHash;

/// Errors reported by a [`DocumentEngine`](super::DocumentEngine).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The engine rejected a request or change
    #[error("Engine failure: {0}")]
    Failure(String),

    /// A change cannot be applied until its dependencies arrive
    #[error("Change {hash} is missing {} dependencies", missing.len())]
    CausalGap {
        hash: ChangeHash,
        missing: Vec<ChangeHash>,
    },

    /// Bytes handed to the engine could not be decoded
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// A saved document could not be restored
    #[error("Failed to load document: {reason}")]
    Load { reason: String },
}

impl EngineError {
    pub(crate) fn failure(reason: impl Into<String>) -> Self {
        EngineError::Failure(reason.into())
    }

    pub(crate) fn decode(what: &'static str, reason: impl ToString) -> Self {
        EngineError::Decode {
            what,
            reason: reason.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EngineError::Failure(_))
    }

    pub fn is_causal_gap(&self) -> bool {
        matches!(self, EngineError::CausalGap { .. })
    }

    pub fn is_decode_error(&self) -> bool {
        matches!(self, EngineError::Decode { .. } | EngineError::Load { .. })
    }
}

impl From<EngineError> for crate::Error {
    fn from(err: EngineError) -> Self {
        crate::Error::Engine(err)
    }
}
