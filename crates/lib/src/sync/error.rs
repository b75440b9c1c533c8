//! Error types for the sync module.

use thiserror::Error;

/// Errors raised by the sync coordinator and its persisted state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Persisted sync state could not be decoded
    #[error("Invalid sync state: {reason}")]
    InvalidState { reason: String },

    /// A sync message could not be decoded
    #[error("Failed to decode sync message: {reason}")]
    Decode { reason: String },

    /// Persisted data was written by an unknown format version
    #[error("Unsupported sync format version {version}")]
    UnsupportedVersion { version: u8 },
}

impl SyncError {
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            SyncError::Decode { .. }
                | SyncError::InvalidState { .. }
                | SyncError::UnsupportedVersion { .. }
        )
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
