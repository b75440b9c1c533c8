//! Error types for local mutation sessions.

use thiserror::Error;

use crate::doc::Path;

/// Errors raised while recording mutations into a change request.
///
/// A session that fails emits no request; the snapshot it was built against
/// is unaffected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChangeError {
    /// The path no longer resolves against the snapshot, typically because a
    /// concurrent change removed an object on it
    #[error("Stale reference: {path} does not resolve in the current document")]
    StaleReference { path: Path },

    #[error("Index {index} out of bounds for list at {path} of length {len}")]
    IndexOutOfBounds { path: Path, index: usize, len: usize },

    #[error("Type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: Path,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value at {path} is not a counter")]
    NotACounter { path: Path },

    #[error("Invalid path: {reason}")]
    InvalidPath { reason: String },

    /// A typed value could not be turned into document values
    #[error("Failed to encode value: {reason}")]
    Encoding { reason: String },
}

impl ChangeError {
    pub fn is_stale_reference(&self) -> bool {
        matches!(self, ChangeError::StaleReference { .. })
    }

    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            ChangeError::TypeMismatch { .. } | ChangeError::NotACounter { .. }
        )
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, ChangeError::IndexOutOfBounds { .. })
    }

    /// The path the failed mutation targeted, when known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ChangeError::StaleReference { path }
            | ChangeError::IndexOutOfBounds { path, .. }
            | ChangeError::TypeMismatch { path, .. }
            | ChangeError::NotACounter { path } => Some(path),
            ChangeError::InvalidPath { .. } | ChangeError::Encoding { .. } => None,
        }
    }
}

impl From<ChangeError> for crate::Error {
    fn from(err: ChangeError) -> Self {
        crate::Error::Change(err)
    }
}
