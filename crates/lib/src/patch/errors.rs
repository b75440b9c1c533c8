//! Error types for patch application.

use thiserror::Error;

use crate::ids::ObjectId;

/// Errors raised while materializing a patch.
///
/// Any of these means the engine and the materialized snapshot disagree
/// about the document's structure; the snapshot is left untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PatchError {
    #[error("Malformed patch for object {object}: {reason}")]
    MalformedPatch { object: ObjectId, reason: String },
}

impl PatchError {
    pub(crate) fn malformed(object: &ObjectId, reason: impl Into<String>) -> Self {
        PatchError::MalformedPatch {
            object: object.clone(),
            reason: reason.into(),
        }
    }

    /// The object whose diff was rejected.
    pub fn object(&self) -> &ObjectId {
        match self {
            PatchError::MalformedPatch { object, .. } => object,
        }
    }
}

impl From<PatchError> for crate::Error {
    fn from(err: PatchError) -> Self {
        crate::Error::Patch(err)
    }
}
