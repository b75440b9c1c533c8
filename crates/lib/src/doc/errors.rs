//! Error types for typed schema access.

use thiserror::Error;

/// Errors raised when mapping between typed records and document values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// A document value could not be decoded into the requested type
    #[error("Failed to decode {type_name}: {reason}")]
    Decode {
        type_name: &'static str,
        reason: String,
    },

    /// A typed record could not be encoded into a document value
    #[error("Failed to encode {type_name}: {reason}")]
    Encode {
        type_name: &'static str,
        reason: String,
    },

    /// The value at a location has a different kind than requested
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl SchemaError {
    pub fn is_decode_error(&self) -> bool {
        matches!(self, SchemaError::Decode { .. })
    }

    pub fn is_encode_error(&self) -> bool {
        matches!(self, SchemaError::Encode { .. })
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, SchemaError::TypeMismatch { .. })
    }
}

impl From<SchemaError> for crate::Error {
    fn from(err: SchemaError) -> Self {
        crate::Error::Schema(err)
    }
}
