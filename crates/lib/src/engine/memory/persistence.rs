//! Change and document encoding for the in-memory engine.
//!
//! A change is encoded as the JSON of its [`ChangeRecord`]; its hash is the
//! SHA-256 of exactly those bytes. Saved documents list the encoded bytes of
//! every applied change, hex-encoded, in application order, so loading a
//! saved document and saving it again yields identical bytes.

use serde::{Deserialize, Serialize};

use crate::{
    engine::EngineError,
    ids::{Actor, ChangeHash, OpId},
    op::{Change, Op},
};

/// Current format version of saved documents.
const SAVE_VERSION: u8 = 0;

/// The hashed content of a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChangeRecord {
    pub actor: Actor,
    pub seq: u64,
    pub start_op: u64,
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub deps: Vec<ChangeHash>,
    pub ops: Vec<Op>,
}

impl ChangeRecord {
    pub fn ops_with_ids(&self) -> impl Iterator<Item = (OpId, &Op)> {
        self.ops.iter().enumerate().map(|(index, op)| {
            (
                OpId::new(self.start_op + index as u64, self.actor.clone()),
                op,
            )
        })
    }
}

/// A change together with its encoding and hash.
#[derive(Debug, Clone)]
pub(super) struct StoredChange {
    pub hash: ChangeHash,
    pub record: ChangeRecord,
    pub bytes: Vec<u8>,
}

impl StoredChange {
    pub fn from_record(record: ChangeRecord) -> Result<Self, EngineError> {
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| EngineError::failure(format!("Failed to encode change: {e}")))?;
        Ok(Self {
            hash: ChangeHash::of(&bytes),
            record,
            bytes,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let record = serde_json::from_slice(bytes).map_err(|e| EngineError::decode("change", e))?;
        Ok(Self {
            hash: ChangeHash::of(bytes),
            record,
            bytes: bytes.to_vec(),
        })
    }

    pub fn to_change(&self) -> Change {
        Change {
            hash: self.hash,
            actor: self.record.actor.clone(),
            seq: self.record.seq,
            start_op: self.record.start_op,
            time: self.record.time,
            message: self.record.message.clone(),
            deps: self.record.deps.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SavedDocument {
    #[serde(rename = "_v", default)]
    version: u8,
    changes: Vec<String>,
}

pub(super) fn encode_document<'a>(
    changes: impl Iterator<Item = &'a StoredChange>,
) -> Result<Vec<u8>, EngineError> {
    let saved = SavedDocument {
        version: SAVE_VERSION,
        changes: changes.map(|change| hex::encode(&change.bytes)).collect(),
    };
    serde_json::to_vec(&saved)
        .map_err(|e| EngineError::failure(format!("Failed to encode document: {e}")))
}

pub(super) fn decode_document(bytes: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
    let saved: SavedDocument = serde_json::from_slice(bytes).map_err(|e| EngineError::Load {
        reason: e.to_string(),
    })?;
    if saved.version != SAVE_VERSION {
        return Err(EngineError::Load {
            reason: format!("unsupported format version {}", saved.version),
        });
    }
    saved
        .changes
        .iter()
        .map(|change| {
            hex::decode(change).map_err(|e| EngineError::Load {
                reason: format!("invalid change encoding: {e}"),
            })
        })
        .collect()
}
