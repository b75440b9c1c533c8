use serde::{Deserialize, Serialize};

use crate::ids::{Actor, ChangeHash};

/// Metadata of an encoded change, as reported by the engine's decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub hash: ChangeHash,
    pub actor: Actor,
    pub seq: u64,
    pub start_op: u64,
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub deps: Vec<ChangeHash>,
}
