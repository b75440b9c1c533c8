use serde::{Deserialize, Serialize};

use super::Op;
use crate::ids::{Actor, ChangeHash, OpId};

/// A local mutation batch, ready to be handed to the document engine.
///
/// Operation `i` of `ops` has the id `start_op + i` at `actor`. A request
/// always carries at least one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub start_op: u64,
    pub deps: Vec<ChangeHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub actor: Actor,
    pub seq: u64,
    pub ops: Vec<Op>,
}

impl Request {
    /// Id assigned to the operation at `index`.
    pub fn op_id(&self, index: usize) -> OpId {
        OpId::new(self.start_op + index as u64, self.actor.clone())
    }

    /// Counter of the last operation in the batch.
    pub fn max_op(&self) -> u64 {
        self.start_op + self.ops.len().saturating_sub(1) as u64
    }

    /// Iterate operations with their assigned ids.
    pub fn ops_with_ids(&self) -> impl Iterator<Item = (OpId, &Op)> {
        self.ops
            .iter()
            .enumerate()
            .map(|(index, op)| (self.op_id(index), op))
    }
}
