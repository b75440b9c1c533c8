//! Identity types for replicas, operations, objects and changes.
//!
//! Every operation is named by an [`OpId`]: a per-document Lamport counter
//! paired with the [`Actor`] that produced it. Objects and list elements reuse
//! the id of the operation that created them, so [`ObjectId`] and [`ElemId`]
//! are thin wrappers with a distinguished sentinel (`_root`, `_head`).
//!
//! All identifiers serialize as plain strings.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while parsing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("Invalid actor '{actor}': {reason}")]
    InvalidActor { actor: String, reason: String },

    #[error("Invalid operation id '{id}'")]
    InvalidOpId { id: String },

    #[error("Invalid change hash '{hash}': {reason}")]
    InvalidHash { hash: String, reason: String },
}

impl From<IdError> for crate::Error {
    fn from(err: IdError) -> Self {
        crate::Error::Id(err)
    }
}

/// Implements string-based serde for a type with `Display` and `FromStr`.
macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Identifier of a replica.
///
/// Actors are lowercase hex strings. Ordering is lexicographic and decides
/// which value of a conflict set is reported as the primary one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Actor(String);

impl Actor {
    /// Generate a fresh random actor.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Actor {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdError::InvalidActor {
                actor: s.to_string(),
                reason: "actor must not be empty".to_string(),
            });
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidActor {
                actor: s.to_string(),
                reason: "actor must be a hex string".to_string(),
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Actor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

string_serde!(Actor);

/// Identifier of a single operation: `counter@actor`.
///
/// Ordered by counter first and actor second, which gives every replica the
/// same total order over operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpId {
    counter: u64,
    actor: Actor,
}

impl OpId {
    pub fn new(counter: u64, actor: Actor) -> Self {
        Self { counter, actor }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.actor.cmp(&other.actor))
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for OpId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidOpId { id: s.to_string() };
        let (counter, actor) = s.split_once('@').ok_or_else(invalid)?;
        let counter = counter.parse().map_err(|_| invalid())?;
        let actor = actor.parse().map_err(|_| invalid())?;
        Ok(Self { counter, actor })
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.actor)
    }
}

string_serde!(OpId);

/// Identifier of a map, table or list object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    /// The document root map
    Root,
    /// An object created by the given make operation
    Op(OpId),
}

impl ObjectId {
    pub fn is_root(&self) -> bool {
        matches!(self, ObjectId::Root)
    }

    pub fn op_id(&self) -> Option<&OpId> {
        match self {
            ObjectId::Root => None,
            ObjectId::Op(id) => Some(id),
        }
    }
}

impl From<OpId> for ObjectId {
    fn from(id: OpId) -> Self {
        ObjectId::Op(id)
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "_root" {
            Ok(ObjectId::Root)
        } else {
            s.parse().map(ObjectId::Op)
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Root => f.write_str("_root"),
            ObjectId::Op(id) => id.fmt(f),
        }
    }
}

string_serde!(ObjectId);

/// Reference to a list element, or to the position before the first one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElemId {
    Head,
    Op(OpId),
}

impl From<OpId> for ElemId {
    fn from(id: OpId) -> Self {
        ElemId::Op(id)
    }
}

impl FromStr for ElemId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "_head" {
            Ok(ElemId::Head)
        } else {
            s.parse().map(ElemId::Op)
        }
    }
}

impl fmt::Display for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElemId::Head => f.write_str("_head"),
            ElemId::Op(id) => id.fmt(f),
        }
    }
}

string_serde!(ElemId);

/// SHA-256 content hash of an encoded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeHash([u8; 32]);

impl ChangeHash {
    /// Hash the given encoded change bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ChangeHash {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| IdError::InvalidHash {
            hash: s.to_string(),
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| IdError::InvalidHash {
            hash: s.to_string(),
            reason: "expected 32 bytes".to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

string_serde!(ChangeHash);
