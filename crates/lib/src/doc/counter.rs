use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A numeric CRDT that merges concurrent increments by summing them.
///
/// `pending` holds increments made by an in-flight mutation session that the
/// engine has not acknowledged yet. Committed snapshots always have
/// `pending == 0`.
///
/// Arithmetic wraps around on overflow, so every replica lands on the same
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counter {
    value: i64,
    pending: i64,
}

impl Counter {
    pub fn new(value: i64) -> Self {
        Self { value, pending: 0 }
    }

    /// Observed value, including pending increments.
    pub fn value(&self) -> i64 {
        self.value.wrapping_add(self.pending)
    }

    /// Value acknowledged by the engine.
    pub fn committed(&self) -> i64 {
        self.value
    }

    pub fn pending(&self) -> i64 {
        self.pending
    }

    pub(crate) fn increment(&mut self, delta: i64) {
        self.pending = self.pending.wrapping_add(delta);
    }
}

impl From<i64> for Counter {
    fn from(value: i64) -> Self {
        Counter::new(value)
    }
}

impl Serialize for Counter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl<'de> Deserialize<'de> for Counter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Counter::new)
    }
}
