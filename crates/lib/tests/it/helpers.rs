use std::sync::Arc;

use accord::{Actor, Document, DocumentOptions, FixedClock, sync::SyncCoordinator};

pub fn actor(hex: &str) -> Actor {
    hex.parse().expect("valid actor")
}

/// Options for a document owned by `hex`.
///
/// Uses a [`FixedClock`] stepping one millisecond per change so timestamps
/// are deterministic.
pub fn options(hex: &str) -> DocumentOptions {
    DocumentOptions::new()
        .actor(actor(hex))
        .clock(Arc::new(FixedClock::default().with_step(1)))
}

/// An empty in-memory document owned by `hex`.
pub fn new_doc(hex: &str) -> Document {
    Document::new(options(hex))
}

/// Exchange sync messages between `a` and `b` until neither has anything to
/// send. Returns the number of rounds it took.
///
/// # Panics
/// Panics if the peers have not converged after `max_rounds`.
pub fn sync_until_quiet(
    a: &mut Document,
    a_sync: &mut SyncCoordinator,
    b: &mut Document,
    b_sync: &mut SyncCoordinator,
    max_rounds: usize,
) -> usize {
    for round in 1..=max_rounds {
        let from_a = a.generate_sync_message(a_sync).expect("generate a");
        if let Some(message) = &from_a {
            b.receive_sync_message(b_sync, message).expect("receive b");
        }
        let from_b = b.generate_sync_message(b_sync).expect("generate b");
        if let Some(message) = &from_b {
            a.receive_sync_message(a_sync, message).expect("receive a");
        }
        if from_a.is_none() && from_b.is_none() {
            return round;
        }
    }
    panic!("peers did not converge within {max_rounds} rounds");
}

/// Sync two documents with fresh coordinators.
pub fn sync_pair(a: &mut Document, b: &mut Document) -> usize {
    let mut a_sync = SyncCoordinator::new();
    let mut b_sync = SyncCoordinator::new();
    sync_until_quiet(a, &mut a_sync, b, &mut b_sync, 10)
}
