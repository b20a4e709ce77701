use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::watch;

use super::models::Board;

/// One stored board together with its replacement counter.
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub board: Board,
}

impl Deref for Snapshot {
    type Target = Board;

    fn deref(&self) -> &Board {
        &self.board
    }
}

/// Holds the current board snapshot.
///
/// The whole value is swapped on [`replace`](Self::replace); nothing patches
/// it in place. Readers get an `Arc` to an immutable snapshot, so a reader
/// can never see fields from two different fetches. Subscribers are woken on
/// every replacement.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    tx: Arc<watch::Sender<Option<Arc<Snapshot>>>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The current snapshot, or `None` before the first load.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        self.tx.borrow().clone()
    }

    /// Swap in a freshly fetched board. Returns the new generation.
    pub fn replace(&self, board: Board) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|slot| {
            generation = slot.as_ref().map_or(1, |s| s.generation + 1);
            *slot = Some(Arc::new(Snapshot { generation, board }));
        });
        generation
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |s| s.generation)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.tx.subscribe()
    }
}
