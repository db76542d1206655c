//! Request Queue
//!
//! The only channel between connection handlers and the game loop.
//! Handlers push; the loop drains once at the start of every tick.
//!
//! Lifecycle requests (join, leave, resync) keep arrival order. Movement
//! inputs are coalesced per player: the newest direction wins, so a drain
//! never returns more inputs than there are connected players.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use crate::core::grid::Direction;
use crate::game::state::PlayerId;

/// Connection lifecycle change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleRequest {
    /// A connection was accepted; create its player.
    Join(PlayerId),
    /// A connection closed; remove its player.
    Leave(PlayerId),
    /// The client wants a full snapshot.
    Resync(PlayerId),
}

/// Everything queued since the previous drain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainedRequests {
    /// Lifecycle requests in arrival order.
    pub lifecycle: Vec<LifecycleRequest>,
    /// Latest direction per player.
    pub inputs: BTreeMap<PlayerId, Direction>,
}

impl DrainedRequests {
    /// True when nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_empty() && self.inputs.is_empty()
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    lifecycle: VecDeque<LifecycleRequest>,
    inputs: BTreeMap<PlayerId, Direction>,
}

/// Thread-safe request queue shared by the gateway and the loop.
#[derive(Debug, Default)]
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a player creation.
    pub fn push_join(&self, id: PlayerId) {
        self.inner.lock().lifecycle.push_back(LifecycleRequest::Join(id));
    }

    /// Queue a player removal. Any pending input for the player is discarded.
    pub fn push_leave(&self, id: PlayerId) {
        let mut inner = self.inner.lock();
        inner.inputs.remove(&id);
        inner.lifecycle.push_back(LifecycleRequest::Leave(id));
    }

    /// Queue a full-snapshot request.
    pub fn push_resync(&self, id: PlayerId) {
        self.inner.lock().lifecycle.push_back(LifecycleRequest::Resync(id));
    }

    /// Record a movement input, replacing any earlier one from the same player.
    pub fn push_input(&self, id: PlayerId, direction: Direction) {
        self.inner.lock().inputs.insert(id, direction);
    }

    /// Take everything queued so far.
    pub fn drain(&self) -> DrainedRequests {
        let mut inner = self.inner.lock();
        DrainedRequests {
            lifecycle: inner.lifecycle.drain(..).collect(),
            inputs: std::mem::take(&mut inner.inputs),
        }
    }

    /// Number of queued lifecycle requests plus pending inputs.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.lifecycle.len() + inner.inputs.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_newest_input_wins() {
        let queue = RequestQueue::new();
        let id = PlayerId::from_u128(1);

        queue.push_input(id, Direction::Left);
        queue.push_input(id, Direction::Up);
        queue.push_input(id, Direction::Right);

        let drained = queue.drain();
        assert_eq!(drained.inputs.len(), 1);
        assert_eq!(drained.inputs[&id], Direction::Right);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_lifecycle_keeps_order() {
        let queue = RequestQueue::new();
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);

        queue.push_join(b);
        queue.push_join(a);
        queue.push_resync(b);
        queue.push_leave(a);

        let drained = queue.drain();
        assert_eq!(
            drained.lifecycle,
            vec![
                LifecycleRequest::Join(b),
                LifecycleRequest::Join(a),
                LifecycleRequest::Resync(b),
                LifecycleRequest::Leave(a),
            ]
        );
    }

    #[test]
    fn test_leave_discards_pending_input() {
        let queue = RequestQueue::new();
        let id = PlayerId::from_u128(1);

        queue.push_input(id, Direction::Down);
        queue.push_leave(id);

        let drained = queue.drain();
        assert!(drained.inputs.is_empty());
        assert_eq!(drained.lifecycle, vec![LifecycleRequest::Leave(id)]);
    }

    #[test]
    fn test_concurrent_pushes() {
        let queue = Arc::new(RequestQueue::new());

        let handles: Vec<_> = (0..8u128)
            .map(|i| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let id = PlayerId::from_u128(i);
                    queue.push_join(id);
                    for _ in 0..100 {
                        queue.push_input(id, Direction::Up);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let drained = queue.drain();
        assert_eq!(drained.lifecycle.len(), 8);
        // Coalesced to one input per player
        assert_eq!(drained.inputs.len(), 8);
    }
}
