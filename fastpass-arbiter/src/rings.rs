//! Inter-core communication (§5): bounded MPMC/SPSC ring buffers with
//! power-of-two capacity. No thread ever blocks on a ring — a full ring
//! is `RingFull`, a first-class outcome the caller retries (and logs) or
//! drops per configuration, never a panic or a block.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("ring is full (ENOBUFS)")]
    RingFull,
}

/// A bounded ring of pointers into a fixed-size record pool. Each element
/// is `T` (typically a pool index or `Arc<Record>`), never the owned
/// record body itself, so pushing/popping never copies the payload.
#[derive(Clone)]
pub struct Ring<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> Ring<T> {
    /// `capacity` is rounded up to the next power of two, matching the
    /// wire-level windows elsewhere in the stack.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.next_power_of_two())),
        }
    }

    /// Pushes `item`. On failure, hands `item` back alongside
    /// [`RingError::RingFull`] so the caller can decide whether to retry
    /// or free it, rather than it being silently swallowed.
    pub fn push(&self, item: T) -> Result<(), (RingError, T)> {
        self.queue.push(item).map_err(|returned| (RingError::RingFull, returned))
    }

    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// What a core does when a push to a ring fails: retry (and count it for
/// logging) or drop the record (freeing it back to its pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnRingFull {
    Retry,
    Drop,
}

/// Outcome of one push attempt under a full-ring policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    Retrying,
    Dropped,
}

/// Pushes `item` onto `ring`, applying `policy` if the ring is full.
/// Returns the leftover item (to free back to its pool, or to retry with
/// later) alongside the outcome whenever the push didn't succeed.
pub fn push_with_policy<T>(ring: &Ring<T>, item: T, policy: OnRingFull) -> (PushOutcome, Option<T>) {
    match ring.push(item) {
        Ok(()) => (PushOutcome::Pushed, None),
        Err((RingError::RingFull, returned)) => {
            tracing::warn!(?policy, capacity = ring.capacity(), "ring full (ENOBUFS)");
            match policy {
                OnRingFull::Retry => (PushOutcome::Retrying, Some(returned)),
                OnRingFull::Drop => (PushOutcome::Dropped, Some(returned)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let r: Ring<u32> = Ring::new(5);
        assert_eq!(r.capacity(), 8);
    }

    #[test]
    fn push_past_capacity_returns_ring_full_with_item_back() {
        let r: Ring<u32> = Ring::new(1);
        assert!(r.push(1).is_ok());
        assert_eq!(r.push(2), Err((RingError::RingFull, 2)));
    }

    #[test]
    fn push_with_policy_drop_hands_back_item_to_free() {
        let r: Ring<u32> = Ring::new(1);
        r.push(1).unwrap();
        let (outcome, leftover) = push_with_policy(&r, 2, OnRingFull::Drop);
        assert_eq!(outcome, PushOutcome::Dropped);
        assert_eq!(leftover, Some(2));
    }

    #[test]
    fn pop_drains_in_fifo_order() {
        let r: Ring<u32> = Ring::new(4);
        r.push(1).unwrap();
        r.push(2).unwrap();
        assert_eq!(r.pop(), Some(1));
        assert_eq!(r.pop(), Some(2));
        assert_eq!(r.pop(), None);
    }
}
