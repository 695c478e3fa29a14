//! Pluggable enqueue/mark/drop policies (§4.G), dispatched through an enum
//! in the same shape as a `CongestionControl`/`Algorithm`
//! pair: one trait describing the policy, one enum holding whichever
//! variant is configured, and a `dispatch!` macro forwarding calls.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Outcome of offering one packet to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    EnqueuedMarked,
    Dropped,
}

pub trait QueueManagerPolicy: Send {
    /// Decide whether `packet_len` fits, given the queue's `occupancy`
    /// (packets already queued) and `capacity`.
    fn enqueue(&mut self, occupancy: usize, capacity: usize, now: Instant) -> EnqueueOutcome;
}

#[derive(Debug, Clone, Copy)]
pub struct DropTail;

impl QueueManagerPolicy for DropTail {
    fn enqueue(&mut self, occupancy: usize, capacity: usize, _now: Instant) -> EnqueueOutcome {
        if occupancy >= capacity {
            EnqueueOutcome::Dropped
        } else {
            EnqueueOutcome::Enqueued
        }
    }
}

/// Random Early Detection: EWMA queue length, linear drop probability
/// between `min_th` and `max_th`, hard drop above `max_th`.
#[derive(Debug, Clone)]
pub struct Red {
    pub min_th: f64,
    pub max_th: f64,
    pub weight: f64,
    avg: f64,
    rng: StdRng,
}

impl Red {
    pub fn new(min_th: f64, max_th: f64, weight: f64, seed: u64) -> Self {
        Self {
            min_th,
            max_th,
            weight,
            avg: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl QueueManagerPolicy for Red {
    fn enqueue(&mut self, occupancy: usize, capacity: usize, _now: Instant) -> EnqueueOutcome {
        self.avg = (1.0 - self.weight) * self.avg + self.weight * occupancy as f64;
        if self.avg >= self.max_th {
            return EnqueueOutcome::Dropped;
        }
        if self.avg > self.min_th {
            let p = (self.avg - self.min_th) / (self.max_th - self.min_th);
            if self.rng.gen_bool(p.clamp(0.0, 1.0)) {
                return EnqueueOutcome::Dropped;
            }
        }
        if occupancy >= capacity {
            EnqueueOutcome::Dropped
        } else {
            EnqueueOutcome::Enqueued
        }
    }
}

/// Drop-tail queueing with ECN marking once the instantaneous queue
/// length reaches `mark_threshold`.
#[derive(Debug, Clone, Copy)]
pub struct Dctcp {
    pub mark_threshold: usize,
}

impl QueueManagerPolicy for Dctcp {
    fn enqueue(&mut self, occupancy: usize, capacity: usize, _now: Instant) -> EnqueueOutcome {
        if occupancy >= capacity {
            return EnqueueOutcome::Dropped;
        }
        if occupancy >= self.mark_threshold {
            EnqueueOutcome::EnqueuedMarked
        } else {
            EnqueueOutcome::Enqueued
        }
    }
}

/// HULL: a per-port phantom queue drained at `gamma * line_rate`; marks on
/// phantom overflow, drops only on real queue overflow.
#[derive(Debug, Clone)]
pub struct Hull {
    pub gamma: f64,
    pub line_rate_bytes_per_sec: u64,
    pub phantom_capacity_bytes: u64,
    phantom_bytes: u64,
    last_drain: Option<Instant>,
}

impl Hull {
    pub fn new(gamma: f64, line_rate_bytes_per_sec: u64, phantom_capacity_bytes: u64) -> Self {
        Self {
            gamma,
            line_rate_bytes_per_sec,
            phantom_capacity_bytes,
            phantom_bytes: 0,
            last_drain: None,
        }
    }

    fn drain(&mut self, now: Instant) {
        if let Some(last) = self.last_drain {
            let elapsed = now.saturating_duration_since(last);
            let drained =
                (elapsed.as_secs_f64() * self.gamma * self.line_rate_bytes_per_sec as f64) as u64;
            self.phantom_bytes = self.phantom_bytes.saturating_sub(drained);
        }
        self.last_drain = Some(now);
    }

    /// Feeds `packet_len` bytes into the phantom queue, reporting whether
    /// it overflowed (caller marks, does not drop).
    pub fn offer_phantom(&mut self, packet_len: u64, now: Instant) -> bool {
        self.drain(now);
        self.phantom_bytes += packet_len;
        self.phantom_bytes > self.phantom_capacity_bytes
    }
}

impl QueueManagerPolicy for Hull {
    fn enqueue(&mut self, occupancy: usize, capacity: usize, now: Instant) -> EnqueueOutcome {
        let overflowed = self.offer_phantom(1, now);
        if occupancy >= capacity {
            EnqueueOutcome::Dropped
        } else if overflowed {
            EnqueueOutcome::EnqueuedMarked
        } else {
            EnqueueOutcome::Enqueued
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueueManager {
    DropTail(DropTail),
    Red(Red),
    Dctcp(Dctcp),
    Hull(Hull),
}

macro_rules! dispatch {
    ($self:ident, $fn:ident $(, $args:expr)*) => {
        match $self {
            QueueManager::DropTail(q) => q.$fn($($args),*),
            QueueManager::Red(q) => q.$fn($($args),*),
            QueueManager::Dctcp(q) => q.$fn($($args),*),
            QueueManager::Hull(q) => q.$fn($($args),*),
        }
    };
}

impl QueueManagerPolicy for QueueManager {
    fn enqueue(&mut self, occupancy: usize, capacity: usize, now: Instant) -> EnqueueOutcome {
        dispatch!(self, enqueue, occupancy, capacity, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_tail_drops_only_when_full() {
        let mut q = QueueManager::DropTail(DropTail);
        let now = Instant::now();
        assert_eq!(q.enqueue(2, 3, now), EnqueueOutcome::Enqueued);
        assert_eq!(q.enqueue(3, 3, now), EnqueueOutcome::Dropped);
    }

    #[test]
    fn dctcp_marks_above_threshold_without_dropping() {
        let mut q = QueueManager::Dctcp(Dctcp { mark_threshold: 5 });
        let now = Instant::now();
        assert_eq!(q.enqueue(6, 20, now), EnqueueOutcome::EnqueuedMarked);
        assert_eq!(q.enqueue(2, 20, now), EnqueueOutcome::Enqueued);
    }

    #[test]
    fn red_hard_drops_above_max_th() {
        let mut q = Red::new(2.0, 4.0, 1.0, 42); // weight=1 => avg tracks cur exactly
        let now = Instant::now();
        assert_eq!(q.enqueue(10, 100, now), EnqueueOutcome::Dropped);
    }

    #[test]
    fn red_never_drops_below_min_th() {
        let mut q = Red::new(5.0, 10.0, 1.0, 42);
        let now = Instant::now();
        for _ in 0..50 {
            assert_eq!(q.enqueue(1, 100, now), EnqueueOutcome::Enqueued);
        }
    }

    #[test]
    fn hull_marks_on_phantom_overflow_before_real_queue_fills() {
        let mut h = Hull::new(0.5, 1_000_000, 10);
        let now = Instant::now();
        // Each enqueue adds 1 phantom byte with no drain time elapsed,
        // so the phantom queue fills to capacity quickly.
        let mut saw_mark = false;
        for _ in 0..20 {
            if h.enqueue(0, 1000, now) == EnqueueOutcome::EnqueuedMarked {
                saw_mark = true;
            }
        }
        assert!(saw_mark);
    }
}
