//! `QueueBank` (§4.G): port × queue × FIFO storage shared by a router's
//! classifier, queue manager, and scheduler, plus the read-only telemetry
//! snapshots described in §6.

use std::collections::VecDeque;
use std::time::Instant;

use crate::queue_manager::{EnqueueOutcome, QueueManager, QueueManagerPolicy};
use crate::scheduler::NUM_PRIORITIES;

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct QueueStats {
    pub high_water: usize,
    pub enqueues: u64,
    pub drops: u64,
    pub marks: u64,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct PortDropStats {
    pub dropped_by_qm: u64,
    pub dropped_by_full: u64,
}

struct PortQueues {
    fifos: [VecDeque<u64>; NUM_PRIORITIES],
    stats: [QueueStats; NUM_PRIORITIES],
    port_drops: PortDropStats,
    capacity_per_queue: usize,
}

/// One port's worth of per-priority FIFOs, each governed by its own
/// [`QueueManager`] instance (so e.g. RED's EWMA state is per-port-queue,
/// not shared).
pub struct QueueBank {
    ports: Vec<PortQueues>,
    qm: Vec<[QueueManager; NUM_PRIORITIES]>,
}

impl QueueBank {
    pub fn new(num_ports: usize, capacity_per_queue: usize, qm_factory: impl Fn() -> QueueManager) -> Self {
        let ports = (0..num_ports)
            .map(|_| PortQueues {
                fifos: Default::default(),
                stats: Default::default(),
                port_drops: PortDropStats::default(),
                capacity_per_queue,
            })
            .collect();
        let qm = (0..num_ports)
            .map(|_| std::array::from_fn(|_| qm_factory()))
            .collect();
        Self { ports, qm }
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    /// Enqueues `packet_id` onto `(port, priority)`. Applies the port's
    /// queue manager policy first (which may drop or mark), then checks
    /// hard capacity.
    pub fn enqueue(&mut self, port: usize, priority: usize, packet_id: u64, now: Instant) -> EnqueueOutcome {
        let p = &mut self.ports[port];
        let occupancy = p.fifos[priority].len();
        let outcome = self.qm[port][priority].enqueue(occupancy, p.capacity_per_queue, now);
        match outcome {
            EnqueueOutcome::Dropped => {
                p.stats[priority].drops += 1;
                p.port_drops.dropped_by_qm += 1;
            }
            EnqueueOutcome::Enqueued | EnqueueOutcome::EnqueuedMarked => {
                if p.fifos[priority].len() >= p.capacity_per_queue {
                    p.stats[priority].drops += 1;
                    p.port_drops.dropped_by_full += 1;
                    return EnqueueOutcome::Dropped;
                }
                p.fifos[priority].push_back(packet_id);
                p.stats[priority].enqueues += 1;
                p.stats[priority].high_water = p.stats[priority].high_water.max(p.fifos[priority].len());
                if outcome == EnqueueOutcome::EnqueuedMarked {
                    p.stats[priority].marks += 1;
                }
            }
        }
        outcome
    }

    pub fn pull(&mut self, port: usize, scheduler: &mut crate::scheduler::Scheduler) -> Option<u64> {
        use crate::scheduler::SchedulerPolicy;
        scheduler.pull(&mut self.ports[port].fifos)
    }

    pub fn occupancy(&self, port: usize, priority: usize) -> usize {
        self.ports[port].fifos[priority].len()
    }

    pub fn queue_stats(&self, port: usize, priority: usize) -> QueueStats {
        self.ports[port].stats[priority]
    }

    pub fn port_drop_stats(&self, port: usize) -> PortDropStats {
        self.ports[port].port_drops
    }
}
