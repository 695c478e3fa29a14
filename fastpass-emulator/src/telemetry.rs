//! Read-only telemetry snapshots (§6): `queue_bank_stats` and
//! `port_drop_stats`, exposed to whatever owns arbiter-to-emulator
//! observability (tracing subscriber, metrics exporter, or test code).

use crate::queue_bank::{PortDropStats, QueueBank, QueueStats};
use crate::scheduler::NUM_PRIORITIES;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PortSnapshot {
    pub port: usize,
    pub queues: [QueueStats; NUM_PRIORITIES],
    pub drops: PortDropStats,
}

/// A point-in-time copy of every port's queue and drop counters.
pub fn snapshot(bank: &QueueBank) -> Vec<PortSnapshot> {
    (0..bank.num_ports())
        .map(|port| PortSnapshot {
            port,
            queues: std::array::from_fn(|priority| bank.queue_stats(port, priority)),
            drops: bank.port_drop_stats(port),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue_manager::{DropTail, QueueManager};
    use std::time::Instant;

    #[test]
    fn snapshot_reflects_current_counters() {
        let mut bank = QueueBank::new(1, 2, || QueueManager::DropTail(DropTail));
        bank.enqueue(0, 0, 1, Instant::now());
        let snap = snapshot(&bank);
        assert_eq!(snap[0].queues[0].enqueues, 1);
    }
}
