//! `Endpoint` / `EndpointGroup` (§4.G): endpoints are symmetric routers
//! with one "port" each — pull from network-in, deliver up the stack if
//! addressed to self, pull from app-out, enqueue through the port's queue
//! manager, then let the scheduler pull onto network-out.

use std::collections::VecDeque;
use std::time::Instant;

use crate::packet::{Packet, PacketPool};
use crate::queue_bank::QueueBank;
use crate::queue_manager::{EnqueueOutcome, QueueManager};
use crate::scheduler::Scheduler;

/// A pack of endpoints sharing one driver and one [`QueueBank`] (one port
/// per member endpoint).
pub struct EndpointGroup {
    bank: QueueBank,
    schedulers: Vec<Scheduler>,
    network_out: Vec<VecDeque<u32>>,
}

impl EndpointGroup {
    pub fn new(
        num_endpoints: usize,
        queue_capacity: usize,
        qm_factory: impl Fn() -> QueueManager,
        scheduler_factory: impl Fn() -> Scheduler,
    ) -> Self {
        Self {
            bank: QueueBank::new(num_endpoints, queue_capacity, qm_factory),
            schedulers: (0..num_endpoints).map(|_| scheduler_factory()).collect(),
            network_out: (0..num_endpoints).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Enqueues one app-originated packet for `endpoint_idx` at
    /// `priority`.
    pub fn push_app_packet(
        &mut self,
        endpoint_idx: usize,
        priority: usize,
        packet_id: u32,
        now: Instant,
    ) -> EnqueueOutcome {
        self.bank.enqueue(endpoint_idx, priority, packet_id as u64, now)
    }

    pub fn occupancy(&self, endpoint_idx: usize, priority: usize) -> usize {
        self.bank.occupancy(endpoint_idx, priority)
    }

    pub fn dropped_count(&self, endpoint_idx: usize) -> u64 {
        self.bank.port_drop_stats(endpoint_idx).dropped_by_full
            + self.bank.port_drop_stats(endpoint_idx).dropped_by_qm
    }

    /// Pulls one packet per endpoint from its queue onto its
    /// network-out ring.
    pub fn step(&mut self) {
        for idx in 0..self.schedulers.len() {
            if let Some(id) = self.bank.pull(idx, &mut self.schedulers[idx]) {
                self.network_out[idx].push_back(id as u32);
            }
        }
    }

    pub fn network_out(&self, endpoint_idx: usize) -> &VecDeque<u32> {
        &self.network_out[endpoint_idx]
    }
}

/// Used by a single-endpoint driver to decide whether a just-arrived
/// network packet is addressed to itself or must continue through the
/// fabric.
pub fn is_addressed_to_self(packet: &Packet, self_id: u16) -> bool {
    packet.dst == self_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue_manager::DropTail;
    use crate::scheduler::StrictPriority;

    fn pkt(dst: u16) -> Packet {
        Packet {
            src: 0,
            dst,
            len_bytes: 1,
            priority: 0,
            is_control: false,
        }
    }

    #[test]
    fn s6_drop_tail_sanity_three_queued_two_dropped() {
        let mut group = EndpointGroup::new(
            1,
            3,
            || QueueManager::DropTail(DropTail),
            || Scheduler::StrictPriority(StrictPriority),
        );
        let mut pool = PacketPool::new(8);
        let now = Instant::now();
        let mut max_occ = 0;
        for _ in 0..5 {
            let id = pool.alloc(pkt(1)).unwrap();
            group.push_app_packet(0, 0, id, now);
            max_occ = max_occ.max(group.occupancy(0, 0));
        }
        assert_eq!(group.occupancy(0, 0), 3);
        assert_eq!(group.dropped_count(0), 2);
        assert!(max_occ <= 3);
    }

    #[test]
    fn is_addressed_to_self_matches_dst_id() {
        assert!(is_addressed_to_self(&pkt(7), 7));
        assert!(!is_addressed_to_self(&pkt(7), 8));
    }
}
