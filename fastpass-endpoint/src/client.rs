//! The endpoint client (§4.F): owns the per-flow demand table and the two
//! priority queues (retransmit over request) that feed the next outbound
//! AREQ packet.
//!
//! ```text
//! UNQUEUED ──(demand>requested, under-watermark)──▶ IN_REQUEST_QUEUE
//! IN_REQUEST_QUEUE ──(nack)──▶ IN_RETRANSMIT_QUEUE
//! {IN_REQUEST_QUEUE, IN_RETRANSMIT_QUEUE} ──(packet sent)──▶ UNQUEUED
//! ```

use std::collections::{HashMap, VecDeque};

use fastpass_proto::{DenseDemandTable, FlowQueueState, SparseDemandTable};
use smallvec::SmallVec;

use crate::flow::{Flow, PendingPacket};
use crate::horizon::{ElapsedSlot, Horizon};

/// Most packets carry far fewer than `FASTPASS_PKT_MAX_AREQ` entries;
/// stack-allocate up to that many before spilling to the heap.
pub type AreqEntries = SmallVec<[AreqEntry; 15]>;

/// One flow chosen for inclusion in the next outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreqEntry {
    pub dst_key: u64,
    pub new_requested: u64,
}

/// Behavior shared by the endpoint's sparse table and the arbiter's dense
/// one, so the queue-draining logic in [`EndpointClient`] doesn't care
/// which backing shape it's driving.
pub trait DemandLookup {
    fn demand(&self, key: u64) -> u64;
    fn requested(&self, key: u64) -> u64;
    fn acked(&self, key: u64) -> u64;
    fn alloc(&self, key: u64) -> u64;
    fn set_requested(&mut self, key: u64, new_requested: u64);
    fn set_state(&mut self, key: u64, state: FlowQueueState);
    fn inc_demand(&mut self, key: u64, n: u64);
    fn inc_alloc(&mut self, key: u64, n: u64);
    fn inc_used(&mut self, key: u64, n: u64);
}

impl DemandLookup for SparseDemandTable {
    fn demand(&self, key: u64) -> u64 {
        self.get(key).map(|r| r.demand).unwrap_or(0)
    }
    fn requested(&self, key: u64) -> u64 {
        self.get(key).map(|r| r.requested).unwrap_or(0)
    }
    fn acked(&self, key: u64) -> u64 {
        self.get(key).map(|r| r.acked).unwrap_or(0)
    }
    fn alloc(&self, key: u64) -> u64 {
        self.get(key).map(|r| r.alloc).unwrap_or(0)
    }
    fn set_requested(&mut self, key: u64, new_requested: u64) {
        SparseDemandTable::inc_requested(self, key, new_requested);
    }
    fn set_state(&mut self, key: u64, state: FlowQueueState) {
        SparseDemandTable::set_state(self, key, state);
    }
    fn inc_demand(&mut self, key: u64, n: u64) {
        SparseDemandTable::inc_demand(self, key, n);
    }
    fn inc_alloc(&mut self, key: u64, n: u64) {
        SparseDemandTable::inc_alloc(self, key, n);
    }
    fn inc_used(&mut self, key: u64, n: u64) {
        SparseDemandTable::inc_used(self, key, n);
    }
}

impl DemandLookup for DenseDemandTable {
    fn demand(&self, key: u64) -> u64 {
        self.get(key as u32).map(|r| r.demand).unwrap_or(0)
    }
    fn requested(&self, key: u64) -> u64 {
        self.get(key as u32).map(|r| r.requested).unwrap_or(0)
    }
    fn acked(&self, key: u64) -> u64 {
        self.get(key as u32).map(|r| r.acked).unwrap_or(0)
    }
    fn alloc(&self, key: u64) -> u64 {
        self.get(key as u32).map(|r| r.alloc).unwrap_or(0)
    }
    fn set_requested(&mut self, key: u64, new_requested: u64) {
        DenseDemandTable::inc_requested(self, key as u32, new_requested);
    }
    fn set_state(&mut self, key: u64, state: FlowQueueState) {
        DenseDemandTable::set_state(self, key as u32, state);
    }
    fn inc_demand(&mut self, key: u64, n: u64) {
        DenseDemandTable::inc_demand(self, key as u32, n);
    }
    fn inc_alloc(&mut self, key: u64, n: u64) {
        DenseDemandTable::inc_alloc(self, key as u32, n);
    }
    fn inc_used(&mut self, key: u64, n: u64) {
        DenseDemandTable::inc_used(self, key as u32, n);
    }
}

/// Request queue + retransmit queue, draining the latter first (§4.F:
/// "the retransmit queue has strict priority over the request queue").
pub struct EndpointClient<T> {
    pub demand: T,
    flows: HashMap<u64, Flow>,
    request_queue: VecDeque<u64>,
    retransmit_queue: VecDeque<u64>,
    request_window: u64,
    low_watermark: u64,
    max_areq_per_packet: usize,
    missed_timeslots: u64,
}

impl<T: DemandLookup> EndpointClient<T> {
    pub fn new(demand: T, request_window: u64, low_watermark: u64, max_areq_per_packet: usize) -> Self {
        Self {
            demand,
            flows: HashMap::new(),
            request_queue: VecDeque::new(),
            retransmit_queue: VecDeque::new(),
            request_window,
            low_watermark,
            max_areq_per_packet,
            missed_timeslots: 0,
        }
    }

    /// Total count of horizon slots that elapsed carrying an allocation
    /// nobody serviced (§4.E "missed timeslots").
    pub fn missed_timeslots(&self) -> u64 {
        self.missed_timeslots
    }

    /// Enqueues a packet bound for `dst_key`'s egress FIFO, incrementing
    /// demand and (re-)entering the request queue if the flow's credit
    /// just ran out (§4.F).
    pub fn enqueue(
        &mut self,
        dst_key: u64,
        packet: PendingPacket,
        tslot_len_ns: u64,
        link_rate_bytes_per_sec: u64,
    ) {
        let grew_demand = self
            .flows
            .entry(dst_key)
            .or_default()
            .enqueue(packet, tslot_len_ns, link_rate_bytes_per_sec);
        if grew_demand {
            self.demand.inc_demand(dst_key, 1);
            self.on_demand_grew(dst_key);
        }
    }

    /// Drives `horizon` forward to `now_ns`. Exactly one slot elapsing is
    /// the steady-state, on-time case: `schedule[0]`'s flow is serviced
    /// (its egress FIFO drained for one timeslot's worth of packets,
    /// `used++`). More than one slot elapsing in a single call means the
    /// watchdog fell behind — every allocation caught in that backlog was
    /// never serviced in its window, so each is rebooked instead
    /// (`demand++, alloc++`, forcing a fresh request) (§4.E, §4.F).
    pub fn service_horizon(
        &mut self,
        horizon: &mut Horizon,
        now_ns: u64,
        slot_start_ns: &mut u64,
        tslot_len_ns: u64,
        link_rate_bytes_per_sec: u64,
    ) {
        let elapsed = horizon.advance_to(now_ns, slot_start_ns);
        let on_time = elapsed.len() <= 1;
        for slot in elapsed {
            let ElapsedSlot::Allocated(dst_key) = slot else {
                continue;
            };
            if on_time {
                let serviced = self
                    .flows
                    .get_mut(&dst_key)
                    .map(|flow| flow.service_timeslot(tslot_len_ns, link_rate_bytes_per_sec))
                    .unwrap_or(0);
                tracing::debug!(dst_key, serviced, "serviced allocated timeslot");
                self.demand.inc_used(dst_key, 1);
            } else {
                self.missed_timeslots += 1;
                tracing::warn!(dst_key, "missed timeslot, rebooking demand");
                self.demand.inc_demand(dst_key, 1);
                self.demand.inc_alloc(dst_key, 1);
                self.on_demand_grew(dst_key);
            }
        }
    }

    fn under_watermark(&self, dst_key: u64) -> bool {
        self.demand.requested(dst_key) <= self.demand.alloc(dst_key) + self.low_watermark
    }

    /// Call after any event that may have grown `demand` for `dst_key`
    /// (packet enqueue, missed-timeslot re-request). Moves the flow into
    /// the request queue if it qualifies and isn't already queued.
    pub fn on_demand_grew(&mut self, dst_key: u64) {
        if self.demand.demand(dst_key) > self.demand.requested(dst_key) && self.under_watermark(dst_key) {
            self.request_queue.push_back(dst_key);
            self.demand.set_state(dst_key, FlowQueueState::InRequestQueue);
        }
    }

    /// A packet carrying this flow's request was nacked: moves it from
    /// the request queue to the retransmit queue (or just enqueues it
    /// into the retransmit queue directly if it had already left the
    /// request queue when the nack landed).
    pub fn on_nack(&mut self, dst_key: u64) {
        self.retransmit_queue.push_back(dst_key);
        self.demand.set_state(dst_key, FlowQueueState::InRetransmitQueue);
    }

    /// Drains up to `max_areq_per_packet` flows (retransmit queue first)
    /// into one outbound packet's worth of AREQ entries, applying the
    /// `new_requested = min(demand, acked + window - 1)` rule and
    /// discarding stale entries.
    pub fn build_request_entries(&mut self) -> AreqEntries {
        let mut entries = AreqEntries::new();
        while entries.len() < self.max_areq_per_packet {
            let dst_key = match self.retransmit_queue.pop_front() {
                Some(k) => k,
                None => match self.request_queue.pop_front() {
                    Some(k) => k,
                    None => break,
                },
            };
            let demand = self.demand.demand(dst_key);
            let acked = self.demand.acked(dst_key);
            let new_requested = demand.min(acked + self.request_window.saturating_sub(1));
            // Flow left a queue; it re-enters only once demand grows
            // again past watermark.
            self.demand.set_state(dst_key, FlowQueueState::Unqueued);
            if new_requested <= acked {
                continue; // stale: discarded without being sent
            }
            self.demand.set_requested(dst_key, new_requested);
            entries.push(AreqEntry {
                dst_key,
                new_requested,
            });
        }
        entries
    }

    pub fn request_queue_len(&self) -> usize {
        self.request_queue.len()
    }

    pub fn retransmit_queue_len(&self) -> usize {
        self.retransmit_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> EndpointClient<SparseDemandTable> {
        EndpointClient::new(SparseDemandTable::new(), /*window*/ 4, /*watermark*/ 2, /*max_areq*/ 15)
    }

    #[test]
    fn flow_enters_request_queue_once_demand_exceeds_requested() {
        let mut c = client();
        c.demand.inc_demand(7, 3);
        c.on_demand_grew(7);
        assert_eq!(c.request_queue_len(), 1);
    }

    #[test]
    fn flow_over_watermark_does_not_enqueue() {
        let mut c = client();
        c.demand.inc_demand(7, 10);
        c.demand.inc_alloc(7, 10);
        c.demand.inc_requested(7, 9); // requested > alloc(10) + watermark(2) is false here
        c.demand.inc_demand(7, 1); // demand now 11 > requested 9
        // requested(9) <= alloc(10)+watermark(2)=12, so still under watermark
        c.on_demand_grew(7);
        assert_eq!(c.request_queue_len(), 1);
    }

    #[test]
    fn retransmit_queue_drains_before_request_queue() {
        let mut c = client();
        c.demand.inc_demand(1, 5);
        c.demand.ack(1, 1).unwrap();
        c.on_demand_grew(1);
        c.demand.inc_demand(2, 5);
        c.demand.ack(2, 1).unwrap();
        c.on_nack(2);

        let entries = c.build_request_entries();
        assert_eq!(entries[0].dst_key, 2, "retransmit queue must drain first");
        assert_eq!(entries[1].dst_key, 1);
    }

    #[test]
    fn stale_entry_is_discarded_not_sent() {
        let mut c = client();
        c.demand.inc_demand(1, 5);
        c.demand.ack(1, 5).unwrap(); // acked caught up to demand: new_requested <= acked
        c.on_demand_grew(1);
        let entries = c.build_request_entries();
        assert!(entries.is_empty());
    }

    #[test]
    fn missed_timeslot_rebooks_demand_and_alloc() {
        // S4: tslot 10 allocated to dst 42 at t0; watchdog fires at t0 + 11*tslot_len,
        // so 11 slots elapse in a single call — a backlog, not on-time service.
        let mut c = client();
        let mut horizon = Horizon::new(100);
        horizon.set(10, 42).unwrap();
        let mut slot_start = 0u64;

        c.service_horizon(&mut horizon, 11 * 100, &mut slot_start, 100, 1_000_000_000);

        assert_eq!(c.missed_timeslots(), 1);
        assert_eq!(c.demand.demand(42), 1);
        assert_eq!(c.demand.alloc(42), 1);
        assert_eq!(c.request_queue_len(), 1, "rebooked flow re-enters the request queue");
    }

    #[test]
    fn on_time_allocation_services_flow_instead_of_rebooking() {
        // Watchdog ticks exactly once per tslot: a single elapsed slot is
        // the on-time case, so the allocated flow's FIFO gets drained
        // instead of demand/alloc being bumped.
        let mut c = client();
        c.enqueue(42, PendingPacket { len_bytes: 100 }, 100, 1_000_000_000);
        c.demand.inc_alloc(42, 1);

        let mut horizon = Horizon::new(100);
        horizon.set(0, 42).unwrap();
        let mut slot_start = 0u64;

        c.service_horizon(&mut horizon, 100, &mut slot_start, 100, 1_000_000_000);

        assert_eq!(c.missed_timeslots(), 0);
        assert_eq!(c.demand.alloc(42), 1, "alloc is untouched on the on-time path");
        assert_eq!(c.demand.get(42).unwrap().used, 1);
    }
}
