//! Flow identification and credit accounting (§3, §4.F).
//!
//! A flow is the endpoint's unit of demand: `(src_ip, dst_ip)` for TCP
//! traffic, `dst_endpoint_id` otherwise, or the sentinel `Internal` kind
//! for control/ARP/NTP traffic that never requests or awaits timeslots —
//! an explicit enum rather than a magic sentinel value.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FlowKind {
    /// Keyed by `(src_ip, dst_ip)`.
    Tcp { src_ip: u32, dst_ip: u32 },
    /// Keyed by the destination endpoint ID alone.
    DestEndpoint { dst_endpoint_id: u64 },
    /// Control, ARP, NTP: never scheduled.
    Internal,
}

impl FlowKind {
    /// The 64-bit key this flow is tracked under in the demand table.
    /// `Internal` has no demand-table entry; callers must check
    /// `is_internal` first.
    pub fn demand_key(&self) -> u64 {
        match self {
            FlowKind::Tcp { src_ip, dst_ip } => ((*src_ip as u64) << 32) | (*dst_ip as u64),
            FlowKind::DestEndpoint { dst_endpoint_id } => *dst_endpoint_id,
            FlowKind::Internal => 0,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, FlowKind::Internal)
    }
}

/// Classifies a packet into the flow it belongs to. Control-priority and
/// ARP/NTP traffic routes to `FlowKind::Internal`; TCP traffic is keyed by
/// its IP pair; everything else by destination endpoint.
pub fn classify(
    is_control_priority: bool,
    is_arp_or_ntp: bool,
    is_tcp: bool,
    src_ip: u32,
    dst_ip: u32,
    dst_endpoint_id: u64,
) -> FlowKind {
    if is_control_priority || is_arp_or_ntp {
        FlowKind::Internal
    } else if is_tcp {
        FlowKind::Tcp { src_ip, dst_ip }
    } else {
        FlowKind::DestEndpoint { dst_endpoint_id }
    }
}

/// Per-flow packet FIFO and transmission credit (§3 "Flow (F)").
#[derive(Debug, Clone, Default)]
pub struct Flow {
    pub pending: VecDeque<PendingPacket>,
    /// Signed remaining transmission budget, in bytes, for the
    /// currently-allocated timeslot.
    pub credit: i64,
}

#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub len_bytes: u32,
}

impl Flow {
    /// L2 transmit time in nanoseconds for a packet of `len_bytes` at
    /// `link_rate_bytes_per_sec`.
    pub fn l2_tx_time_ns(len_bytes: u32, link_rate_bytes_per_sec: u64) -> i64 {
        ((len_bytes as u128 * 1_000_000_000u128) / link_rate_bytes_per_sec.max(1) as u128) as i64
    }

    /// Enqueues `packet`, refilling credit by `tslot_len_ns` worth of
    /// bytes-at-`link_rate` once it runs non-positive (§4.F). Returns
    /// `true` if demand should be incremented for this flow as a result.
    pub fn enqueue(
        &mut self,
        packet: PendingPacket,
        tslot_len_ns: u64,
        link_rate_bytes_per_sec: u64,
    ) -> bool {
        let mut inc_demand = false;
        if self.credit <= 0 {
            inc_demand = true;
            let refill_bytes = (tslot_len_ns as u128 * link_rate_bytes_per_sec as u128
                / 1_000_000_000u128) as i64;
            self.credit += refill_bytes;
        }
        self.credit -= Self::l2_tx_time_ns(packet.len_bytes, link_rate_bytes_per_sec.max(1))
            * link_rate_bytes_per_sec as i64
            / 1_000_000_000i64.max(1);
        self.pending.push_back(packet);
        inc_demand
    }

    /// Services this flow's allocated timeslot (§4.F: "move one
    /// timeslot's worth of packets from the flow identified by
    /// `schedule[0]` to the egress FIFO"): refills credit by one
    /// timeslot's budget, then dequeues packets while credit allows,
    /// always draining at least one if the queue is non-empty so an
    /// oversized head-of-line packet can't stall the flow forever.
    /// Returns the number of packets dequeued.
    pub fn service_timeslot(&mut self, tslot_len_ns: u64, link_rate_bytes_per_sec: u64) -> usize {
        let refill_bytes = (tslot_len_ns as u128 * link_rate_bytes_per_sec as u128
            / 1_000_000_000u128) as i64;
        self.credit += refill_bytes;
        let mut serviced = 0;
        while let Some(pkt) = self.pending.front() {
            let cost = Self::l2_tx_time_ns(pkt.len_bytes, link_rate_bytes_per_sec.max(1))
                * link_rate_bytes_per_sec as i64
                / 1_000_000_000i64.max(1);
            if self.credit - cost < 0 && serviced > 0 {
                break;
            }
            self.credit -= cost;
            self.pending.pop_front();
            serviced += 1;
        }
        serviced
    }
}
