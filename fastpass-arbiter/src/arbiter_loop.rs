//! The arbiter's per-timeslot pipeline (§4.H):
//!
//! 1. drain new demands from RX, updating the demand table;
//! 2. reset per-timeslot allocator state;
//! 3. run the allocator, producing an admitted-traffic record;
//! 4. hand the record to the TX path, which packs ALLOC payloads for the
//!    connections that should receive each slice.
//!
//! Step 4's packing into wire `Section::Alloc`s lives with the
//! connection that owns the protocol engine for that endpoint (outside
//! this crate's scope); this module produces the [`AdmittedRecord`] that
//! feeds it.

use fastpass_proto::{reconstruct_count_low16, DenseDemandTable};

use crate::admitted::AdmittedRecord;
use crate::allocator::{Allocator, AllocatorPolicy, PendingRequest};
use crate::flow_ids::FlowIdAssigner;

/// One reconstructed AREQ observation from the wire: `dst_key`'s demand
/// has been requested up to `cumulative_count` (the decoded,
/// mod-2^16-reconstructed absolute counter, not a delta).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxDemand {
    pub src: u16,
    pub dst_key: u64,
    pub cumulative_count: u64,
}

pub struct ArbiterLoop {
    demand: DenseDemandTable,
    ids: FlowIdAssigner,
    allocator: Allocator,
    current_timeslot: u64,
    pub dropped_rx_overflow: u64,
}

impl ArbiterLoop {
    pub fn new(max_flows: usize, allocator: Allocator) -> Self {
        Self {
            demand: DenseDemandTable::new(max_flows),
            ids: FlowIdAssigner::new(max_flows),
            allocator,
            current_timeslot: 0,
            dropped_rx_overflow: 0,
        }
    }

    pub fn current_timeslot(&self) -> u64 {
        self.current_timeslot
    }

    /// Decodes one source's raw AREQ entries — `(dst_key, count_low16)`
    /// pairs straight off the wire's `Section::Areq` — into [`RxDemand`]
    /// observations, reconstructing each wrapped counter against the
    /// demand table's current value for that flow (§4.B). An entry whose
    /// guard band rejects reconstruction is logged and dropped rather
    /// than passed through with a garbage counter; the peer is expected
    /// to recover via a reset rather than this path guessing further.
    pub fn decode_areq(&mut self, src: u16, entries: &[(u64, u16)]) -> Vec<RxDemand> {
        let mut out = Vec::with_capacity(entries.len());
        for &(dst_key, count_low16) in entries {
            let id = match self.ids.id_for(dst_key) {
                Ok(id) => id,
                Err(_) => {
                    self.dropped_rx_overflow += 1;
                    continue;
                }
            };
            let reference = self.demand.get(id).map(|r| r.demand).unwrap_or(0);
            match reconstruct_count_low16(count_low16, reference) {
                Some(cumulative_count) => out.push(RxDemand {
                    src,
                    dst_key,
                    cumulative_count,
                }),
                None => {
                    tracing::warn!(
                        src,
                        dst_key,
                        count_low16,
                        reference,
                        "AREQ count_low16 outside guard band, dropping entry"
                    );
                }
            }
        }
        out
    }

    /// Runs one timeslot of the pipeline and advances
    /// `current_timeslot`.
    pub fn step(&mut self, rx: &[RxDemand]) -> AdmittedRecord {
        // (1) drain new demands from RX, updating the demand table.
        let mut pending = Vec::new();
        for obs in rx {
            let id = match self.ids.id_for(obs.dst_key) {
                Ok(id) => id,
                Err(_) => {
                    self.dropped_rx_overflow += 1;
                    continue;
                }
            };
            let current = self.demand.get(id).map(|r| r.demand).unwrap_or(0);
            if obs.cumulative_count > current {
                self.demand.inc_demand(id, obs.cumulative_count - current);
            }
            let demand_now = self.demand.get(id).map(|r| r.demand).unwrap_or(0);
            let alloc_now = self.demand.get(id).map(|r| r.alloc).unwrap_or(0);
            if demand_now > alloc_now {
                pending.push(PendingRequest {
                    src: obs.src,
                    dst: obs.dst_key as u16,
                });
            }
        }

        // (2) + (3): the allocator itself holds any per-timeslot state
        // that needs resetting (e.g. Pim's rng advances per call, the
        // emulator-backed allocator's queue bank persists across
        // timeslots by design so queueing effects carry over).
        let record = self.allocator.allocate(self.current_timeslot, &pending);

        // (4) credit alloc for every admitted entry so the next RX
        // observation's pending-demand check reflects this grant.
        for entry in &record.entries {
            if let Ok(id) = self.ids.id_for(entry.dst as u64) {
                self.demand.inc_alloc(id, 1);
            }
        }

        self.current_timeslot += 1;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Pim;

    #[test]
    fn step_admits_pending_demand_and_credits_alloc() {
        let mut arb = ArbiterLoop::new(16, Allocator::Pim(Pim::new(4, 11)));
        let rx = vec![RxDemand {
            src: 1,
            dst_key: 5,
            cumulative_count: 3,
        }];
        let record = arb.step(&rx);
        assert_eq!(record.n_admitted(), 1);
        assert_eq!(arb.current_timeslot(), 1);
    }

    #[test]
    fn decode_areq_reconstructs_count_low16_against_current_demand() {
        let mut arb = ArbiterLoop::new(16, Allocator::Pim(Pim::new(4, 11)));
        let rx = arb.decode_areq(1, &[(5, 3)]);
        assert_eq!(
            rx,
            vec![RxDemand {
                src: 1,
                dst_key: 5,
                cumulative_count: 3,
            }]
        );
        let record = arb.step(&rx);
        assert_eq!(record.n_admitted(), 1);

        // A later AREQ's low16 is reconstructed against the demand the
        // first one already established, not against zero.
        let rx2 = arb.decode_areq(1, &[(5, 9)]);
        assert_eq!(rx2[0].cumulative_count, 9);
    }

    #[test]
    fn decode_areq_drops_entries_outside_the_guard_band() {
        let mut arb = ArbiterLoop::new(16, Allocator::Pim(Pim::new(4, 11)));
        // Push demand to 20_000 first (well within the guard band of a
        // reference of 0), then replay a stale low16 of 0 against that
        // new reference: reconstructing it forward wraps past the guard
        // band, so it must be dropped rather than accepted as a rollback.
        let rx = arb.decode_areq(1, &[(5, 20_000)]);
        let _ = arb.step(&rx);
        let stale = arb.decode_areq(1, &[(5, 0)]);
        assert!(stale.is_empty());
    }

    #[test]
    fn fully_allocated_flow_does_not_re_request() {
        let mut arb = ArbiterLoop::new(16, Allocator::Pim(Pim::new(4, 3)));
        let rx = vec![RxDemand {
            src: 1,
            dst_key: 5,
            cumulative_count: 1,
        }];
        let first = arb.step(&rx);
        assert_eq!(first.n_admitted(), 1);
        // Same cumulative count again: demand table sees no new demand,
        // alloc already caught up, so nothing pending this timeslot.
        let second = arb.step(&rx);
        assert_eq!(second.n_admitted(), 0);
    }
}
