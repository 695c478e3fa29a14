//! The arbiter's allocator (§4.H): one timeslot-at-a-time bipartite
//! matching from pending `(src, dst)` demand to a conflict-free set of
//! grants (each `src` and each `dst` used at most once per timeslot).
//!
//! Two interchangeable implementations, dispatched the same
//! trait+enum way as [`fastpass_emulator::queue_manager`]: a PIM
//! (Parallel Iterative Matching) allocator, and one that instead treats
//! the emulator's router step as the allocation decision (§4.G: "either
//! PIM ... or the emulator step").

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};

use fastpass_emulator::{Packet, PacketPool, QueueManager, Router, RouterConfig, RoutingTable, Scheduler};

use crate::admitted::{AdmittedEntry, AdmittedRecord};

/// One pending request: `src` wants a timeslot to `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingRequest {
    pub src: u16,
    pub dst: u16,
}

pub trait AllocatorPolicy: Send {
    /// Produces the admitted-traffic record for `timeslot` given the
    /// currently pending requests.
    fn allocate(&mut self, timeslot: u64, pending: &[PendingRequest]) -> AdmittedRecord;
}

/// Parallel Iterative Matching: request / grant / accept rounds over the
/// bipartite demand graph, each round only involving srcs and dsts not
/// yet matched this timeslot ("disjoint partitions").
#[derive(Debug)]
pub struct Pim {
    rounds: u32,
    rng: StdRng,
}

impl Pim {
    pub fn new(rounds: u32, seed: u64) -> Self {
        Self {
            rounds,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl AllocatorPolicy for Pim {
    fn allocate(&mut self, timeslot: u64, pending: &[PendingRequest]) -> AdmittedRecord {
        let mut matched_src: HashSet<u16> = HashSet::new();
        let mut matched_dst: HashSet<u16> = HashSet::new();
        let mut matches: Vec<PendingRequest> = Vec::new();

        for _ in 0..self.rounds {
            if matched_src.len() == pending.len() {
                break;
            }
            // Request phase: every unmatched src requests every dst it
            // still has pending demand for.
            let mut requests_by_dst: HashMap<u16, Vec<u16>> = HashMap::new();
            for req in pending {
                if matched_src.contains(&req.src) || matched_dst.contains(&req.dst) {
                    continue;
                }
                requests_by_dst.entry(req.dst).or_default().push(req.src);
            }
            if requests_by_dst.is_empty() {
                break;
            }
            // Grant phase: each dst grants one requester at random.
            let mut grants: HashMap<u16, u16> = HashMap::new();
            for (dst, srcs) in requests_by_dst {
                let pick = srcs[self.rng.gen_range(0..srcs.len())];
                grants.insert(dst, pick);
            }
            // Accept phase: a src with multiple grants (possible if it
            // requested multiple dsts in this round) takes one; since
            // each src contributes one request per dst pair, collapse by
            // src here before committing the timeslot-exclusive match.
            let mut accepted_src: HashSet<u16> = HashSet::new();
            for (dst, src) in grants {
                if accepted_src.contains(&src) {
                    continue;
                }
                accepted_src.insert(src);
                matched_src.insert(src);
                matched_dst.insert(dst);
                matches.push(PendingRequest { src, dst });
            }
        }

        let mut record = AdmittedRecord::new(timeslot);
        for (idx, m) in matches.into_iter().enumerate() {
            record.push(AdmittedEntry {
                src: m.src,
                dst: m.dst,
                id: idx as u16,
                flags: 0,
            });
        }
        record
    }
}

/// Delegates the allocation decision to one pass of the emulator's router
/// step function: every pending request becomes a unit-length packet,
/// fed through a single-port-per-destination router, and whatever lands
/// in an egress ring this timeslot is admitted.
pub struct EmulatorBacked {
    router: Router,
    pool: PacketPool,
}

impl EmulatorBacked {
    pub fn new(num_dsts: usize, queue_capacity: usize, pool_capacity: usize, seed: u64) -> Self {
        let mut routing_table = RoutingTable::new();
        for dst in 0..num_dsts {
            routing_table.set_route(dst as u16, dst);
        }
        let mut router = Router::new(
            num_dsts,
            queue_capacity,
            || QueueManager::DropTail(fastpass_emulator::DropTail),
            || Scheduler::StrictPriority(fastpass_emulator::StrictPriority),
            RouterConfig {
                egress_ring_capacity: queue_capacity,
                drop_on_failed_enqueue: true,
                rng_seed: seed,
            },
        );
        router.routing_table = routing_table;
        Self {
            router,
            pool: PacketPool::new(pool_capacity),
        }
    }
}

impl AllocatorPolicy for EmulatorBacked {
    fn allocate(&mut self, timeslot: u64, pending: &[PendingRequest]) -> AdmittedRecord {
        let mut ingress = std::collections::VecDeque::new();
        for req in pending {
            if let Some(id) = self.pool.alloc(Packet {
                src: req.src,
                dst: req.dst,
                len_bytes: 1,
                priority: 0,
                is_control: false,
            }) {
                ingress.push_back(id);
            }
        }
        let now = std::time::Instant::now();
        self.router.step(&mut ingress, &mut self.pool, now);

        let mut record = AdmittedRecord::new(timeslot);
        let num_ports = self.router.bank.num_ports();
        for port in 0..num_ports {
            if let Some(&packet_id) = self.router.egress_ring(port).front() {
                if let Some(packet) = self.pool.get(packet_id).copied() {
                    record.push(AdmittedEntry {
                        src: packet.src,
                        dst: packet.dst,
                        id: packet_id as u16,
                        flags: 0,
                    });
                }
            }
        }
        record
    }
}

pub enum Allocator {
    Pim(Pim),
    EmulatorBacked(Box<EmulatorBacked>),
}

impl AllocatorPolicy for Allocator {
    fn allocate(&mut self, timeslot: u64, pending: &[PendingRequest]) -> AdmittedRecord {
        match self {
            Allocator::Pim(a) => a.allocate(timeslot, pending),
            Allocator::EmulatorBacked(a) => a.allocate(timeslot, pending),
        }
    }
}
