//! Router step function (§4.G): `RT ∘ CLA ∘ QM ∘ SCH` operating over a
//! shared [`QueueBank`] once per timeslot.

use std::collections::VecDeque;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::classifier::Classifier;
use crate::dropper::Dropper;
use crate::packet::PacketPool;
use crate::queue_bank::QueueBank;
use crate::queue_manager::{EnqueueOutcome, QueueManager};
use crate::routing_table::RoutingTable;
use crate::scheduler::Scheduler;

pub const ROUTER_MAX_BURST: usize = 64;

pub struct RouterConfig {
    pub egress_ring_capacity: usize,
    pub drop_on_failed_enqueue: bool,
    pub rng_seed: u64,
}

pub struct Router {
    pub routing_table: RoutingTable,
    pub bank: QueueBank,
    pub dropper: Dropper,
    egress_rings: Vec<VecDeque<u32>>,
    schedulers: Vec<Scheduler>,
    egress_ring_capacity: usize,
    drop_on_failed_enqueue: bool,
    rng: StdRng,
    pub retries: u64,
}

impl Router {
    pub fn new(
        num_ports: usize,
        queue_capacity: usize,
        qm_factory: impl Fn() -> QueueManager,
        scheduler_factory: impl Fn() -> Scheduler,
        config: RouterConfig,
    ) -> Self {
        Self {
            routing_table: RoutingTable::new(),
            bank: QueueBank::new(num_ports, queue_capacity, qm_factory),
            dropper: Dropper::new(),
            egress_rings: (0..num_ports).map(|_| VecDeque::new()).collect(),
            schedulers: (0..num_ports).map(|_| scheduler_factory()).collect(),
            egress_ring_capacity: config.egress_ring_capacity,
            drop_on_failed_enqueue: config.drop_on_failed_enqueue,
            rng: StdRng::seed_from_u64(config.rng_seed),
            retries: 0,
        }
    }

    pub fn egress_ring(&self, port: usize) -> &VecDeque<u32> {
        &self.egress_rings[port]
    }

    /// Runs one timeslot: drain up to `ROUTER_MAX_BURST` ingress packets
    /// (shuffled to avoid endpoint bias), classify+route+enqueue each,
    /// then pull at most one packet per egress port into its ring.
    pub fn step(&mut self, ingress: &mut VecDeque<u32>, pool: &mut PacketPool, now: Instant) {
        let mut burst: Vec<u32> = (0..ROUTER_MAX_BURST)
            .filter_map(|_| ingress.pop_front())
            .collect();
        burst.shuffle(&mut self.rng);

        for packet_id in burst {
            let Some(packet) = pool.get(packet_id).copied() else {
                continue;
            };
            let classifier = Classifier::new(&self.routing_table);
            match classifier.classify(&packet) {
                Ok((port, priority)) => {
                    let outcome = self.bank.enqueue(port, priority, packet_id as u64, now);
                    if outcome == EnqueueOutcome::Dropped {
                        self.dropper.drop_packet(pool, packet_id);
                    }
                }
                Err(_) => self.dropper.drop_packet(pool, packet_id),
            }
        }

        for port in 0..self.bank.num_ports() {
            if let Some(id) = self.bank.pull(port, &mut self.schedulers[port]) {
                let packet_id = id as u32;
                if self.egress_rings[port].len() >= self.egress_ring_capacity {
                    if self.drop_on_failed_enqueue {
                        self.dropper.drop_packet(pool, packet_id);
                    } else {
                        self.retries += 1;
                    }
                } else {
                    self.egress_rings[port].push_back(packet_id);
                }
            }
        }
    }
}
