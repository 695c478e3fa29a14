//! The per-destination demand table (§4.C), in its two concrete shapes: a
//! dense, directly-indexed vector for the arbiter (keys are already small
//! integers) and an open-addressed hash table for the endpoint (keys are
//! sparse 64-bit destination identifiers). Both share the same record type
//! and the same counter operations and invariants; only the key→slot
//! lookup differs: "lookup, upsert, rebalance on reset" becomes a dense
//! vector where keys are already small integers, and an open-addressed
//! table with explicit bucket-doubling where they are not.

use thiserror::Error;

/// Where a flow sits relative to the endpoint's send queues (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum FlowQueueState {
    #[default]
    Unqueued,
    InRequestQueue,
    InRetransmitQueue,
}

/// `demand ≥ requested ≥ acked`, `alloc ≤ demand`, `used ≤ alloc` (§8
/// invariant 1). The table enforces the first by rejecting an `ack` that
/// would push `acked` past `demand`; it enforces the other two by clamping
/// and counting the excess rather than refusing the call, per §4.C
/// ("excess alloc ⇒ counted and dropped").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct DemandRecord {
    pub demand: u64,
    pub requested: u64,
    pub acked: u64,
    pub alloc: u64,
    pub used: u64,
    pub state: FlowQueueState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DemandError {
    #[error("ack({0}) exceeds demand({1}); counter-invariant violation")]
    AckExceedsDemand(u64, u64),
}

impl DemandRecord {
    fn inc_demand(&mut self, n: u64) {
        self.demand += n;
    }

    fn inc_requested(&mut self, new_requested: u64) {
        self.requested = self.requested.max(new_requested);
    }

    /// Returns the amount actually applied; anything beyond `demand` is
    /// dropped and reported to the caller for a stat counter.
    fn inc_alloc(&mut self, n: u64) -> (u64, u64) {
        let room = self.demand.saturating_sub(self.alloc);
        let applied = n.min(room);
        self.alloc += applied;
        (applied, n - applied)
    }

    /// Returns the amount actually applied and the amount dropped because
    /// it would exceed `alloc`.
    fn inc_used(&mut self, n: u64) -> (u64, u64) {
        let room = self.alloc.saturating_sub(self.used);
        let applied = n.min(room);
        self.used += applied;
        (applied, n - applied)
    }

    fn ack(&mut self, new_acked: u64) -> Result<(), DemandError> {
        if new_acked > self.demand {
            return Err(DemandError::AckExceedsDemand(new_acked, self.demand));
        }
        self.acked = self.acked.max(new_acked);
        Ok(())
    }

    fn nack(&mut self) {
        if self.state == FlowQueueState::InRequestQueue {
            self.state = FlowQueueState::InRetransmitQueue;
        }
    }

    /// "Subtract `used` from `demand`, zero the other three counters — so
    /// flows with outstanding demand survive, fully-served flows are
    /// garbage-collected" (§4.C).
    fn rebalance_on_reset(&mut self) {
        self.demand = self.demand.saturating_sub(self.used);
        self.requested = 0;
        self.acked = 0;
        self.alloc = 0;
        self.used = 0;
        self.state = FlowQueueState::Unqueued;
    }

    fn is_idle(&self) -> bool {
        self.demand == 0 && self.requested == 0 && self.acked == 0 && self.alloc == 0 && self.used == 0
    }
}

/// Dense, directly-indexed demand table for the arbiter, where destination
/// keys have already been mapped to small integer IDs (by whatever
/// partitioning scheme owns that sharding — §5 "demand table on the
/// arbiter is sharded across admission cores using deterministic
/// partitioning").
#[derive(Debug, Clone)]
pub struct DenseDemandTable {
    records: Vec<DemandRecord>,
}

impl DenseDemandTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: vec![DemandRecord::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: u32) -> Option<&DemandRecord> {
        self.records.get(id as usize)
    }

    pub fn inc_demand(&mut self, id: u32, n: u64) {
        if let Some(r) = self.records.get_mut(id as usize) {
            r.inc_demand(n);
        }
    }

    pub fn inc_requested(&mut self, id: u32, new_requested: u64) {
        if let Some(r) = self.records.get_mut(id as usize) {
            r.inc_requested(new_requested);
        }
    }

    pub fn inc_alloc(&mut self, id: u32, n: u64) -> (u64, u64) {
        self.records
            .get_mut(id as usize)
            .map(|r| r.inc_alloc(n))
            .unwrap_or((0, n))
    }

    pub fn inc_used(&mut self, id: u32, n: u64) -> (u64, u64) {
        self.records
            .get_mut(id as usize)
            .map(|r| r.inc_used(n))
            .unwrap_or((0, n))
    }

    pub fn ack(&mut self, id: u32, new_acked: u64) -> Result<(), DemandError> {
        match self.records.get_mut(id as usize) {
            Some(r) => r.ack(new_acked),
            None => Ok(()),
        }
    }

    pub fn nack(&mut self, id: u32) {
        if let Some(r) = self.records.get_mut(id as usize) {
            r.nack();
        }
    }

    pub fn set_state(&mut self, id: u32, state: FlowQueueState) {
        if let Some(r) = self.records.get_mut(id as usize) {
            r.state = state;
        }
    }

    pub fn rebalance_on_reset(&mut self) {
        for r in self.records.iter_mut() {
            r.rebalance_on_reset();
        }
    }
}

const INITIAL_BUCKETS: usize = 16;
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

/// Open-addressed demand table for the endpoint, keyed by a sparse 64-bit
/// destination key. Records live in a stable backing arena so that a
/// resize/rehash of the bucket array never moves a record (§9: "preserves
/// element identity — flow objects must not move during a single step").
#[derive(Debug, Clone)]
pub struct SparseDemandTable {
    arena: Vec<DemandRecord>,
    arena_keys: Vec<u64>,
    free_slots: Vec<u32>,
    buckets: Vec<Option<(u64, u32)>>,
    len: usize,
}

impl Default for SparseDemandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseDemandTable {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            arena_keys: Vec::new(),
            free_slots: Vec::new(),
            buckets: vec![None; INITIAL_BUCKETS],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn hash(key: u64) -> u64 {
        // Fibonacci hashing: fast, good-enough spread for a bucket-count
        // that is always a power of two.
        key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    fn find_slot(&self, key: u64) -> Option<usize> {
        let mask = self.buckets.len() - 1;
        let mut idx = (Self::hash(key) as usize) & mask;
        for _ in 0..self.buckets.len() {
            match &self.buckets[idx] {
                Some((k, arena_idx)) if *k == key => return Some(*arena_idx as usize),
                None => return None,
                _ => idx = (idx + 1) & mask,
            }
        }
        None
    }

    pub fn get(&self, key: u64) -> Option<&DemandRecord> {
        self.find_slot(key).map(|i| &self.arena[i])
    }

    /// Inserts a zeroed record for `key` if absent, returning its stable
    /// arena index (the "flow object" identity a caller may cache).
    pub fn get_or_insert(&mut self, key: u64) -> u32 {
        if let Some(i) = self.find_slot(key) {
            return i as u32;
        }
        if (self.len + 1) * MAX_LOAD_DEN > self.buckets.len() * MAX_LOAD_NUM {
            self.grow();
        }
        let arena_idx = if let Some(reused) = self.free_slots.pop() {
            self.arena[reused as usize] = DemandRecord::default();
            self.arena_keys[reused as usize] = key;
            reused
        } else {
            self.arena.push(DemandRecord::default());
            self.arena_keys.push(key);
            (self.arena.len() - 1) as u32
        };
        self.insert_bucket(key, arena_idx);
        self.len += 1;
        arena_idx
    }

    fn insert_bucket(&mut self, key: u64, arena_idx: u32) {
        let mask = self.buckets.len() - 1;
        let mut idx = (Self::hash(key) as usize) & mask;
        loop {
            if self.buckets[idx].is_none() {
                self.buckets[idx] = Some((key, arena_idx));
                return;
            }
            idx = (idx + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let new_len = self.buckets.len() * 2;
        let mut new_buckets = vec![None; new_len];
        std::mem::swap(&mut self.buckets, &mut new_buckets);
        for slot in new_buckets.into_iter().flatten() {
            let (key, arena_idx) = slot;
            let mask = self.buckets.len() - 1;
            let mut idx = (Self::hash(key) as usize) & mask;
            while self.buckets[idx].is_some() {
                idx = (idx + 1) & mask;
            }
            self.buckets[idx] = Some((key, arena_idx));
        }
    }

    pub fn inc_demand(&mut self, key: u64, n: u64) {
        let idx = self.get_or_insert(key);
        self.arena[idx as usize].inc_demand(n);
    }

    pub fn inc_requested(&mut self, key: u64, new_requested: u64) {
        let idx = self.get_or_insert(key);
        self.arena[idx as usize].inc_requested(new_requested);
    }

    pub fn inc_alloc(&mut self, key: u64, n: u64) -> (u64, u64) {
        let idx = self.get_or_insert(key);
        self.arena[idx as usize].inc_alloc(n)
    }

    pub fn inc_used(&mut self, key: u64, n: u64) -> (u64, u64) {
        let idx = self.get_or_insert(key);
        self.arena[idx as usize].inc_used(n)
    }

    pub fn ack(&mut self, key: u64, new_acked: u64) -> Result<(), DemandError> {
        let idx = self.get_or_insert(key);
        self.arena[idx as usize].ack(new_acked)
    }

    pub fn nack(&mut self, key: u64) {
        if let Some(i) = self.find_slot(key) {
            self.arena[i].nack();
        }
    }

    pub fn set_state(&mut self, key: u64, state: FlowQueueState) {
        let idx = self.get_or_insert(key);
        self.arena[idx as usize].state = state;
    }

    /// Rebalances every tracked flow and garbage-collects ones that are
    /// left fully idle, freeing their arena slot for reuse.
    pub fn rebalance_on_reset(&mut self) {
        let mut to_remove = Vec::new();
        for (i, r) in self.arena.iter_mut().enumerate() {
            if self.free_slots.contains(&(i as u32)) {
                continue;
            }
            r.rebalance_on_reset();
            if r.is_idle() {
                to_remove.push(i as u32);
            }
        }
        for idx in to_remove {
            let key = self.arena_keys[idx as usize];
            if let Some(slot) = self.find_bucket_slot(key) {
                self.buckets[slot] = None;
            }
            self.free_slots.push(idx);
            self.len -= 1;
        }
    }

    fn find_bucket_slot(&self, key: u64) -> Option<usize> {
        let mask = self.buckets.len() - 1;
        let mut idx = (Self::hash(key) as usize) & mask;
        for _ in 0..self.buckets.len() {
            match &self.buckets[idx] {
                Some((k, _)) if *k == key => return Some(idx),
                None => return None,
                _ => idx = (idx + 1) & mask,
            }
        }
        None
    }
}
