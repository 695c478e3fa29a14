//! Small-integer ID assignment backing the arbiter's dense demand table
//! (§9: "a fixed-size dense vector keyed by the small integer destination
//! ID on the arbiter").

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("flow ID table is at capacity ({0})")]
pub struct FlowIdsFull(pub usize);

/// Bijection from a sparse 64-bit destination key to a dense `u32` ID in
/// `[0, capacity)`, assigned on first sight and stable thereafter.
#[derive(Debug, Default)]
pub struct FlowIdAssigner {
    by_key: HashMap<u64, u32>,
    capacity: usize,
    next: u32,
}

impl FlowIdAssigner {
    pub fn new(capacity: usize) -> Self {
        Self {
            by_key: HashMap::new(),
            capacity,
            next: 0,
        }
    }

    pub fn id_for(&mut self, dst_key: u64) -> Result<u32, FlowIdsFull> {
        if let Some(&id) = self.by_key.get(&dst_key) {
            return Ok(id);
        }
        if self.next as usize >= self.capacity {
            return Err(FlowIdsFull(self.capacity));
        }
        let id = self.next;
        self.next += 1;
        self.by_key.insert(dst_key, id);
        Ok(id)
    }
}
