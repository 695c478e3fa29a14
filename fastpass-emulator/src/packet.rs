//! The emulator's packet representation and a fixed-size pool of owned
//! records, the same "pointer into a pool, never move the payload" shape
//! the arbiter's ring buffers use (§5), scaled down to single-threaded
//! emulator use.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub src: u16,
    pub dst: u16,
    pub len_bytes: u32,
    pub priority: u8,
    pub is_control: bool,
}

/// Fixed-capacity pool of packet records, addressed by an opaque id that
/// stays valid until explicitly freed. `alloc` returns `None` once the
/// pool is exhausted — a first-class "mempool exhaustion" outcome (§7),
/// not a panic.
#[derive(Debug)]
pub struct PacketPool {
    slots: Vec<Option<Packet>>,
    free: Vec<u32>,
}

impl PacketPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            free: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alloc(&mut self, packet: Packet) -> Option<u32> {
        let id = self.free.pop()?;
        self.slots[id as usize] = Some(packet);
        Some(id)
    }

    pub fn get(&self, id: u32) -> Option<&Packet> {
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn free(&mut self, id: u32) -> Option<Packet> {
        let slot = self.slots.get_mut(id as usize)?;
        let packet = slot.take()?;
        self.free.push(id);
        Some(packet)
    }
}
