//! `Dropper` (§4.G, glossary): owns the decision and the freeing of a
//! dropped emulated packet, and the counters that make drops observable
//! via telemetry rather than silent.

use crate::packet::PacketPool;

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct DropperStats {
    pub router_dropped_packet: u64,
}

#[derive(Debug, Default)]
pub struct Dropper {
    pub stats: DropperStats,
}

impl Dropper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frees `packet_id` back to `pool` and counts the drop.
    pub fn drop_packet(&mut self, pool: &mut PacketPool, packet_id: u32) {
        pool.free(packet_id);
        self.stats.router_dropped_packet += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn drop_packet_frees_slot_and_counts() {
        let mut pool = PacketPool::new(1);
        let id = pool
            .alloc(Packet {
                src: 0,
                dst: 0,
                len_bytes: 1,
                priority: 0,
                is_control: false,
            })
            .unwrap();
        let mut dropper = Dropper::new();
        dropper.drop_packet(&mut pool, id);
        assert_eq!(dropper.stats.router_dropped_packet, 1);
        assert!(pool.is_empty());
    }
}
