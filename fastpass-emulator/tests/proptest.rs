use std::collections::HashSet;

use proptest::prelude::*;

use fastpass_emulator::packet::{Packet, PacketPool};
use fastpass_emulator::routing_table::RoutingTable;

fn pkt(n: u32) -> Packet {
    Packet {
        src: 0,
        dst: (n % u16::MAX as u32) as u16,
        len_bytes: n,
        priority: (n % 5) as u8,
        is_control: false,
    }
}

proptest! {
    #[test]
    fn test_packet_pool_never_exceeds_capacity_and_ids_stay_unique(
        capacity in 1usize..64,
        // 0 = alloc, 1 = free a live id picked by index-into-live-set
        ops in prop::collection::vec((any::<bool>(), any::<u32>()), 0..300),
    ) {
        let mut pool = PacketPool::new(capacity);
        let mut live: Vec<u32> = Vec::new();
        let mut seen_at_once: HashSet<u32> = HashSet::new();

        for (idx, (do_alloc, seed)) in ops.iter().enumerate() {
            if *do_alloc || live.is_empty() {
                match pool.alloc(pkt(idx as u32)) {
                    Some(id) => {
                        prop_assert!(!seen_at_once.contains(&id), "id reused while still live");
                        seen_at_once.insert(id);
                        live.push(id);
                    }
                    None => {
                        prop_assert_eq!(pool.len(), capacity);
                    }
                }
            } else {
                let pick = (*seed as usize) % live.len();
                let id = live.remove(pick);
                prop_assert!(pool.free(id).is_some());
                seen_at_once.remove(&id);
            }
            prop_assert!(pool.len() <= capacity);
        }
    }

    #[test]
    fn test_routing_table_explicit_route_always_wins_over_default(
        dst in any::<u16>(),
        explicit_port in 0usize..64,
        default_port in 0usize..64,
    ) {
        let mut rt = RoutingTable::new();
        rt.set_default_port(default_port);
        rt.set_route(dst, explicit_port);
        prop_assert_eq!(rt.port_for(dst), Some(explicit_port));
    }

    #[test]
    fn test_routing_table_unrouted_falls_back_to_default(
        dst in any::<u16>(),
        default_port in 0usize..64,
    ) {
        let mut rt = RoutingTable::new();
        rt.set_default_port(default_port);
        prop_assert_eq!(rt.port_for(dst), Some(default_port));
    }
}
