use proptest::prelude::*;

use fastpass_proto::demand::DenseDemandTable;
use fastpass_proto::wire::{AllocSlot, Header};
use fastpass_proto::window::reconstruct_seqno16;

proptest! {
    #[test]
    fn test_header_roundtrip(
        seqno_low in any::<u16>(),
        ack_seq_low14 in 0u16..0x4000,
        ack_vec in any::<u16>(),
    ) {
        let h = Header {
            seqno_low,
            flags: 0,
            ack_seq_low14,
            ack_vec,
        };
        let encoded = h.encode();
        let decoded = Header::decode(&encoded).unwrap();
        prop_assert_eq!(h, decoded);
    }

    #[test]
    fn test_seqno16_reconstruction_near_reference(
        reference in 0u64..(1u64 << 40),
        delta in -8000i64..8000,
    ) {
        let actual = (reference as i64 + delta).max(0) as u64;
        let low16 = (actual & 0xFFFF) as u16;
        let reconstructed = reconstruct_seqno16(low16, reference);
        // the reconstructed value must be the closest 64-bit number whose
        // low 16 bits equal `low16`, which is `actual` itself whenever the
        // true distance from `reference` is within half the 16-bit range.
        if delta.unsigned_abs() < (1u64 << 15) {
            prop_assert_eq!(reconstructed, actual);
        }
    }

    #[test]
    fn test_demand_invariants_hold_under_random_ops(
        ops in prop::collection::vec(0u8..5, 0..200),
        amounts in prop::collection::vec(1u64..50, 0..200),
    ) {
        let mut table = DenseDemandTable::new(1);
        for (op, amount) in ops.iter().zip(amounts.iter()) {
            match op {
                0 => table.inc_demand(0, *amount),
                1 => table.inc_requested(0, table.get(0).unwrap().requested + amount),
                2 => { table.inc_alloc(0, *amount); }
                3 => { table.inc_used(0, *amount); }
                4 => { let _ = table.ack(0, table.get(0).unwrap().acked + (amount / 7)); }
                _ => unreachable!(),
            }
            let rec = table.get(0).unwrap();
            prop_assert!(rec.acked <= rec.demand);
            prop_assert!(rec.alloc <= rec.demand);
            prop_assert!(rec.used <= rec.alloc);
        }
    }

    #[test]
    fn test_alloc_section_roundtrip(
        base_tslot_low20 in 0u32..(1 << 20),
        dst_count in 1usize..=15,
        slot_count in 0usize..64,
    ) {
        let dst_list: Vec<u16> = (1..=dst_count as u16).collect();
        let slots: Vec<AllocSlot> = (0..slot_count)
            .map(|i| AllocSlot::Assign {
                dst_index: ((i % dst_count) + 1) as u8,
                flags: 0,
            })
            .collect();
        let sections = vec![fastpass_proto::wire::Section::Alloc {
            base_tslot_low20,
            dst_list: dst_list.clone(),
            slots: slots.clone(),
        }];
        let encoded = fastpass_proto::wire::encode_sections(&sections);
        let decoded = fastpass_proto::wire::decode_sections(&encoded).unwrap();
        prop_assert_eq!(decoded.len(), 1);
        match &decoded[0] {
            fastpass_proto::wire::Section::Alloc {
                base_tslot_low20: b,
                dst_list: d,
                slots: s,
            } => {
                prop_assert_eq!(*b, base_tslot_low20);
                prop_assert_eq!(d, &dst_list);
                prop_assert_eq!(s, &slots);
            }
            _ => prop_assert!(false, "expected Alloc section"),
        }
    }
}
