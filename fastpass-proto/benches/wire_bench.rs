use criterion::{criterion_group, criterion_main, Criterion};
use fastpass_proto::wire::{decode_sections, encode_sections, AllocSlot, Header, Section};
use std::hint::black_box;

fn bench_header_roundtrip(c: &mut Criterion) {
    let h = Header {
        seqno_low: 1234,
        flags: 0,
        ack_seq_low14: 999,
        ack_vec: 0xBEEF,
    };
    c.bench_function("header_encode", |b| b.iter(|| black_box(h.encode())));

    let encoded = h.encode();
    c.bench_function("header_decode", |b| {
        b.iter(|| black_box(Header::decode(black_box(&encoded)).unwrap()))
    });
}

fn bench_areq_packet(c: &mut Criterion) {
    let sections = vec![Section::Areq {
        entries: (0..15).map(|i| (i as u16, i as u16 * 3)).collect(),
    }];
    c.bench_function("encode_full_areq_section", |b| {
        b.iter(|| black_box(encode_sections(black_box(&sections))))
    });

    let encoded = encode_sections(&sections);
    c.bench_function("decode_full_areq_section", |b| {
        b.iter(|| black_box(decode_sections(black_box(&encoded)).unwrap()))
    });
}

fn bench_alloc_packet(c: &mut Criterion) {
    let dst_list: Vec<u16> = (1..=15).collect();
    let slots: Vec<AllocSlot> = (0..64)
        .map(|i| AllocSlot::Assign {
            dst_index: ((i % 15) + 1) as u8,
            flags: 0,
        })
        .collect();
    let sections = vec![Section::Alloc {
        base_tslot_low20: 0xABCDE,
        dst_list,
        slots,
    }];
    c.bench_function("encode_full_alloc_section", |b| {
        b.iter(|| black_box(encode_sections(black_box(&sections))))
    });

    let encoded = encode_sections(&sections);
    c.bench_function("decode_full_alloc_section", |b| {
        b.iter(|| black_box(decode_sections(black_box(&encoded)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_header_roundtrip,
    bench_areq_packet,
    bench_alloc_packet
);
criterion_main!(benches);
