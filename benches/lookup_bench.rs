use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rvamap::{pack_blocks, write_index_files, RvaLookup, RvaRecord};
use std::io::Cursor;

fn bench_find_floor(c: &mut Criterion) {
    let records: Vec<RvaRecord> = (0..100_000u64)
        .map(|i| RvaRecord { rva: 0x40_0000 + i * 0x30, dump_offset: (i * 64) as u32 })
        .collect();
    let blocks = pack_blocks(&records, 1024);
    let mut idx1 = Vec::new();
    let mut idx2 = Vec::new();
    write_index_files(&mut idx1, &mut idx2, &blocks, records.len() as u32).unwrap();
    let mut lookup = RvaLookup::load(&idx1[..], Cursor::new(idx2)).unwrap();

    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    c.bench_function("find_floor_100k", |b| {
        b.iter(|| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let rva = 0x40_0000 + state % (100_000 * 0x30);
            lookup.find_floor(black_box(rva)).unwrap()
        })
    });
}

criterion_group!(benches, bench_find_floor);
criterion_main!(benches);
