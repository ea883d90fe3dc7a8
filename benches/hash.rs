use criterion::{criterion_group, criterion_main, Criterion};
use posting_index::{hash::hash64, normalize};
use std::hint::black_box;

fn hash_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash64");

    for len in [4, 14, 64, 1_024] {
        let key = "a".repeat(len);

        group.bench_function(format!("{len} bytes"), |b| {
            b.iter(|| hash64(black_box(key.as_bytes()), 0));
        });
    }
}

fn normalize_key(c: &mut Criterion) {
    let keys = [
        "Dune",
        "Hello, World",
        "Gabriel García Márquez",
        "The Hitchhiker's Guide to the Galaxy",
    ];

    c.bench_function("normalize", |b| {
        b.iter(|| {
            for key in keys {
                black_box(normalize(black_box(key)));
            }
        });
    });
}

criterion_group!(benches, hash_key, normalize_key);
criterion_main!(benches);
