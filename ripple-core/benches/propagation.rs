//! Propagation benchmarks: fan-out, chains, and batched writes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::{Record, Runtime};

fn fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for readers in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(readers), &readers, |b, &n| {
            let rt = Runtime::new();
            let s = rt.signal(Record::from([("v".to_string(), 0u64)]));
            let results: Vec<_> = (0..n)
                .map(|_| {
                    let reader = s.clone();
                    rt.effect(move |_| Ok(reader.get("v").unwrap_or(0) + 1))
                        .expect("effect")
                })
                .collect();

            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                s.insert("v", black_box(next)).expect("write");
            });
            black_box(results);
        });
    }
    group.finish();
}

fn chain(c: &mut Criterion) {
    c.bench_function("chain_of_32", |b| {
        let rt = Runtime::new();
        let s = rt.signal(Record::from([("v".to_string(), 0u64)]));

        let reader = s.clone();
        let mut tail = rt
            .effect(move |_| Ok(reader.get("v").unwrap_or(0)))
            .expect("effect");
        let mut links = vec![tail.clone()];
        for _ in 0..31 {
            let upstream = tail.clone();
            tail = rt
                .effect(move |_| Ok(upstream.value().unwrap_or(0) + 1))
                .expect("effect");
            links.push(tail.clone());
        }

        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            s.insert("v", black_box(next)).expect("write");
        });
        black_box(links);
    });
}

fn batched_writes(c: &mut Criterion) {
    c.bench_function("batch_of_100_writes", |b| {
        let rt = Runtime::new();
        let s = rt.signal(vec![0u64; 100]);

        let reader = s.clone();
        let sum = rt
            .effect(move |_| Ok(reader.iter_with(|items| items.iter().sum::<u64>())))
            .expect("effect");

        let mut round = 0u64;
        b.iter(|| {
            round += 1;
            rt.batch(|| {
                for i in 0..100 {
                    s.set(i, round)?;
                }
                Ok(())
            })
            .expect("batch");
        });
        black_box(sum);
    });
}

criterion_group!(benches, fan_out, chain, batched_writes);
criterion_main!(benches);
