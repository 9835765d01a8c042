//! Benchmarks for the receive buffer pool.
//!
//! Measures the acquire/release cycle against plain per-datagram allocation.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box};

use viaduct::pool::{BufferPool, DNS_BUFFER_SIZE};

fn bench_pool(c: &mut Criterion) {
    let pool = Arc::new(BufferPool::with_defaults());

    // Warm the pool so acquire hits the recycled path.
    drop(pool.acquire());

    let mut group = c.benchmark_group("pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("acquire_release", "recycled"), |b| {
        b.iter(|| {
            let buf = pool.acquire();
            black_box(buf.len());
        })
    });

    group.bench_function(BenchmarkId::new("acquire_release", "fresh_alloc"), |b| {
        b.iter(|| {
            let buf = black_box(vec![0u8; DNS_BUFFER_SIZE]);
            black_box(buf.len());
        })
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_pool(&mut criterion);
    criterion.final_summary();
}
