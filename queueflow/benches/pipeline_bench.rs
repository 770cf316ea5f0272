//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use queueflow::prelude::*;
use std::sync::Arc;

fn passthrough(count: usize) -> Pipeline<u64> {
    (0..count)
        .map(|_| {
            Handler::from_fn(|_: Arc<u64>, next: Next| async move {
                next.proceed();
                Ok(())
            })
        })
        .collect()
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let pipeline = passthrough(10);

    c.bench_function("execute_10_handlers", |b| {
        b.iter(|| runtime.block_on(pipeline.execute(black_box(7_u64), None)))
    });

    c.bench_function("execute_10_handlers_with_timeout", |b| {
        b.iter(|| runtime.block_on(pipeline.execute(black_box(7_u64), Some(1_000))))
    });

    let recovering: Pipeline<u64> = Pipeline::with_handlers([
        Handler::from_fn(|_: Arc<u64>, next: Next| async move {
            next.fail("boom");
            Ok(())
        }),
        Handler::from_error_fn(|_err, _: Arc<u64>, next: Next| async move {
            next.proceed();
            Ok(())
        }),
    ]);

    c.bench_function("execute_with_recovery", |b| {
        b.iter(|| runtime.block_on(recovering.execute(black_box(7_u64), None)))
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
