use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use taskpool::{Task, WorkerPool};

const TASK_COUNT: usize = 1000;

fn spin_work() {
    for _ in 0..1000 {
        std::hint::spin_loop();
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("bench_dispatch");
    group.bench_function("sequential", |b| {
        b.iter(|| {
            for _ in 0..TASK_COUNT {
                spin_work();
            }
        })
    });
    for workers in [1, 2, 4] {
        group.bench_function(format!("taskpool_{workers}"), |b| {
            b.iter_batched(
                || WorkerPool::new(workers).unwrap(),
                // the creating thread drains alongside the workers, as the
                // pool is meant to be used
                |pool| {
                    let remaining = Arc::new(AtomicUsize::new(TASK_COUNT));
                    pool.submit_many((0..TASK_COUNT).map(|_| {
                        let remaining = Arc::clone(&remaining);
                        Box::new(move || {
                            spin_work();
                            remaining.fetch_sub(1, Ordering::Release);
                        }) as Task
                    }));
                    while remaining.load(Ordering::Acquire) > 0 {
                        if let Some(task) = pool.try_take() {
                            task();
                        }
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.bench_function("rayon_4", |b| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        b.iter(|| {
            pool.scope(|s| {
                for _ in 0..TASK_COUNT {
                    s.spawn(|_| spin_work());
                }
            })
        })
    });

    group.finish();
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("bench_submit");
    group.bench_function("submit_one", |b| {
        b.iter_batched(
            || WorkerPool::new(0).unwrap(),
            |pool| {
                for _ in 0..TASK_COUNT {
                    pool.submit_one(|| {});
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("submit_many", |b| {
        b.iter_batched(
            || WorkerPool::new(0).unwrap(),
            |pool| {
                pool.submit_many((0..TASK_COUNT).map(|_| Box::new(|| {}) as Task));
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(20));
    targets = bench_dispatch, bench_submit
);
criterion_main!(benches);
