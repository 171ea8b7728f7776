use criterion::{criterion_group, criterion_main, Criterion};
use listcurrent::adt::Set;
use listcurrent::structures::{CoarseSet, FineSet, LazySet, LockFreeSet, OptimisticSet};
use listcurrent::testing::{Harness, HarnessConfig, OpGenerator, SetOperator};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

const OPS_PER_ITER: usize = 20_000;

/// Baseline: the standard library's tree behind one lock.
struct LockedBTreeSet(Mutex<BTreeSet<i64>>);

impl LockedBTreeSet {
    fn new() -> Self {
        LockedBTreeSet(Mutex::new(BTreeSet::new()))
    }
}

impl Set<i64> for LockedBTreeSet {
    fn add(&self, value: i64) -> bool {
        self.0.lock().unwrap().insert(value)
    }

    fn remove(&self, value: &i64) -> bool {
        self.0.lock().unwrap().remove(value)
    }

    fn contains(&self, value: &i64) -> bool {
        self.0.lock().unwrap().contains(value)
    }
}

/// `contains` percent of lookups, the rest split between adds and removes.
fn weights(contains: u32) -> [(SetOperator, u32); 3] {
    let writes = 100 - contains;
    [
        (SetOperator::Add, writes / 2),
        (SetOperator::Remove, writes - writes / 2),
        (SetOperator::Contains, contains),
    ]
}

fn run<S, F>(harness: &Harness, build: F, contains: u32, range: i64, iters: u64) -> Duration
where
    S: Set<i64>,
    F: Fn() -> S,
{
    let mut total = Duration::ZERO;
    for iteration in 0..iters {
        let set = build();
        let generator =
            OpGenerator::new(&weights(contains), OPS_PER_ITER, range, iteration).unwrap();
        total += harness.throughput(&set, &generator).unwrap();
    }
    total
}

fn bench_sets(c: &mut Criterion) {
    for &threads in &[1, 4] {
        for &contains in &[10, 50, 90] {
            for &range in &[8, 1024] {
                let harness = Harness::new(HarnessConfig::default().with_threads(threads));
                let mut group = c.benchmark_group(format!(
                    "set/threads-{}/contains-{}/range-{}",
                    threads, contains, range
                ));
                group.sample_size(10);

                group.bench_function("mutex_btree", |b| {
                    b.iter_custom(|iters| run(&harness, LockedBTreeSet::new, contains, range, iters))
                });
                group.bench_function("coarse", |b| {
                    b.iter_custom(|iters| run(&harness, CoarseSet::<i64>::new, contains, range, iters))
                });
                group.bench_function("fine", |b| {
                    b.iter_custom(|iters| run(&harness, FineSet::<i64>::new, contains, range, iters))
                });
                group.bench_function("optimistic", |b| {
                    b.iter_custom(|iters| {
                        run(&harness, OptimisticSet::<i64>::new, contains, range, iters)
                    })
                });
                group.bench_function("lazy", |b| {
                    b.iter_custom(|iters| run(&harness, LazySet::<i64>::new, contains, range, iters))
                });
                group.bench_function("lock_free", |b| {
                    b.iter_custom(|iters| {
                        run(&harness, LockFreeSet::<i64>::new, contains, range, iters)
                    })
                });

                group.finish();
            }
        }
    }
}

criterion_group!(benches, bench_sets);
criterion_main!(benches);
