use criterion::{BatchSize, Criterion};
use libiotc::event::{Dispatcher, TimeEventHandle, TimeEventHeap};
use std::hint::black_box;

pub fn bench_heap_churn(c: &mut Criterion) {
    c.bench_function("heap_add_restart_cancel_1k", |b| {
        b.iter(|| {
            let mut heap = TimeEventHeap::new();
            let mut handles: Vec<TimeEventHandle> =
                (0..1000u64).map(|i| heap.add((i * 7919) % 1000, i).unwrap()).collect();
            for (i, handle) in handles.iter().enumerate().step_by(3) {
                heap.restart(handle, (i as u64 * 31) % 1000).unwrap();
            }
            for handle in handles.iter_mut().step_by(2) {
                heap.cancel(handle).unwrap();
            }
            while let Some(entry) = heap.pop() {
                black_box(entry);
            }
        })
    });
}

pub fn bench_dispatcher_step(c: &mut Criterion) {
    c.bench_function("dispatcher_step_1k_due", |b| {
        b.iter_batched(
            || {
                let mut dispatcher = Dispatcher::new();
                for i in 0..1000u64 {
                    dispatcher.execute_in(i % 60, i).unwrap();
                }
                dispatcher
            },
            |mut dispatcher| {
                dispatcher.step(60).unwrap();
                while let Some(event) = dispatcher.next_ready() {
                    black_box(event);
                }
            },
            BatchSize::SmallInput,
        )
    });
}
