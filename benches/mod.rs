use criterion::{criterion_group, criterion_main};

mod event;
mod mqtt;

criterion_group!(
    benches,
    mqtt::bench_serialize_publish,
    mqtt::bench_parse_publish,
    mqtt::bench_topic_match,
    event::bench_heap_churn,
    event::bench_dispatcher_step
);
criterion_main!(benches);
