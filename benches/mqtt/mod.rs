use criterion::{Criterion, Throughput};
use libiotc::memory::ByteBuffer;
use libiotc::mqtt::parser::Parser;
use libiotc::mqtt::serializer::serialize;
use libiotc::mqtt::{Packet, QoS, match_topics};
use std::hint::black_box;

fn publish(payload: &'static [u8]) -> Packet<'static> {
    Packet::Publish {
        topic: ByteBuffer::share_str("/devices/bench/events"),
        payload: ByteBuffer::share(payload),
        qos: QoS::AtLeastOnce,
        retain: false,
        dup: false,
        message_id: 17,
    }
}

static PAYLOAD: [u8; 1024] = [0x5A; 1024];

pub fn bench_serialize_publish(c: &mut Criterion) {
    let packet = publish(&PAYLOAD);
    let mut group = c.benchmark_group("mqtt_serialize");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    group.bench_function("publish_1k", |b| {
        b.iter(|| serialize(black_box(&packet)).unwrap())
    });
    group.finish();
}

pub fn bench_parse_publish(c: &mut Criterion) {
    let frame = serialize(&publish(&PAYLOAD)).unwrap();
    let mut group = c.benchmark_group("mqtt_parse");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("publish_1k", |b| {
        b.iter(|| {
            let mut parser = Parser::new(64 * 1024);
            let mut input = ByteBuffer::share(frame.as_slice());
            parser.parse(black_box(&mut input)).unwrap()
        })
    });
    group.bench_function("publish_1k_bytewise", |b| {
        b.iter(|| {
            let mut parser = Parser::new(64 * 1024);
            let mut packet = None;
            for byte in frame.as_slice().chunks(1) {
                let mut input = ByteBuffer::share(byte);
                if let Some(parsed) = parser.parse(&mut input).unwrap() {
                    packet = Some(parsed);
                }
            }
            packet
        })
    });
    group.finish();
}

pub fn bench_topic_match(c: &mut Criterion) {
    c.bench_function("match_topics_wildcard", |b| {
        b.iter(|| {
            match_topics(
                black_box(Some("projects/p/devices/d/commands/#")),
                black_box(Some("projects/p/devices/d/commands/reboot/now")),
            )
        })
    });
}
