#[macro_use]
extern crate criterion;

use bytes::BytesMut;
use criterion::Criterion;

use mqtt_core::{Connect, Frame, LastWill, Publish, QoS, Subscribe};
use mqtt_codec::encode_frame;

fn bench_encode_connect(c: &mut Criterion) {
    let frame = Frame::Connect(Connect {
        clean_session: false,
        keep_alive: 60,
        client_id: "12345".to_owned(),
        last_will: Some(LastWill {
            qos: QoS::ExactlyOnce,
            retain: false,
            topic: "topic".to_owned(),
            message: b"message".to_vec(),
        }),
        username: None,
        password: None,
    });

    c.bench_function("encode_connect", move |b| {
        b.iter(|| {
            let mut buf = BytesMut::new();
            encode_frame(&frame, &mut buf).unwrap()
        })
    });
}

fn bench_encode_publish(c: &mut Criterion) {
    let frame = Frame::Publish(Publish {
        dup: true,
        retain: true,
        qos: QoS::ExactlyOnce,
        topic: "topic".to_owned(),
        packet_id: Some(0x4321),
        payload: b"data".to_vec(),
    });

    c.bench_function("encode_publish", move |b| {
        b.iter(|| {
            let mut buf = BytesMut::new();
            encode_frame(&frame, &mut buf).unwrap()
        })
    });
}

fn bench_encode_subscribe(c: &mut Criterion) {
    let frame = Frame::Subscribe(Subscribe {
        packet_id: 0x1234,
        subscriptions: vec![
            ("test".to_owned(), QoS::AtLeastOnce),
            ("filter".to_owned(), QoS::ExactlyOnce),
        ],
    });

    c.bench_function("encode_subscribe", move |b| {
        b.iter(|| {
            let mut buf = BytesMut::new();
            encode_frame(&frame, &mut buf).unwrap()
        })
    });
}

criterion_group!(
    encode,
    bench_encode_connect,
    bench_encode_publish,
    bench_encode_subscribe
);
criterion_main!(encode);
