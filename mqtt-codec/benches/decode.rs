#[macro_use]
extern crate criterion;

use criterion::Criterion;

use mqtt_codec::{decode_frame, try_read_fixed_header};

fn bench_decode_connect(c: &mut Criterion) {
    let buf: &[u8] = b"\x10\x2a\x00\x06MQIsdp\x03\x2c\x00\x3c\x00\x04test\x00\x0atest/topic\x00\x0atest death";

    c.bench_function("decode_connect", move |b| {
        b.iter(|| {
            let (header, consumed) = try_read_fixed_header(buf).unwrap().unwrap();
            decode_frame(&header, &buf[consumed..]).unwrap()
        })
    });
}

fn bench_decode_publish(c: &mut Criterion) {
    let buf: &[u8] = b"\x3d\x0D\x00\x05topic\x43\x21data";

    c.bench_function("decode_publish", move |b| {
        b.iter(|| {
            let (header, consumed) = try_read_fixed_header(buf).unwrap().unwrap();
            decode_frame(&header, &buf[consumed..]).unwrap()
        })
    });
}

criterion_group!(decode, bench_decode_connect, bench_decode_publish);
criterion_main!(decode);
