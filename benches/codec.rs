use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qwkpack::export::{encode, EncodeInput};
use qwkpack::format::msbin;
use qwkpack::model::Destination;
use qwkpack::text::{self, ColorMode, TextOptions};

/// A few kilobytes of board text with colour and routing codes.
fn sample_body() -> Vec<u8> {
    let mut body = b"\x040PID: BENCH 1.0\r".to_vec();
    for i in 0..200 {
        body.extend_from_slice(format!("\x03{}Line {i} of the message body\r", i % 10).as_bytes());
    }
    body
}

fn bench_msbin(c: &mut Criterion) {
    c.bench_function("msbin_encode_positions", |b| {
        b.iter(|| {
            for pos in (2..20_000u32).step_by(7) {
                black_box(msbin::encode_position(pos).unwrap());
            }
        })
    });
}

fn bench_to_wire(c: &mut Criterion) {
    let body = sample_body();
    let stamp = text::address_stamp("JANE DOE", Some("NIGHTOWL"));

    for (name, color) in [
        ("to_wire_keep", ColorMode::Keep),
        ("to_wire_strip", ColorMode::Strip),
        ("to_wire_ansi", ColorMode::Ansi),
    ] {
        let opts = TextOptions {
            color,
            ..TextOptions::default()
        };
        c.bench_function(name, |b| {
            b.iter(|| text::to_wire(black_box(&body), &stamp, &opts))
        });
    }
}

fn bench_encode(c: &mut Criterion) {
    let body = sample_body();
    let stamp = text::address_stamp("JANE DOE", None);
    let input = EncodeInput {
        body: &body,
        from: "Jane Doe",
        to: "All",
        title: "Benchmark",
        posted: NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        status: b' ',
        destination: Destination::Area(1),
        msgnum: 1,
        logical_num: 1,
        stamp: &stamp,
    };
    let opts = TextOptions::default();

    c.bench_function("encode_message", |b| {
        b.iter(|| encode(black_box(&input), &opts).unwrap())
    });
}

criterion_group!(benches, bench_msbin, bench_to_wire, bench_encode);
criterion_main!(benches);
