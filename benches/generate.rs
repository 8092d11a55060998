//! Benchmarks for header parsing and artifact rendering.
//!
//! Synthetic headers of increasing size are parsed and rendered entirely in
//! memory so the numbers reflect the generator and not the filesystem.

#![allow(missing_docs, clippy::unwrap_used, clippy::cast_possible_truncation)]

use std::fmt::Write;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pknative::{Artifacts, GeneratorConfig, parse_header};

const SIZES: [usize; 3] = [50, 200, 500];

/// Builds a header with `count` exported declarations of mixed shapes.
fn synthetic_header(count: usize) -> String {
    let mut header = String::from(
        "#ifndef POCKETLANG_H\n#define POCKETLANG_H\n\n/* POCKETLANG PUBLIC API */\n\n",
    );
    for i in 0..count {
        let written = match i % 4 {
            0 => writeln!(header, "PK_PUBLIC PkConfiguration pkFn{i}(void);"),
            1 => writeln!(header, "// Sets slot {i}.\nPK_PUBLIC void pkFn{i}(PKVM* vm, int val);"),
            2 => writeln!(
                header,
                "PK_PUBLIC bool pkFn{i}(PKVM* vm, int arg,\n                    const char** value, uint32_t* length);"
            ),
            _ => writeln!(header, "PK_PUBLIC void pkFn{i}Fmt(PKVM* vm, const char* fmt, ...);"),
        };
        written.unwrap();
    }
    header.push_str("\n#endif // POCKETLANG_H\n");
    header
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_header");
    let config = GeneratorConfig::default();

    for size in &SIZES {
        let header = synthetic_header(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("declarations", size), &header, |b, header| {
            b.iter(|| parse_header(black_box(header), &config).unwrap());
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_artifacts");
    let config = GeneratorConfig::default();

    for size in &SIZES {
        let signatures = parse_header(&synthetic_header(*size), &config).unwrap();
        group.throughput(Throughput::Elements(signatures.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("signatures", size),
            &signatures,
            |b, signatures| {
                b.iter(|| Artifacts::render(&config, black_box(signatures)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let config = GeneratorConfig::default();
    let signatures = parse_header(&synthetic_header(500), &config).unwrap();

    c.bench_function("fingerprint_500", |b| {
        b.iter(|| black_box(&signatures).fingerprint());
    });
}

criterion_group!(benches, bench_parse, bench_render, bench_fingerprint);
criterion_main!(benches);
