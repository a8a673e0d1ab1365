//! Descriptor-parse throughput benchmark.
//!
//! Parsing happens once per module load, so absolute numbers matter less
//! than catching regressions in the line reader and the kind-merge path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use clspv_runner::abi::AbiMap;

/// Build a synthetic descriptor with `kernels` entry points of `args`
/// arguments each, every fourth one a packed POD member.
fn synthetic_descriptor(kernels: usize, args: usize) -> String {
    let mut text = String::from("sampler,19,descriptorSet,0,binding,0\n");
    for k in 0..kernels {
        for a in 0..args {
            let (kind, offset) = match a % 4 {
                0 => ("buffer", 0),
                1 => ("pod_ubo", 0),
                2 => ("pod", 0),
                _ => ("pod", 4),
            };
            // A packed member shares the binding of the cluster head before it.
            let binding = if offset == 0 { a } else { a - 1 };
            text.push_str(&format!(
                "kernel,entry_{k},argOrdinal,{a},argKind,{kind},descriptorSet,1,binding,{binding},offset,{offset}\n",
            ));
        }
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let small = synthetic_descriptor(1, 4);
    let large = synthetic_descriptor(32, 16);

    c.bench_function("parse_single_kernel", |b| {
        b.iter(|| AbiMap::parse(black_box(&small)).unwrap())
    });
    c.bench_function("parse_32_kernels_16_args", |b| {
        b.iter(|| AbiMap::parse(black_box(&large)).unwrap())
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let map = AbiMap::parse(&synthetic_descriptor(8, 8)).unwrap();
    c.bench_function("serialize_8_kernels", |b| b.iter(|| black_box(&map).to_text()));
}

criterion_group!(benches, bench_parse, bench_round_trip);
criterion_main!(benches);
