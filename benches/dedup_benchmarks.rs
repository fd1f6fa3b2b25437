use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use linedupe::engine::{
    normalize, process_lines, similarity, split_lines, ComparisonMode, EngineConfig,
};
use linedupe::processor::{process_file, ProcessorConfig};
use std::fs;
use tempfile::TempDir;

// Log-like input with roughly one duplicate in three lines
fn sample_text(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            format!(
                "2024-05-01 worker-{} INFO request {} finished in {}ms\n",
                i % 8,
                i % (lines * 2 / 3).max(1),
                i % 97
            )
        })
        .collect()
}

// 1. Normalization Benchmarks
fn bench_normalize(c: &mut Criterion) {
    let line = "  The Quick Brown Fox, jumps over the LAZY dog 42 times!  ";
    let mut group = c.benchmark_group("normalize");
    for mode in ComparisonMode::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, &mode| {
            b.iter(|| black_box(normalize(black_box(line), mode)))
        });
    }
    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    c.bench_function("similarity_short_lines", |b| {
        b.iter(|| {
            black_box(similarity(
                black_box("connection reset by peer on port 8080"),
                black_box("connection refused by peer on port 8081"),
            ))
        })
    });
}

// 2. Engine Benchmarks
fn bench_engine_modes(c: &mut Criterion) {
    let text = sample_text(10_000);
    let lines = split_lines(&text);
    let mut group = c.benchmark_group("engine_10k_lines");
    group.sample_size(20);

    for mode in [
        ComparisonMode::CaseSensitive,
        ComparisonMode::CaseInsensitive,
        ComparisonMode::ContentHash,
    ] {
        let config = EngineConfig::default().with_mode(mode);
        group.bench_with_input(BenchmarkId::from_parameter(mode), &config, |b, config| {
            b.iter(|| black_box(process_lines(lines.clone(), config)))
        });
    }
    group.finish();
}

fn bench_fuzzy_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuzzy");
    group.sample_size(10);

    // 500 entries stay exhaustive, 5000 reach the sampled tier
    for size in [500usize, 5_000] {
        let text = sample_text(size);
        let lines = split_lines(&text);
        let config = EngineConfig::default()
            .with_mode(ComparisonMode::Fuzzy)
            .with_threshold(0.9)
            .with_seed(7);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| black_box(process_lines(lines.clone(), &config)))
        });
    }
    group.finish();
}

// 3. File Processing Benchmarks
fn bench_process_file(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.log");
    fs::write(&path, sample_text(50_000)).unwrap();
    let config = ProcessorConfig::default().with_dry_run(true);

    let mut group = c.benchmark_group("process_file");
    group.sample_size(10);
    group.bench_function("dry_run_50k_lines", |b| {
        b.iter(|| black_box(process_file(&path, &config).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_normalize,
    bench_similarity,
    bench_engine_modes,
    bench_fuzzy_tiers,
    bench_process_file
);
criterion_main!(benches);
