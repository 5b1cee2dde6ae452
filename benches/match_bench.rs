//! Benchmarks for filename parsing, matching and existence checks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::hint::black_box;
use tempfile::TempDir;
use wheelhouse_lib::{already_satisfied, is_match, ArtifactInfo, Requirement, Target, TargetSet};

const FILENAMES: &[&str] = &[
    "numpy-1.26.4-cp311-cp311-win_amd64.whl",
    "charset_normalizer-3.3.2-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
    "requests-2.31.0-py3-none-any.whl",
    "six-1.16.0-py2.py3-none-any.whl",
    "python-dateutil-2.8.2.tar.gz",
    "README.md",
];

/// Create a destination directory holding `n` wheels.
fn create_dest(n: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..n {
        let name = format!("pkg{}-1.{}.0-cp311-cp311-win_amd64.whl", i, i % 10);
        fs::write(dir.path().join(name), b"").unwrap();
    }
    dir
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_filenames", |b| {
        b.iter(|| {
            for f in FILENAMES {
                black_box(ArtifactInfo::from_filename(black_box(f)));
            }
        })
    });

    let targets = TargetSet::from_selection(
        &["Windows".to_string(), "Linux".to_string()],
        &["3.11".to_string(), "3.12".to_string()],
    );
    let infos: Vec<ArtifactInfo> = FILENAMES.iter().map(|f| ArtifactInfo::from_filename(f)).collect();
    c.bench_function("is_match", |b| {
        b.iter(|| {
            for info in &infos {
                black_box(is_match(&targets, info));
            }
        })
    });
}

fn bench_satisfied(c: &mut Criterion) {
    let mut group = c.benchmark_group("already_satisfied");
    let target = Target::new("win_amd64", "3.11");

    for size in [10, 100, 1000] {
        let dest = create_dest(size);
        // Last package: worst case scan.
        let req = Requirement::parse(&format!("pkg{}>=1.0.0", size - 1)).unwrap();
        group.bench_with_input(BenchmarkId::new("dest_files", size), &size, |b, _| {
            b.iter(|| black_box(already_satisfied(dest.path(), &req, &target)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_satisfied);
criterion_main!(benches);
