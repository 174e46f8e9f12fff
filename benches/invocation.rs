use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

use placerun::inputs::{self, BENCHMARK_INPUTS};
use placerun::{Case, CommandBuilder, ExecutionMode, HarnessConfig, RunStamp};

/// A benchmark root with `count` complete cases
fn case_tree(count: usize) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for i in 0..count {
        let path = dir.path().join(format!("case_{:03}", i));
        fs::create_dir_all(&path).expect("case dir");
        for file in ["tech.lef", "cells_modified.lef", "placed.def", "placement.constraints"] {
            fs::write(path.join(file), "").expect("input file");
        }
    }
    dir
}

fn invocation_benchmarks(c: &mut Criterion) {
    let tree = case_tree(32);
    let config = HarnessConfig {
        binary: PathBuf::from("./OpenDP"),
        bench_root: tree.path().to_path_buf(),
        output_dir: PathBuf::from("../output"),
        log_dir: PathBuf::from("../logdir"),
        threads: 1,
        mode: ExecutionMode::Direct,
        dry_run: true,
        stamp: RunStamp::now(),
    };
    let cases: Vec<Case> = (0..32)
        .map(|i| Case::new(tree.path(), &format!("case_{:03}", i)))
        .collect();

    c.bench_function("collect_fragments", |b| {
        b.iter(|| inputs::collect_fragments(&cases[0], &BENCHMARK_INPUTS).expect("fragments"))
    });

    let builder = CommandBuilder::new(&config, &BENCHMARK_INPUTS);
    c.bench_function("build_batch_32", |b| {
        b.iter(|| {
            cases
                .iter()
                .map(|case| builder.build(case).expect("invocation").command_line())
                .collect::<Vec<_>>()
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_millis(100));
    targets = invocation_benchmarks
}

criterion_main!(benches);
