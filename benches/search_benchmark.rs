//! Criterion benchmarks for indexing and search
//!
//! These benchmarks measure:
//! - Applying add tasks through the write pipeline
//! - Keyword search with facet counting
//! - Facet-filtered search
//! - Cursor pagination

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forge_search::config::{SearchConfig, StorageConfig};
use forge_search::indexer::IndexPipeline;
use forge_search::models::{ObjectType, TaskAction};
use forge_search::queue::{QueueTask, TaskBody};
use forge_search::search::{QueryBuilder, SearchExecutor, StorageManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

const WORDS: &[&str] = &[
    "login", "crash", "timeout", "render", "cache", "deploy", "upgrade", "docs", "memory",
    "leak",
];
const LABELS: &[&str] = &["bug", "feature", "docs", "ui", "perf"];

fn issues(range: std::ops::Range<i64>) -> Vec<Value> {
    range
        .map(|id| {
            let w = |n: i64| WORDS[(id * n) as usize % WORDS.len()];
            json!({
                "id": id,
                "repository": {"id": 1, "name": "acme/api"},
                "number": id,
                "title": format!("{} {} {}", w(1), w(3), w(7)),
                "description": format!("{} when {} after {}", w(2), w(5), w(11)),
                "tags": [LABELS[id as usize % LABELS.len()]],
                "state": if id % 3 == 0 { "closed" } else { "open" },
                "created_at": 1_700_000_000_000i64 + id
            })
        })
        .collect()
}

fn storage(dir: &TempDir) -> Arc<StorageManager> {
    Arc::new(
        StorageManager::new(&StorageConfig {
            path: dir.path().to_path_buf(),
            writer_heap_size: 50_000_000,
            search_threads: 4,
        })
        .unwrap(),
    )
}

fn add_task(objects: Vec<Value>) -> QueueTask {
    QueueTask::new(ObjectType::Issue, TaskAction::Add, &TaskBody { objects }).unwrap()
}

/// Benchmark applying add tasks of different sizes
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_apply");

    for size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let pipeline = IndexPipeline::new(storage(&dir));
            let mut next = 0i64;
            b.iter(|| {
                let task = add_task(issues(next..next + size as i64));
                next += size as i64;
                black_box(pipeline.apply(&task).unwrap());
            });
        });
    }

    group.finish();
}

fn seeded_executor(dir: &TempDir, documents: i64) -> SearchExecutor {
    let storage = storage(dir);
    let pipeline = IndexPipeline::new(storage.clone());
    for start in (0..documents).step_by(500) {
        pipeline
            .apply(&add_task(issues(start..(start + 500).min(documents))))
            .unwrap();
    }

    // Disable the result cache so every iteration executes the query
    let config = SearchConfig {
        cache_max_entries: 0,
        ..Default::default()
    };
    SearchExecutor::new(storage, &config)
}

/// Benchmark keyword, filtered and cursor searches
fn bench_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let executor = seeded_executor(&dir, 5_000);
    let mut group = c.benchmark_group("search");

    group.bench_function("keyword", |b| {
        let request = QueryBuilder::new(ObjectType::Issue)
            .with_search_key("login crash")
            .build();
        b.iter(|| black_box(executor.search_blocking(&request).unwrap()));
    });

    group.bench_function("keyword_with_facets", |b| {
        let request = QueryBuilder::new(ObjectType::Issue)
            .with_search_key("timeout")
            .with_facet("label", "bug")
            .with_facet("label", "perf")
            .with_facet("state", "open")
            .build();
        b.iter(|| black_box(executor.search_blocking(&request).unwrap()));
    });

    group.bench_function("sorted_match_all", |b| {
        let request = QueryBuilder::new(ObjectType::Issue)
            .with_sort("created")
            .with_page(5)
            .build();
        b.iter(|| black_box(executor.search_blocking(&request).unwrap()));
    });

    group.bench_function("search_after", |b| {
        let request = QueryBuilder::new(ObjectType::Issue)
            .with_search_key("memory")
            .with_page_size(50)
            .build();
        let cursor = executor
            .search_after_blocking(&request, None)
            .unwrap()
            .cursor;
        b.iter(|| {
            black_box(
                executor
                    .search_after_blocking(&request, cursor.as_deref())
                    .unwrap(),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, bench_apply, bench_search);
criterion_main!(benches);
