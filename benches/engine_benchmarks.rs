//! Criterion benchmarks for the filter engine's hot paths.
//!
//! Run with: `cargo bench`
//!
//! Everything runs on synthetic data, so no ripgrep binary or real
//! workspace is needed and numbers compare across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use treefilter::fuzzy::{FuzzyMatcher, LabelMatcher};
use treefilter::search::cache::{CacheKey, ResultCache};
use treefilter::search::coordinator::merge_root_results;
use treefilter::search::{ContentMatch, RootSearchOutcome, SearchResult};
use treefilter::tree::content_tree_entries;

// ─── Helpers ─────────────────────────────────────────────────────────

/// One outcome per root, each with `files` files of `per_file` hits spread
/// over a few nested directories.
fn synthetic_outcomes(roots: &[PathBuf], files: usize, per_file: usize) -> Vec<RootSearchOutcome> {
    roots
        .iter()
        .map(|root| {
            let mut outcome = RootSearchOutcome::default();
            for f in 0..files {
                let path = root
                    .join(format!("mod_{}", f % 16))
                    .join(format!("sub_{}", f % 5))
                    .join(format!("file_{}.rs", f));
                let matches = (0..per_file)
                    .map(|m| ContentMatch {
                        path: path.clone(),
                        line: m * 3 + 1,
                        column: 5,
                        preview: format!("let needle_{} = compute({});", m, f),
                    })
                    .collect();
                outcome.matches_by_file.insert(path, matches);
            }
            outcome
        })
        .collect()
}

fn synthetic_labels(n: usize) -> Vec<String> {
    let dirs = ["src", "src/search", "src/tree", "tests", "docs", "benches"];
    (0..n)
        .map(|i| format!("{}/component_{}_{}.rs", dirs[i % dirs.len()], i % 97, i))
        .collect()
}

fn cache_key(i: usize) -> CacheKey {
    CacheKey {
        roots_signature: vec![PathBuf::from("/w/repo")],
        query: format!("query_{}", i),
        show_hidden: false,
        skip_gitignored: true,
        max_matches: 20_000,
        max_files: 2_000,
    }
}

// ─── Benchmarks ──────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_root_results");
    for &roots_n in &[1usize, 4] {
        let roots: Vec<PathBuf> = (0..roots_n).map(|i| PathBuf::from(format!("/w/root_{}", i))).collect();
        let outcomes = synthetic_outcomes(&roots, 500, 8);
        group.bench_with_input(BenchmarkId::from_parameter(roots_n), &outcomes, |b, outcomes| {
            b.iter(|| merge_root_results(black_box(&roots), black_box(outcomes), 20_000, 2_000, false))
        });
    }
    group.finish();
}

fn bench_content_tree(c: &mut Criterion) {
    let root = PathBuf::from("/w/root_0");
    let outcomes = synthetic_outcomes(std::slice::from_ref(&root), 1_000, 4);
    let result: SearchResult = merge_root_results(std::slice::from_ref(&root), &outcomes, 20_000, 2_000, false);
    let collapsed = HashSet::new();
    c.bench_function("content_tree_entries_1000_files", |b| {
        b.iter(|| content_tree_entries(black_box(&root), black_box(&result), &collapsed, 0))
    });
}

fn bench_cache(c: &mut Criterion) {
    let result = Arc::new(SearchResult::default());
    c.bench_function("result_cache_put_get_64", |b| {
        b.iter(|| {
            let mut cache = ResultCache::new(64);
            for i in 0..128 {
                cache.put(cache_key(i), Arc::clone(&result));
                black_box(cache.get(&cache_key(i / 2)));
            }
        })
    });
}

fn bench_fuzzy(c: &mut Criterion) {
    let labels = synthetic_labels(20_000);
    let matcher = LabelMatcher::new();
    let mut group = c.benchmark_group("fuzzy_match_labels");
    for query in ["component_42", "srchcmp", "tests/component_9"] {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, query| {
            b.iter(|| matcher.match_labels(black_box(query), &labels, 500))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge, bench_content_tree, bench_cache, bench_fuzzy);
criterion_main!(benches);
