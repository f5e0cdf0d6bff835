//! Benchmarks for exact top-k matching over the flat catalog.
//!
//! The default corpus is 10,000 resumes at the configured 384 dimensions. Set
//! `BENCH_FULL_SCALE=1` to run against 100,000.
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p resmatch-vector
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use resmatch_core::types::DocumentRecord;
use resmatch_vector::catalog::Catalog;
use resmatch_vector::embedding::{EmbeddingService, HashingEmbedding};

const DIMENSIONS: usize = 384;
const CI_RESUME_COUNT: usize = 10_000;
const FULL_SCALE_RESUME_COUNT: usize = 100_000;

const SKILLS: &[&str] = &[
    "rust", "python", "kubernetes", "postgresql", "react", "terraform", "spark", "kafka",
    "golang", "typescript", "pytorch", "airflow", "figma", "salesforce", "excel", "tableau",
];

fn resume_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_RESUME_COUNT
    } else {
        CI_RESUME_COUNT
    }
}

/// Synthetic resume text mixing four skills picked from the index.
fn generate_resume_text(index: usize) -> String {
    let pick = |k: usize| SKILLS[(index / SKILLS.len().pow(k as u32)) % SKILLS.len()];
    format!(
        "Engineer with hands-on {} and {} delivery, plus {} and {} in production. Resume {}",
        pick(0),
        pick(1),
        pick(2),
        pick(3),
        index
    )
}

fn build_catalog(count: usize) -> (Catalog, HashingEmbedding, tokio::runtime::Runtime) {
    let embedder = HashingEmbedding::new(DIMENSIONS).expect("embedder");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    let mut vectors = Vec::with_capacity(count);
    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let text = generate_resume_text(i);
        vectors.push(rt.block_on(embedder.embed(&text)).expect("embed failed"));
        records.push(DocumentRecord::new(format!("resume_{}.pdf", i), text, "Engineer"));
    }

    let catalog = Catalog::in_memory(DIMENSIONS).expect("catalog");
    catalog.ingest(vectors, records).expect("ingest failed");
    assert_eq!(catalog.size(), count, "Catalog should contain every resume");
    (catalog, embedder, rt)
}

fn bench_catalog_query(c: &mut Criterion) {
    let count = resume_count();
    let (catalog, embedder, rt) = build_catalog(count);
    let query = rt
        .block_on(embedder.embed("Backend engineer: rust, kafka, kubernetes"))
        .expect("query embed failed");

    let mut group = c.benchmark_group("catalog_query");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(10));

    for top_k in [1usize, 5, 50] {
        group.bench_with_input(
            BenchmarkId::new(format!("{}resumes", count), top_k),
            &top_k,
            |b, &top_k| {
                b.iter(|| {
                    let results = catalog.query(&query, top_k).expect("query failed");
                    assert_eq!(results.len(), top_k);
                    results
                });
            },
        );
    }

    group.finish();
}

fn bench_ingest_batch(c: &mut Criterion) {
    let embedder = HashingEmbedding::new(DIMENSIONS).expect("embedder");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");
    let batch: Vec<(Vec<f32>, DocumentRecord)> = (0..100)
        .map(|i| {
            let text = generate_resume_text(i);
            let v = rt.block_on(embedder.embed(&text)).expect("embed failed");
            (v, DocumentRecord::new(format!("upload_{}.pdf", i), text, "Uploaded"))
        })
        .collect();

    let mut group = c.benchmark_group("catalog_ingest");
    group.bench_function("in_memory_batch_100", |b| {
        b.iter_batched(
            || {
                let catalog = Catalog::in_memory(DIMENSIONS).expect("catalog");
                let (vectors, records): (Vec<_>, Vec<_>) = batch.iter().cloned().unzip();
                (catalog, vectors, records)
            },
            |(catalog, vectors, records)| catalog.ingest(vectors, records).expect("ingest failed"),
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_catalog_query, bench_ingest_batch);
criterion_main!(benches);
