use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qpsearch::fuzzy::{string_score, DEFAULT_FUZZINESS};
use qpsearch::{Record, SearchEngine};

const NAMES: &[&str] = &[
    "Data Structures", "Algorithms", "Operating Systems", "Computer Networks", "Compilers",
    "Probability and Statistics", "Linear Algebra", "Signals and Systems", "Thermodynamics",
    "Fluid Mechanics", "Digital Logic Design", "Database Management Systems",
];

fn bench_string_score(c: &mut Criterion) {
    c.bench_function("string_score", |b| {
        b.iter(|| string_score(black_box("cs21003 algorithms i"), black_box("algo"), DEFAULT_FUZZINESS))
    });
}

fn bench_search(c: &mut Criterion) {
    let engine = SearchEngine::default();
    for id in 0..5_000u64 {
        let name = NAMES[id as usize % NAMES.len()];
        let mut r = Record::new(id, format!("CS{:05}", id), name);
        r.approved = true;
        engine.upsert(r);
    }
    c.bench_function("search_5k", |b| b.iter(|| engine.search(black_box("data struct")).unwrap()));
}

criterion_group!(benches, bench_string_score, bench_search);
criterion_main!(benches);
