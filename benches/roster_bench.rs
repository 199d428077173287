use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use roster::{load_records, select, slot_counts, QueryParameters, SortKey};

macro_rules! test_file {
    ($file_name:expr) => {
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/resources/test/",
            $file_name
        ))
    };
}

/// The test roster repeated until it holds a few hundred rows.
fn large_roster() -> String {
    let text = test_file!("roster.csv");
    let (header, body) = text.split_once('\n').unwrap_or((text, ""));
    let mut out = format!("{header}\n");
    for _ in 0..100 {
        out.push_str(body);
    }
    out
}

fn criterion_benchmark(c: &mut Criterion) {
    let text = large_roster();
    c.bench_function("load roster", |b| b.iter(|| load_records(black_box(&text))));

    let records = load_records(&text);
    let params = QueryParameters::new("iiitk", "slot", "", Some(SortKey::Slot));
    c.bench_function("select sorted by slot", |b| {
        b.iter(|| select(black_box(&records), black_box(&params)).len())
    });
    c.bench_function("slot counts", |b| b.iter(|| slot_counts(black_box(&records))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
