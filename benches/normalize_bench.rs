use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use citation_geomap::common::AffiliationRecord;
use citation_geomap::normalize::{is_country, normalize_affiliation, normalize_records};

fn sample_affiliations() -> Vec<&'static str> {
    vec![
        "Massachusetts Institute of Technology",
        "Dept. of Computer Science, Stanford University, USA",
        "Professor at University of Oxford; Alan Turing Institute",
        "PhD student, ETH Zurich, Switzerland",
        "Tsinghua University and Peking University, China",
        "jane.doe@cs.cmu.edu",
    ]
}

fn bench_normalize_affiliation(c: &mut Criterion) {
    let samples = sample_affiliations();

    let mut group = c.benchmark_group("normalize_affiliation");
    group.throughput(Throughput::Elements(samples.len() as u64));

    group.bench_function("single_strings", |b| {
        b.iter(|| {
            for raw in &samples {
                black_box(normalize_affiliation(raw));
            }
        })
    });

    group.finish();
}

fn bench_country_lookup(c: &mut Criterion) {
    let names = ["USA", "United Kingdom", "Stanford University", "de", "Côte d'Ivoire"];

    let mut group = c.benchmark_group("country_lookup");
    group.throughput(Throughput::Elements(names.len() as u64));

    group.bench_function("is_country", |b| {
        b.iter(|| {
            for name in &names {
                black_box(is_country(name));
            }
        })
    });

    group.finish();
}

fn bench_normalize_records(c: &mut Criterion) {
    let samples = sample_affiliations();
    let records: Vec<AffiliationRecord> = (0..10_000)
        .map(|i| AffiliationRecord {
            author_id: format!("author{}", i),
            author_name: format!("Author {}", i),
            citing_title: format!("Citing paper {}", i % 500),
            cited_title: "Cited paper".to_string(),
            affiliation: samples[i % samples.len()].to_string(),
        })
        .collect();

    let mut group = c.benchmark_group("normalize_records");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.sample_size(20);

    group.bench_function("10k_records", |b| {
        b.iter(|| black_box(normalize_records(&records)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_normalize_affiliation,
    bench_country_lookup,
    bench_normalize_records
);
criterion_main!(benches);
