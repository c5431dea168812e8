use criterion::{Criterion, criterion_group, criterion_main};
use epinlp::{AlgorithmConfig, Classifier, Learner, Record, VectoriseConfig, Vectoriser};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const POSITIVE: &[&str] = &["cut wrists", "overdose of tablets", "self harm", "took 20 paracetamol", "ligature"];
const NEGATIVE: &[&str] = &["fall from ladder", "chest pain", "fever and cough", "sprained ankle", "head injury"];
const FILLER: &[&str] = &["pt", "brought in by ambulance", "alert", "with family", "at home", "since last night"];

fn synthetic(count: usize, rng: &mut StdRng) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let positive = i % 3 == 0;
            let pool = if positive { POSITIVE } else { NEGATIVE };
            let text = format!(
                "{} {} {}",
                FILLER[rng.random_range(0..FILLER.len())],
                pool[rng.random_range(0..pool.len())],
                FILLER[rng.random_range(0..FILLER.len())]
            );
            Record::from_texts(vec![text], u8::from(positive))
        })
        .collect()
}

fn trained(records: &[Record], rng: &mut StdRng) -> (Vectoriser, Classifier) {
    let mut vectoriser = Vectoriser::new(&VectoriseConfig {
        corpus_level: Some("BAG_OF_WORDS_F".into()),
        ..VectoriseConfig::default()
    })
    .unwrap();
    vectoriser.fit(records).unwrap();
    let vectors = vectoriser.transform(records).unwrap();
    let flags: Vec<u8> = records.iter().map(|r| r.flag).collect();
    let config = AlgorithmConfig::from_params("NAIVEBAYES", BTreeMap::new()).unwrap();
    let classifier = Learner::new(&config).unwrap().fit(&vectors, &flags, rng).unwrap();
    (vectoriser, classifier)
}

fn bench_predict_single(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let records = synthetic(2_000, &mut rng);
    let (vectoriser, classifier) = trained(&records, &mut rng);
    let record = [Record::from_texts(vec!["pt took overdose of tablets at home".into()], 0)];

    c.bench_function("predict single note", |b| {
        b.iter(|| {
            let vectors = vectoriser.transform(&record).unwrap();
            let _ = classifier.predict(&vectors).unwrap();
        })
    });
}

fn bench_bulk_prediction(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let records = synthetic(10_000, &mut rng);
    let (vectoriser, classifier) = trained(&records[..2_000], &mut rng);

    c.bench_function("bulk predict 10k notes", |b| {
        b.iter(|| {
            let vectors = vectoriser.transform(&records).unwrap();
            let _ = classifier.predict(&vectors).unwrap();
        });
    });
}

criterion_group!(benches, bench_predict_single, bench_bulk_prediction);
criterion_main!(benches);
