use std::path::Path;

use epinlp::{ErrorKind, FileType, Pipeline, PipelineConfig, Stage, TrainedProgram};
use serde_json::{Value, json};
use tempfile::TempDir;

const POSITIVE: &[&str] = &[
    "self harm by cutting wrists",
    "overdose of tablets, self harm",
    "suicidal thoughts and self harm",
    "self harm with ligature",
    "deliberate self harm",
];
const NEGATIVE: &[&str] = &[
    "fall from ladder",
    "chest pain",
    "fever and cough",
    "sprained ankle",
    "head injury",
];
const FILLER: &[&str] = &["pt", "brought in by ambulance", "alert", "with family", "at home"];

/// 60 triage notes, alternating positive and negative, one per day.
fn write_notes(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("notes.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(["presented", "hospital", "sex", "age", "triage_text", "self_harm"])
        .unwrap();
    for i in 0..60usize {
        let positive = i % 2 == 0;
        let phrase = if positive { POSITIVE } else { NEGATIVE }[(i / 2) % 5];
        let text = format!("{} {phrase} {}", FILLER[i % 5], FILLER[(i + 2) % 5]);
        writer
            .write_record([
                format!("{:02}/{:02}/2019 {:02}:30", 1 + i % 28, 1 + i / 28, i % 24),
                if i % 3 == 0 { "CHPB" } else { "CHHS" }.to_string(),
                (1 + i % 2).to_string(),
                (20 + i % 50).to_string(),
                text,
                u8::from(positive).to_string(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    path
}

fn config(file: &Path, vectorise: Value, algorithm: Value) -> PipelineConfig {
    serde_json::from_value(json!({
        "name": "self harm",
        "seed": 7,
        "import": {
            "files": [file],
            "file_type": "CSV",
            "columns": {
                "date": "presented",
                "hospital": "hospital",
                "sex": "sex",
                "age": "age",
                "text": ["triage_text"],
                "flag": "self_harm"
            },
            "train": {"size": 30, "distribution": "UNIFORM", "positive_fraction": 0.5},
            "test": {"size": 20, "distribution": "NEWESTBLOCK"}
        },
        "vectorise": vectorise,
        "algorithm": algorithm
    }))
    .unwrap()
}

fn bag_of_words(file: &Path) -> PipelineConfig {
    config(
        file,
        json!({"corpus_level": "BAG_OF_WORDS_C"}),
        json!({"algorithm": "NAIVEBAYES", "params": {"alpha": 1.0}}),
    )
}

#[test]
fn naive_bayes_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let notes = write_notes(dir.path());

    let mut created = Pipeline::new(&bag_of_words(&notes)).unwrap().create().unwrap();
    assert_eq!(created.train().len(), 30);
    assert_eq!(created.train().positives(), 15);
    assert_eq!(created.test().len(), 20);
    assert!(created.test().class_count() >= 2);

    let evaluation = created.evaluate().unwrap();
    assert_eq!(evaluation.actual.len(), 20);
    assert!(evaluation.f1 > 0.9, "{evaluation}");
    assert!(evaluation.adjusted_score <= evaluation.f1);
    assert!(evaluation.complexity.parameters > 0);
    for stage in [Stage::Import, Stage::Filter, Stage::Vectorise, Stage::Training, Stage::Evaluation] {
        assert!(evaluation.timings.get(stage).is_some(), "{stage}");
    }

    let program = created.into_program();
    let top = program.top_features(3);
    assert_eq!(top.len(), 3);
    assert!(top[0].positive > top[0].negative);

    let exported = dir.path().join("self_harm.msgpack");
    program.save_to_file(&exported).unwrap();
    let err = program.save_to_file(&exported).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NameExists));

    let program = TrainedProgram::load_from_file(&exported).unwrap();
    assert_eq!(program.predict_single(&["deliberate self harm"]).unwrap(), 1);
    assert_eq!(program.predict_single(&["chest pain at home"]).unwrap(), 0);

    let annotated = dir.path().join("annotated.csv");
    let rows = program
        .annotate_csv(&notes, &annotated, FileType::Csv, "PREDICTED")
        .unwrap();
    assert_eq!(rows, 60);
    let mut reader = csv::Reader::from_path(&annotated).unwrap();
    assert_eq!(reader.headers().unwrap().iter().last(), Some("PREDICTED"));
    assert_eq!(reader.records().count(), 60);
}

#[test]
fn annotation_matches_padded_headers_like_the_importer() {
    let dir = TempDir::new().unwrap();
    let notes = write_notes(dir.path());
    let program = Pipeline::new(&bag_of_words(&notes))
        .unwrap()
        .create()
        .unwrap()
        .into_program();

    let padded = dir.path().join("padded.csv");
    let mut writer = csv::Writer::from_path(&padded).unwrap();
    writer.write_record(["id", " triage_text "]).unwrap();
    writer.write_record(["1", "deliberate self harm"]).unwrap();
    writer.write_record(["2", "chest pain at home"]).unwrap();
    writer.flush().unwrap();

    let annotated = dir.path().join("padded_annotated.csv");
    let rows = program
        .annotate_csv(&padded, &annotated, FileType::Csv, "PREDICTED")
        .unwrap();
    assert_eq!(rows, 2);
    let flags: Vec<String> = csv::Reader::from_path(&annotated)
        .unwrap()
        .records()
        .map(|row| row.unwrap()[2].to_string())
        .collect();
    assert_eq!(flags, ["1", "0"]);
}

#[test]
fn same_seed_reproduces_the_run() {
    let dir = TempDir::new().unwrap();
    let notes = write_notes(dir.path());
    let config = bag_of_words(&notes);

    let first = Pipeline::new(&config).unwrap().create().unwrap();
    let second = Pipeline::new(&config).unwrap().create().unwrap();
    assert_eq!(first.train().records(), second.train().records());
    assert_eq!(first.test().records(), second.test().records());
    assert_eq!(first.predicted(), second.predicted());
}

#[test]
fn decision_tree_on_keyword_flags() {
    let dir = TempDir::new().unwrap();
    let notes = write_notes(dir.path());
    let config = config(
        &notes,
        json!({"text_level": ["KEYWORDS"]}),
        json!({"algorithm": "DECISIONTREE", "params": {"criterion": "GINI"}}),
    );

    let mut created = Pipeline::new(&config).unwrap().create().unwrap();
    let evaluation = created.evaluate().unwrap();
    assert_eq!(evaluation.accuracy, 1.0);
    assert!(evaluation.complexity.parameters >= 2);
}

#[test]
fn growth_approximation_needs_enough_records() {
    let dir = TempDir::new().unwrap();
    let notes = write_notes(dir.path());

    let mut created = Pipeline::new(&bag_of_words(&notes)).unwrap().create().unwrap();
    let err = created.approximate_complexities().unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InsufficientMeasureList));
}

#[test]
fn configuration_errors_surface_before_import() {
    let missing = Path::new("does/not/exist.csv");

    let mut config = bag_of_words(missing);
    config.import.train.size = -1;
    let err = Pipeline::new(&config).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NegTrainSize));

    let mut config = bag_of_words(missing);
    config.algorithm.params.insert("alpha".into(), json!(-2.0));
    let err = Pipeline::new(&config).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Bounds));

    let mut config = bag_of_words(missing);
    config.import.demographic.min_year = 2010;
    let err = Pipeline::new(&config).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MinYear));
}

#[test]
fn too_large_partitions_are_rejected() {
    let dir = TempDir::new().unwrap();
    let notes = write_notes(dir.path());
    let mut config = bag_of_words(&notes);
    config.import.test.size = 40;

    let err = Pipeline::new(&config).unwrap().create().unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MoreDataThanRecords));
}
