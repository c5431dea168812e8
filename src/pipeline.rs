//! End-to-end runs: import, vectorise, train, predict and evaluate.
//!
//! ```no_run
//! use std::path::Path;
//! use epinlp::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load(Path::new("self_harm.json"))?;
//! let mut created = Pipeline::new(&config)?.create()?;
//! let evaluation = created.evaluate()?;
//! println!("{evaluation}");
//! created.into_program().save_to_file(Path::new("self_harm.msgpack"))?;
//! # Ok::<(), epinlp::Error>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use log::info;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data::{DataSet, FLAG_NEGATIVE, Flag, Record};
use crate::error::{Error, ErrorKind, Result};
use crate::evaluate::{self, ComplexityApproximator, Evaluation, GrowthApproximator, Stage, StageTimings};
use crate::importer::{FileType, Import, Importer};
use crate::mlearn::{Classifier, Learner};
use crate::vectorise::Vectoriser;

/// A fully validated pipeline that has not read any data yet.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    importer: Importer,
    vectoriser: Vectoriser,
    learner: Learner,
    approximator: ComplexityApproximator,
    approximate_complexity: bool,
    rng: StdRng,
}

impl Pipeline {
    /// Validate every stage of `config` before anything runs.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            importer: config.import.validate()?,
            vectoriser: Vectoriser::new(&config.vectorise)?,
            learner: Learner::new(&config.algorithm)?,
            approximator: ComplexityApproximator::new(config.evaluate.complexity_weight)?,
            approximate_complexity: config.evaluate.approximate_complexity,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Import both partitions, fit the vectoriser and the model on the
    /// training data and predict the test data.
    pub fn create(mut self) -> Result<Created> {
        let import = self.importer.import(&mut self.rng)?;
        import.train.ensure_compatible(&import.test)?;
        let mut timings = import.timings.clone();

        info!("Vectorising data...");
        let start = Instant::now();
        let (train_vectors, test_vectors) = self
            .vectoriser
            .fit_transform(import.train.records(), import.test.records())?;
        timings.record(Stage::Vectorise, start.elapsed());

        info!("Training {}...", self.learner.algorithm());
        let start = Instant::now();
        let classifier = self.learner.fit(&train_vectors, &import.train.flags(), &mut self.rng)?;
        timings.record(Stage::Training, start.elapsed());

        info!("Predicting {} test records...", test_vectors.nrows());
        let start = Instant::now();
        let predicted = classifier.predict(&test_vectors)?;
        timings.record(Stage::Prediction, start.elapsed());

        Ok(Created {
            name: self.name,
            import,
            vectoriser: self.vectoriser,
            classifier,
            predicted,
            approximator: self.approximator,
            approximate_complexity: self.approximate_complexity,
            growth_exponent: None,
            timings,
        })
    }
}

/// A trained pipeline together with its test predictions.
#[derive(Debug)]
pub struct Created {
    name: String,
    import: Import,
    vectoriser: Vectoriser,
    classifier: Classifier,
    predicted: Vec<Flag>,
    approximator: ComplexityApproximator,
    approximate_complexity: bool,
    growth_exponent: Option<f64>,
    timings: StageTimings,
}

impl Created {
    pub fn train(&self) -> &DataSet {
        &self.import.train
    }

    pub fn test(&self) -> &DataSet {
        &self.import.test
    }

    pub fn import(&self) -> &Import {
        &self.import
    }

    pub fn predicted(&self) -> &[Flag] {
        &self.predicted
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Score the test predictions. Runs the growth approximation first when
    /// the configuration asks for it.
    pub fn evaluate(&mut self) -> Result<Evaluation> {
        if self.approximate_complexity && self.growth_exponent.is_none() {
            self.approximate_complexities()?;
        }
        info!("Evaluating...");
        let start = Instant::now();
        let mut evaluation = evaluate::score(
            &self.predicted,
            &self.import.test.flags(),
            self.classifier.complexity(),
            &self.approximator,
        )?;
        self.timings.record(Stage::Evaluation, start.elapsed());

        evaluation.timings = self.timings.clone();
        evaluation.growth_exponent = self.growth_exponent;
        info!(
            "F1 {:.4}, adjusted score {:.4} ({})",
            evaluation.f1, evaluation.adjusted_score, evaluation.complexity
        );
        Ok(evaluation)
    }

    /// Estimate `k` in `O(n^k)` for vectorising and predicting records.
    ///
    /// # Errors
    ///
    /// `InsufficientMeasureList` when train and test together hold fewer
    /// records than the smallest measure set needs.
    pub fn approximate_complexities(&mut self) -> Result<f64> {
        info!("Approximating prediction complexity...");
        let start = Instant::now();
        let items: Vec<Record> = self
            .import
            .test
            .records()
            .iter()
            .chain(self.import.train.records())
            .cloned()
            .collect();
        let approximator = GrowthApproximator::new(&items)?;
        let k = approximator.time_exponent(|sample| {
            let vectors = self.vectoriser.transform(sample)?;
            self.classifier.predict(&vectors)
        })?;
        self.timings.record(Stage::Complexity, start.elapsed());
        info!("Prediction time grows as O(n^{k:.2})");

        self.growth_exponent = Some(k);
        Ok(k)
    }

    /// Keep what is needed to classify new text.
    pub fn into_program(self) -> TrainedProgram {
        let mut positive_df = BTreeMap::new();
        let mut negative_df = BTreeMap::new();
        for record in self.import.train.records() {
            let terms: BTreeSet<String> = self.vectoriser.corpus_ngrams(record).into_iter().collect();
            let counts = if record.is_positive() {
                &mut positive_df
            } else {
                &mut negative_df
            };
            for term in terms {
                *counts.entry(term).or_insert(0) += 1;
            }
        }
        let train = &self.import.train;
        TrainedProgram {
            name: self.name,
            text_columns: train.fields().text_columns.clone(),
            positives: train.positives(),
            negatives: train.len() - train.positives(),
            vectoriser: self.vectoriser,
            classifier: self.classifier,
            positive_df,
            negative_df,
        }
    }
}

/// A corpus-level term with its document frequency in each class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRatio {
    pub term: String,
    pub positive: usize,
    pub negative: usize,
    /// `(positive + 1) / (negative + 1)`
    pub ratio: f64,
}

/// A fitted vectoriser and classifier, ready to label new text.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedProgram {
    name: String,
    text_columns: Vec<String>,
    positives: usize,
    negatives: usize,
    vectoriser: Vectoriser,
    classifier: Classifier,
    positive_df: BTreeMap<String, usize>,
    negative_df: BTreeMap<String, usize>,
}

impl TrainedProgram {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text_columns(&self) -> &[String] {
        &self.text_columns
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn vectoriser(&self) -> &Vectoriser {
        &self.vectoriser
    }

    /// Flag for one record given as one text per text column.
    pub fn predict_single(&self, texts: &[&str]) -> Result<Flag> {
        let record = Record::from_texts(texts.iter().map(|t| t.to_string()).collect(), FLAG_NEGATIVE);
        let flags = self.predict_records(std::slice::from_ref(&record))?;
        flags
            .first()
            .copied()
            .ok_or_else(|| Error::model("the classifier returned no prediction"))
    }

    /// Flags for many records, each given as its text fields.
    pub fn predict_texts(&self, texts: &[Vec<String>]) -> Result<Vec<Flag>> {
        let records: Vec<Record> = texts
            .iter()
            .map(|fields| Record::from_texts(fields.clone(), FLAG_NEGATIVE))
            .collect();
        self.predict_records(&records)
    }

    fn predict_records(&self, records: &[Record]) -> Result<Vec<Flag>> {
        let vectors: Array2<f64> = self.vectoriser.transform(records)?;
        self.classifier.predict(&vectors)
    }

    /// Copy `input` to `output` with the predicted flag appended as column
    /// `label`. Returns the number of rows labelled.
    pub fn annotate_csv(&self, input: &Path, output: &Path, file_type: FileType, label: &str) -> Result<usize> {
        if output.exists() {
            return Err(Error::invalid(
                ErrorKind::NameExists,
                format!("{} already exists", output.display()),
            ));
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(file_type.delimiter())
            .from_path(input)?;
        let headers = reader.headers()?.clone();
        let columns = self
            .text_columns
            .iter()
            .map(|column| {
                headers.iter().position(|h| h.trim() == column).ok_or_else(|| {
                    Error::invalid(
                        ErrorKind::ColumnLabel,
                        format!("column {column:?} is not in {}", input.display()),
                    )
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        let texts: Vec<Vec<String>> = rows
            .iter()
            .map(|row| columns.iter().map(|&i| row.get(i).unwrap_or_default().to_string()).collect())
            .collect();
        let flags = if texts.is_empty() {
            Vec::new()
        } else {
            self.predict_texts(&texts)?
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(file_type.delimiter())
            .from_path(output)?;
        let mut header: Vec<&str> = headers.iter().collect();
        header.push(label);
        writer.write_record(&header)?;
        for (row, flag) in rows.iter().zip(&flags) {
            let flag = flag.to_string();
            let mut fields: Vec<&str> = row.iter().collect();
            fields.push(&flag);
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        info!("Annotated {} rows into {}", flags.len(), output.display());
        Ok(flags.len())
    }

    /// Corpus-level terms ranked by positive/negative document frequency ratio.
    pub fn top_features(&self, n: usize) -> Vec<TermRatio> {
        let Some(terms) = self.vectoriser.corpus_terms() else {
            return Vec::new();
        };
        let mut features: Vec<TermRatio> = terms
            .into_iter()
            .map(|term| {
                let positive = self.positive_df.get(term).copied().unwrap_or(0);
                let negative = self.negative_df.get(term).copied().unwrap_or(0);
                TermRatio {
                    term: term.to_string(),
                    positive,
                    negative,
                    ratio: (positive as f64 + 1.0) / (negative as f64 + 1.0),
                }
            })
            .collect();
        features.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.term.cmp(&b.term)));
        features.truncate(n);
        features
    }

    /// Saves the program to a binary `.msgpack` file. Never overwrites.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Error::invalid(
                ErrorKind::NameExists,
                format!("{} already exists, choose another name", path.display()),
            ));
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self)?;
        info!("Saved program {} to {}", self.name, path.display());
        Ok(())
    }

    /// Loads a program from a binary `.msgpack` file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(from_read(reader)?)
    }
}

impl fmt::Display for TrainedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program: {}", self.name)?;
        writeln!(f, "Text columns: {}", self.text_columns.join(", "))?;
        writeln!(
            f,
            "Trained on {} records ({} positive, {} negative)",
            self.positives + self.negatives,
            self.positives,
            self.negatives
        )?;
        writeln!(f, "Vectorise: {}", self.vectoriser.techniques())?;
        writeln!(f, "Algorithm: {}", self.classifier.algorithm())?;
        write!(f, "Complexity: {}", self.classifier.complexity())
    }
}
