//! # epinlp 🏥🧠
//!
//! Build, train and evaluate text-classification pipelines over
//! epidemiological free-text records such as hospital triage notes.
//!
//! A run reads CSV/TSV records, filters them by demographic, samples a
//! training and a testing partition, turns every record into a fixed-width
//! feature vector, fits a classical classifier from
//! [`linfa`](https://crates.io/crates/linfa) and scores its predictions with
//! a complexity-adjusted F1 so that different algorithm families can be ranked
//! against each other.
//!
//! ## Features
//! - Seeded `UNIFORM`, `RANDOMBLOCK` and `NEWESTBLOCK` sampling with a target positive share
//! - Stop-word removal, Snowball stemming, POS tags, keyword flags, character codes
//! - Bag-of-words counts, TF-IDF and feature hashing over word n-grams
//! - Decision trees, random forests, AdaBoost/RUSBoost, SVMs and multinomial Naive Bayes
//! - Over- and undersampling of the training set
//! - Complexity-adjusted scoring and empirical prediction-time growth
//! - Trained program persistence with `rmp-serde` (MessagePack)
//! - Benchmarkable with [Criterion](https://crates.io/crates/criterion)
//!
//! ## Example
//! ```no_run
//! use std::path::Path;
//! use epinlp::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load(Path::new("self_harm.json"))?;
//! let mut created = Pipeline::new(&config)?.create()?;
//! println!("{}", created.evaluate()?);
//!
//! let program = created.into_program();
//! let flag = program.predict_single(&["pt cut wrists with razor, self harm"])?;
//! println!("Flag: {flag}");
//! # Ok::<(), epinlp::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod importer;
pub mod mlearn;
pub mod pipeline;
pub mod vectorise;

pub use config::{EvaluateConfig, PipelineConfig};
pub use data::{DataSet, DemographicConfig, DemographicSummary, Flag, Record, SexFilter};
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use evaluate::{ComplexityApproximator, Evaluation, GrowthApproximator, Stage, StageTimings};
pub use extract::{Distribution, Extractor};
pub use importer::{FileType, ImportConfig, Importer};
pub use mlearn::{AlgorithmConfig, Classifier, Complexity, Learner};
pub use pipeline::{Created, Pipeline, TermRatio, TrainedProgram};
pub use vectorise::{VectoriseConfig, Vectoriser};
