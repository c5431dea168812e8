//! Error types for the pipeline.
//!
//! Every rejected configuration or malformed input is a [`ValidationError`]
//! tagged with an [`ErrorKind`], one kind per precondition the pipeline
//! checks. Everything else (I/O, CSV decoding, model backends) is wrapped by
//! [`Error`].

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The precondition a [`ValidationError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // Evaluate
    EmptyActualFlags,
    EmptyPredictedFlags,
    FlagsNotEqual,
    BadActualFlag,
    BadPredictedFlag,
    InsufficientMeasureList,

    // Importer
    UnsupportedFileType,
    NoTextFields,
    NoFlagField,
    ColumnLabel,
    TimesSpacesNotEqual,
    File,
    MinAge,
    MaxAge,
    Sex,
    Hospital,
    MinYear,
    MaxYear,
    MinMaxYear,
    NegTrainSize,
    NegTestSize,
    TrainDist,
    TestDist,
    TrainPosPercent,
    TestPosPercent,
    MoreDataThanRecords,

    // Vectorise
    NoLaTechniques,
    NoTokeniser,
    Tokeniser,
    PreLa,
    TokenLevel,
    TextLevel,
    CorpusLevel,
    NGram,
    Vectorise,

    // MLearn
    MlAlgType,
    MacLearnInput,
    Impurity,
    Kernel,
    MaxDepth,
    MinSamples,
    NEstimators,
    LearningRate,
    Ratio,
    CArg,
    Gamma,
    NoRbfGamma,
    NegRbfGamma,
    Polynomial,
    NoPolynomialParameter,
    NegPolynomialDegree,
    Sigmoid,
    NoSigmoidParameter,
    NegSigmoidGamma,
    OverSampleOps,
    UnderSampleOps,
    EmptyFlagsVectors,
    TrainVectorsFlagsNotEqual,
    VectorsNotEqual,
    NotEnoughClasses,

    // Program
    NameExists,
    Bounds,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A violated precondition together with a human readable detail.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(kind: ErrorKind, detail: S) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// The main error type of the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value or input record failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The model backend refused to fit or predict.
    #[error("Model error: {0}")]
    Model(String),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error of the given kind.
    pub fn invalid<S: Into<String>>(kind: ErrorKind, detail: S) -> Self {
        Error::Validation(ValidationError::new(kind, detail))
    }

    /// Create a model backend error.
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Error::Model(msg.into())
    }

    /// The validation kind, if this is a validation error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Validation(err) => Some(err.kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_displays_kind_and_detail() {
        let err = Error::invalid(ErrorKind::MaxDepth, "max depth must be positive, got -1");
        assert_eq!(err.kind(), Some(ErrorKind::MaxDepth));
        assert_eq!(
            err.to_string(),
            "MaxDepth: max depth must be positive, got -1"
        );
    }

    #[test]
    fn backend_errors_have_no_kind() {
        let err = Error::model("solver diverged");
        assert_eq!(err.kind(), None);
        assert!(err.to_string().contains("solver diverged"));
    }
}
