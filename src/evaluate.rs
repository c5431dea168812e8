//! Scoring predicted flags against actual flags.
//!
//! Besides the usual confusion-matrix metrics, every [`Evaluation`] carries a
//! complexity-adjusted score: F1 scaled down by a penalty that grows with the
//! number of fitted structural parameters of the model. Tree leaves, support
//! vector coordinates and per-class feature weights all count as parameters,
//! which puts heterogeneous algorithm families on one scale.

use std::collections::BTreeMap;
use std::fmt;
use std::hint::black_box;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::{FLAG_POSITIVE, Flag, is_flag};
use crate::error::{Error, ErrorKind, Result};
use crate::mlearn::Complexity;

/// Pipeline stages whose wall-clock time is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Import,
    Filter,
    TrainExtract,
    TestExtract,
    Vectorise,
    Training,
    Prediction,
    Evaluation,
    Complexity,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Import => "import",
            Stage::Filter => "filter",
            Stage::TrainExtract => "train extraction",
            Stage::TestExtract => "test extraction",
            Stage::Vectorise => "vectorise",
            Stage::Training => "training",
            Stage::Prediction => "prediction",
            Stage::Evaluation => "evaluation",
            Stage::Complexity => "complexity approximation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings(BTreeMap<Stage, Duration>);

impl StageTimings {
    /// Record `elapsed` for `stage`, replacing an earlier measurement.
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.0.insert(stage, elapsed);
    }

    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.0.get(&stage).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        self.0.iter().map(|(&stage, &elapsed)| (stage, elapsed))
    }

    pub fn extend(&mut self, other: &StageTimings) {
        self.0.extend(other.iter());
    }

    pub fn total(&self) -> Duration {
        self.0.values().sum()
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage, elapsed) in self.iter() {
            writeln!(f, "{:>26}: {:.3}s", stage.to_string(), elapsed.as_secs_f64())?;
        }
        write!(f, "{:>26}: {:.3}s", "total", self.total().as_secs_f64())
    }
}

/// Confusion matrix of a binary prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    fn of(predicted: &[Flag], actual: &[Flag]) -> Self {
        let mut counts = Self::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (a == FLAG_POSITIVE, p == FLAG_POSITIVE) {
                (true, true) => counts.true_positives += 1,
                (false, true) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (true, false) => counts.false_negatives += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// Penalises scores by the structural size of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityApproximator {
    weight: f64,
}

impl ComplexityApproximator {
    pub const DEFAULT_WEIGHT: f64 = 0.05;

    pub fn new(weight: f64) -> Result<Self> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(Error::invalid(
                ErrorKind::Bounds,
                format!("complexity weight must be a non-negative number, got {weight}"),
            ));
        }
        Ok(Self { weight })
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// `1 / (1 + w * log10(1 + parameters))`, always within (0, 1].
    pub fn penalty(&self, parameters: u64) -> f64 {
        1.0 / (1.0 + self.weight * (1.0 + parameters as f64).log10())
    }
}

impl Default for ComplexityApproximator {
    fn default() -> Self {
        Self {
            weight: Self::DEFAULT_WEIGHT,
        }
    }
}

/// The outcome of scoring one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub predicted: Vec<Flag>,
    pub actual: Vec<Flag>,
    pub confusion: ConfusionCounts,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub complexity: Complexity,
    pub penalty: f64,
    pub adjusted_score: f64,
    pub timings: StageTimings,
    /// Empirical `k` of `O(n^k)` prediction time, when it was measured.
    pub growth_exponent: Option<f64>,
}

/// Score `predicted` against `actual` and adjust by model complexity.
///
/// When neither sequence holds a positive flag (no true positives, false
/// positives or false negatives) the prediction is counted as perfect:
/// precision, recall and F1 are all 1.0. Otherwise a zero denominator gives
/// 0 for precision or recall, and F1 is 0 when both are 0.
pub fn score(
    predicted: &[Flag],
    actual: &[Flag],
    complexity: Complexity,
    approximator: &ComplexityApproximator,
) -> Result<Evaluation> {
    if actual.is_empty() {
        return Err(Error::invalid(
            ErrorKind::EmptyActualFlags,
            "actual flags are empty, please provide some flags",
        ));
    }
    if predicted.is_empty() {
        return Err(Error::invalid(
            ErrorKind::EmptyPredictedFlags,
            "predicted flags are empty, please provide some flags",
        ));
    }
    if actual.len() != predicted.len() {
        return Err(Error::invalid(
            ErrorKind::FlagsNotEqual,
            format!("{} actual flags but {} predicted flags", actual.len(), predicted.len()),
        ));
    }
    if let Some(flag) = actual.iter().find(|&&f| !is_flag(f)) {
        return Err(Error::invalid(
            ErrorKind::BadActualFlag,
            format!("actual flags contain {flag}, which is not in (0,1)"),
        ));
    }
    if let Some(flag) = predicted.iter().find(|&&f| !is_flag(f)) {
        return Err(Error::invalid(
            ErrorKind::BadPredictedFlag,
            format!("predicted flags contain {flag}, which is not in (0,1)"),
        ));
    }

    let confusion = ConfusionCounts::of(predicted, actual);
    let accuracy = (confusion.true_positives + confusion.true_negatives) as f64 / confusion.total() as f64;
    let (precision, recall, f1) = if confusion.true_positives + confusion.false_positives + confusion.false_negatives == 0 {
        (1.0, 1.0, 1.0)
    } else {
        let precision = ratio(confusion.true_positives, confusion.true_positives + confusion.false_positives);
        let recall = ratio(confusion.true_positives, confusion.true_positives + confusion.false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1)
    };
    let penalty = approximator.penalty(complexity.parameters);
    debug!(
        "scored {} flags: f1 {f1:.4}, {} parameters, penalty {penalty:.4}",
        actual.len(),
        complexity.parameters
    );

    Ok(Evaluation {
        predicted: predicted.to_vec(),
        actual: actual.to_vec(),
        confusion,
        accuracy,
        precision,
        recall,
        f1,
        complexity,
        penalty,
        adjusted_score: f1 * penalty,
        timings: StageTimings::default(),
        growth_exponent: None,
    })
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.confusion;
        writeln!(f, "Evaluation of {} test records", self.actual.len())?;
        writeln!(
            f,
            "  TP: {:>6}  FP: {:>6}  TN: {:>6}  FN: {:>6}",
            c.true_positives, c.false_positives, c.true_negatives, c.false_negatives
        )?;
        writeln!(f, "  accuracy:       {:.4}", self.accuracy)?;
        writeln!(f, "  precision:      {:.4}", self.precision)?;
        writeln!(f, "  recall:         {:.4}", self.recall)?;
        writeln!(f, "  F1:             {:.4}", self.f1)?;
        writeln!(f, "  complexity:     {}", self.complexity)?;
        writeln!(f, "  penalty:        {:.4}", self.penalty)?;
        writeln!(f, "  adjusted score: {:.4}", self.adjusted_score)?;
        if let Some(k) = self.growth_exponent {
            writeln!(f, "  prediction time grows as O(n^{k:.2})")?;
        }
        write!(f, "Stage timings:\n{}", self.timings)
    }
}

/// Sample sizes for timing; the set is chosen by the number of items available.
pub static MEASURE_SIZES: [[usize; 5]; 4] = [
    [10, 20, 50, 100, 200],
    [20, 50, 100, 200, 500],
    [100, 200, 500, 1000, 2000],
    [200, 500, 1000, 2000, 5000],
];

/// Estimates `k` in `O(n^k)` for a function by timing it on growing samples.
pub struct GrowthApproximator<'a, T> {
    items: &'a [T],
    sizes: &'static [usize; 5],
}

impl<'a, T> GrowthApproximator<'a, T> {
    pub fn new(items: &'a [T]) -> Result<Self> {
        let needed = MEASURE_SIZES[0][4];
        let sizes = match items.len() {
            n if n < needed => {
                return Err(Error::invalid(
                    ErrorKind::InsufficientMeasureList,
                    format!("at least {needed} items are needed to approximate complexity, got {n}"),
                ));
            }
            n if n <= 1_000 => &MEASURE_SIZES[0],
            n if n <= 5_000 => &MEASURE_SIZES[1],
            n if n <= 10_000 => &MEASURE_SIZES[2],
            _ => &MEASURE_SIZES[3],
        };
        Ok(Self { items, sizes })
    }

    pub fn sizes(&self) -> &[usize] {
        self.sizes
    }

    /// Time `run` on the last `size` items for every measure size.
    pub fn time_exponent<F, R>(&self, mut run: F) -> Result<f64>
    where
        F: FnMut(&[T]) -> Result<R>,
    {
        let mut timings = Vec::with_capacity(self.sizes.len());
        for &size in self.sizes {
            let sample = &self.items[self.items.len() - size..];
            let start = Instant::now();
            black_box(run(sample)?);
            timings.push(start.elapsed().as_secs_f64());
        }
        debug!("timed {:?} samples: {timings:?}", self.sizes);
        Ok(growth_exponent(self.sizes, &timings))
    }
}

/// Absolute slope of the least-squares line through `(ln size, ln result)`.
/// A zero measurement cannot be placed on the log scale and yields 0.
pub fn growth_exponent(sizes: &[usize], results: &[f64]) -> f64 {
    if results.iter().any(|&r| r <= 0.0) {
        warn!("fastest measurement is too small to approximate complexity; increase the smallest sample size");
        return 0.0;
    }
    let points: Vec<(f64, f64)> = sizes
        .iter()
        .zip(results)
        .map(|(&size, &result)| ((size as f64).ln(), result.ln()))
        .collect();
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let covariance: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let variance: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if variance == 0.0 {
        return 0.0;
    }
    (covariance / variance).abs()
}
