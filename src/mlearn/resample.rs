//! Training-set rebalancing by random over- and undersampling.

use std::fmt;

use log::debug;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Target minority/majority ratios. Oversampling runs first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resampling {
    pub over_sample: Option<f64>,
    pub under_sample: Option<f64>,
}

impl Resampling {
    pub fn new(over_sample: Option<f64>, under_sample: Option<f64>) -> Result<Self> {
        let in_range = |ratio: f64| ratio > 0.0 && ratio <= 1.0;
        if let Some(ratio) = over_sample.filter(|&r| !in_range(r)) {
            return Err(Error::invalid(
                ErrorKind::OverSampleOps,
                format!("oversampling ratio must be within (0, 1], got {ratio}"),
            ));
        }
        if let Some(ratio) = under_sample.filter(|&r| !in_range(r)) {
            return Err(Error::invalid(
                ErrorKind::UnderSampleOps,
                format!("undersampling ratio must be within (0, 1], got {ratio}"),
            ));
        }
        Ok(Self {
            over_sample,
            under_sample,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.over_sample.is_none() && self.under_sample.is_none()
    }

    /// Rebalanced copy of the training set. Rows stay in their original order,
    /// duplicates next to their source row.
    pub fn apply(&self, x: &Array2<f64>, y: &Array1<usize>, rng: &mut StdRng) -> (Array2<f64>, Array1<usize>) {
        let (positives, negatives): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|&i| y[i] == 1);
        let (mut minority, mut majority) = if positives.len() <= negatives.len() {
            (positives, negatives)
        } else {
            (negatives, positives)
        };

        if let Some(ratio) = self.over_sample {
            let target = (ratio * majority.len() as f64).ceil() as usize;
            let source = minority.len();
            if source > 0 && target > source {
                let extra: Vec<usize> = (0..target - source)
                    .map(|_| minority[rng.random_range(0..source)])
                    .collect();
                minority.extend(extra);
            }
        }
        if let Some(ratio) = self.under_sample {
            let target = ((minority.len() as f64 / ratio).floor() as usize).max(1);
            if target < majority.len() {
                majority = index::sample(rng, majority.len(), target)
                    .into_iter()
                    .map(|i| majority[i])
                    .collect();
            }
        }

        let mut rows = minority;
        rows.extend(majority);
        rows.sort_unstable();
        debug!("resampled training set from {} to {} rows", y.len(), rows.len());
        (x.select(Axis(0), &rows), y.select(Axis(0), &rows))
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.over_sample, self.under_sample) {
            (None, None) => f.write_str("none"),
            (Some(over), None) => write!(f, "oversample to {over}"),
            (None, Some(under)) => write!(f, "undersample to {under}"),
            (Some(over), Some(under)) => write!(f, "oversample to {over}, undersample to {under}"),
        }
    }
}
