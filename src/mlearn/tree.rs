//! Decision trees, used directly and as the base learner of ensembles.

use std::fmt;
use std::str::FromStr;

use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Split impurity measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criterion {
    Gini,
    Entropy,
    /// Log loss; for classification trees this picks the same splits as entropy.
    LogLoss,
}

impl Criterion {
    fn split_quality(self) -> SplitQuality {
        match self {
            Criterion::Gini => SplitQuality::Gini,
            Criterion::Entropy | Criterion::LogLoss => SplitQuality::Entropy,
        }
    }
}

impl FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GINI" => Ok(Criterion::Gini),
            "ENTROPY" => Ok(Criterion::Entropy),
            "LOGLOSS" => Ok(Criterion::LogLoss),
            other => Err(Error::invalid(
                ErrorKind::Impurity,
                format!("criterion must be GINI, ENTROPY or LOGLOSS, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Gini => f.write_str("GINI"),
            Criterion::Entropy => f.write_str("ENTROPY"),
            Criterion::LogLoss => f.write_str("LOGLOSS"),
        }
    }
}

/// Validated decision tree hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion: Criterion,
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl TreeParams {
    pub fn new(
        criterion: Criterion,
        max_depth: Option<i64>,
        min_samples_split: i64,
        min_samples_leaf: i64,
    ) -> Result<Self> {
        let max_depth = match max_depth {
            Some(depth) if depth <= 0 => {
                return Err(Error::invalid(
                    ErrorKind::MaxDepth,
                    format!("max depth must be positive, got {depth}"),
                ));
            }
            depth => depth.map(|d| d as usize),
        };
        for (name, value) in [("min_samples_split", min_samples_split), ("min_samples_leaf", min_samples_leaf)] {
            if value < 1 {
                return Err(Error::invalid(
                    ErrorKind::MinSamples,
                    format!("{name} must be at least 1, got {value}"),
                ));
            }
        }
        Ok(Self {
            criterion,
            max_depth,
            min_samples_split: min_samples_split as usize,
            min_samples_leaf: min_samples_leaf as usize,
        })
    }

    /// A depth-one stump, the default base learner for boosting.
    pub fn stump(criterion: Criterion) -> Self {
        Self {
            criterion,
            max_depth: Some(1),
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    /// Fit on `x`/`y`. Sample weights, when given, should average 1 so the
    /// minimum sample counts keep their meaning.
    pub fn fit(&self, x: Array2<f64>, y: Array1<usize>, weights: Option<Array1<f32>>) -> Result<DecisionTree<f64, usize>> {
        let mut dataset = Dataset::new(x, y);
        if let Some(weights) = weights {
            dataset = dataset.with_weights(weights);
        }
        DecisionTree::params()
            .split_quality(self.criterion.split_quality())
            .max_depth(self.max_depth)
            .min_weight_split(self.min_samples_split as f32)
            .min_weight_leaf(self.min_samples_leaf as f32)
            .fit(&dataset)
            .map_err(|err| Error::model(format!("decision tree: {err}")))
    }
}

impl fmt::Display for TreeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "criterion {}", self.criterion)?;
        match self.max_depth {
            Some(depth) => write!(f, ", max depth {depth}")?,
            None => write!(f, ", unlimited depth")?,
        }
        write!(
            f,
            ", min samples split {} leaf {}",
            self.min_samples_split, self.min_samples_leaf
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn validates_hyper_parameters() {
        let kind = |depth, split, leaf| TreeParams::new(Criterion::Gini, depth, split, leaf).unwrap_err().kind();
        assert_eq!(kind(Some(-1), 2, 1), Some(ErrorKind::MaxDepth));
        assert_eq!(kind(Some(0), 2, 1), Some(ErrorKind::MaxDepth));
        assert_eq!(kind(None, 0, 1), Some(ErrorKind::MinSamples));
        assert_eq!(kind(None, 2, 0), Some(ErrorKind::MinSamples));
        assert_eq!("MSE".parse::<Criterion>().unwrap_err().kind(), Some(ErrorKind::Impurity));
    }

    #[test]
    fn fits_a_separable_problem() {
        let x = array![[0.0, 1.0], [0.0, 2.0], [1.0, 1.0], [1.0, 2.0]];
        let y = array![0usize, 0, 1, 1];
        let params = TreeParams::new(Criterion::Entropy, Some(3), 2, 1).unwrap();
        let tree = params.fit(x.clone(), y.clone(), None).unwrap();
        assert_eq!(tree.predict(&x), y);
        assert_eq!(tree.num_leaves(), 2);
    }
}
