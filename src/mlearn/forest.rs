//! Bagged decision trees.

use linfa::prelude::*;
use linfa_trees::DecisionTree;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::TreeParams;
use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub tree: TreeParams,
    pub n_estimators: usize,
    /// Bootstrap sample size as a share of the training set.
    pub ratio: f64,
    /// Features seen by each tree; `None` takes `ceil(sqrt(d))`.
    pub max_features: Option<usize>,
}

impl ForestParams {
    pub fn new(tree: TreeParams, n_estimators: i64, ratio: f64, max_features: Option<i64>) -> Result<Self> {
        if n_estimators <= 0 {
            return Err(Error::invalid(
                ErrorKind::NEstimators,
                format!("n_estimators must be positive, got {n_estimators}"),
            ));
        }
        check_ratio(ratio)?;
        let max_features = match max_features {
            Some(features) if features <= 0 => {
                return Err(Error::invalid(
                    ErrorKind::MacLearnInput,
                    format!("max_features must be positive, got {features}"),
                ));
            }
            features => features.map(|f| f as usize),
        };
        Ok(Self {
            tree,
            n_estimators: n_estimators as usize,
            ratio,
            max_features,
        })
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>, rng: &mut StdRng) -> Result<Forest> {
        let (samples, dimension) = x.dim();
        let bag = ((samples as f64 * self.ratio).round() as usize).max(1);
        let width = self
            .max_features
            .unwrap_or_else(|| (dimension as f64).sqrt().ceil() as usize)
            .clamp(1, dimension.max(1));
        let seed: u64 = rng.random();

        let mut members = Vec::with_capacity(self.n_estimators);
        for i in 0..self.n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let rows: Vec<usize> = (0..bag).map(|_| tree_rng.random_range(0..samples)).collect();
            let mut features = index::sample(&mut tree_rng, dimension, width).into_vec();
            features.sort_unstable();

            let bag_x = x.select(Axis(0), &rows).select(Axis(1), &features);
            let bag_y = y.select(Axis(0), &rows);
            let tree = self.tree.fit(bag_x, bag_y, None)?;
            members.push(Member { features, tree });
        }
        debug!(
            "fitted {} trees on bags of {bag} records and {width} features",
            members.len()
        );
        Ok(Forest { members })
    }
}

/// Bootstrap and subsample ratios live in (0, 1].
pub(super) fn check_ratio(ratio: f64) -> Result<()> {
    if ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid(
            ErrorKind::Ratio,
            format!("ratio must be within (0, 1], got {ratio}"),
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct Member {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// A fitted forest. Predicts by majority vote, ties going to the negative class.
#[derive(Serialize, Deserialize)]
pub struct Forest {
    members: Vec<Member>,
}

impl Forest {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<usize> {
        let mut votes = Array1::<usize>::zeros(x.nrows());
        for member in &self.members {
            let predictions = member.tree.predict(&x.select(Axis(1), &member.features));
            votes += &predictions;
        }
        let trees = self.members.len();
        votes.mapv(|positive| usize::from(positive * 2 > trees))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn leaves(&self) -> usize {
        self.members.iter().map(|m| m.tree.num_leaves()).sum()
    }
}
