//! SAMME boosting of shallow trees, optionally with random undersampling of
//! the majority class in every round (RUSBoost).

use linfa::prelude::*;
use linfa_trees::DecisionTree;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::forest::check_ratio;
use super::tree::TreeParams;
use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub tree: TreeParams,
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Minority/majority ratio each round is undersampled to. `None` boosts on the full set.
    pub undersample: Option<f64>,
}

impl BoostParams {
    pub fn new(tree: TreeParams, n_estimators: i64, learning_rate: f64, undersample: Option<f64>) -> Result<Self> {
        if n_estimators <= 0 {
            return Err(Error::invalid(
                ErrorKind::NEstimators,
                format!("n_estimators must be positive, got {n_estimators}"),
            ));
        }
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(Error::invalid(
                ErrorKind::LearningRate,
                format!("learning rate must be within (0, 1], got {learning_rate}"),
            ));
        }
        if let Some(ratio) = undersample {
            check_ratio(ratio)?;
        }
        Ok(Self {
            tree,
            n_estimators: n_estimators as usize,
            learning_rate,
            undersample,
        })
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>, rng: &mut StdRng) -> Result<Boosted> {
        let samples = x.nrows();
        let mut weights = Array1::<f64>::from_elem(samples, 1.0 / samples as f64);
        let mut rounds: Vec<Round> = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            let rows = match self.undersample {
                Some(ratio) => undersampled_rows(y, ratio, rng),
                None => (0..samples).collect(),
            };
            let round_weights = weights.select(Axis(0), &rows);
            let scale = rows.len() as f64 / round_weights.sum();
            let tree = self.tree.fit(
                x.select(Axis(0), &rows),
                y.select(Axis(0), &rows),
                Some(round_weights.mapv(|w| (w * scale) as f32)),
            )?;

            let predictions = tree.predict(x);
            let missed: Array1<f64> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| if p == t { 0.0 } else { 1.0 })
                .collect();
            let error = (&weights * &missed).sum() / weights.sum();

            if error <= 0.0 {
                rounds.push(Round { weight: 1.0, tree });
                debug!("boosting round {round} is perfect, stopping");
                break;
            }
            if error >= 0.5 {
                if rounds.is_empty() {
                    rounds.push(Round { weight: 1.0, tree });
                }
                debug!("boosting round {round} has error {error:.3}, stopping");
                break;
            }

            let weight = self.learning_rate * ((1.0 - error) / error).ln();
            weights = &weights * &missed.mapv(|m| (weight * m).exp());
            let total = weights.sum();
            weights.mapv_inplace(|w| w / total);
            rounds.push(Round { weight, tree });
        }

        debug!("boosted {} rounds", rounds.len());
        Ok(Boosted { rounds })
    }
}

/// All minority rows plus a random subset of the majority sized so that
/// minority/majority is at least `ratio`. Rows come back in ascending order.
fn undersampled_rows(y: &Array1<usize>, ratio: f64, rng: &mut StdRng) -> Vec<usize> {
    let (positives, negatives): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|&i| y[i] == 1);
    let (minority, majority) = if positives.len() <= negatives.len() {
        (positives, negatives)
    } else {
        (negatives, positives)
    };
    let keep = ((minority.len() as f64 / ratio).round() as usize).clamp(1, majority.len());

    let mut rows = minority;
    rows.extend(index::sample(rng, majority.len(), keep).into_iter().map(|i| majority[i]));
    rows.sort_unstable();
    rows
}

#[derive(Serialize, Deserialize)]
struct Round {
    weight: f64,
    tree: DecisionTree<f64, usize>,
}

/// A fitted boosted ensemble; predicts the sign of the weighted vote.
#[derive(Serialize, Deserialize)]
pub struct Boosted {
    rounds: Vec<Round>,
}

impl Boosted {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<usize> {
        let mut score = Array1::<f64>::zeros(x.nrows());
        for round in &self.rounds {
            let predictions = round.tree.predict(x);
            score.zip_mut_with(&predictions, |s, &p| {
                *s += if p == 1 { round.weight } else { -round.weight };
            });
        }
        score.mapv(|s| usize::from(s > 0.0))
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn leaves(&self) -> usize {
        self.rounds.iter().map(|r| r.tree.num_leaves()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tree::Criterion;
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn problem() -> (Array2<f64>, Array1<usize>) {
        // positive when both features are high; one stump cannot separate it
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.1, 0.2],
            [0.9, 0.1],
            [0.2, 0.9],
            [0.9, 0.9]
        ];
        let y = array![0usize, 0, 0, 1, 0, 0, 0, 1];
        (x, y)
    }

    #[test]
    fn validates_hyper_parameters() {
        let tree = TreeParams::stump(Criterion::Gini);
        assert_eq!(BoostParams::new(tree, 0, 1.0, None).unwrap_err().kind(), Some(ErrorKind::NEstimators));
        assert_eq!(BoostParams::new(tree, 5, 0.0, None).unwrap_err().kind(), Some(ErrorKind::LearningRate));
        assert_eq!(BoostParams::new(tree, 5, 1.2, None).unwrap_err().kind(), Some(ErrorKind::LearningRate));
        assert_eq!(BoostParams::new(tree, 5, 0.5, Some(2.0)).unwrap_err().kind(), Some(ErrorKind::Ratio));
    }

    #[test]
    fn a_perfect_stump_stops_boosting() {
        let x = array![[0.0], [0.1], [0.2], [0.8], [0.9], [1.0]];
        let y = array![0usize, 0, 0, 1, 1, 1];
        let params = BoostParams::new(TreeParams::stump(Criterion::Gini), 20, 1.0, None).unwrap();
        let model = params.fit(&x, &y, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn rusboost_fits_an_imbalanced_problem() {
        let (x, y) = problem();
        let params = BoostParams::new(TreeParams::stump(Criterion::Entropy), 5, 0.5, Some(1.0)).unwrap();
        let model = params.fit(&x, &y, &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(!model.is_empty());
        assert!(model.leaves() >= model.len());
        assert_eq!(model.predict(&x).len(), 8);
    }

    #[test]
    fn undersampling_keeps_every_minority_row() {
        let y = array![0usize, 0, 0, 0, 0, 0, 1, 1];
        let rows = undersampled_rows(&y, 1.0, &mut StdRng::seed_from_u64(4));
        assert_eq!(rows.len(), 4);
        assert!(rows.contains(&6) && rows.contains(&7));

        let rows = undersampled_rows(&y, 0.5, &mut StdRng::seed_from_u64(4));
        assert_eq!(rows.len(), 6);
    }
}
