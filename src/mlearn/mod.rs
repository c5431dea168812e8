//! Classical classifiers over feature vectors.
//!
//! An [`AlgorithmConfig`] names an algorithm and carries its hyper-parameters
//! as a key/value map. [`Learner::new`] validates every value against the
//! algorithm's domain before anything is fitted; [`Learner::fit`] checks the
//! training vectors and returns a [`Classifier`].

pub mod bayes;
pub mod boost;
pub mod forest;
pub mod resample;
pub mod svm;
pub mod tree;

use std::collections::BTreeMap;
use std::fmt;

use linfa::prelude::*;
use linfa_bayes::MultinomialNb;
use linfa_trees::DecisionTree;
use log::{info, warn};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{Flag, is_flag};
use crate::error::{Error, ErrorKind, Result};

pub use boost::{BoostParams, Boosted};
pub use forest::{Forest, ForestParams};
pub use resample::Resampling;
pub use svm::{Gamma, Kernel, SvmModel, SvmParams};
pub use tree::{Criterion, TreeParams};

/// An algorithm identifier plus its hyper-parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    pub algorithm: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl AlgorithmConfig {
    /// Build and validate a configuration from a front-end parameter map.
    pub fn from_params(algorithm: &str, params: BTreeMap<String, Value>) -> Result<Self> {
        let config = Self {
            algorithm: algorithm.to_string(),
            params,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(Algorithm, Resampling)> {
        let params = Params {
            algorithm: &self.algorithm,
            map: &self.params,
        };
        let algorithm = match self.algorithm.as_str() {
            "DECISIONTREE" => {
                params.expect_keys(&["criterion", "max_depth", "min_samples_split", "min_samples_leaf"]);
                Algorithm::DecisionTree(params.tree(None)?)
            }
            "RANDOMFOREST" => {
                params.expect_keys(&[
                    "criterion",
                    "max_depth",
                    "min_samples_split",
                    "min_samples_leaf",
                    "n_estimators",
                    "ratio",
                    "max_features",
                ]);
                Algorithm::RandomForest(ForestParams::new(
                    params.tree(None)?,
                    params.int("n_estimators")?.unwrap_or(100),
                    params.float("ratio")?.unwrap_or(1.0),
                    params.int("max_features")?,
                )?)
            }
            "ADABOOST" | "RUSBOOST" => {
                let rus = self.algorithm == "RUSBOOST";
                params.expect_keys(&[
                    "criterion",
                    "max_depth",
                    "min_samples_split",
                    "min_samples_leaf",
                    "n_estimators",
                    "learning_rate",
                    "ratio",
                ]);
                let boost = BoostParams::new(
                    params.tree(Some(1))?,
                    params.int("n_estimators")?.unwrap_or(50),
                    params.float("learning_rate")?.unwrap_or(1.0),
                    if rus {
                        Some(params.float("ratio")?.unwrap_or(1.0))
                    } else {
                        None
                    },
                )?;
                if rus {
                    Algorithm::RusBoost(boost)
                } else {
                    Algorithm::AdaBoost(boost)
                }
            }
            "SVMACHINE" => {
                params.expect_keys(&["kernel", "c", "gamma", "degree", "coef0"]);
                Algorithm::SupportVectorMachine(SvmParams::new(
                    params.float("c")?.unwrap_or(1.0),
                    params.kernel()?,
                )?)
            }
            "NAIVEBAYES" => {
                params.expect_keys(&["alpha"]);
                Algorithm::NaiveBayes {
                    alpha: bayes::check_alpha(params.float("alpha")?.unwrap_or(bayes::DEFAULT_ALPHA))?,
                }
            }
            other => {
                return Err(Error::invalid(
                    ErrorKind::MlAlgType,
                    format!(
                        "algorithm must be one of DECISIONTREE, RANDOMFOREST, ADABOOST, RUSBOOST, \
                         SVMACHINE or NAIVEBAYES, got {other:?}"
                    ),
                ));
            }
        };
        let resampling = Resampling::new(params.float("over_sample")?, params.float("under_sample")?)?;
        Ok((algorithm, resampling))
    }
}

/// Typed access to a hyper-parameter map. JSON `null` counts as absent.
struct Params<'a> {
    algorithm: &'a str,
    map: &'a BTreeMap<String, Value>,
}

impl Params<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    fn input_error(&self, detail: String) -> Error {
        Error::invalid(ErrorKind::MacLearnInput, format!("{}: {detail}", self.algorithm))
    }

    fn expect_keys(&self, keys: &[&str]) {
        for key in self.map.keys() {
            if !keys.contains(&key.as_str()) && key != "over_sample" && key != "under_sample" {
                warn!("{} ignores parameter {key:?}", self.algorithm);
            }
        }
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(Value::String(value)) => Ok(value.as_str()),
            Some(other) => Err(self.input_error(format!("{key} must be a string, got {other}"))),
            None => Err(self.input_error(format!("missing required parameter {key}"))),
        }
    }

    fn int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
                .map(Some)
                .ok_or_else(|| self.input_error(format!("{key} must be an integer, got {value}"))),
        }
    }

    fn float(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.input_error(format!("{key} must be a number, got {value}"))),
        }
    }

    fn gamma(&self) -> Result<Option<Gamma>> {
        match self.get("gamma") {
            None => Ok(None),
            Some(Value::String(value)) => value.parse().map(Some),
            Some(value) => value
                .as_f64()
                .map(|v| Some(Gamma::Value(v)))
                .ok_or_else(|| Error::invalid(ErrorKind::Gamma, format!("gamma must be a number, got {value}"))),
        }
    }

    fn tree(&self, default_depth: Option<i64>) -> Result<TreeParams> {
        let criterion = self.required_str("criterion")?.parse()?;
        TreeParams::new(
            criterion,
            self.int("max_depth")?.or(default_depth),
            self.int("min_samples_split")?.unwrap_or(2),
            self.int("min_samples_leaf")?.unwrap_or(1),
        )
    }

    fn kernel(&self) -> Result<Kernel> {
        let kernel = match self.required_str("kernel")? {
            "LINEAR" => Kernel::Linear,
            "RBF" => Kernel::Rbf {
                gamma: self.gamma()?.ok_or_else(|| {
                    Error::invalid(ErrorKind::NoRbfGamma, "the RBF kernel needs a gamma parameter")
                })?,
            },
            "POLYNOMIAL" => {
                let (Some(degree), Some(coef0)) = (self.get("degree"), self.get("coef0")) else {
                    return Err(Error::invalid(
                        ErrorKind::NoPolynomialParameter,
                        "the polynomial kernel needs degree and coef0 parameters",
                    ));
                };
                let degree = degree
                    .as_f64()
                    .filter(|d| d.fract() == 0.0)
                    .ok_or_else(|| Error::invalid(ErrorKind::Polynomial, format!("degree must be an integer, got {degree}")))?;
                let coef0 = coef0
                    .as_f64()
                    .ok_or_else(|| Error::invalid(ErrorKind::Polynomial, format!("coef0 must be a number, got {coef0}")))?;
                Kernel::Polynomial {
                    degree: degree as i64,
                    coef0,
                }
            }
            "SIGMOID" => {
                let (Some(_), Some(coef0)) = (self.get("gamma"), self.get("coef0")) else {
                    return Err(Error::invalid(
                        ErrorKind::NoSigmoidParameter,
                        "the sigmoid kernel needs gamma and coef0 parameters",
                    ));
                };
                let coef0 = coef0
                    .as_f64()
                    .ok_or_else(|| Error::invalid(ErrorKind::Sigmoid, format!("coef0 must be a number, got {coef0}")))?;
                Kernel::Sigmoid {
                    gamma: self.gamma()?.unwrap_or(Gamma::Scale),
                    coef0,
                }
            }
            other => {
                return Err(Error::invalid(
                    ErrorKind::Kernel,
                    format!("kernel must be LINEAR, RBF, POLYNOMIAL or SIGMOID, got {other:?}"),
                ));
            }
        };
        Ok(kernel)
    }
}

/// A validated algorithm choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Algorithm {
    DecisionTree(TreeParams),
    RandomForest(ForestParams),
    AdaBoost(BoostParams),
    RusBoost(BoostParams),
    SupportVectorMachine(SvmParams),
    NaiveBayes { alpha: f64 },
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::DecisionTree(_) => "DECISIONTREE",
            Algorithm::RandomForest(_) => "RANDOMFOREST",
            Algorithm::AdaBoost(_) => "ADABOOST",
            Algorithm::RusBoost(_) => "RUSBOOST",
            Algorithm::SupportVectorMachine(_) => "SVMACHINE",
            Algorithm::NaiveBayes { .. } => "NAIVEBAYES",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::DecisionTree(tree) => write!(f, "DECISIONTREE ({tree})"),
            Algorithm::RandomForest(forest) => write!(
                f,
                "RANDOMFOREST ({} trees, bootstrap ratio {}, {})",
                forest.n_estimators, forest.ratio, forest.tree
            ),
            Algorithm::AdaBoost(boost) => write!(
                f,
                "ADABOOST ({} rounds, learning rate {}, {})",
                boost.n_estimators, boost.learning_rate, boost.tree
            ),
            Algorithm::RusBoost(boost) => write!(
                f,
                "RUSBOOST ({} rounds, learning rate {}, undersample ratio {}, {})",
                boost.n_estimators,
                boost.learning_rate,
                boost.undersample.unwrap_or(1.0),
                boost.tree
            ),
            Algorithm::SupportVectorMachine(svm) => write!(f, "SVMACHINE ({}, C {})", svm.kernel, svm.c),
            Algorithm::NaiveBayes { alpha } => write!(f, "NAIVEBAYES (alpha {alpha})"),
        }
    }
}

/// Structural size of a fitted model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complexity {
    /// Fitted structural parameters: leaves, support vector coordinates or
    /// per-class feature weights.
    pub parameters: u64,
    pub detail: String,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} parameters ({})", self.parameters, self.detail)
    }
}

/// Validated learner, ready to fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    algorithm: Algorithm,
    resampling: Resampling,
}

impl Learner {
    pub fn new(config: &AlgorithmConfig) -> Result<Self> {
        let (algorithm, resampling) = config.validate()?;
        Ok(Self { algorithm, resampling })
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    pub fn resampling(&self) -> &Resampling {
        &self.resampling
    }

    /// Fit on training vectors and their flags.
    pub fn fit(&self, vectors: &Array2<f64>, flags: &[Flag], rng: &mut StdRng) -> Result<Classifier> {
        if vectors.nrows() == 0 || vectors.ncols() == 0 || flags.is_empty() {
            return Err(Error::invalid(
                ErrorKind::EmptyFlagsVectors,
                "training vectors and flags must not be empty",
            ));
        }
        if vectors.nrows() != flags.len() {
            return Err(Error::invalid(
                ErrorKind::TrainVectorsFlagsNotEqual,
                format!("{} training vectors but {} flags", vectors.nrows(), flags.len()),
            ));
        }
        if let Some(flag) = flags.iter().find(|&&f| !is_flag(f)) {
            return Err(Error::invalid(
                ErrorKind::BadActualFlag,
                format!("training flag {flag} is outside (0,1)"),
            ));
        }
        let positives = flags.iter().filter(|&&f| f == 1).count();
        if positives == 0 || positives == flags.len() {
            return Err(Error::invalid(
                ErrorKind::NotEnoughClasses,
                "training flags must contain both classes",
            ));
        }

        let targets: Array1<usize> = flags.iter().map(|&f| usize::from(f)).collect();
        let (x, y) = if self.resampling.is_identity() {
            (vectors.clone(), targets)
        } else {
            self.resampling.apply(vectors, &targets, rng)
        };
        info!(
            "Training {} on {} vectors of dimension {}",
            self.algorithm.name(),
            x.nrows(),
            x.ncols()
        );

        let model = match &self.algorithm {
            Algorithm::DecisionTree(params) => Model::Tree(params.fit(x, y, None)?),
            Algorithm::RandomForest(params) => Model::Forest(params.fit(&x, &y, rng)?),
            Algorithm::AdaBoost(params) | Algorithm::RusBoost(params) => Model::Boosted(params.fit(&x, &y, rng)?),
            Algorithm::SupportVectorMachine(params) => Model::Svm(params.fit(&x, &y, rng)?),
            Algorithm::NaiveBayes { alpha } => Model::Bayes(bayes::fit(&x, &y, *alpha)?),
        };

        Ok(Classifier {
            algorithm: self.algorithm,
            dimension: vectors.ncols(),
            model,
        })
    }
}

#[derive(Serialize, Deserialize)]
enum Model {
    Tree(DecisionTree<f64, usize>),
    Forest(Forest),
    Boosted(Boosted),
    Svm(SvmModel),
    Bayes(MultinomialNb<f64, usize>),
}

/// A fitted model together with the dimension it was trained on.
#[derive(Serialize, Deserialize)]
pub struct Classifier {
    algorithm: Algorithm,
    dimension: usize,
    model: Model,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("algorithm", &self.algorithm)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Predicted flag per row of `vectors`.
    pub fn predict(&self, vectors: &Array2<f64>) -> Result<Vec<Flag>> {
        if vectors.nrows() == 0 {
            return Err(Error::invalid(ErrorKind::EmptyFlagsVectors, "no vectors to predict"));
        }
        if vectors.ncols() != self.dimension {
            return Err(Error::invalid(
                ErrorKind::VectorsNotEqual,
                format!(
                    "vectors have dimension {} but the model was trained on {}",
                    vectors.ncols(),
                    self.dimension
                ),
            ));
        }
        let predictions = match &self.model {
            Model::Tree(tree) => tree.predict(vectors),
            Model::Forest(forest) => forest.predict(vectors),
            Model::Boosted(boosted) => boosted.predict(vectors),
            Model::Svm(svm) => svm.predict(vectors),
            Model::Bayes(bayes) => bayes.predict(vectors),
        };
        Ok(predictions.iter().map(|&p| Flag::from(p == 1)).collect())
    }

    pub fn complexity(&self) -> Complexity {
        let (parameters, detail) = match &self.model {
            Model::Tree(tree) => (
                tree.num_leaves(),
                format!("{} leaves, depth {}", tree.num_leaves(), tree.max_depth()),
            ),
            Model::Forest(forest) => (
                forest.leaves(),
                format!("{} leaves over {} trees", forest.leaves(), forest.len()),
            ),
            Model::Boosted(boosted) => (
                boosted.leaves(),
                format!("{} leaves over {} rounds", boosted.leaves(), boosted.len()),
            ),
            Model::Svm(svm) => (
                svm.support_vectors() * self.dimension,
                format!("{} support vectors of dimension {}", svm.support_vectors(), self.dimension),
            ),
            Model::Bayes(_) => (
                2 * self.dimension,
                format!("2 classes over {} features", self.dimension),
            ),
        };
        Complexity {
            parameters: parameters as u64,
            detail,
        }
    }
}
