//! Support vector machines. Linear, RBF and polynomial kernels are fitted with
//! `linfa-svm`; the sigmoid kernel, which it does not provide, uses a small
//! SMO solver.

use std::fmt;
use std::str::FromStr;

use linfa::prelude::*;
use linfa_svm::Svm;
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Kernel coefficient: a positive value, or derived from the training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    Value(f64),
    /// `1 / (d * var(X))`
    Scale,
    /// `1 / d`
    Auto,
}

impl Gamma {
    pub fn resolve(self, x: &Array2<f64>) -> f64 {
        let dimension = x.ncols().max(1) as f64;
        match self {
            Gamma::Value(gamma) => gamma,
            Gamma::Auto => 1.0 / dimension,
            Gamma::Scale => {
                let mean = x.mean().unwrap_or(0.0);
                let variance = x.mapv(|v| (v - mean).powi(2)).mean().unwrap_or(0.0);
                if variance > 0.0 {
                    1.0 / (dimension * variance)
                } else {
                    1.0
                }
            }
        }
    }
}

impl FromStr for Gamma {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scale" => Ok(Gamma::Scale),
            "auto" => Ok(Gamma::Auto),
            other => other.parse::<f64>().map(Gamma::Value).map_err(|_| {
                Error::invalid(
                    ErrorKind::Gamma,
                    format!("gamma must be a number, \"scale\" or \"auto\", got {s:?}"),
                )
            }),
        }
    }
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gamma::Value(gamma) => write!(f, "{gamma}"),
            Gamma::Scale => f.write_str("scale"),
            Gamma::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    Linear,
    Rbf { gamma: Gamma },
    /// `(x·y + coef0)^degree`
    Polynomial { degree: i64, coef0: f64 },
    /// `tanh(gamma x·y + coef0)`
    Sigmoid { gamma: Gamma, coef0: f64 },
}

impl Kernel {
    fn validate(&self) -> Result<()> {
        match *self {
            Kernel::Linear => Ok(()),
            Kernel::Rbf { gamma } => check_gamma(gamma, ErrorKind::NegRbfGamma, "RBF"),
            Kernel::Polynomial { degree, coef0 } => {
                if degree < 1 {
                    return Err(Error::invalid(
                        ErrorKind::NegPolynomialDegree,
                        format!("polynomial degree must be at least 1, got {degree}"),
                    ));
                }
                if !coef0.is_finite() {
                    return Err(Error::invalid(
                        ErrorKind::Polynomial,
                        format!("polynomial coef0 must be finite, got {coef0}"),
                    ));
                }
                Ok(())
            }
            Kernel::Sigmoid { gamma, coef0 } => {
                check_gamma(gamma, ErrorKind::NegSigmoidGamma, "sigmoid")?;
                if !coef0.is_finite() {
                    return Err(Error::invalid(
                        ErrorKind::Sigmoid,
                        format!("sigmoid coef0 must be finite, got {coef0}"),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Linear => "LINEAR",
            Kernel::Rbf { .. } => "RBF",
            Kernel::Polynomial { .. } => "POLYNOMIAL",
            Kernel::Sigmoid { .. } => "SIGMOID",
        }
    }
}

fn check_gamma(gamma: Gamma, negative: ErrorKind, kernel: &str) -> Result<()> {
    match gamma {
        Gamma::Value(value) if !value.is_finite() => Err(Error::invalid(
            ErrorKind::Gamma,
            format!("{kernel} gamma must be finite, got {value}"),
        )),
        Gamma::Value(value) if value <= 0.0 => Err(Error::invalid(
            negative,
            format!("{kernel} gamma must be positive, got {value}"),
        )),
        _ => Ok(()),
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Linear => f.write_str("LINEAR"),
            Kernel::Rbf { gamma } => write!(f, "RBF (gamma {gamma})"),
            Kernel::Polynomial { degree, coef0 } => write!(f, "POLYNOMIAL (degree {degree}, coef0 {coef0})"),
            Kernel::Sigmoid { gamma, coef0 } => write!(f, "SIGMOID (gamma {gamma}, coef0 {coef0})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub c: f64,
    pub kernel: Kernel,
}

impl SvmParams {
    pub fn new(c: f64, kernel: Kernel) -> Result<Self> {
        if !(c.is_finite() && c > 0.0) {
            return Err(Error::invalid(
                ErrorKind::CArg,
                format!("C must be a positive number, got {c}"),
            ));
        }
        kernel.validate()?;
        Ok(Self { c, kernel })
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>, rng: &mut StdRng) -> Result<SvmModel> {
        let params = Svm::<f64, bool>::params().pos_neg_weights(self.c, self.c);
        let params = match self.kernel {
            Kernel::Linear => params.linear_kernel(),
            // linfa's gaussian kernel is exp(-|x-y|^2 / eps)
            Kernel::Rbf { gamma } => params.gaussian_kernel(1.0 / gamma.resolve(x)),
            Kernel::Polynomial { degree, coef0 } => params.polynomial_kernel(coef0, degree as f64),
            Kernel::Sigmoid { gamma, coef0 } => {
                let model = SigmoidSvm::fit(x, y, self.c, gamma.resolve(x), coef0, rng);
                return Ok(SvmModel::Sigmoid(model));
            }
        };
        let dataset = Dataset::new(x.clone(), y.mapv(|flag| flag == 1));
        let model = params
            .fit(&dataset)
            .map_err(|err| Error::model(format!("support vector machine: {err}")))?;
        Ok(SvmModel::Linfa(model))
    }
}

#[derive(Serialize, Deserialize)]
pub enum SvmModel {
    Linfa(Svm<f64, bool>),
    Sigmoid(SigmoidSvm),
}

impl SvmModel {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<usize> {
        match self {
            SvmModel::Linfa(model) => model.predict(x).mapv(usize::from),
            SvmModel::Sigmoid(model) => model.predict(x),
        }
    }

    pub fn support_vectors(&self) -> usize {
        match self {
            SvmModel::Linfa(model) => model.nsupport(),
            SvmModel::Sigmoid(model) => model.support_vectors.nrows(),
        }
    }
}

const TOLERANCE: f64 = 1e-3;
const MAX_QUIET_PASSES: usize = 5;
const MAX_SWEEPS: usize = 200;

/// Sigmoid-kernel SVM fitted with simplified SMO.
///
/// The Gram matrix is held in memory, so memory grows with the square of the
/// training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmoidSvm {
    support_vectors: Array2<f64>,
    /// `alpha_i * y_i` per support vector.
    coefficients: Array1<f64>,
    bias: f64,
    gamma: f64,
    coef0: f64,
}

impl SigmoidSvm {
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, c: f64, gamma: f64, coef0: f64, rng: &mut StdRng) -> Self {
        let n = x.nrows();
        let signs = y.mapv(|flag| if flag == 1 { 1.0 } else { -1.0 });
        let gram = x.dot(&x.t()).mapv(|dot| (gamma * dot + coef0).tanh());
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;

        let output = |alphas: &Array1<f64>, bias: f64, i: usize| -> f64 {
            (alphas * &signs).dot(&gram.row(i)) + bias
        };

        let mut quiet = 0;
        let mut sweeps = 0;
        while quiet < MAX_QUIET_PASSES && sweeps < MAX_SWEEPS && n > 1 {
            sweeps += 1;
            let mut changed = 0;
            for i in 0..n {
                let error_i = output(&alphas, bias, i) - signs[i];
                let violates = (signs[i] * error_i < -TOLERANCE && alphas[i] < c)
                    || (signs[i] * error_i > TOLERANCE && alphas[i] > 0.0);
                if !violates {
                    continue;
                }
                let mut j = rng.random_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let error_j = output(&alphas, bias, j) - signs[j];
                let (old_i, old_j) = (alphas[i], alphas[j]);
                let (low, high) = if signs[i] != signs[j] {
                    ((old_j - old_i).max(0.0), (c + old_j - old_i).min(c))
                } else {
                    ((old_i + old_j - c).max(0.0), (old_i + old_j).min(c))
                };
                if low >= high {
                    continue;
                }
                let eta = 2.0 * gram[[i, j]] - gram[[i, i]] - gram[[j, j]];
                if eta >= 0.0 {
                    continue;
                }
                let new_j = (old_j - signs[j] * (error_i - error_j) / eta).clamp(low, high);
                if (new_j - old_j).abs() < 1e-5 {
                    continue;
                }
                let new_i = old_i + signs[i] * signs[j] * (old_j - new_j);
                alphas[i] = new_i;
                alphas[j] = new_j;

                let b1 = bias
                    - error_i
                    - signs[i] * (new_i - old_i) * gram[[i, i]]
                    - signs[j] * (new_j - old_j) * gram[[i, j]];
                let b2 = bias
                    - error_j
                    - signs[i] * (new_i - old_i) * gram[[i, j]]
                    - signs[j] * (new_j - old_j) * gram[[j, j]];
                bias = if new_i > 0.0 && new_i < c {
                    b1
                } else if new_j > 0.0 && new_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };
                changed += 1;
            }
            quiet = if changed == 0 { quiet + 1 } else { 0 };
        }

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        debug!("sigmoid SMO finished after {sweeps} sweeps with {} support vectors", support.len());
        Self {
            support_vectors: x.select(Axis(0), &support),
            coefficients: support.iter().map(|&i| alphas[i] * signs[i]).collect(),
            bias,
            gamma,
            coef0,
        }
    }

    fn decision(&self, row: ArrayView1<f64>) -> f64 {
        let kernel = self
            .support_vectors
            .dot(&row)
            .mapv(|dot| (self.gamma * dot + self.coef0).tanh());
        kernel.dot(&self.coefficients) + self.bias
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<usize> {
        x.rows()
            .into_iter()
            .map(|row| usize::from(self.decision(row) > 0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [-2.0, -1.5],
            [-1.5, -2.0],
            [-1.8, -1.2],
            [-2.2, -2.1],
            [1.5, 2.0],
            [2.0, 1.5],
            [1.2, 1.8],
            [2.1, 2.2]
        ];
        let y = array![0usize, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn kernel_parameters_are_validated() {
        let kind = |c, kernel| SvmParams::new(c, kernel).unwrap_err().kind();
        assert_eq!(kind(0.0, Kernel::Linear), Some(ErrorKind::CArg));
        assert_eq!(
            kind(1.0, Kernel::Rbf { gamma: Gamma::Value(-0.5) }),
            Some(ErrorKind::NegRbfGamma)
        );
        assert_eq!(
            kind(1.0, Kernel::Rbf { gamma: Gamma::Value(f64::NAN) }),
            Some(ErrorKind::Gamma)
        );
        assert_eq!(
            kind(1.0, Kernel::Polynomial { degree: 0, coef0: 1.0 }),
            Some(ErrorKind::NegPolynomialDegree)
        );
        assert_eq!(
            kind(1.0, Kernel::Polynomial { degree: 2, coef0: f64::INFINITY }),
            Some(ErrorKind::Polynomial)
        );
        assert_eq!(
            kind(1.0, Kernel::Sigmoid { gamma: Gamma::Value(0.0), coef0: 0.0 }),
            Some(ErrorKind::NegSigmoidGamma)
        );
        assert_eq!(
            kind(1.0, Kernel::Sigmoid { gamma: Gamma::Auto, coef0: f64::NAN }),
            Some(ErrorKind::Sigmoid)
        );
        assert_eq!("often".parse::<Gamma>().unwrap_err().kind(), Some(ErrorKind::Gamma));
        assert_eq!("Scale".parse::<Gamma>().unwrap(), Gamma::Scale);
    }

    #[test]
    fn gamma_resolution() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        assert_eq!(Gamma::Auto.resolve(&x), 0.5);
        // variance of {0, 2, 2, 0} is 1
        assert_eq!(Gamma::Scale.resolve(&x), 0.5);
        assert_eq!(Gamma::Value(3.0).resolve(&x), 3.0);
    }

    #[test]
    fn linear_kernel_separates() {
        let (x, y) = separable();
        let model = SvmParams::new(1.0, Kernel::Linear)
            .unwrap()
            .fit(&x, &y, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(model.predict(&x), y);
        assert!(model.support_vectors() >= 2);
    }

    #[test]
    fn rbf_and_polynomial_kernels_separate() {
        let (x, y) = separable();
        for kernel in [
            Kernel::Rbf { gamma: Gamma::Scale },
            Kernel::Rbf { gamma: Gamma::Value(0.5) },
            Kernel::Polynomial { degree: 2, coef0: 1.0 },
        ] {
            let model = SvmParams::new(1.0, kernel)
                .unwrap()
                .fit(&x, &y, &mut StdRng::seed_from_u64(0))
                .unwrap();
            assert_eq!(model.predict(&x), y, "{kernel}");
            // unseen points well inside each cluster
            assert_eq!(model.predict(&array![[-1.7, -1.7], [1.7, 1.7]]), array![0usize, 1], "{kernel}");
            assert!(model.support_vectors() > 0, "{kernel}");
        }
    }

    #[test]
    fn sigmoid_smo_fits_and_predicts() {
        let (x, y) = separable();
        let model = SvmParams::new(1.0, Kernel::Sigmoid { gamma: Gamma::Value(0.1), coef0: 0.0 })
            .unwrap()
            .fit(&x, &y, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(model.predict(&x), y);
        assert!(model.support_vectors() > 0);
    }
}
