//! Multinomial naive Bayes.

use linfa::prelude::*;
use linfa_bayes::MultinomialNb;
use ndarray::{Array1, Array2};

use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_ALPHA: f64 = 1.0;

/// Validate the additive smoothing parameter.
pub fn check_alpha(alpha: f64) -> Result<f64> {
    if alpha.is_finite() && alpha > 0.0 {
        Ok(alpha)
    } else {
        Err(Error::invalid(
            ErrorKind::Bounds,
            format!("naive Bayes alpha must be positive, got {alpha}"),
        ))
    }
}

/// Fit on count-like features. Negative features have no multinomial reading,
/// so they are refused.
pub fn fit(x: &Array2<f64>, y: &Array1<usize>, alpha: f64) -> Result<MultinomialNb<f64, usize>> {
    if x.iter().any(|&v| v < 0.0) {
        return Err(Error::model(
            "multinomial naive Bayes needs non-negative features; \
             drop POS_TAG, ASCII_CONVERSION and BAG_OF_WORDS_H",
        ));
    }
    MultinomialNb::params()
        .alpha(alpha)
        .fit(&Dataset::new(x.clone(), y.clone()))
        .map_err(|err| Error::model(format!("naive Bayes: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fits_word_counts() {
        let x = array![[3.0, 0.0, 1.0], [2.0, 0.0, 0.0], [0.0, 2.0, 1.0], [0.0, 3.0, 0.0]];
        let y = array![1usize, 1, 0, 0];
        let model = fit(&x, &y, DEFAULT_ALPHA).unwrap();
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn rejects_bad_alpha_and_negative_features() {
        assert_eq!(check_alpha(0.0).unwrap_err().kind(), Some(ErrorKind::Bounds));
        let x = array![[-1.0, 0.0], [0.0, 1.0]];
        let err = fit(&x, &array![0usize, 1], 1.0).unwrap_err();
        assert_eq!(err.kind(), None);
    }
}
