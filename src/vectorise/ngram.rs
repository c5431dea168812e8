//! Contiguous token n-grams.

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Inclusive range of n-gram orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramRange {
    min: usize,
    max: usize,
}

impl Default for NgramRange {
    fn default() -> Self {
        Self { min: 1, max: 3 }
    }
}

impl NgramRange {
    /// # Errors
    ///
    /// `NGram` if `min` is not positive or `max < min`.
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min < 1 {
            return Err(Error::invalid(
                ErrorKind::NGram,
                format!("minimum n-gram order must be at least 1, got {min}"),
            ));
        }
        if max < min {
            return Err(Error::invalid(
                ErrorKind::NGram,
                format!("maximum n-gram order {max} is less than minimum {min}"),
            ));
        }
        Ok(Self {
            min: min as usize,
            max: max as usize,
        })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// All n-grams of `tokens`, shortest order first, joined by single spaces.
    pub fn ngrams(&self, tokens: &[String]) -> Vec<String> {
        let mut grams = Vec::new();
        for n in self.min..=self.max.min(tokens.len()) {
            grams.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        grams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn produces_every_order_in_range() {
        let range = NgramRange::new(1, 2).unwrap();
        assert_eq!(
            range.ngrams(&tokens("took an overdose")),
            vec!["took", "an", "overdose", "took an", "an overdose"]
        );
        assert_eq!(NgramRange::default().ngrams(&tokens("od")), vec!["od"]);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert_eq!(NgramRange::new(0, 2).unwrap_err().kind(), Some(ErrorKind::NGram));
        assert_eq!(NgramRange::new(3, 2).unwrap_err().kind(), Some(ErrorKind::NGram));
    }
}
