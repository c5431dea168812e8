//! Corpus-level bag-of-words features: counts, TF-IDF and signed feature hashing.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_HASH_BUCKETS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weighting {
    /// Raw term counts.
    Counts,
    /// TF-IDF with smooth idf and L2 normalisation.
    Frequencies,
    /// Signed hashing into a fixed number of buckets, L2 normalised.
    Hashing,
}

/// A corpus-level technique. `modified` variants remove stop words and stem
/// the corpus text before counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusLevel {
    pub weighting: Weighting,
    pub modified: bool,
}

impl FromStr for CorpusLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (modified, base) = match s.strip_prefix("MOD_") {
            Some(base) => (true, base),
            None => (false, s),
        };
        let weighting = match base {
            "BAG_OF_WORDS_C" => Weighting::Counts,
            "BAG_OF_WORDS_F" => Weighting::Frequencies,
            "BAG_OF_WORDS_H" => Weighting::Hashing,
            _ => {
                return Err(Error::invalid(
                    ErrorKind::CorpusLevel,
                    format!(
                        "corpus level technique must be [MOD_]BAG_OF_WORDS_C, [MOD_]BAG_OF_WORDS_F \
                         or [MOD_]BAG_OF_WORDS_H, got {s:?}"
                    ),
                ));
            }
        };
        Ok(Self { weighting, modified })
    }
}

impl fmt::Display for CorpusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modified {
            f.write_str("MOD_")?;
        }
        match self.weighting {
            Weighting::Counts => f.write_str("BAG_OF_WORDS_C"),
            Weighting::Frequencies => f.write_str("BAG_OF_WORDS_F"),
            Weighting::Hashing => f.write_str("BAG_OF_WORDS_H"),
        }
    }
}

/// Fitted corpus-level state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CorpusModel {
    Vocabulary {
        vocabulary: BTreeMap<String, usize>,
        idf: Option<Vec<f64>>,
    },
    Hashing {
        buckets: usize,
    },
}

impl CorpusModel {
    /// Fit on analysed documents (one n-gram list per document).
    pub fn fit(weighting: Weighting, documents: &[Vec<String>], buckets: usize) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::invalid(
                ErrorKind::CorpusLevel,
                "cannot fit a corpus level technique on an empty corpus",
            ));
        }
        if weighting == Weighting::Hashing {
            return Ok(CorpusModel::Hashing { buckets });
        }

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for document in documents {
            let unique: HashSet<&str> = document.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }
        if document_frequency.is_empty() {
            return Err(Error::invalid(
                ErrorKind::CorpusLevel,
                "the training corpus produced an empty vocabulary",
            ));
        }

        // BTreeMap iteration is lexicographic, so indices follow term order.
        let vocabulary: BTreeMap<String, usize> = document_frequency
            .keys()
            .enumerate()
            .map(|(index, term)| (term.to_string(), index))
            .collect();

        let idf = (weighting == Weighting::Frequencies).then(|| {
            let n = documents.len() as f64;
            document_frequency
                .values()
                .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
                .collect()
        });

        Ok(CorpusModel::Vocabulary { vocabulary, idf })
    }

    pub fn dimension(&self) -> usize {
        match self {
            CorpusModel::Vocabulary { vocabulary, .. } => vocabulary.len(),
            CorpusModel::Hashing { buckets } => *buckets,
        }
    }

    /// Feature vector of one analysed document. Unseen terms are ignored.
    pub fn transform(&self, document: &[String]) -> Vec<f64> {
        match self {
            CorpusModel::Vocabulary { vocabulary, idf } => {
                let mut vector = vec![0.0; vocabulary.len()];
                for term in document {
                    if let Some(&index) = vocabulary.get(term) {
                        vector[index] += 1.0;
                    }
                }
                if let Some(idf) = idf {
                    for (value, weight) in vector.iter_mut().zip(idf) {
                        *value *= weight;
                    }
                    l2_normalise(&mut vector);
                }
                vector
            }
            CorpusModel::Hashing { buckets } => {
                let mut vector = vec![0.0; *buckets];
                for term in document {
                    let hash = fnv1a(term.as_bytes());
                    let index = (hash % *buckets as u64) as usize;
                    let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
                    vector[index] += sign;
                }
                l2_normalise(&mut vector);
                vector
            }
        }
    }

    /// Vocabulary terms in feature order. Hashing has no vocabulary.
    pub fn terms(&self) -> Option<Vec<&str>> {
        match self {
            CorpusModel::Vocabulary { vocabulary, .. } => Some(vocabulary.keys().map(String::as_str).collect()),
            CorpusModel::Hashing { .. } => None,
        }
    }
}

fn l2_normalise(vector: &mut [f64]) {
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

/// 64-bit FNV-1a; stable across platforms and releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
