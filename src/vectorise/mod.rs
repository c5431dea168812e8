//! Turns records into fixed-length feature vectors.
//!
//! The vector of a record is the corpus-level block followed, for each text
//! field, by that field's token-level and text-level features:
//!
//! ```text
//! [ corpus | field 1: pos tags ++ keywords ++ ascii | field 2: ... ]
//! ```
//!
//! Corpus-level state (vocabulary, idf weights) is learnt once by
//! [`Vectoriser::fit`] and never changes afterwards, so transforming the same
//! records twice gives identical matrices.

pub mod corpus;
pub mod ngram;
pub mod pos;
pub mod prela;
pub mod text;
pub mod token;

use std::fmt;

use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::Record;
use crate::error::{Error, ErrorKind, Result};

pub use corpus::{CorpusLevel, CorpusModel, DEFAULT_HASH_BUCKETS, Weighting};
pub use ngram::NgramRange;
pub use pos::{MAX_TOKENS, TokenLevel};
pub use prela::PreLa;
pub use text::{KEYWORDS, MAX_CHARS, TextLevel};
pub use token::Tokeniser;

fn default_ngram_range() -> (i64, i64) {
    (1, 3)
}

fn default_hash_buckets() -> usize {
    DEFAULT_HASH_BUCKETS
}

/// Vectorisation settings as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectoriseConfig {
    #[serde(default)]
    pub tokeniser: Option<String>,
    #[serde(default)]
    pub pre_la: Vec<String>,
    #[serde(default)]
    pub token_level: Vec<String>,
    #[serde(default)]
    pub text_level: Vec<String>,
    #[serde(default)]
    pub corpus_level: Option<String>,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (i64, i64),
    #[serde(default = "default_hash_buckets")]
    pub hash_buckets: usize,
}

impl Default for VectoriseConfig {
    fn default() -> Self {
        Self {
            tokeniser: None,
            pre_la: Vec::new(),
            token_level: Vec::new(),
            text_level: Vec::new(),
            corpus_level: None,
            ngram_range: default_ngram_range(),
            hash_buckets: default_hash_buckets(),
        }
    }
}

/// Validated vectorisation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Techniques {
    pub tokeniser: Option<Tokeniser>,
    pub pre_la: Vec<PreLa>,
    pub token_level: Vec<TokenLevel>,
    pub text_level: Vec<TextLevel>,
    pub corpus_level: Option<CorpusLevel>,
    pub ngram_range: NgramRange,
    pub hash_buckets: usize,
}

impl VectoriseConfig {
    pub fn validate(&self) -> Result<Techniques> {
        let blank = |name: &Option<String>| name.as_deref().is_none_or(str::is_empty);

        if self.token_level.is_empty() && self.text_level.is_empty() && blank(&self.corpus_level) {
            return Err(Error::invalid(
                ErrorKind::NoLaTechniques,
                "at least one token, text or corpus level technique is required to build a vector",
            ));
        }
        if !self.token_level.is_empty() && blank(&self.tokeniser) {
            return Err(Error::invalid(
                ErrorKind::NoTokeniser,
                "token level techniques need a tokeniser",
            ));
        }
        let tokeniser = match self.tokeniser.as_deref() {
            None | Some("") => None,
            Some(name) => Some(name.parse::<Tokeniser>()?),
        };
        let pre_la = prela::parse_pre_la(&self.pre_la)?;
        let mut token_level = self
            .token_level
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<TokenLevel>>>()?;
        token_level.sort_unstable();
        token_level.dedup();
        let mut text_level = self
            .text_level
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<TextLevel>>>()?;
        text_level.sort_unstable();
        text_level.dedup();
        let corpus_level = match self.corpus_level.as_deref() {
            None | Some("") => None,
            Some(name) => Some(name.parse::<CorpusLevel>()?),
        };
        let ngram_range = NgramRange::new(self.ngram_range.0, self.ngram_range.1)?;
        if self.hash_buckets == 0 {
            return Err(Error::invalid(
                ErrorKind::CorpusLevel,
                "feature hashing needs at least one bucket",
            ));
        }

        Ok(Techniques {
            tokeniser,
            pre_la,
            token_level,
            text_level,
            corpus_level,
            ngram_range,
            hash_buckets: self.hash_buckets,
        })
    }
}

impl fmt::Display for Techniques {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |items: Vec<String>| {
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(", ")
            }
        };
        writeln!(
            f,
            "tokeniser: {}",
            self.tokeniser.map_or("-".to_string(), |t| t.to_string())
        )?;
        writeln!(f, "pre-LA: {}", list(self.pre_la.iter().map(ToString::to_string).collect()))?;
        writeln!(
            f,
            "token level: {}",
            list(self.token_level.iter().map(ToString::to_string).collect())
        )?;
        writeln!(
            f,
            "text level: {}",
            list(self.text_level.iter().map(ToString::to_string).collect())
        )?;
        match self.corpus_level {
            Some(level) => writeln!(
                f,
                "corpus level: {level} (n-grams {}-{})",
                self.ngram_range.min(),
                self.ngram_range.max()
            ),
            None => writeln!(f, "corpus level: -"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Fitted {
    corpus: Option<CorpusModel>,
    fields: usize,
}

/// Builds feature vectors. Fit once on the training records, then transform
/// any number of record sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vectoriser {
    techniques: Techniques,
    fitted: Option<Fitted>,
}

impl Vectoriser {
    pub fn new(config: &VectoriseConfig) -> Result<Self> {
        Ok(Self {
            techniques: config.validate()?,
            fitted: None,
        })
    }

    pub fn techniques(&self) -> &Techniques {
        &self.techniques
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Learn the corpus-level state from the training records.
    ///
    /// # Errors
    ///
    /// `Vectorise` when already fitted or when records disagree on the number
    /// of text fields; `CorpusLevel` for an empty corpus or vocabulary.
    pub fn fit(&mut self, records: &[Record]) -> Result<()> {
        if self.fitted.is_some() {
            return Err(Error::invalid(ErrorKind::Vectorise, "the vectoriser is already fitted"));
        }
        let fields = match records.first() {
            Some(record) => record.texts.len(),
            None if self.techniques.corpus_level.is_some() => {
                return Err(Error::invalid(
                    ErrorKind::CorpusLevel,
                    "cannot fit a corpus level technique on an empty corpus",
                ));
            }
            None => {
                return Err(Error::invalid(ErrorKind::Vectorise, "cannot fit on zero records"));
            }
        };
        check_fields(records, fields)?;

        let corpus = match self.techniques.corpus_level {
            Some(level) => {
                let documents: Vec<Vec<String>> = records.iter().map(|r| self.analyse(level, r)).collect();
                let model = CorpusModel::fit(level.weighting, &documents, self.techniques.hash_buckets)?;
                info!("Corpus level {level}: {} features", model.dimension());
                Some(model)
            }
            None => None,
        };

        self.fitted = Some(Fitted { corpus, fields });
        info!(
            "Fitted vectoriser on {} records, dimension {}",
            records.len(),
            self.dimension().unwrap_or_default()
        );
        Ok(())
    }

    /// Feature matrix of `records`, one row per record.
    pub fn transform(&self, records: &[Record]) -> Result<Array2<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| Error::invalid(ErrorKind::Vectorise, "transform called before fit"))?;
        check_fields(records, fitted.fields)?;

        let dimension = self.field_offset(fitted) + fitted.fields * self.field_width();
        let mut values = Vec::with_capacity(records.len() * dimension);
        for record in records {
            if let (Some(level), Some(model)) = (self.techniques.corpus_level, &fitted.corpus) {
                values.extend(model.transform(&self.analyse(level, record)));
            }
            for text in &record.texts {
                values.extend(self.field_features(text));
            }
        }
        debug!("transformed {} records into {dimension} features", records.len());

        Array2::from_shape_vec((records.len(), dimension), values).map_err(|err| {
            Error::invalid(ErrorKind::Vectorise, format!("feature matrix has the wrong shape: {err}"))
        })
    }

    /// Fit on `train` and transform both sets.
    pub fn fit_transform(&mut self, train: &[Record], test: &[Record]) -> Result<(Array2<f64>, Array2<f64>)> {
        self.fit(train)?;
        Ok((self.transform(train)?, self.transform(test)?))
    }

    /// Feature count per record, once fitted.
    pub fn dimension(&self) -> Option<usize> {
        self.fitted
            .as_ref()
            .map(|fitted| self.field_offset(fitted) + fitted.fields * self.field_width())
    }

    /// Corpus-level vocabulary in feature order.
    pub fn corpus_terms(&self) -> Option<Vec<&str>> {
        self.fitted.as_ref()?.corpus.as_ref()?.terms()
    }

    /// The n-grams a record contributes to the corpus-level block.
    pub fn corpus_ngrams(&self, record: &Record) -> Vec<String> {
        match self.techniques.corpus_level {
            Some(level) => self.analyse(level, record),
            None => Vec::new(),
        }
    }

    fn analyse(&self, level: CorpusLevel, record: &Record) -> Vec<String> {
        let mut text = record.corpus_text();
        if level.modified {
            text = prela::stem(&prela::remove_stopwords(&text));
        }
        let tokens: Vec<String> = self
            .techniques
            .tokeniser
            .unwrap_or(Tokeniser::Word)
            .tokenise(&text.to_lowercase())
            .into_iter()
            .filter(|token| token.chars().any(char::is_alphanumeric))
            .collect();
        self.techniques.ngram_range.ngrams(&tokens)
    }

    fn field_features(&self, text: &str) -> Vec<f64> {
        let text = prela::prepare(&self.techniques.pre_la, text);
        let mut features = Vec::with_capacity(self.field_width());
        if !self.techniques.token_level.is_empty() {
            let tokens = self
                .techniques
                .tokeniser
                .map(|tokeniser| tokeniser.tokenise(&text))
                .unwrap_or_default();
            for level in &self.techniques.token_level {
                features.extend(level.features(&tokens));
            }
        }
        for level in &self.techniques.text_level {
            features.extend(level.features(&text));
        }
        features
    }

    fn field_offset(&self, fitted: &Fitted) -> usize {
        fitted.corpus.as_ref().map_or(0, CorpusModel::dimension)
    }

    fn field_width(&self) -> usize {
        self.techniques.token_level.iter().map(|l| l.width()).sum::<usize>()
            + self.techniques.text_level.iter().map(|l| l.width()).sum::<usize>()
    }
}

fn check_fields(records: &[Record], fields: usize) -> Result<()> {
    match records.iter().position(|r| r.texts.len() != fields) {
        Some(index) => Err(Error::invalid(
            ErrorKind::Vectorise,
            format!(
                "record {index} has {} text fields, expected {fields}",
                records[index].texts.len()
            ),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(texts: &[&str]) -> Vec<Record> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Record::from_texts(vec![t.to_string()], (i % 2) as u8))
            .collect()
    }

    fn bag_of_words(ngram_range: (i64, i64)) -> VectoriseConfig {
        VectoriseConfig {
            tokeniser: Some("WORD".into()),
            corpus_level: Some("BAG_OF_WORDS_C".into()),
            ngram_range,
            ..Default::default()
        }
    }

    #[test]
    fn word_unigrams_share_a_vocabulary() {
        let train = records(&["cat sat", "cat ran"]);
        let mut vectoriser = Vectoriser::new(&bag_of_words((1, 1))).unwrap();
        vectoriser.fit(&train).unwrap();
        let matrix = vectoriser.transform(&train).unwrap();

        assert_eq!(matrix.dim(), (2, 3));
        assert_eq!(vectoriser.corpus_terms().unwrap(), vec!["cat", "ran", "sat"]);
        assert_eq!(matrix[[0, 0]], 1.0);
        assert_eq!(matrix[[1, 0]], 1.0);
    }

    #[test]
    fn transform_is_repeatable_and_test_shares_dimension() {
        let train = records(&["took 20 tablets of paracetamol", "fell off a ladder", "self harm cutting"]);
        let test = records(&["ladder fall, took tablets", "unrelated text entirely"]);
        let config = VectoriseConfig {
            tokeniser: Some("PUNCTUATION".into()),
            pre_la: vec!["STEMMING".into(), "REMOVE_STOPWORDS".into()],
            token_level: vec!["POS_TAG".into()],
            text_level: vec!["KEYWORDS".into(), "ASCII_CONVERSION".into()],
            corpus_level: Some("MOD_BAG_OF_WORDS_F".into()),
            ..Default::default()
        };
        let mut vectoriser = Vectoriser::new(&config).unwrap();
        let (train_x, test_x) = vectoriser.fit_transform(&train, &test).unwrap();

        let expected = vectoriser.corpus_terms().unwrap().len() + MAX_TOKENS + KEYWORDS.len() + MAX_CHARS;
        assert_eq!(train_x.ncols(), expected);
        assert_eq!(test_x.ncols(), expected);
        assert_eq!(vectoriser.dimension(), Some(expected));
        assert_eq!(vectoriser.transform(&test).unwrap(), test_x);
    }

    #[test]
    fn each_text_field_gets_its_own_block() {
        let train = vec![
            Record::from_texts(vec!["overdose".into(), "found at home".into()], 1),
            Record::from_texts(vec!["fracture".into(), "fell".into()], 0),
        ];
        let config = VectoriseConfig {
            text_level: vec!["KEYWORDS".into()],
            ..Default::default()
        };
        let mut vectoriser = Vectoriser::new(&config).unwrap();
        vectoriser.fit(&train).unwrap();
        let matrix = vectoriser.transform(&train).unwrap();
        assert_eq!(matrix.ncols(), 2 * KEYWORDS.len());
        assert_eq!(matrix[[0, 10]], 1.0);
        assert_eq!(matrix[[0, KEYWORDS.len() + 10]], 0.0);
    }

    #[test]
    fn fit_once_and_before_transform() {
        let train = records(&["a note", "another note"]);
        let mut vectoriser = Vectoriser::new(&bag_of_words((1, 2))).unwrap();
        let err = vectoriser.transform(&train).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Vectorise));

        vectoriser.fit(&train).unwrap();
        let err = vectoriser.fit(&train).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Vectorise));

        let err = Vectoriser::new(&bag_of_words((1, 1))).unwrap().fit(&[]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CorpusLevel));
    }

    #[test]
    fn configuration_errors() {
        let kind = |config: VectoriseConfig| Vectoriser::new(&config).unwrap_err().kind();

        assert_eq!(kind(VectoriseConfig::default()), Some(ErrorKind::NoLaTechniques));
        assert_eq!(
            kind(VectoriseConfig {
                token_level: vec!["POS_TAG".into()],
                ..Default::default()
            }),
            Some(ErrorKind::NoTokeniser)
        );
        assert_eq!(
            kind(VectoriseConfig {
                tokeniser: Some("BYTE".into()),
                ..bag_of_words((1, 1))
            }),
            Some(ErrorKind::Tokeniser)
        );
        assert_eq!(
            kind(VectoriseConfig {
                pre_la: vec!["LEMMATISE".into()],
                ..bag_of_words((1, 1))
            }),
            Some(ErrorKind::PreLa)
        );
        assert_eq!(
            kind(VectoriseConfig {
                tokeniser: Some("WORD".into()),
                token_level: vec!["CHUNK".into()],
                ..Default::default()
            }),
            Some(ErrorKind::TokenLevel)
        );
        assert_eq!(
            kind(VectoriseConfig {
                text_level: vec!["SENTIMENT".into()],
                ..Default::default()
            }),
            Some(ErrorKind::TextLevel)
        );
        assert_eq!(
            kind(VectoriseConfig {
                corpus_level: Some("WORD2VEC".into()),
                ..Default::default()
            }),
            Some(ErrorKind::CorpusLevel)
        );
        assert_eq!(kind(bag_of_words((0, 2))), Some(ErrorKind::NGram));
        assert_eq!(kind(bag_of_words((3, 1))), Some(ErrorKind::NGram));
    }
}
