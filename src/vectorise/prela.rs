//! Text rewriting applied before any feature is built: stop-word removal and
//! Snowball stemming.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

use super::token::Tokeniser;
use crate::error::{Error, ErrorKind, Result};

/// English stop words.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've", "you'll",
    "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself", "she", "she's",
    "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them", "their", "theirs",
    "themselves", "what", "which", "who", "whom", "this", "that", "that'll", "these", "those", "am",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having", "do", "does",
    "did", "doing", "a", "an", "the", "and", "but", "if", "or", "because", "as", "until", "while",
    "of", "at", "by", "for", "with", "about", "against", "between", "into", "through", "during",
    "before", "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
    "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn",
    "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't",
    "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren",
    "weren't", "won", "won't", "wouldn", "wouldn't",
];

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreLa {
    RemoveStopwords,
    Stemming,
}

impl PreLa {
    pub fn apply(self, text: &str) -> String {
        match self {
            PreLa::RemoveStopwords => remove_stopwords(text),
            PreLa::Stemming => stem(text),
        }
    }
}

impl FromStr for PreLa {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "REMOVE_STOPWORDS" => Ok(PreLa::RemoveStopwords),
            "STEMMING" => Ok(PreLa::Stemming),
            other => Err(Error::invalid(
                ErrorKind::PreLa,
                format!("pre-LA change must be REMOVE_STOPWORDS or STEMMING, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for PreLa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreLa::RemoveStopwords => f.write_str("REMOVE_STOPWORDS"),
            PreLa::Stemming => f.write_str("STEMMING"),
        }
    }
}

/// Parse, deduplicate and order pre-LA changes. Stop-word removal always runs first.
pub fn parse_pre_la(names: &[String]) -> Result<Vec<PreLa>> {
    let mut changes = names.iter().map(|n| n.parse()).collect::<Result<Vec<PreLa>>>()?;
    changes.sort_unstable();
    changes.dedup();
    Ok(changes)
}

/// Apply `changes` in order.
pub fn prepare(changes: &[PreLa], text: &str) -> String {
    changes
        .iter()
        .fold(text.to_string(), |text, change| change.apply(&text))
}

pub fn remove_stopwords(text: &str) -> String {
    Tokeniser::Word
        .tokenise(text)
        .into_iter()
        .filter(|token| !STOP_WORDS.contains(token.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Lower-case and stem every word token.
pub fn stem(text: &str) -> String {
    Tokeniser::Word
        .tokenise(text)
        .into_iter()
        .map(|token| STEMMER.stem(&token.to_lowercase()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
