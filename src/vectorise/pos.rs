//! Token-level features: a rule-based Penn Treebank part-of-speech tagger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Tag indices per token kept per text field.
pub const MAX_TOKENS: usize = 225;

/// Index of a token whose tag is outside [`PENN_TAGS`], e.g. punctuation.
pub const UNKNOWN_TAG: f64 = -1.0;
/// Padding after the last token.
pub const PADDING: f64 = -2.0;

/// Penn Treebank tags, in feature index order.
pub const PENN_TAGS: &[&str] = &[
    "CC", "CD", "DT", "EX", "IN", "JJ", "JJR", "JJS", "LS", "MD", "NN", "NNP", "NNS", "PDT", "POS",
    "PRP", "RB", "RBR", "RBS", "RP", "TO", "UH", "VB", "VBD", "VBG", "VBN", "VBP", "VBZ", "WDT",
    "WP", "WRB",
];

const LEXICON: &[(&str, &str)] = &[
    ("and", "CC"), ("or", "CC"), ("but", "CC"), ("nor", "CC"), ("yet", "CC"),
    ("a", "DT"), ("an", "DT"), ("the", "DT"), ("this", "DT"), ("that", "DT"), ("these", "DT"),
    ("those", "DT"), ("each", "DT"), ("every", "DT"), ("no", "DT"), ("some", "DT"), ("any", "DT"),
    ("all", "PDT"), ("both", "PDT"), ("half", "PDT"),
    ("there", "EX"),
    ("in", "IN"), ("on", "IN"), ("at", "IN"), ("of", "IN"), ("by", "IN"), ("for", "IN"),
    ("with", "IN"), ("from", "IN"), ("into", "IN"), ("after", "IN"), ("before", "IN"),
    ("during", "IN"), ("since", "IN"), ("because", "IN"), ("if", "IN"), ("while", "IN"),
    ("about", "IN"), ("over", "IN"), ("under", "IN"), ("than", "IN"), ("as", "IN"),
    ("can", "MD"), ("could", "MD"), ("may", "MD"), ("might", "MD"), ("must", "MD"),
    ("shall", "MD"), ("should", "MD"), ("will", "MD"), ("would", "MD"), ("ca", "MD"), ("wo", "MD"),
    ("i", "PRP"), ("me", "PRP"), ("you", "PRP"), ("he", "PRP"), ("him", "PRP"), ("she", "PRP"),
    ("her", "PRP"), ("it", "PRP"), ("we", "PRP"), ("us", "PRP"), ("they", "PRP"), ("them", "PRP"),
    ("himself", "PRP"), ("herself", "PRP"), ("themselves", "PRP"), ("myself", "PRP"),
    ("not", "RB"), ("n't", "RB"), ("very", "RB"), ("also", "RB"), ("now", "RB"), ("then", "RB"),
    ("again", "RB"), ("never", "RB"), ("today", "RB"), ("yesterday", "RB"),
    ("more", "RBR"), ("less", "RBR"), ("most", "RBS"), ("least", "RBS"),
    ("up", "RP"), ("out", "RP"), ("off", "RP"), ("down", "RP"),
    ("to", "TO"),
    ("oh", "UH"), ("yes", "UH"), ("ok", "UH"), ("please", "UH"),
    ("be", "VB"), ("do", "VB"), ("have", "VB"),
    ("was", "VBD"), ("were", "VBD"), ("did", "VBD"), ("had", "VBD"), ("took", "VBD"),
    ("went", "VBD"), ("came", "VBD"), ("found", "VBD"), ("said", "VBD"), ("felt", "VBD"),
    ("been", "VBN"), ("done", "VBN"), ("taken", "VBN"), ("given", "VBN"),
    ("am", "VBP"), ("are", "VBP"),
    ("is", "VBZ"), ("has", "VBZ"), ("does", "VBZ"), ("'s", "POS"),
    ("which", "WDT"), ("whatever", "WDT"),
    ("who", "WP"), ("whom", "WP"), ("what", "WP"),
    ("when", "WRB"), ("where", "WRB"), ("why", "WRB"), ("how", "WRB"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenLevel {
    PosTag,
}

impl TokenLevel {
    pub fn width(self) -> usize {
        match self {
            TokenLevel::PosTag => MAX_TOKENS,
        }
    }

    pub fn features(self, tokens: &[String]) -> Vec<f64> {
        match self {
            TokenLevel::PosTag => tag_indices(tokens),
        }
    }
}

impl FromStr for TokenLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "POS_TAG" => Ok(TokenLevel::PosTag),
            other => Err(Error::invalid(
                ErrorKind::TokenLevel,
                format!("token level technique must be POS_TAG, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for TokenLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenLevel::PosTag => f.write_str("POS_TAG"),
        }
    }
}

/// Tag one token. `sentence_start` suppresses the proper noun rule for capitalised first words.
pub fn tag(token: &str, sentence_start: bool) -> &'static str {
    let lower = token.to_lowercase();
    if let Some(&(_, tag)) = LEXICON.iter().find(|(word, _)| *word == lower) {
        return tag;
    }
    if !token.chars().any(char::is_alphanumeric) {
        return "";
    }
    if token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',' || c == '/') {
        return "CD";
    }
    if !sentence_start && token.chars().next().is_some_and(char::is_uppercase) {
        return "NNP";
    }
    if lower.ends_with("ing") && lower.len() > 4 {
        "VBG"
    } else if lower.ends_with("ed") && lower.len() > 3 {
        "VBD"
    } else if lower.ends_with("ly") && lower.len() > 3 {
        "RB"
    } else if lower.ends_with("est") && lower.len() > 4 {
        "JJS"
    } else if ["ous", "ful", "ive", "able", "ible", "al", "ic", "less"]
        .iter()
        .any(|suffix| lower.ends_with(suffix) && lower.len() > suffix.len() + 2)
    {
        "JJ"
    } else if lower.ends_with('s') && !lower.ends_with("ss") && lower.len() > 3 {
        "NNS"
    } else {
        "NN"
    }
}

/// Feature index of `tag`, or [`UNKNOWN_TAG`].
pub fn tag_index(tag: &str) -> f64 {
    PENN_TAGS
        .iter()
        .position(|t| *t == tag)
        .map_or(UNKNOWN_TAG, |i| i as f64)
}

/// Tag index per token, padded with [`PADDING`] or truncated to [`MAX_TOKENS`].
pub fn tag_indices(tokens: &[String]) -> Vec<f64> {
    let mut sentence_start = true;
    let mut indices = Vec::with_capacity(MAX_TOKENS);
    for token in tokens.iter().take(MAX_TOKENS) {
        indices.push(tag_index(tag(token, sentence_start)));
        sentence_start = matches!(token.as_str(), "." | "!" | "?");
    }
    indices.resize(MAX_TOKENS, PADDING);
    indices
}
