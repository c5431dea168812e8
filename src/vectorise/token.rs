//! Tokenisers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, ErrorKind, Result};

static WORD_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|[^\w\s]+").unwrap());

static TWEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+|[@#]\w+|[:;=][\-o]?[()\[\]dDpP/]|\w+(?:['’]\w+)*|[^\w\s]").unwrap()
});

/// Granularity at which text is split into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tokeniser {
    /// Unicode word boundaries; punctuation segments are kept as tokens.
    Word,
    /// Runs of word characters and runs of punctuation.
    Punctuation,
    /// Unicode sentence boundaries.
    Sentence,
    /// Grapheme clusters, whitespace dropped.
    Character,
    /// Words, handles, hashtags, urls and simple emoticons.
    Tweet,
}

impl Tokeniser {
    pub fn tokenise(self, text: &str) -> Vec<String> {
        match self {
            Tokeniser::Word => text
                .split_word_bounds()
                .filter(|segment| !segment.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Tokeniser::Punctuation => WORD_PUNCT
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect(),
            Tokeniser::Sentence => text
                .unicode_sentences()
                .map(str::trim)
                .filter(|sentence| !sentence.is_empty())
                .map(str::to_string)
                .collect(),
            Tokeniser::Character => text
                .graphemes(true)
                .filter(|g| !g.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Tokeniser::Tweet => TWEET.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        }
    }
}

impl FromStr for Tokeniser {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WORD" | "WORD_TOKENISER" => Ok(Tokeniser::Word),
            "PUNCTUATION" | "PUNC_TOKENISER" => Ok(Tokeniser::Punctuation),
            "SENTENCE" => Ok(Tokeniser::Sentence),
            "CHARACTER" => Ok(Tokeniser::Character),
            "TWEET" | "TWEET_TOKENISER" => Ok(Tokeniser::Tweet),
            other => Err(Error::invalid(
                ErrorKind::Tokeniser,
                format!(
                    "tokeniser must be one of WORD, PUNCTUATION, SENTENCE, CHARACTER or TWEET, got {other:?}"
                ),
            )),
        }
    }
}

impl fmt::Display for Tokeniser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tokeniser::Word => "WORD",
            Tokeniser::Punctuation => "PUNCTUATION",
            Tokeniser::Sentence => "SENTENCE",
            Tokeniser::Character => "CHARACTER",
            Tokeniser::Tweet => "TWEET",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_keeps_punctuation_segments() {
        assert_eq!(
            Tokeniser::Word.tokenise("Pt took 20 tabs, can't recall."),
            vec!["Pt", "took", "20", "tabs", ",", "can't", "recall", "."]
        );
    }

    #[test]
    fn punctuation_splits_word_and_punct_runs() {
        assert_eq!(
            Tokeniser::Punctuation.tokenise("o/d at 10:30pm!!"),
            vec!["o", "/", "d", "at", "10", ":", "30pm", "!!"]
        );
    }

    #[test]
    fn sentence_and_character() {
        assert_eq!(
            Tokeniser::Sentence.tokenise("Found at home. Transferred by ambulance."),
            vec!["Found at home.", "Transferred by ambulance."]
        );
        assert_eq!(Tokeniser::Character.tokenise("a b"), vec!["a", "b"]);
    }

    #[test]
    fn tweet_keeps_handles_and_urls() {
        assert_eq!(
            Tokeniser::Tweet.tokenise("@nurse see https://x.org/a #triage :)"),
            vec!["@nurse", "see", "https://x.org/a", "#triage", ":)"]
        );
    }

    #[test]
    fn unknown_tokeniser() {
        let err = "LETTER".parse::<Tokeniser>().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Tokeniser));
        assert_eq!("PUNC_TOKENISER".parse::<Tokeniser>().unwrap(), Tokeniser::Punctuation);
    }
}
