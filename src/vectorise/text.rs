//! Text-level features, computed over a whole text field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Character codes kept per text field.
pub const MAX_CHARS: usize = 1571;

/// Self-harm keyword groups. A group matches when every fragment occurs in
/// the lower-cased text; surrounding spaces are part of the fragment.
pub const KEYWORDS: &[&[&str]] = &[
    &["suic"],
    &["self harm"],
    &["self-harm"],
    &["selfharm"],
    &[" self inflicted"],
    &[" self-inflicted"],
    &[" tsh "],
    &[" tosh "],
    &["tos"],
    &[" dsh "],
    &["overdos"],
    &[" od "],
    &[" o/d "],
    &[" od."],
    &[" gas self"],
    &["monox"],
    &["lacerat", "self harm"],
    &[" hanging", "self harm"],
    &[" hang", "self"],
    &[" strangle", "self"],
    &["cutting", "self harm"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextLevel {
    Keywords,
    AsciiConversion,
}

impl TextLevel {
    pub fn width(self) -> usize {
        match self {
            TextLevel::Keywords => KEYWORDS.len(),
            TextLevel::AsciiConversion => MAX_CHARS,
        }
    }

    pub fn features(self, text: &str) -> Vec<f64> {
        match self {
            TextLevel::Keywords => keyword_flags(text),
            TextLevel::AsciiConversion => character_codes(text),
        }
    }
}

impl FromStr for TextLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "KEYWORDS" => Ok(TextLevel::Keywords),
            "ASCII_CONVERSION" => Ok(TextLevel::AsciiConversion),
            other => Err(Error::invalid(
                ErrorKind::TextLevel,
                format!("text level technique must be KEYWORDS or ASCII_CONVERSION, got {other:?}"),
            )),
        }
    }
}

impl fmt::Display for TextLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextLevel::Keywords => f.write_str("KEYWORDS"),
            TextLevel::AsciiConversion => f.write_str("ASCII_CONVERSION"),
        }
    }
}

/// One 0/1 feature per keyword group.
pub fn keyword_flags(text: &str) -> Vec<f64> {
    let text = text.to_lowercase();
    KEYWORDS
        .iter()
        .map(|group| {
            if group.iter().all(|fragment| text.contains(fragment)) {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Code point of every character, padded with -1 or truncated to [`MAX_CHARS`].
pub fn character_codes(text: &str) -> Vec<f64> {
    let mut codes: Vec<f64> = text.chars().take(MAX_CHARS).map(|c| c as u32 as f64).collect();
    codes.resize(MAX_CHARS, -1.0);
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_groups_need_every_fragment() {
        let flags = keyword_flags("Pt states OVERDOSE, hanging attempt denied");
        assert_eq!(flags.len(), KEYWORDS.len());
        assert_eq!(flags[10], 1.0); // overdos
        assert_eq!(flags[17], 0.0); // hanging needs "self harm" too
        assert_eq!(keyword_flags("self harm, hanging")[17], 1.0);
    }

    #[test]
    fn character_codes_are_padded_and_truncated() {
        let codes = character_codes("Ab");
        assert_eq!(codes.len(), MAX_CHARS);
        assert_eq!(&codes[..3], &[65.0, 98.0, -1.0]);

        let long = "x".repeat(MAX_CHARS + 10);
        let codes = character_codes(&long);
        assert_eq!(codes.len(), MAX_CHARS);
        assert!(codes.iter().all(|&c| c == 120.0));
    }
}
