//! Japanese → Latin transliteration.
//!
//! `Transliterator` is the seam the tag policy calls through. The built-in
//! `KanaTransliterator` reads kanji with a morphological `Analyzer` and a
//! `Lexicon` of overrides, converts kana with a static syllable table, and
//! assembles words the way place names are usually written on signage
//! ("Shibuya-ku", "Tokyo Tower").

mod analyzer;
mod builtin;
mod kana;
mod lexicon;

pub use analyzer::{Analyzer, AnalyzerError, Morpheme, DEFAULT_READING_FIELD};
pub use builtin::KanaTransliterator;
pub use kana::kana_to_romaji;
pub use lexicon::{EntryKind, Lexicon, LexiconError, DEFAULT_LEXICON_TOML};

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Romanization convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RomajiSystem {
    #[default]
    Hepburn,
    Nihon,
    Kunrei,
}

impl RomajiSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            RomajiSystem::Hepburn => "hepburn",
            RomajiSystem::Nihon => "nihon",
            RomajiSystem::Kunrei => "kunrei",
        }
    }
}

impl fmt::Display for RomajiSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown romaji system '{0}' (expected hepburn, nihon, or kunrei)")]
pub struct UnknownSystem(String);

impl FromStr for RomajiSystem {
    type Err = UnknownSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hepburn" => Ok(RomajiSystem::Hepburn),
            "nihon" | "nihon-shiki" | "nippon" => Ok(RomajiSystem::Nihon),
            "kunrei" | "kunrei-shiki" => Ok(RomajiSystem::Kunrei),
            _ => Err(UnknownSystem(s.to_string())),
        }
    }
}

/// Per-run conversion switches, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransliterateOptions {
    pub system: RomajiSystem,
    /// Replace every non-ASCII character of the result with `????`.
    pub ensure_ascii: bool,
    /// Render known katakana loanwords with their original spelling.
    pub foreign_spelling: bool,
}

/// Placeholder written for each non-ASCII character under `ensure_ascii`.
pub const NON_ASCII_PLACEHOLDER: &str = "????";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransliterateError {
    #[error("no reading for '{ch}' in \"{text}\"")]
    UnknownReading { text: String, ch: char },
}

pub trait Transliterator: Send + Sync {
    /// Romanize `text`. With `title_case` each word starts upper case.
    fn convert(
        &self,
        text: &str,
        title_case: bool,
        options: &TransliterateOptions,
    ) -> Result<String, TransliterateError>;
}
