use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::unicode::{is_kana_reading, is_katakana, katakana_to_hiragana};

pub const DEFAULT_LEXICON_TOML: &str = include_str!("default_lexicon.toml");

#[derive(Debug, thiserror::Error)]
pub enum LexiconError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("empty surface in [{section}]")]
    EmptySurface { section: &'static str },
    #[error("reading for '{surface}' must be kana, got \"{reading}\"")]
    InvalidReading { surface: String, reading: String },
    #[error("loanword '{surface}' must be katakana")]
    InvalidLoanword { surface: String },
    #[error("empty spelling for loanword '{surface}'")]
    EmptySpelling { surface: String },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LexiconFile {
    #[serde(default)]
    words: BTreeMap<String, String>,
    #[serde(default)]
    suffixes: BTreeMap<String, String>,
    #[serde(default)]
    loanwords: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Stands as its own word.
    Word,
    /// Attaches to the preceding word with a hyphen.
    Suffix,
    /// Katakana loanword rendered with its source-language spelling.
    Loanword,
}

/// Surface → reading lookup with longest-match search.
///
/// Word and suffix readings are stored as hiragana; loanword values are the
/// final Latin spelling.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: HashMap<String, String>,
    suffixes: HashMap<String, String>,
    loanwords: HashMap<String, String>,
    /// Longest surface, in chars.
    max_len: usize,
}

impl Lexicon {
    /// The embedded default lexicon.
    pub fn builtin() -> Self {
        Self::parse(DEFAULT_LEXICON_TOML).expect("embedded lexicon TOML must be valid")
    }

    pub fn parse(toml_str: &str) -> Result<Self, LexiconError> {
        let file: LexiconFile =
            toml::from_str(toml_str).map_err(|e| LexiconError::Parse(e.to_string()))?;

        let mut lexicon = Self::default();
        for (surface, reading) in file.words {
            check_reading("words", &surface, &reading)?;
            lexicon.insert(EntryKind::Word, surface, katakana_to_hiragana(&reading));
        }
        for (surface, reading) in file.suffixes {
            check_reading("suffixes", &surface, &reading)?;
            lexicon.insert(EntryKind::Suffix, surface, katakana_to_hiragana(&reading));
        }
        for (surface, spelling) in file.loanwords {
            if surface.is_empty() {
                return Err(LexiconError::EmptySurface {
                    section: "loanwords",
                });
            }
            if !surface.chars().all(|c| is_katakana(c) && c != '・') {
                return Err(LexiconError::InvalidLoanword { surface });
            }
            if spelling.trim().is_empty() {
                return Err(LexiconError::EmptySpelling { surface });
            }
            lexicon.insert(EntryKind::Loanword, surface, spelling);
        }
        Ok(lexicon)
    }

    /// Add every entry of `other`, replacing entries with the same surface
    /// and kind.
    pub fn extend(&mut self, other: Lexicon) {
        for (surface, reading) in other.words {
            self.insert(EntryKind::Word, surface, reading);
        }
        for (surface, reading) in other.suffixes {
            self.insert(EntryKind::Suffix, surface, reading);
        }
        for (surface, spelling) in other.loanwords {
            self.insert(EntryKind::Loanword, surface, spelling);
        }
    }

    fn insert(&mut self, kind: EntryKind, surface: String, value: String) {
        self.max_len = self.max_len.max(surface.chars().count());
        let map = match kind {
            EntryKind::Word => &mut self.words,
            EntryKind::Suffix => &mut self.suffixes,
            EntryKind::Loanword => &mut self.loanwords,
        };
        map.insert(surface, value);
    }

    pub fn len(&self) -> usize {
        self.words.len() + self.suffixes.len() + self.loanwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, kind: EntryKind, surface: &str) -> Option<&str> {
        let map = match kind {
            EntryKind::Word => &self.words,
            EntryKind::Suffix => &self.suffixes,
            EntryKind::Loanword => &self.loanwords,
        };
        map.get(surface).map(String::as_str)
    }

    /// Longest entry starting at `chars[start]`.
    ///
    /// At equal length a word beats a suffix, which beats a loanword.
    /// Loanwords are only considered when `loanwords` is set. Returns the
    /// matched length in chars, the entry kind and its value.
    pub fn longest_match(
        &self,
        chars: &[char],
        start: usize,
        loanwords: bool,
    ) -> Option<(usize, EntryKind, &str)> {
        let remaining = chars.len().saturating_sub(start);
        let upper = self.max_len.min(remaining);
        let mut key = String::new();
        for len in (1..=upper).rev() {
            key.clear();
            key.extend(&chars[start..start + len]);
            for kind in [EntryKind::Word, EntryKind::Suffix, EntryKind::Loanword] {
                if kind == EntryKind::Loanword && !loanwords {
                    continue;
                }
                if let Some(value) = self.get(kind, &key) {
                    return Some((len, kind, value));
                }
            }
        }
        None
    }
}

fn check_reading(section: &'static str, surface: &str, reading: &str) -> Result<(), LexiconError> {
    if surface.is_empty() {
        return Err(LexiconError::EmptySurface { section });
    }
    if !is_kana_reading(reading) {
        return Err(LexiconError::InvalidReading {
            surface: surface.to_string(),
            reading: reading.to_string(),
        });
    }
    Ok(())
}
