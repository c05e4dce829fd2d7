use tracing::trace;

use crate::unicode::{fold_fullwidth, is_kana, is_kanji, katakana_to_hiragana};

use super::analyzer::Analyzer;
use super::kana::kana_to_romaji;
use super::lexicon::{EntryKind, Lexicon};
use super::{
    TransliterateError, TransliterateOptions, Transliterator, NON_ASCII_PLACEHOLDER,
};

/// Transliterator for place names.
///
/// Kanji are read through the morphological analyzer when one is attached,
/// with the lexicon layered on top: at each position the longer match
/// wins, and the lexicon wins ties. A kanji neither of them can read is an
/// error rather than a guess.
pub struct KanaTransliterator {
    lexicon: Lexicon,
    analyzer: Option<Analyzer>,
}

impl KanaTransliterator {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon,
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn has_analyzer(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Analyzer reading for the morpheme starting at `chars[start]`, as
    /// (length in chars, hiragana). The analyzer only sees the Japanese
    /// run beginning there.
    fn analyze_at(&self, chars: &[char], start: usize) -> Option<(usize, String)> {
        let analyzer = self.analyzer.as_ref()?;
        let end = chars[start..]
            .iter()
            .position(|&c| is_break(c) || !(needs_reading(c) || is_kana(c)))
            .map_or(chars.len(), |n| start + n);
        let run: String = chars[start..end].iter().collect();
        let morpheme = analyzer.first(&run)?;
        let reading = morpheme.reading?;
        Some((morpheme.len.min(end - start), reading))
    }
}

impl Default for KanaTransliterator {
    fn default() -> Self {
        Self::new(Lexicon::builtin())
    }
}

#[derive(Debug, PartialEq)]
enum Piece {
    Word(String),
    Suffix(String),
    Punct { text: String, space_after: bool },
    Break,
}

fn needs_reading(c: char) -> bool {
    is_kanji(c) || matches!(c, '々' | '〆' | '〇')
}

fn is_break(c: char) -> bool {
    c.is_whitespace() || c == '・'
}

fn punct(c: char) -> Piece {
    let (text, space_after) = match c {
        '、' => (",".to_string(), true),
        '。' => (".".to_string(), true),
        '〜' => ("~".to_string(), false),
        '「' | '」' | '『' | '』' => ("\"".to_string(), false),
        other => (other.to_string(), false),
    };
    Piece::Punct { text, space_after }
}

impl KanaTransliterator {
    fn tokenize(
        &self,
        text: &str,
        options: &TransliterateOptions,
    ) -> Result<Vec<Piece>, TransliterateError> {
        let chars: Vec<char> = text.chars().map(fold_fullwidth).collect();
        let system = options.system;
        let loanwords = options.foreign_spelling;
        let mut pieces = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if is_break(c) {
                pieces.push(Piece::Break);
                i += 1;
                continue;
            }

            let lexical = self.lexicon.longest_match(&chars, i, loanwords);
            if needs_reading(c) {
                let lexical_len = lexical.map_or(0, |(len, ..)| len);
                if let Some((len, reading)) = self.analyze_at(&chars, i) {
                    if len > lexical_len {
                        pieces.push(Piece::Word(kana_to_romaji(&reading, system)));
                        i += len;
                        continue;
                    }
                }
            }

            if let Some((len, kind, value)) = lexical {
                let attaches = matches!(
                    pieces.last(),
                    Some(Piece::Word(_)) | Some(Piece::Suffix(_))
                );
                let piece = match kind {
                    EntryKind::Word => Piece::Word(kana_to_romaji(value, system)),
                    EntryKind::Suffix if attaches => Piece::Suffix(kana_to_romaji(value, system)),
                    EntryKind::Suffix => Piece::Word(kana_to_romaji(value, system)),
                    EntryKind::Loanword => Piece::Word(value.to_string()),
                };
                pieces.push(piece);
                i += len;
                continue;
            }

            if needs_reading(c) {
                return Err(TransliterateError::UnknownReading {
                    text: text.to_string(),
                    ch: c,
                });
            }

            if is_kana(c) {
                // A kana run ends where a lexicon entry begins.
                let mut j = i + 1;
                while j < chars.len()
                    && is_kana(chars[j])
                    && !is_break(chars[j])
                    && self.lexicon.longest_match(&chars, j, loanwords).is_none()
                {
                    j += 1;
                }
                let run: String = chars[i..j].iter().collect();
                let romaji = kana_to_romaji(&katakana_to_hiragana(&run), system);
                if romaji.is_empty() {
                    pieces.push(punct('-'));
                } else {
                    pieces.push(Piece::Word(romaji));
                }
                i = j;
                continue;
            }

            if c.is_ascii_alphanumeric() {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_alphanumeric() {
                    j += 1;
                }
                pieces.push(Piece::Word(chars[i..j].iter().collect()));
                i = j;
                continue;
            }

            pieces.push(punct(c));
            i += 1;
        }

        Ok(pieces)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join pieces: words are space separated, suffixes hang off the previous
/// word with a hyphen, punctuation sticks to its neighbours unless the
/// source had a break there.
fn assemble(pieces: Vec<Piece>, title_case: bool) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    let mut after_word = false;

    for piece in pieces {
        match piece {
            Piece::Break => pending_space = !out.is_empty(),
            Piece::Word(word) => {
                if !out.is_empty() && (pending_space || after_word) {
                    out.push(' ');
                }
                if title_case {
                    out.push_str(&capitalize(&word));
                } else {
                    out.push_str(&word);
                }
                pending_space = false;
                after_word = true;
            }
            Piece::Suffix(suffix) => {
                out.push('-');
                out.push_str(&suffix);
                pending_space = false;
                after_word = true;
            }
            Piece::Punct { text, space_after } => {
                if pending_space {
                    out.push(' ');
                }
                out.push_str(&text);
                pending_space = space_after;
                after_word = false;
            }
        }
    }

    out
}

fn replace_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(NON_ASCII_PLACEHOLDER);
        }
    }
    out
}

impl Transliterator for KanaTransliterator {
    fn convert(
        &self,
        text: &str,
        title_case: bool,
        options: &TransliterateOptions,
    ) -> Result<String, TransliterateError> {
        let pieces = self.tokenize(text, options)?;
        trace!(pieces = pieces.len(), "tokenized");
        let romaji = assemble(pieces, title_case);
        if options.ensure_ascii {
            Ok(replace_non_ascii(&romaji))
        } else {
            Ok(romaji)
        }
    }
}
