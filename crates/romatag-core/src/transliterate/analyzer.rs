//! Kanji readings from a morphological analyzer.
//!
//! Wraps a vibrato tokenizer over a MeCab-format system dictionary
//! (IPADIC, UniDic). Only the first morpheme of a run is used: the
//! transliterator re-asks at each position so the lexicon can still win
//! where it knows better.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use tracing::{debug, trace};
use vibrato::{Dictionary, Tokenizer};

use crate::unicode::{is_kana_reading, katakana_to_hiragana};

/// Feature column holding the katakana reading in IPADIC-style dictionaries.
pub const DEFAULT_READING_FIELD: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("dictionary error: {0}")]
    Dictionary(String),
}

/// One morpheme at the start of the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morpheme {
    /// Length in chars.
    pub len: usize,
    /// Hiragana reading, if the dictionary has one.
    pub reading: Option<String>,
}

pub struct Analyzer {
    tokenizer: Tokenizer,
    reading_field: usize,
}

impl Analyzer {
    pub fn new(dict: Dictionary) -> Self {
        Self {
            tokenizer: Tokenizer::new(dict),
            reading_field: DEFAULT_READING_FIELD,
        }
    }

    /// Use another feature column for the reading (UniDic layouts differ).
    pub fn with_reading_field(mut self, field: usize) -> Self {
        self.reading_field = field;
        self
    }

    /// Load a compiled vibrato dictionary; `.zst` files are decompressed
    /// on the fly.
    pub fn open(path: &Path) -> Result<Self, AnalyzerError> {
        let file = BufReader::new(File::open(path)?);
        let compressed = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zst"));
        debug!(path = %path.display(), compressed, "loading dictionary");
        let dict = if compressed {
            read_dictionary(zstd::Decoder::new(file)?)?
        } else {
            read_dictionary(file)?
        };
        Ok(Self::new(dict))
    }

    /// The first morpheme of `text`, or `None` for empty input.
    pub fn first(&self, text: &str) -> Option<Morpheme> {
        if text.is_empty() {
            return None;
        }
        let mut worker = self.tokenizer.new_worker();
        worker.reset_sentence(text);
        worker.tokenize();
        if worker.num_tokens() == 0 {
            return None;
        }
        let token = worker.token(0);
        let reading = token
            .feature()
            .split(',')
            .nth(self.reading_field)
            .filter(|r| is_kana_reading(r))
            .map(katakana_to_hiragana);
        trace!(surface = token.surface(), ?reading, "morpheme");
        Some(Morpheme {
            len: token.range_char().end,
            reading,
        })
    }
}

fn read_dictionary<R: Read>(reader: R) -> Result<Dictionary, AnalyzerError> {
    Dictionary::read(reader).map_err(|e| AnalyzerError::Dictionary(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use vibrato::SystemDictionaryBuilder;

    const LEX: &str = "\
大阪城,1,1,1,大阪城,名詞,固有名詞,地域,一般,*,*,オオサカジョウ,大阪城,*
代々木,1,1,5,代々木,名詞,固有名詞,地域,一般,*,*,ヨヨギ,代々木,*
公園,1,1,5,公園,名詞,一般,*,*,*,*,コウエン,公園,*
金閣,1,1,5,金閣,名詞,固有名詞,一般,*,*,*,キンカク,金閣,*
寺,1,1,5,寺,名詞,接尾,一般,*,*,*,テラ,寺,*
道後,1,1,5,道後,名詞,固有名詞,地域,一般,*,*,ドウゴ,道後,*
温泉,1,1,5,温泉,名詞,一般,*,*,*,*,オンセン,温泉,*";
    const MATRIX: &str = "2 2\n0 0 0\n0 1 0\n1 0 0\n1 1 0";
    const CHAR_DEF: &str = "DEFAULT 0 1 0";
    const UNK_DEF: &str = "DEFAULT,0,0,100,DEFAULT,名詞,一般,*,*,*,*,*,*,*";

    /// A tiny IPADIC-shaped dictionary for tests.
    pub(crate) fn test_analyzer() -> Analyzer {
        let dict = SystemDictionaryBuilder::from_readers(
            LEX.as_bytes(),
            MATRIX.as_bytes(),
            CHAR_DEF.as_bytes(),
            UNK_DEF.as_bytes(),
        )
        .unwrap();
        Analyzer::new(dict)
    }

    #[test]
    fn first_morpheme_with_reading() {
        let a = test_analyzer();
        assert_eq!(
            a.first("代々木公園"),
            Some(Morpheme {
                len: 3,
                reading: Some("よよぎ".into())
            })
        );
        assert_eq!(a.first("大阪城").unwrap().reading.as_deref(), Some("おおさかじょう"));
        assert_eq!(a.first(""), None);
    }

    #[test]
    fn unknown_word_has_no_reading() {
        let a = test_analyzer();
        let m = a.first("髙").unwrap();
        assert_eq!(m.len, 1);
        assert_eq!(m.reading, None);
    }

    #[test]
    fn reading_field_is_configurable() {
        let a = test_analyzer().with_reading_field(1);
        // column 1 is the part of speech, not kana
        assert_eq!(a.first("公園").unwrap().reading, None);
    }

    #[test]
    fn missing_dictionary_file() {
        let err = Analyzer::open(Path::new("/nonexistent/system.dic.zst"))
            .err()
            .unwrap();
        assert!(matches!(err, AnalyzerError::Io(_)));
    }
}
