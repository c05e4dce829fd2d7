//! Command implementations shared by the `romatag` and `romatool` binaries.
//!
//! Loading helpers return `Result`; the `*_cmd` entry points report
//! failures on stderr and exit with status 1.

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

pub mod config_ops;
pub mod romanize_ops;
pub mod transliterate_ops;

use std::fs;
use std::path::{Path, PathBuf};

use romatag_core::config::{self, ConfigError, TransliterationConfig};
use romatag_core::transliterate::{
    Analyzer, AnalyzerError, KanaTransliterator, Lexicon, LexiconError,
};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("{path}: {source}")]
    Lexicon {
        path: PathBuf,
        #[source]
        source: LexiconError,
    },

    #[error("{path}: {source}")]
    Dictionary {
        path: PathBuf,
        #[source]
        source: AnalyzerError,
    },
}

/// Where kanji readings come from: the analyzer dictionary and its reading
/// column, plus an optional user lexicon layered over the built-in one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingSources<'a> {
    pub lexicon: Option<&'a Path>,
    pub dictionary: Option<&'a Path>,
    pub reading_field: Option<usize>,
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// The config file at `path`, or the embedded defaults.
pub fn load_config(path: Option<&Path>) -> Result<TransliterationConfig, LoadError> {
    let Some(path) = path else {
        return Ok(TransliterationConfig::default());
    };
    config::parse_config_toml(&read(path)?).map_err(|source| LoadError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// The built-in lexicon, extended with the entries of `path` if given.
pub fn load_lexicon(path: Option<&Path>) -> Result<Lexicon, LoadError> {
    let mut lexicon = Lexicon::builtin();
    if let Some(path) = path {
        let user = Lexicon::parse(&read(path)?).map_err(|source| LoadError::Lexicon {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), entries = user.len(), "loaded user lexicon");
        lexicon.extend(user);
    }
    Ok(lexicon)
}

/// Build the transliterator. Without a dictionary, kanji are read from the
/// lexicon alone and most real names will not convert.
pub fn load_transliterator(sources: ReadingSources) -> Result<KanaTransliterator, LoadError> {
    let transliterator = KanaTransliterator::new(load_lexicon(sources.lexicon)?);
    let Some(path) = sources.dictionary else {
        warn!("no --dictionary given; kanji are read from the lexicon only");
        return Ok(transliterator);
    };
    let mut analyzer = Analyzer::open(path).map_err(|source| LoadError::Dictionary {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(field) = sources.reading_field {
        analyzer = analyzer.with_reading_field(field);
    }
    Ok(transliterator.with_analyzer(analyzer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use romatag_core::transliterate::EntryKind;

    #[test]
    fn defaults_without_files() {
        assert_eq!(load_config(None).unwrap(), TransliterationConfig::default());
        assert_eq!(load_lexicon(None).unwrap().len(), Lexicon::builtin().len());
    }

    #[test]
    fn config_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "kana_source_tags = []\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, LoadError::Config { .. }));
        assert!(err.to_string().contains("bad.toml"));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(LoadError::Read { .. })
        ));
    }

    #[test]
    fn transliterator_without_dictionary() {
        let t = load_transliterator(ReadingSources::default()).unwrap();
        assert!(!t.has_analyzer());
    }

    #[test]
    fn unreadable_dictionary_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.dic");
        fs::write(&path, b"not a dictionary").unwrap();
        let err = load_transliterator(ReadingSources {
            dictionary: Some(&path),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, LoadError::Dictionary { .. }));
        assert!(err.to_string().contains("system.dic"));
    }

    #[test]
    fn user_lexicon_extends_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lex.toml");
        fs::write(&path, "[words]\n\"宇都\" = \"うつ\"\n").unwrap();
        let lexicon = load_lexicon(Some(&path)).unwrap();
        assert_eq!(lexicon.get(EntryKind::Word, "宇都"), Some("うつ"));
        assert_eq!(lexicon.get(EntryKind::Word, "東京"), Some("とうきょう"));
    }
}
