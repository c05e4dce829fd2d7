//! Run configuration for the tag policy.
//!
//! Built once at startup (embedded defaults, optionally replaced by a TOML
//! file, then command-line overrides), validated, and passed by reference
//! from then on. Nothing here is global.

use std::collections::HashSet;

use serde::Deserialize;

use crate::transliterate::{RomajiSystem, TransliterateOptions};

pub const DEFAULT_CONFIG_TOML: &str = include_str!("default_config.toml");

/// Returns the embedded default configuration TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("{field} must list at least one tag")]
    EmptyTagList { field: &'static str },
    #[error("invalid tag in {field}: {reason}")]
    InvalidTag { field: &'static str, reason: String },
    #[error("{field} lists '{key}' more than once")]
    DuplicateTag { field: &'static str, key: String },
}

/// What to do with an element whose name the transliterator rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the run; the output file is incomplete.
    #[default]
    Abort,
    /// Log the element and write it through unchanged.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransliterationConfig {
    pub kana_source_tags: Vec<String>,
    pub romaji_source_tags: Vec<String>,
    pub romaji_dest_tags: Vec<String>,
    pub kana_dest_tags: Vec<String>,
    pub clobber_romaji: bool,
    pub clobber_kana: bool,
    pub ensure_ascii: bool,
    pub disable_foreign_spelling: bool,
    pub romaji_system: RomajiSystem,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

impl Default for TransliterationConfig {
    fn default() -> Self {
        parse_config_toml(DEFAULT_CONFIG_TOML).expect("embedded config TOML must be valid")
    }
}

impl TransliterationConfig {
    pub fn transliterate_options(&self) -> TransliterateOptions {
        TransliterateOptions {
            system: self.romaji_system,
            ensure_ascii: self.ensure_ascii,
            foreign_spelling: !self.disable_foreign_spelling,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_tag_list("kana_source_tags", &self.kana_source_tags)?;
        check_tag_list("romaji_source_tags", &self.romaji_source_tags)?;
        check_tag_list("romaji_dest_tags", &self.romaji_dest_tags)?;
        check_tag_list("kana_dest_tags", &self.kana_dest_tags)?;
        Ok(())
    }
}

pub fn parse_config_toml(toml_str: &str) -> Result<TransliterationConfig, ConfigError> {
    let config: TransliterationConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn check_tag_list(field: &'static str, tags: &[String]) -> Result<(), ConfigError> {
    if tags.is_empty() {
        return Err(ConfigError::EmptyTagList { field });
    }
    let mut seen = HashSet::new();
    for key in tags {
        if key.trim().is_empty() {
            return Err(ConfigError::InvalidTag {
                field,
                reason: "empty key".to_string(),
            });
        }
        if key.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidTag {
                field,
                reason: format!("'{key}' contains whitespace"),
            });
        }
        if !seen.insert(key.as_str()) {
            return Err(ConfigError::DuplicateTag {
                field,
                key: key.clone(),
            });
        }
    }
    Ok(())
}
