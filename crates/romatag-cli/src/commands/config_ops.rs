use std::fs;

use romatag_core::config;
use romatag_core::transliterate::{Lexicon, DEFAULT_LEXICON_TOML};

pub fn config_export() {
    print!("{}", config::default_toml());
}

pub fn config_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let c = die!(config::parse_config_toml(&content), "Error: {}");
    println!(
        "OK: system={}, kana_source_tags={}, romaji_source_tags={}, romaji_dest_tags={}, kana_dest_tags={}",
        c.romaji_system,
        c.kana_source_tags.len(),
        c.romaji_source_tags.len(),
        c.romaji_dest_tags.len(),
        c.kana_dest_tags.len()
    );
}

pub fn lexicon_export() {
    print!("{DEFAULT_LEXICON_TOML}");
}

pub fn lexicon_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let lexicon = die!(Lexicon::parse(&content), "Error: {}");
    println!("OK: {} entries", lexicon.len());
}
