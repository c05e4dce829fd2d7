fn main() {
    // Validate embedded TOML files at compile time.
    validate_toml(
        "src/default_config.toml",
        include_str!("src/default_config.toml"),
    );
    validate_toml(
        "src/transliterate/default_lexicon.toml",
        include_str!("src/transliterate/default_lexicon.toml"),
    );
}

fn validate_toml(path: &str, content: &str) {
    if content.parse::<toml::Table>().is_err() {
        panic!("{path} contains invalid TOML");
    }
}
