use std::path::Path;

use romatag_core::config::TransliterationConfig;
use romatag_core::normalize::normalize_hyphens;
use romatag_core::policy::{Outcome, TagPolicy};
use romatag_core::tags::{ElementKind, Tag, Tagged};
use romatag_core::transliterate::{
    KanaTransliterator, RomajiSystem, TransliterateError, TransliterateOptions, Transliterator,
};
use serde::Serialize;

use super::{load_config, load_transliterator, ReadingSources};

pub struct TransliterateArgs<'a> {
    pub text: &'a str,
    pub system: RomajiSystem,
    pub ensure_ascii: bool,
    pub disable_loanwords: bool,
    pub no_title: bool,
    pub sources: ReadingSources<'a>,
}

/// Romanize `text` exactly as `romatag` would write it: transliterator
/// output followed by hyphen normalization.
pub fn transliterate(
    transliterator: &dyn Transliterator,
    args: &TransliterateArgs,
) -> Result<String, TransliterateError> {
    let options = TransliterateOptions {
        system: args.system,
        ensure_ascii: args.ensure_ascii,
        foreign_spelling: !args.disable_loanwords,
    };
    let raw = transliterator.convert(args.text, !args.no_title, &options)?;
    Ok(normalize_hyphens(&raw))
}

pub fn transliterate_cmd(args: &TransliterateArgs) {
    let transliterator = die!(
        load_transliterator(args.sources),
        "Error: {}"
    );
    let romaji = die!(transliterate(&transliterator, args), "Error: {}");
    println!("{romaji}");
}

/// Stand-in element for running the policy on tags given on the command
/// line.
struct AdHoc {
    tags: Vec<Tag>,
}

impl Tagged for AdHoc {
    fn kind(&self) -> ElementKind {
        ElementKind::Node
    }

    fn id(&self) -> i64 {
        0
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn with_tags(self, tags: Vec<Tag>) -> Self {
        Self { tags }
    }
}

/// Parse `key=value` arguments. The first `=` splits; values may contain
/// more.
pub fn parse_tag_args(args: &[String]) -> Result<Vec<Tag>, String> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok(Tag::new(k, v)),
            _ => Err(format!("expected key=value, got {arg:?}")),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct Explanation {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub romaji: Option<String>,
    pub written: Vec<String>,
    pub tags: Vec<(String, String)>,
}

pub fn explain(
    config: &TransliterationConfig,
    transliterator: &dyn Transliterator,
    tags: Vec<Tag>,
) -> Result<Explanation, String> {
    let policy = TagPolicy::new(config, transliterator);
    let applied = policy
        .apply(AdHoc { tags })
        .map_err(|rejected| rejected.error.to_string())?;
    let (outcome, source_tag, romaji, written) = match applied.outcome {
        Outcome::NoSource => ("no-source", None, None, Vec::new()),
        Outcome::AlreadyLatin => ("already-latin", None, None, Vec::new()),
        Outcome::Converted {
            romaji,
            romaji_tags,
            kana_tags,
            ..
        } => {
            let written = romaji_tags.into_iter().chain(kana_tags).collect();
            ("converted", None, Some(romaji), written)
        }
        Outcome::Swapped {
            source_tag,
            romaji,
            romaji_tags,
        } => ("swapped", Some(source_tag), Some(romaji), romaji_tags),
    };
    Ok(Explanation {
        outcome,
        source_tag,
        romaji,
        written,
        tags: applied
            .element
            .tags
            .into_iter()
            .map(|t| (t.key, t.value))
            .collect(),
    })
}

pub fn explain_cmd(
    tag_args: &[String],
    config_path: Option<&Path>,
    sources: ReadingSources,
    json: bool,
) {
    let config = die!(load_config(config_path), "Error: {}");
    let tags = die!(parse_tag_args(tag_args), "Error: {}");
    let transliterator = die!(load_transliterator(sources), "Error: {}");
    let explanation = die!(explain(&config, &transliterator, tags), "Error: {}");

    if json {
        let out = die!(
            serde_json::to_string_pretty(&explanation),
            "Error encoding JSON: {}"
        );
        println!("{out}");
        return;
    }
    match (&explanation.source_tag, &explanation.romaji) {
        (Some(source), Some(romaji)) => {
            println!("{}: {romaji} (from {source})", explanation.outcome)
        }
        (None, Some(romaji)) => println!("{}: {romaji}", explanation.outcome),
        _ => println!("{}", explanation.outcome),
    }
    if !explanation.written.is_empty() {
        println!("written: {}", explanation.written.join(", "));
    }
    for (k, v) in &explanation.tags {
        println!("  {k}={v}");
    }
}
