use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::config::TransliterationConfig;
use crate::tags::{ElementKind, Tag};
use crate::transliterate::KanaTransliterator;

#[derive(Debug, Clone, PartialEq)]
struct TestElement {
    id: i64,
    tags: Vec<Tag>,
}

impl Tagged for TestElement {
    fn kind(&self) -> ElementKind {
        ElementKind::Node
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn tags(&self) -> &[Tag] {
        &self.tags
    }
    fn with_tags(self, tags: Vec<Tag>) -> Self {
        Self { tags, ..self }
    }
}

fn element(tags: &[(&str, &str)]) -> TestElement {
    TestElement {
        id: 42,
        tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
    }
}

fn tag<'e>(e: &'e TestElement, key: &str) -> Option<&'e str> {
    e.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
}

/// Returns a fixed string and counts calls.
struct Recording {
    output: &'static str,
    calls: AtomicUsize,
    last_title: AtomicUsize,
}

impl Recording {
    fn new(output: &'static str) -> Self {
        Self {
            output,
            calls: AtomicUsize::new(0),
            last_title: AtomicUsize::new(usize::MAX),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transliterator for Recording {
    fn convert(
        &self,
        _text: &str,
        title_case: bool,
        _options: &TransliterateOptions,
    ) -> Result<String, TransliterateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_title.store(title_case as usize, Ordering::SeqCst);
        Ok(self.output.to_string())
    }
}

struct Failing;

impl Transliterator for Failing {
    fn convert(
        &self,
        text: &str,
        _title_case: bool,
        _options: &TransliterateOptions,
    ) -> Result<String, TransliterateError> {
        Err(TransliterateError::UnknownReading {
            text: text.to_string(),
            ch: text.chars().next().unwrap_or('?'),
        })
    }
}

#[test]
fn no_source_tag_is_unchanged() {
    let config = TransliterationConfig::default();
    let t = Recording::new("x");
    let policy = TagPolicy::new(&config, &t);
    let input = element(&[("highway", "bus_stop"), ("ref", "12")]);

    let applied = policy.apply(input.clone()).unwrap();
    assert_eq!(applied.outcome, Outcome::NoSource);
    assert_eq!(applied.element, input);
    assert_eq!(t.calls(), 0);
}

#[test]
fn latin_source_is_unchanged() {
    let config = TransliterationConfig::default();
    let t = Recording::new("x");
    let policy = TagPolicy::new(&config, &t);
    let input = element(&[("name", "Shibuya")]);

    let applied = policy.apply(input.clone()).unwrap();
    assert_eq!(applied.outcome, Outcome::AlreadyLatin);
    assert_eq!(applied.element, input);
    assert_eq!(t.calls(), 0);
}

#[test]
fn source_precedence_follows_config_order() {
    // "name" is Latin, but "name:ja" comes first in this config.
    let mut config = TransliterationConfig::default();
    config.kana_source_tags = vec!["name:ja".into(), "name".into()];
    let t = Recording::new("Tokyo");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy
        .apply(element(&[("name", "Tokyo"), ("name:ja", "東京")]))
        .unwrap();
    assert!(matches!(applied.outcome, Outcome::Converted { ref original, .. } if original == "東京"));
    assert_eq!(t.calls(), 1);
}

#[test]
fn conversion_writes_romaji_and_kana_dest_tags() {
    let config = TransliterationConfig::default();
    let t = Recording::new("Tokyo");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy.apply(element(&[("name", "東京")])).unwrap();
    let out = &applied.element;
    assert_eq!(tag(out, "name"), Some("東京"));
    assert_eq!(tag(out, "name:ja_rm"), Some("Tokyo"));
    assert_eq!(tag(out, "int_name"), Some("Tokyo"));
    assert_eq!(tag(out, "name:ja"), Some("東京"));
    assert_eq!(
        applied.outcome,
        Outcome::Converted {
            original: "東京".into(),
            romaji: "Tokyo".into(),
            romaji_tags: vec!["name:ja_rm".into(), "int_name".into()],
            kana_tags: vec!["name:ja".into()],
        }
    );
    // original tags keep their position, new keys are appended
    let keys: Vec<&str> = out.tags.iter().map(|t| t.key.as_str()).collect();
    assert_eq!(keys, ["name", "name:ja_rm", "int_name", "name:ja"]);
}

#[test]
fn title_case_only_without_latin_letters() {
    let config = TransliterationConfig::default();
    let t = Recording::new("x");
    let policy = TagPolicy::new(&config, &t);

    policy.apply(element(&[("name", "東京")])).unwrap();
    assert_eq!(t.last_title.load(Ordering::SeqCst), 1);
    policy.apply(element(&[("name", "JR東京")])).unwrap();
    assert_eq!(t.last_title.load(Ordering::SeqCst), 0);
}

#[test]
fn converted_output_is_normalized() {
    let config = TransliterationConfig::default();
    let t = Recording::new("Shibuya - ku");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy.apply(element(&[("name", "渋谷区")])).unwrap();
    assert_eq!(tag(&applied.element, "name:ja_rm"), Some("Shibuya-ku"));
}

#[test]
fn swap_never_calls_transliterator() {
    let config = TransliterationConfig::default();
    let t = Recording::new("WRONG");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy
        .apply(element(&[("name", "東京"), ("name:en", "Tokyo Metropolis")]))
        .unwrap();
    assert_eq!(t.calls(), 0);
    let out = &applied.element;
    assert_eq!(tag(out, "name:ja_rm"), Some("Tokyo Metropolis"));
    assert_eq!(tag(out, "int_name"), Some("Tokyo Metropolis"));
    assert_eq!(tag(out, "name:ja"), None);
    assert_eq!(
        applied.outcome,
        Outcome::Swapped {
            source_tag: "name:en".into(),
            romaji: "Tokyo Metropolis".into(),
            romaji_tags: vec!["name:ja_rm".into(), "int_name".into()],
        }
    );
}

#[test]
fn clobber_off_preserves_existing_values() {
    let config = TransliterationConfig::default();
    let t = Recording::new("Tokyo");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy
        .apply(element(&[("name", "東京"), ("name:ja", "とうきょう")]))
        .unwrap();
    assert_eq!(tag(&applied.element, "name:ja"), Some("とうきょう"));
    match applied.outcome {
        Outcome::Converted { kana_tags, .. } => assert!(kana_tags.is_empty()),
        other => panic!("expected Converted, got {other:?}"),
    }
}

#[test]
fn clobber_off_keeps_existing_romaji_dest() {
    let mut config = TransliterationConfig::default();
    config.romaji_source_tags = vec!["name:en".into()];
    let t = Recording::new("Tokyo");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy
        .apply(element(&[("name", "東京"), ("int_name", "Tôkyô")]))
        .unwrap();
    assert_eq!(t.calls(), 1);
    let out = &applied.element;
    assert_eq!(tag(out, "int_name"), Some("Tôkyô"));
    assert_eq!(tag(out, "name:ja_rm"), Some("Tokyo"));
    match applied.outcome {
        Outcome::Converted { romaji_tags, .. } => {
            assert_eq!(romaji_tags, vec!["name:ja_rm".to_string()]);
        }
        other => panic!("expected Converted, got {other:?}"),
    }
}

#[test]
fn clobber_on_overwrites() {
    let mut config = TransliterationConfig::default();
    config.clobber_romaji = true;
    config.clobber_kana = true;
    config.romaji_source_tags = vec!["name:en".into()];
    let t = Recording::new("Tokyo");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy
        .apply(element(&[
            ("name", "東京"),
            ("name:ja", "とうきょう"),
            ("int_name", "Tôkyô"),
        ]))
        .unwrap();
    let out = &applied.element;
    assert_eq!(tag(out, "name:ja"), Some("東京"));
    assert_eq!(tag(out, "int_name"), Some("Tokyo"));
    assert_eq!(tag(out, "name:ja_rm"), Some("Tokyo"));
}

#[test]
fn swap_respects_clobber_flag() {
    let config = TransliterationConfig::default();
    let t = Recording::new("x");
    let policy = TagPolicy::new(&config, &t);

    let applied = policy
        .apply(element(&[("name", "大阪"), ("name:ja_rm", "Osaka-shi")]))
        .unwrap();
    let out = &applied.element;
    assert_eq!(tag(out, "name:ja_rm"), Some("Osaka-shi"));
    assert_eq!(tag(out, "int_name"), Some("Osaka-shi"));
    assert_eq!(t.calls(), 0);
}

#[test]
fn overlapping_dest_lists_write_romaji_then_kana() {
    let mut config = TransliterationConfig::default();
    config.romaji_dest_tags = vec!["name".into()];
    config.kana_dest_tags = vec!["name".into()];
    config.clobber_romaji = true;
    let t = Recording::new("Tokyo");

    // kana write sees the key present and does not clobber
    let policy = TagPolicy::new(&config, &t);
    let applied = policy.apply(element(&[("name", "東京")])).unwrap();
    assert_eq!(tag(&applied.element, "name"), Some("Tokyo"));

    // with clobber_kana the kana write runs last and wins
    config.clobber_kana = true;
    let policy = TagPolicy::new(&config, &t);
    let applied = policy.apply(element(&[("name", "東京")])).unwrap();
    assert_eq!(tag(&applied.element, "name"), Some("東京"));
}

#[test]
fn transliterator_failure_propagates() {
    let config = TransliterationConfig::default();
    let policy = TagPolicy::new(&config, &Failing);
    let input = element(&[("name", "鬱")]);
    let rejected = policy.apply(input.clone()).unwrap_err();
    assert!(matches!(
        rejected.error,
        TransliterateError::UnknownReading { ch: '鬱', .. }
    ));
    assert_eq!(rejected.element, input);

    // the swap branch never reaches the transliterator
    let applied = policy
        .apply(element(&[("name", "鬱"), ("int_name", "Utsu")]))
        .unwrap();
    assert!(matches!(applied.outcome, Outcome::Swapped { .. }));
}

// End-to-end scenarios with the built-in transliterator.

#[test]
fn scenario_tokyo_conversion() {
    let config = TransliterationConfig::default();
    let t = KanaTransliterator::default();
    let policy = TagPolicy::new(&config, &t);
    let out = policy.apply(element(&[("name", "東京")])).unwrap().element;
    assert_eq!(tag(&out, "name:ja_rm"), Some("Tokyo"));
    assert_eq!(tag(&out, "int_name"), Some("Tokyo"));
    assert_eq!(tag(&out, "name:ja"), Some("東京"));
}

#[test]
fn scenario_tokyo_swap() {
    let config = TransliterationConfig::default();
    let t = KanaTransliterator::default();
    let policy = TagPolicy::new(&config, &t);
    let out = policy
        .apply(element(&[("name", "東京"), ("int_name", "Tokyo")]))
        .unwrap()
        .element;
    assert_eq!(tag(&out, "name:ja_rm"), Some("Tokyo"));
    assert_eq!(tag(&out, "int_name"), Some("Tokyo"));
    assert_eq!(tag(&out, "name:ja"), None);
}

#[test]
fn scenario_latin_name() {
    let config = TransliterationConfig::default();
    let t = KanaTransliterator::default();
    let policy = TagPolicy::new(&config, &t);
    let input = element(&[("name", "Shibuya")]);
    let applied = policy.apply(input.clone()).unwrap();
    assert_eq!(applied.element, input);
}

#[test]
fn scenario_ward_name_suffix() {
    let config = TransliterationConfig::default();
    let t = KanaTransliterator::default();
    let policy = TagPolicy::new(&config, &t);
    let out = policy.apply(element(&[("name", "渋谷区")])).unwrap().element;
    assert_eq!(tag(&out, "name:ja_rm"), Some("Shibuya-ku"));
}
