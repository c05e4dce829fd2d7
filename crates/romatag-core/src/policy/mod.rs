//! The tag application policy: decides, per element, whether a name needs
//! romanizing, where the Latin and original-script names come from, and
//! which destination tags get written.

#[cfg(test)]
mod tests;

use tracing::{debug, debug_span};

use crate::config::TransliterationConfig;
use crate::normalize::normalize_hyphens;
use crate::tags::{first_present, TagMap, Tagged};
use crate::transliterate::{TransliterateError, TransliterateOptions, Transliterator};
use crate::unicode::{has_latin_chars, is_all_latin};

/// What `apply` did to one element. Observational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// None of the kana source tags is present.
    NoSource,
    /// The source name has no Japanese script in it.
    AlreadyLatin,
    /// No Latin name existed; one was generated.
    Converted {
        original: String,
        romaji: String,
        /// Romaji destination tags actually written.
        romaji_tags: Vec<String>,
        /// Kana destination tags actually written.
        kana_tags: Vec<String>,
    },
    /// An existing Latin name was copied to the destination tags.
    Swapped {
        source_tag: String,
        romaji: String,
        romaji_tags: Vec<String>,
    },
}

/// An element after the policy ran, and what happened to it.
#[derive(Debug)]
pub struct Applied<E> {
    pub element: E,
    pub outcome: Outcome,
}

/// An element the transliterator could not handle, handed back untouched
/// so the caller can decide whether to stop or pass it through.
#[derive(Debug)]
pub struct Rejected<E> {
    pub element: E,
    pub error: TransliterateError,
}

/// Tag policy bound to one run's configuration and transliterator.
pub struct TagPolicy<'a> {
    config: &'a TransliterationConfig,
    transliterator: &'a dyn Transliterator,
    options: TransliterateOptions,
}

impl<'a> TagPolicy<'a> {
    pub fn new(config: &'a TransliterationConfig, transliterator: &'a dyn Transliterator) -> Self {
        Self {
            config,
            transliterator,
            options: config.transliterate_options(),
        }
    }

    pub fn config(&self) -> &TransliterationConfig {
        self.config
    }

    /// Run the policy on one element.
    ///
    /// Unchanged elements are handed back as they came in. Otherwise the
    /// returned element carries a new tag list built from the working map:
    /// original tags in their original order, new keys appended.
    pub fn apply<E: Tagged>(&self, element: E) -> Result<Applied<E>, Rejected<E>> {
        let _span = debug_span!("apply", kind = %element.kind(), id = element.id()).entered();
        let config = self.config;
        let mut tags = TagMap::from_tags(element.tags());

        let Some(source) = first_present(&tags, &config.kana_source_tags) else {
            return Ok(Applied {
                element,
                outcome: Outcome::NoSource,
            });
        };
        let original = source.value.clone();

        // Never hand Latin text to the transliterator.
        if is_all_latin(&original) {
            return Ok(Applied {
                element,
                outcome: Outcome::AlreadyLatin,
            });
        }

        let outcome = match first_present(&tags, &config.romaji_source_tags) {
            None => {
                let raw = match self.transliterator.convert(
                    &original,
                    !has_latin_chars(&original),
                    &self.options,
                ) {
                    Ok(raw) => raw,
                    Err(error) => return Err(Rejected { element, error }),
                };
                let romaji = normalize_hyphens(&raw);
                debug!(%original, %romaji, "converted");

                // Romaji first, then kana: with overlapping lists and
                // clobber_kana on, the original script ends up in the tag.
                let romaji_tags =
                    write_dest(&mut tags, &config.romaji_dest_tags, &romaji, config.clobber_romaji);
                let kana_tags =
                    write_dest(&mut tags, &config.kana_dest_tags, &original, config.clobber_kana);
                Outcome::Converted {
                    original,
                    romaji,
                    romaji_tags,
                    kana_tags,
                }
            }
            Some(existing) => {
                let source_tag = existing.key.clone();
                let romaji = existing.value.clone();
                debug!(%source_tag, %romaji, "swapped");
                let romaji_tags =
                    write_dest(&mut tags, &config.romaji_dest_tags, &romaji, config.clobber_romaji);
                Outcome::Swapped {
                    source_tag,
                    romaji,
                    romaji_tags,
                }
            }
        };

        Ok(Applied {
            element: element.with_tags(tags.into_tags()),
            outcome,
        })
    }
}

/// Write `value` to each key in `keys`, in order, when the key is absent
/// or `clobber` is set. Returns the keys written.
fn write_dest(tags: &mut TagMap, keys: &[String], value: &str, clobber: bool) -> Vec<String> {
    let mut written = Vec::new();
    for key in keys {
        if clobber || !tags.contains_key(key) {
            tags.insert(key, value);
            written.push(key.clone());
        }
    }
    written
}
