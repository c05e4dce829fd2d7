//! Tags, the per-element working tag map, and precedence lookup.

use std::fmt;

/// A single OSM key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the tag policy needs from a map element.
///
/// `with_tags` consumes the element and hands back a new one carrying the
/// replacement tag list; everything else about the element is kept as is.
pub trait Tagged {
    fn kind(&self) -> ElementKind;
    fn id(&self) -> i64;
    fn tags(&self) -> &[Tag];
    fn with_tags(self, tags: Vec<Tag>) -> Self;
}

/// Working copy of an element's tags, keyed by tag key.
///
/// Keeps first-insertion order; `insert` on an existing key replaces the
/// value in place. Element tag lists are short, so lookups scan linearly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: Vec<Tag>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: &[Tag]) -> Self {
        let mut map = Self {
            entries: Vec::with_capacity(tags.len()),
        };
        for tag in tags {
            map.insert(&tag.key, &tag.value);
        }
        map
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.entries.iter().find(|t| t.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|t| t.key == key) {
            Some(existing) => existing.value = value.to_string(),
            None => self.entries.push(Tag::new(key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.entries.iter()
    }

    pub fn into_tags(self) -> Vec<Tag> {
        self.entries
    }
}

/// Return the tag for the earliest key in `keys` that `tags` contains.
///
/// Precedence is entirely the caller's: `["name:ja", "name"]` prefers
/// `name:ja` and falls back to `name`.
pub fn first_present<'a, K: AsRef<str>>(tags: &'a TagMap, keys: &[K]) -> Option<&'a Tag> {
    keys.iter().find_map(|k| tags.get(k.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TagMap {
        TagMap::from_tags(&[
            Tag::new("name", "東京"),
            Tag::new("name:en", "Tokyo"),
            Tag::new("highway", "bus_stop"),
        ])
    }

    #[test]
    fn first_present_respects_key_order() {
        let tags = sample();
        let hit = first_present(&tags, &["name:ja", "name:en", "name"]).unwrap();
        assert_eq!(hit.key, "name:en");
        let hit = first_present(&tags, &["name", "name:en"]).unwrap();
        assert_eq!(hit.value, "東京");
    }

    #[test]
    fn first_present_absent() {
        let tags = sample();
        assert!(first_present(&tags, &["int_name", "name:ja_rm"]).is_none());
        assert!(first_present::<&str>(&tags, &[]).is_none());
    }

    #[test]
    fn first_present_accepts_owned_keys() {
        let tags = sample();
        let keys = vec!["missing".to_string(), "highway".to_string()];
        assert_eq!(first_present(&tags, &keys).unwrap().value, "bus_stop");
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut tags = sample();
        tags.insert("name", "Tokyo");
        tags.insert("name:ja", "東京");
        let keys: Vec<&str> = tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["name", "name:en", "highway", "name:ja"]);
        assert_eq!(tags.get("name").unwrap().value, "Tokyo");
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn duplicate_input_keys_last_write_wins() {
        let tags = TagMap::from_tags(&[Tag::new("name", "a"), Tag::new("name", "b")]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("name").unwrap().value, "b");
    }
}
