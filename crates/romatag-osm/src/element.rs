use romatag_core::tags::{ElementKind, Tag, Tagged};

/// Document-level data carried from input to output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// Attributes of the `<bounds>` element, in document order.
    pub bounds: Option<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: ElementKind,
    pub id: i64,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Deleted nodes in history extracts carry no coordinate.
    Node { coord: Option<Coord> },
    Way { nodes: Vec<i64> },
    Relation { members: Vec<Member> },
}

/// A node, way or relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: i64,
    /// Metadata attributes other than id/lat/lon (version, timestamp,
    /// changeset, user, uid, visible), in document order.
    pub attrs: Vec<(String, String)>,
    pub tags: Vec<Tag>,
    pub body: Body,
}

impl Element {
    pub fn node(id: i64, coord: Option<Coord>, tags: Vec<Tag>) -> Self {
        Self {
            id,
            attrs: Vec::new(),
            tags,
            body: Body::Node { coord },
        }
    }

    pub fn way(id: i64, nodes: Vec<i64>, tags: Vec<Tag>) -> Self {
        Self {
            id,
            attrs: Vec::new(),
            tags,
            body: Body::Way { nodes },
        }
    }

    pub fn relation(id: i64, members: Vec<Member>, tags: Vec<Tag>) -> Self {
        Self {
            id,
            attrs: Vec::new(),
            tags,
            body: Body::Relation { members },
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

impl Tagged for Element {
    fn kind(&self) -> ElementKind {
        match self.body {
            Body::Node { .. } => ElementKind::Node,
            Body::Way { .. } => ElementKind::Way,
            Body::Relation { .. } => ElementKind::Relation,
        }
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

pub(crate) fn kind_from_str(s: &str) -> Option<ElementKind> {
    match s {
        "node" => Some(ElementKind::Node),
        "way" => Some(ElementKind::Way),
        "relation" => Some(ElementKind::Relation),
        _ => None,
    }
}
