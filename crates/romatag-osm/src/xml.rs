use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use romatag_core::pipeline::{MapReader, MapWriter, StoreError};
use romatag_core::tags::{ElementKind, Tag};
use tracing::{debug, trace};

use crate::element::{kind_from_str, Body, Coord, Element, Header, Member};

const GENERATOR: &str = "romatag";

fn xml_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Xml(e.to_string())
}

fn malformed(element: impl Into<String>, reason: impl Into<String>) -> StoreError {
    StoreError::Malformed {
        element: element.into(),
        reason: reason.into(),
    }
}

fn owned_attrs(e: &BytesStart) -> Result<Vec<(String, String)>, StoreError> {
    let mut out = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn take_attr(attrs: &mut Vec<(String, String)>, key: &str) -> Option<String> {
    let pos = attrs.iter().position(|(k, _)| k == key)?;
    Some(attrs.remove(pos).1)
}

fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Element whose start tag has been read but whose end tag has not.
#[derive(Debug)]
struct Partial {
    kind: ElementKind,
    id: i64,
    attrs: Vec<(String, String)>,
    coord: Option<Coord>,
    tags: Vec<Tag>,
    nodes: Vec<i64>,
    members: Vec<Member>,
}

impl Partial {
    fn start(kind: ElementKind, mut attrs: Vec<(String, String)>) -> Result<Self, StoreError> {
        let raw_id = take_attr(&mut attrs, "id")
            .ok_or_else(|| malformed(kind.as_str(), "missing id attribute"))?;
        let id = raw_id
            .parse::<i64>()
            .map_err(|_| malformed(kind.as_str(), format!("invalid id {raw_id:?}")))?;
        let label = format!("{kind} {id}");

        let coord = if kind == ElementKind::Node {
            let lat = take_attr(&mut attrs, "lat");
            let lon = take_attr(&mut attrs, "lon");
            match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Coord {
                    lat: parse_degrees(&label, "lat", &lat)?,
                    lon: parse_degrees(&label, "lon", &lon)?,
                }),
                (None, None) => None,
                _ => return Err(malformed(label, "lat and lon must appear together")),
            }
        } else {
            None
        };

        Ok(Self {
            kind,
            id,
            attrs,
            coord,
            tags: Vec::new(),
            nodes: Vec::new(),
            members: Vec::new(),
        })
    }

    fn label(&self) -> String {
        format!("{} {}", self.kind, self.id)
    }

    fn child(&mut self, e: &BytesStart) -> Result<(), StoreError> {
        match e.name().as_ref() {
            b"tag" => {
                let attrs = owned_attrs(e)?;
                let key = find_attr(&attrs, "k")
                    .ok_or_else(|| malformed(self.label(), "tag without k"))?;
                let value = find_attr(&attrs, "v").unwrap_or_default();
                self.tags.push(Tag::new(key, value));
            }
            b"nd" if self.kind == ElementKind::Way => {
                let attrs = owned_attrs(e)?;
                let raw = find_attr(&attrs, "ref")
                    .ok_or_else(|| malformed(self.label(), "nd without ref"))?;
                let id = raw
                    .parse::<i64>()
                    .map_err(|_| malformed(self.label(), format!("invalid nd ref {raw:?}")))?;
                self.nodes.push(id);
            }
            b"member" if self.kind == ElementKind::Relation => {
                let attrs = owned_attrs(e)?;
                let raw_kind = find_attr(&attrs, "type").unwrap_or_default();
                let kind = kind_from_str(raw_kind).ok_or_else(|| {
                    malformed(self.label(), format!("invalid member type {raw_kind:?}"))
                })?;
                let raw = find_attr(&attrs, "ref")
                    .ok_or_else(|| malformed(self.label(), "member without ref"))?;
                let id = raw
                    .parse::<i64>()
                    .map_err(|_| malformed(self.label(), format!("invalid member ref {raw:?}")))?;
                let role = find_attr(&attrs, "role").unwrap_or_default().to_string();
                self.members.push(Member { kind, id, role });
            }
            other => {
                trace!(
                    element = %self.label(),
                    child = %String::from_utf8_lossy(other),
                    "ignoring child"
                );
            }
        }
        Ok(())
    }

    fn finish(self) -> Element {
        let body = match self.kind {
            ElementKind::Node => Body::Node { coord: self.coord },
            ElementKind::Way => Body::Way { nodes: self.nodes },
            ElementKind::Relation => Body::Relation {
                members: self.members,
            },
        };
        Element {
            id: self.id,
            attrs: self.attrs,
            tags: self.tags,
            body,
        }
    }
}

fn parse_degrees(label: &str, name: &str, raw: &str) -> Result<f64, StoreError> {
    raw.parse::<f64>()
        .map_err(|_| malformed(label, format!("invalid {name} {raw:?}")))
}

/// Streaming OSM XML reader.
///
/// Elements are produced one at a time in document order; the file is
/// never loaded whole. `<bounds>` is captured into the [`Header`] when the
/// reader is opened.
pub struct XmlReader<R: BufRead = BufReader<File>> {
    reader: Reader<R>,
    buf: Vec<u8>,
    header: Header,
    /// Element opened while scanning the header.
    pending: Option<Partial>,
    /// Self-closing element seen while scanning the header.
    ready: Option<Element>,
    done: bool,
}

impl XmlReader {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        debug!(path = %path.display(), "reading OSM XML");
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: BufRead> XmlReader<R> {
    pub fn from_reader(inner: R) -> Result<Self, StoreError> {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        let mut this = Self {
            reader,
            buf: Vec::new(),
            header: Header::default(),
            pending: None,
            ready: None,
            done: false,
        };
        this.scan_header()?;
        Ok(this)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Read up to the first element so the header is known before any
    /// output is written.
    fn scan_header(&mut self) -> Result<(), StoreError> {
        let mut buf = std::mem::take(&mut self.buf);
        let result = loop {
            buf.clear();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => break Err(xml_err(e)),
            };
            match event {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"bounds" => {
                    match owned_attrs(&e) {
                        Ok(attrs) => self.header.bounds = Some(attrs),
                        Err(err) => break Err(err),
                    }
                }
                Event::Start(e) => {
                    match open_element(&e) {
                        Ok(Some(partial)) => {
                            self.pending = Some(partial);
                            break Ok(());
                        }
                        Ok(None) => {}
                        Err(err) => break Err(err),
                    }
                }
                Event::Empty(e) => match open_element(&e) {
                    Ok(Some(partial)) => {
                        self.ready = Some(partial.finish());
                        break Ok(());
                    }
                    Ok(None) => {}
                    Err(err) => break Err(err),
                },
                Event::Eof => {
                    self.done = true;
                    break Ok(());
                }
                _ => {}
            }
        };
        self.buf = buf;
        result
    }

    fn read_next(&mut self, buf: &mut Vec<u8>) -> Result<Option<Element>, StoreError> {
        if let Some(element) = self.ready.take() {
            return Ok(Some(element));
        }
        if self.done {
            return Ok(None);
        }
        let mut current = self.pending.take();
        loop {
            buf.clear();
            match self.reader.read_event_into(buf).map_err(xml_err)? {
                Event::Start(e) => {
                    if let Some(partial) = current.as_mut() {
                        partial.child(&e)?;
                    } else if let Some(partial) = open_element(&e)? {
                        current = Some(partial);
                    }
                }
                Event::Empty(e) => {
                    if let Some(partial) = current.as_mut() {
                        partial.child(&e)?;
                    } else if let Some(partial) = open_element(&e)? {
                        return Ok(Some(partial.finish()));
                    }
                }
                Event::End(e) => {
                    let closes = current
                        .as_ref()
                        .is_some_and(|p| e.name().as_ref() == p.kind.as_str().as_bytes());
                    if closes {
                        if let Some(partial) = current.take() {
                            return Ok(Some(partial.finish()));
                        }
                    }
                }
                Event::Eof => {
                    self.done = true;
                    return match current {
                        Some(partial) => Err(malformed(
                            partial.label(),
                            "unexpected end of file inside element",
                        )),
                        None => Ok(None),
                    };
                }
                _ => {}
            }
        }
    }
}

/// Start a new element if `e` opens a node, way or relation.
fn open_element(e: &BytesStart) -> Result<Option<Partial>, StoreError> {
    let kind = match e.name().as_ref() {
        b"node" => ElementKind::Node,
        b"way" => ElementKind::Way,
        b"relation" => ElementKind::Relation,
        _ => return Ok(None),
    };
    Partial::start(kind, owned_attrs(e)?).map(Some)
}

impl<R: BufRead> MapReader for XmlReader<R> {
    type Element = Element;

    fn next_element(&mut self) -> Result<Option<Element>, StoreError> {
        let mut buf = std::mem::take(&mut self.buf);
        let result = self.read_next(&mut buf);
        self.buf = buf;
        result
    }
}

/// OSM XML writer, `<osm version="0.6" generator="romatag">`.
pub struct XmlWriter<W: Write = BufWriter<File>> {
    writer: Writer<W>,
    finished: bool,
}

impl XmlWriter {
    pub fn create(path: &Path, header: &Header) -> Result<Self, StoreError> {
        let file = File::create(path)?;
        debug!(path = %path.display(), "writing OSM XML");
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> XmlWriter<W> {
    pub fn new(inner: W, header: &Header) -> Result<Self, StoreError> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        let mut osm = BytesStart::new("osm");
        osm.push_attribute(("version", "0.6"));
        osm.push_attribute(("generator", GENERATOR));
        writer.write_event(Event::Start(osm)).map_err(xml_err)?;
        if let Some(bounds) = &header.bounds {
            let mut start = BytesStart::new("bounds");
            for (k, v) in bounds {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        }
        Ok(Self {
            writer,
            finished: false,
        })
    }

    /// The underlying sink, for callers that wrote to memory.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn empty(&mut self, start: BytesStart) -> Result<(), StoreError> {
        self.writer.write_event(Event::Empty(start)).map_err(xml_err)
    }
}

impl<W: Write> MapWriter for XmlWriter<W> {
    type Element = Element;

    fn write_element(&mut self, element: &Element) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "write after finish",
            )));
        }
        let name = match element.body {
            Body::Node { .. } => "node",
            Body::Way { .. } => "way",
            Body::Relation { .. } => "relation",
        };
        let mut start = BytesStart::new(name);
        start.push_attribute(("id", element.id.to_string().as_str()));
        for (k, v) in &element.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if let Body::Node {
            coord: Some(coord),
        } = &element.body
        {
            start.push_attribute(("lat", coord.lat.to_string().as_str()));
            start.push_attribute(("lon", coord.lon.to_string().as_str()));
        }

        let has_children = !element.tags.is_empty()
            || match &element.body {
                Body::Node { .. } => false,
                Body::Way { nodes } => !nodes.is_empty(),
                Body::Relation { members } => !members.is_empty(),
            };
        if !has_children {
            return self.empty(start);
        }

        self.writer.write_event(Event::Start(start)).map_err(xml_err)?;
        match &element.body {
            Body::Node { .. } => {}
            Body::Way { nodes } => {
                for id in nodes {
                    let mut nd = BytesStart::new("nd");
                    nd.push_attribute(("ref", id.to_string().as_str()));
                    self.empty(nd)?;
                }
            }
            Body::Relation { members } => {
                for member in members {
                    let mut m = BytesStart::new("member");
                    m.push_attribute(("type", member.kind.as_str()));
                    m.push_attribute(("ref", member.id.to_string().as_str()));
                    m.push_attribute(("role", member.role.as_str()));
                    self.empty(m)?;
                }
            }
        }
        for tag in &element.tags {
            let mut t = BytesStart::new("tag");
            t.push_attribute(("k", tag.key.as_str()));
            t.push_attribute(("v", tag.value.as_str()));
            self.empty(t)?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        if self.finished {
            return Ok(());
        }
        self.writer
            .write_event(Event::End(BytesEnd::new("osm")))
            .map_err(xml_err)?;
        self.writer.get_mut().write_all(b"\n")?;
        self.writer.get_mut().flush()?;
        self.finished = true;
        Ok(())
    }
}
