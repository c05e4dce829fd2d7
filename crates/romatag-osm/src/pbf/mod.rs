//! OSM PBF reader and writer.
//!
//! The file is a sequence of length-prefixed `BlobHeader`/`Blob` pairs:
//! one `OSMHeader` blob, then `OSMData` blobs holding zlib-compressed
//! `PrimitiveBlock`s. Both plain and dense nodes are read; nodes are
//! written plain. Element metadata (`Info`) maps to the same attributes
//! the XML store uses: visible, version, changeset, timestamp, user, uid.

mod proto;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use prost::Message;
use romatag_core::pipeline::{MapReader, MapWriter, StoreError};
use romatag_core::tags::{ElementKind, Tag, Tagged};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::element::{Body, Coord, Element, Header, Member};
use proto::{
    Blob, BlobHeader, DenseNodes, HeaderBBox, HeaderBlock, Info, PrimitiveBlock, PrimitiveGroup,
    StringTable, BLOB_OSM_DATA, BLOB_OSM_HEADER, FEATURE_DENSE, FEATURE_SCHEMA, MAX_BLOB_SIZE,
    MAX_HEADER_SIZE, MEMBER_NODE, MEMBER_RELATION, MEMBER_WAY,
};

const NANO: f64 = 1e9;
/// Nanodegrees per coordinate unit when a block does not say.
const DEFAULT_GRANULARITY: i64 = 100;
/// Milliseconds per timestamp unit when a block does not say.
const DEFAULT_DATE_GRANULARITY: i64 = 1000;
/// Elements per written `PrimitiveBlock`.
const BLOCK_ELEMENTS: usize = 8000;
const WRITING_PROGRAM: &str = "romatag";
const FEATURE_HISTORY: &str = "HistoricalInformation";

fn pbf_err(e: impl fmt::Display) -> StoreError {
    StoreError::Pbf(e.to_string())
}

fn malformed(element: &Element, reason: String) -> StoreError {
    StoreError::Malformed {
        element: format!("{} {}", element.kind(), element.id),
        reason,
    }
}

fn unpack(blob: Blob) -> Result<Vec<u8>, StoreError> {
    if let Some(raw) = blob.raw {
        return Ok(raw);
    }
    let Some(compressed) = blob.zlib_data else {
        return Err(pbf_err("unsupported blob compression (only raw and zlib are)"));
    };
    let capacity = blob
        .raw_size
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
        .min(MAX_BLOB_SIZE);
    let mut out = Vec::with_capacity(capacity);
    ZlibDecoder::new(compressed.as_slice())
        .take(MAX_BLOB_SIZE as u64 + 1)
        .read_to_end(&mut out)?;
    if out.len() > MAX_BLOB_SIZE {
        return Err(pbf_err("blob larger than 32 MiB"));
    }
    Ok(out)
}

fn degrees_from_nano(nano: i64) -> f64 {
    nano as f64 / NANO
}

fn read_header_block(data: &[u8]) -> Result<Header, StoreError> {
    let block = HeaderBlock::decode(data).map_err(pbf_err)?;
    for feature in &block.required_features {
        if ![FEATURE_SCHEMA, FEATURE_DENSE, FEATURE_HISTORY].contains(&feature.as_str()) {
            return Err(pbf_err(format!("unsupported required feature {feature:?}")));
        }
    }
    debug!(
        writer = block.writingprogram.as_deref().unwrap_or("unknown"),
        "PBF header"
    );
    let bounds = block.bbox.map(|b| {
        vec![
            ("minlat".to_string(), degrees_from_nano(b.bottom).to_string()),
            ("minlon".to_string(), degrees_from_nano(b.left).to_string()),
            ("maxlat".to_string(), degrees_from_nano(b.top).to_string()),
            ("maxlon".to_string(), degrees_from_nano(b.right).to_string()),
        ]
    });
    Ok(Header { bounds })
}

/// Decoding state shared by every group of one `PrimitiveBlock`.
struct BlockDecoder {
    strings: Vec<String>,
    granularity: i64,
    date_granularity: i64,
    lat_offset: i64,
    lon_offset: i64,
}

impl BlockDecoder {
    fn new(block: &PrimitiveBlock) -> Self {
        Self {
            strings: block
                .stringtable
                .s
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
            granularity: block.granularity.map_or(DEFAULT_GRANULARITY, i64::from),
            date_granularity: block
                .date_granularity
                .map_or(DEFAULT_DATE_GRANULARITY, i64::from),
            lat_offset: block.lat_offset.unwrap_or(0),
            lon_offset: block.lon_offset.unwrap_or(0),
        }
    }

    fn string(&self, index: i64) -> Result<&str, StoreError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
            .ok_or_else(|| pbf_err(format!("string index {index} out of range")))
    }

    fn tags(&self, keys: &[u32], vals: &[u32]) -> Result<Vec<Tag>, StoreError> {
        if keys.len() != vals.len() {
            return Err(pbf_err("tag keys and values differ in length"));
        }
        keys.iter()
            .zip(vals)
            .map(|(&k, &v)| {
                Ok(Tag::new(
                    self.string(i64::from(k))?,
                    self.string(i64::from(v))?,
                ))
            })
            .collect()
    }

    fn coord(&self, lat: i64, lon: i64) -> Coord {
        Coord {
            lat: degrees_from_nano(self.lat_offset + self.granularity * lat),
            lon: degrees_from_nano(self.lon_offset + self.granularity * lon),
        }
    }

    fn timestamp(&self, raw: i64) -> Result<String, StoreError> {
        let seconds = (raw * self.date_granularity).div_euclid(1000);
        OffsetDateTime::from_unix_timestamp(seconds)
            .map_err(pbf_err)?
            .format(&Rfc3339)
            .map_err(pbf_err)
    }

    fn info_attrs(&self, info: Option<&Info>) -> Result<Vec<(String, String)>, StoreError> {
        let mut attrs = Vec::new();
        let Some(info) = info else {
            return Ok(attrs);
        };
        if info.visible == Some(false) {
            attrs.push(("visible".to_string(), "false".to_string()));
        }
        if let Some(version) = info.version.filter(|v| *v >= 0) {
            attrs.push(("version".to_string(), version.to_string()));
        }
        if let Some(changeset) = info.changeset {
            attrs.push(("changeset".to_string(), changeset.to_string()));
        }
        if let Some(ts) = info.timestamp {
            attrs.push(("timestamp".to_string(), self.timestamp(ts)?));
        }
        if let Some(sid) = info.user_sid {
            let user = self.string(i64::from(sid))?;
            if !user.is_empty() {
                attrs.push(("user".to_string(), user.to_string()));
            }
        }
        if let Some(uid) = info.uid {
            attrs.push(("uid".to_string(), uid.to_string()));
        }
        Ok(attrs)
    }

    fn dense(&self, dense: &DenseNodes, out: &mut VecDeque<Element>) -> Result<(), StoreError> {
        let n = dense.id.len();
        if dense.lat.len() != n || dense.lon.len() != n {
            return Err(pbf_err("dense node columns differ in length"));
        }
        let mut kv = dense.keys_vals.iter().copied();
        let (mut id, mut lat, mut lon) = (0i64, 0i64, 0i64);
        let (mut ts, mut changeset, mut uid, mut sid) = (0i64, 0i64, 0i32, 0i32);

        for i in 0..n {
            id += dense.id[i];
            lat += dense.lat[i];
            lon += dense.lon[i];

            let mut tags = Vec::new();
            while let Some(k) = kv.next() {
                if k == 0 {
                    break;
                }
                let v = kv
                    .next()
                    .ok_or_else(|| pbf_err("dense tag key without value"))?;
                tags.push(Tag::new(
                    self.string(i64::from(k))?,
                    self.string(i64::from(v))?,
                ));
            }

            let attrs = match &dense.denseinfo {
                Some(di) => {
                    let mut info = Info {
                        version: di.version.get(i).copied(),
                        visible: di.visible.get(i).copied(),
                        ..Info::default()
                    };
                    if let Some(d) = di.timestamp.get(i) {
                        ts += d;
                        info.timestamp = Some(ts);
                    }
                    if let Some(d) = di.changeset.get(i) {
                        changeset += d;
                        info.changeset = Some(changeset);
                    }
                    if let Some(d) = di.uid.get(i) {
                        uid += d;
                        info.uid = Some(uid);
                    }
                    if let Some(d) = di.user_sid.get(i) {
                        sid += d;
                        info.user_sid = u32::try_from(sid).ok();
                    }
                    self.info_attrs(Some(&info))?
                }
                None => Vec::new(),
            };

            out.push_back(Element {
                id,
                attrs,
                tags,
                body: Body::Node {
                    coord: Some(self.coord(lat, lon)),
                },
            });
        }
        Ok(())
    }

    fn group(&self, group: &PrimitiveGroup, out: &mut VecDeque<Element>) -> Result<(), StoreError> {
        for node in &group.nodes {
            out.push_back(Element {
                id: node.id,
                attrs: self.info_attrs(node.info.as_ref())?,
                tags: self.tags(&node.keys, &node.vals)?,
                body: Body::Node {
                    coord: Some(self.coord(node.lat, node.lon)),
                },
            });
        }
        if let Some(dense) = &group.dense {
            self.dense(dense, out)?;
        }
        for way in &group.ways {
            let mut node = 0i64;
            let nodes = way
                .refs
                .iter()
                .map(|d| {
                    node += d;
                    node
                })
                .collect();
            out.push_back(Element {
                id: way.id,
                attrs: self.info_attrs(way.info.as_ref())?,
                tags: self.tags(&way.keys, &way.vals)?,
                body: Body::Way { nodes },
            });
        }
        for rel in &group.relations {
            if rel.memids.len() != rel.types.len() || rel.memids.len() != rel.roles_sid.len() {
                return Err(pbf_err(format!(
                    "relation {}: member columns differ in length",
                    rel.id
                )));
            }
            let mut member = 0i64;
            let mut members = Vec::with_capacity(rel.memids.len());
            for ((d, &kind), &role) in rel.memids.iter().zip(&rel.types).zip(&rel.roles_sid) {
                member += d;
                let kind = match kind {
                    MEMBER_NODE => ElementKind::Node,
                    MEMBER_WAY => ElementKind::Way,
                    MEMBER_RELATION => ElementKind::Relation,
                    other => {
                        return Err(pbf_err(format!(
                            "relation {}: unknown member type {other}",
                            rel.id
                        )))
                    }
                };
                members.push(Member {
                    kind,
                    id: member,
                    role: self.string(i64::from(role))?.to_string(),
                });
            }
            out.push_back(Element {
                id: rel.id,
                attrs: self.info_attrs(rel.info.as_ref())?,
                tags: self.tags(&rel.keys, &rel.vals)?,
                body: Body::Relation { members },
            });
        }
        Ok(())
    }
}

/// Streaming OSM PBF reader. One data block is decoded at a time.
pub struct PbfReader<R: BufRead = BufReader<File>> {
    inner: R,
    header: Header,
    queue: VecDeque<Element>,
    done: bool,
}

impl PbfReader {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        debug!(path = %path.display(), "reading OSM PBF");
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: BufRead> PbfReader<R> {
    /// Reads the `OSMHeader` blob up front so the header is known before
    /// any output is written.
    pub fn from_reader(inner: R) -> Result<Self, StoreError> {
        let mut this = Self {
            inner,
            header: Header::default(),
            queue: VecDeque::new(),
            done: false,
        };
        match this.read_blob()? {
            Some((kind, data)) if kind == BLOB_OSM_HEADER => {
                this.header = read_header_block(&data)?;
            }
            Some((kind, _)) => {
                return Err(pbf_err(format!(
                    "expected {BLOB_OSM_HEADER} blob first, found {kind:?}"
                )));
            }
            None => this.done = true,
        }
        Ok(this)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn read_blob(&mut self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        if self.inner.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let mut len = [0u8; 4];
        self.inner.read_exact(&mut len)?;
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_HEADER_SIZE {
            return Err(pbf_err(format!("blob header of {len} bytes is too large")));
        }
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        let header = BlobHeader::decode(buf.as_slice()).map_err(pbf_err)?;

        let size = usize::try_from(header.datasize)
            .ok()
            .filter(|n| *n <= MAX_BLOB_SIZE)
            .ok_or_else(|| pbf_err(format!("invalid blob size {}", header.datasize)))?;
        let mut buf = vec![0u8; size];
        self.inner.read_exact(&mut buf)?;
        let blob = Blob::decode(buf.as_slice()).map_err(pbf_err)?;
        Ok(Some((header.r#type, unpack(blob)?)))
    }
}

impl<R: BufRead> MapReader for PbfReader<R> {
    type Element = Element;

    fn next_element(&mut self) -> Result<Option<Element>, StoreError> {
        while self.queue.is_empty() {
            if self.done {
                return Ok(None);
            }
            match self.read_blob() {
                Ok(Some((kind, data))) if kind == BLOB_OSM_DATA => {
                    let block = PrimitiveBlock::decode(data.as_slice()).map_err(pbf_err)?;
                    let decoder = BlockDecoder::new(&block);
                    for group in &block.primitivegroup {
                        decoder.group(group, &mut self.queue)?;
                    }
                    trace!(elements = self.queue.len(), "decoded block");
                }
                Ok(Some((kind, _))) => trace!(%kind, "skipping blob"),
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
        Ok(self.queue.pop_front())
    }
}

/// Builds a block's string table; index 0 is reserved for "".
struct StringTableBuilder {
    index: HashMap<String, u32>,
    strings: Vec<Vec<u8>>,
}

impl StringTableBuilder {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            strings: vec![Vec::new()],
        }
    }

    fn id(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(s.as_bytes().to_vec());
        self.index.insert(s.to_string(), id);
        id
    }

    fn into_table(self) -> StringTable {
        StringTable { s: self.strings }
    }
}

fn coord_units(degrees: f64) -> i64 {
    (degrees * NANO / DEFAULT_GRANULARITY as f64).round() as i64
}

fn nano_from_degrees(raw: &str) -> Option<i64> {
    raw.parse::<f64>().ok().map(|d| (d * NANO).round() as i64)
}

fn header_bbox(header: &Header) -> Option<HeaderBBox> {
    let bounds = header.bounds.as_ref()?;
    let get = |key: &str| {
        bounds
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| nano_from_degrees(v))
    };
    Some(HeaderBBox {
        left: get("minlon")?,
        right: get("maxlon")?,
        top: get("maxlat")?,
        bottom: get("minlat")?,
    })
}

fn parse_attr<T: std::str::FromStr>(
    element: &Element,
    key: &str,
    raw: &str,
) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| malformed(element, format!("invalid {key} {raw:?}")))
}

/// `Info` from the element's metadata attributes; `None` when it has none.
fn encode_info(
    element: &Element,
    strings: &mut StringTableBuilder,
) -> Result<Option<Info>, StoreError> {
    let mut info = Info::default();
    let mut any = false;
    for (key, raw) in &element.attrs {
        match key.as_str() {
            "version" => info.version = Some(parse_attr(element, key, raw)?),
            "changeset" => info.changeset = Some(parse_attr(element, key, raw)?),
            "uid" => info.uid = Some(parse_attr(element, key, raw)?),
            "user" => info.user_sid = Some(strings.id(raw)),
            "visible" => info.visible = Some(parse_attr(element, key, raw)?),
            "timestamp" => {
                let at = OffsetDateTime::parse(raw, &Rfc3339)
                    .map_err(|e| malformed(element, format!("invalid timestamp {raw:?}: {e}")))?;
                info.timestamp = Some(at.unix_timestamp() * 1000 / DEFAULT_DATE_GRANULARITY);
            }
            _ => continue,
        }
        any = true;
    }
    Ok(any.then_some(info))
}

fn tag_ids(tags: &[Tag], strings: &mut StringTableBuilder) -> (Vec<u32>, Vec<u32>) {
    tags.iter()
        .map(|t| (strings.id(&t.key), strings.id(&t.value)))
        .unzip()
}

/// One block holding a single group; every element must be the same kind.
fn encode_block(elements: &[Element]) -> Result<PrimitiveBlock, StoreError> {
    let mut strings = StringTableBuilder::new();
    let mut group = PrimitiveGroup::default();

    for element in elements {
        let (keys, vals) = tag_ids(&element.tags, &mut strings);
        let info = encode_info(element, &mut strings)?;
        match &element.body {
            Body::Node { coord } => {
                let coord = coord.unwrap_or(Coord { lat: 0.0, lon: 0.0 });
                group.nodes.push(proto::Node {
                    id: element.id,
                    keys,
                    vals,
                    info,
                    lat: coord_units(coord.lat),
                    lon: coord_units(coord.lon),
                });
            }
            Body::Way { nodes } => {
                let mut prev = 0i64;
                let refs = nodes
                    .iter()
                    .map(|&id| {
                        let delta = id - prev;
                        prev = id;
                        delta
                    })
                    .collect();
                group.ways.push(proto::Way {
                    id: element.id,
                    keys,
                    vals,
                    info,
                    refs,
                });
            }
            Body::Relation { members } => {
                let mut prev = 0i64;
                let mut rel = proto::Relation {
                    id: element.id,
                    keys,
                    vals,
                    info,
                    ..Default::default()
                };
                for member in members {
                    rel.memids.push(member.id - prev);
                    prev = member.id;
                    rel.types.push(match member.kind {
                        ElementKind::Node => MEMBER_NODE,
                        ElementKind::Way => MEMBER_WAY,
                        ElementKind::Relation => MEMBER_RELATION,
                    });
                    rel.roles_sid.push(strings.id(&member.role) as i32);
                }
                group.relations.push(rel);
            }
        }
    }

    Ok(PrimitiveBlock {
        stringtable: strings.into_table(),
        primitivegroup: vec![group],
        ..Default::default()
    })
}

fn write_blob<W: Write>(out: &mut W, kind: &str, data: &[u8]) -> Result<(), StoreError> {
    if data.len() > MAX_BLOB_SIZE {
        return Err(pbf_err(format!("{kind} block of {} bytes is too large", data.len())));
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let blob = Blob {
        raw: None,
        raw_size: Some(data.len() as i32),
        zlib_data: Some(encoder.finish()?),
    }
    .encode_to_vec();
    let header = BlobHeader {
        r#type: kind.to_string(),
        indexdata: None,
        datasize: blob.len() as i32,
    }
    .encode_to_vec();
    out.write_all(&(header.len() as u32).to_be_bytes())?;
    out.write_all(&header)?;
    out.write_all(&blob)?;
    Ok(())
}

/// OSM PBF writer.
///
/// Elements are buffered into blocks of one kind; a block is flushed when
/// the kind changes or it is full, so file order is preserved.
pub struct PbfWriter<W: Write = BufWriter<File>> {
    out: W,
    pending: Vec<Element>,
    finished: bool,
}

impl PbfWriter {
    pub fn create(path: &Path, header: &Header) -> Result<Self, StoreError> {
        let file = File::create(path)?;
        debug!(path = %path.display(), "writing OSM PBF");
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> PbfWriter<W> {
    pub fn new(mut out: W, header: &Header) -> Result<Self, StoreError> {
        let block = HeaderBlock {
            bbox: header_bbox(header),
            required_features: vec![FEATURE_SCHEMA.to_string()],
            writingprogram: Some(WRITING_PROGRAM.to_string()),
            ..Default::default()
        };
        write_blob(&mut out, BLOB_OSM_HEADER, &block.encode_to_vec())?;
        Ok(Self {
            out,
            pending: Vec::with_capacity(BLOCK_ELEMENTS),
            finished: false,
        })
    }

    /// The underlying sink, for callers that wrote to memory.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_block(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let block = encode_block(&self.pending)?;
        trace!(elements = self.pending.len(), "writing block");
        self.pending.clear();
        write_blob(&mut self.out, BLOB_OSM_DATA, &block.encode_to_vec())
    }
}

impl<W: Write> MapWriter for PbfWriter<W> {
    type Element = Element;

    fn write_element(&mut self, element: &Element) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "write after finish",
            )));
        }
        let full = self.pending.len() >= BLOCK_ELEMENTS;
        let kind_changed = self
            .pending
            .first()
            .is_some_and(|first| first.kind() != element.kind());
        if full || kind_changed {
            self.flush_block()?;
        }
        self.pending.push(element.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        if self.finished {
            return Ok(());
        }
        self.flush_block()?;
        self.out.flush()?;
        self.finished = true;
        Ok(())
    }
}
