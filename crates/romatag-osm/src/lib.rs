//! OSM map store: element model, XML and PBF readers and writers.
//!
//! Both input and output format are chosen by file extension
//! (`.osm`/`.xml` or `.pbf`).

mod element;
mod pbf;
mod xml;

pub use element::{Body, Coord, Element, Header, Member};
pub use pbf::{PbfReader, PbfWriter};
pub use xml::{XmlReader, XmlWriter};

use std::fs;
use std::io;
use std::path::Path;

use romatag_core::pipeline::{MapReader, MapWriter, StoreError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    Xml,
    Pbf,
}

impl MapFormat {
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("osm") | Some("xml") => Ok(MapFormat::Xml),
            Some("pbf") => Ok(MapFormat::Pbf),
            _ => Err(StoreError::UnsupportedFormat(format!(
                "{} (expected .osm, .xml, or .pbf)",
                path.display()
            ))),
        }
    }
}

/// Reader over either supported input format.
pub enum OsmReader {
    Xml(XmlReader),
    Pbf(PbfReader),
}

impl OsmReader {
    pub fn header(&self) -> &Header {
        match self {
            OsmReader::Xml(r) => r.header(),
            OsmReader::Pbf(r) => r.header(),
        }
    }
}

impl MapReader for OsmReader {
    type Element = Element;

    fn next_element(&mut self) -> Result<Option<Element>, StoreError> {
        match self {
            OsmReader::Xml(r) => r.next_element(),
            OsmReader::Pbf(r) => r.next_element(),
        }
    }
}

/// Writer for either supported output format.
pub enum OsmWriter {
    Xml(XmlWriter),
    Pbf(PbfWriter),
}

impl MapWriter for OsmWriter {
    type Element = Element;

    fn write_element(&mut self, element: &Element) -> Result<(), StoreError> {
        match self {
            OsmWriter::Xml(w) => w.write_element(element),
            OsmWriter::Pbf(w) => w.write_element(element),
        }
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        match self {
            OsmWriter::Xml(w) => w.finish(),
            OsmWriter::Pbf(w) => w.finish(),
        }
    }
}

/// Open `path` for reading, picking the format from its extension.
pub fn open_reader(path: &Path) -> Result<OsmReader, StoreError> {
    let format = MapFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "opening input");
    match format {
        MapFormat::Xml => Ok(OsmReader::Xml(XmlReader::open(path)?)),
        MapFormat::Pbf => Ok(OsmReader::Pbf(PbfReader::open(path)?)),
    }
}

/// Prepare `path` for output: any existing file there is removed first.
///
/// Fails before touching the filesystem if the extension names no format
/// that can be written.
pub fn create_writer(path: &Path, header: &Header) -> Result<OsmWriter, StoreError> {
    let format = MapFormat::from_path(path)?;
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed existing output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(StoreError::Io(e)),
    }
    match format {
        MapFormat::Xml => Ok(OsmWriter::Xml(XmlWriter::create(path, header)?)),
        MapFormat::Pbf => Ok(OsmWriter::Pbf(PbfWriter::create(path, header)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(MapFormat::from_path(Path::new("a.osm")).unwrap(), MapFormat::Xml);
        assert_eq!(MapFormat::from_path(Path::new("a.XML")).unwrap(), MapFormat::Xml);
        assert_eq!(
            MapFormat::from_path(Path::new("shikoku.osm.pbf")).unwrap(),
            MapFormat::Pbf
        );
        assert!(matches!(
            MapFormat::from_path(Path::new("a.o5m")),
            Err(StoreError::UnsupportedFormat(_))
        ));
        assert!(MapFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn open_missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_reader(&dir.path().join("missing.osm")).err().unwrap();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn unknown_output_format_is_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.o5m");
        fs::write(&path, b"keep").unwrap();
        let err = create_writer(&path, &Header::default()).err().unwrap();
        assert!(matches!(err, StoreError::UnsupportedFormat(_)));
        assert_eq!(fs::read(&path).unwrap(), b"keep");
    }

    #[test]
    fn create_writer_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.osm");
        fs::write(&path, "stale contents that are longer than the new file").unwrap();
        let mut writer = create_writer(&path, &Header::default()).unwrap();
        writer.finish().unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        assert!(text.contains("<osm"));
    }

    #[test]
    fn create_writer_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.osm");
        let err = create_writer(&path, &Header::default()).err().unwrap();
        assert!(matches!(err, StoreError::Io(_)));
    }

    const PIPELINE_INPUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="1" minlon="2" maxlat="3" maxlon="4"/>
  <node id="1" version="2" user="a&lt;b" lat="10.5" lon="-3.25">
    <tag k="name" v="Kyoto Tower"/>
  </node>
  <node id="2" lat="0" lon="0"/>
  <way id="3" version="1"><nd ref="1"/><nd ref="2"/><tag k="highway" v="path"/></way>
  <relation id="4"><member type="way" ref="3" role="inner"/></relation>
  <node id="5" lat="1" lon="1"><tag k="name" v="大阪"/></node>
</osm>
"#;

    fn read_elements(path: &Path) -> (Header, Vec<Element>) {
        let mut reader = open_reader(path).unwrap();
        let header = reader.header().clone();
        let mut elements = Vec::new();
        while let Some(e) = reader.next_element().unwrap() {
            elements.push(e);
        }
        (header, elements)
    }

    /// Romanize the sample map into `output_name` and check that only the
    /// Japanese-named node changed.
    fn romanize_sample_into(output_name: &str) {
        use romatag_core::config::TransliterationConfig;
        use romatag_core::pipeline::{Pipeline, PipelineOptions};
        use romatag_core::policy::TagPolicy;
        use romatag_core::transliterate::KanaTransliterator;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.osm");
        let output = dir.path().join(output_name);
        fs::write(&input, PIPELINE_INPUT).unwrap();

        let config = TransliterationConfig::default();
        let transliterator = KanaTransliterator::default();
        let policy = TagPolicy::new(&config, &transliterator);
        let options = PipelineOptions {
            jobs: 2,
            batch_size: 2,
            verbose: false,
        };

        let reader = open_reader(&input).unwrap();
        let mut writer = create_writer(&output, reader.header()).unwrap();
        let stats = Pipeline::new(policy, options)
            .run(reader, &mut writer, &mut std::io::sink())
            .unwrap();
        assert_eq!(stats.total(), 5);
        assert_eq!(stats.converted, 1);

        let (header, before) = read_elements(&input);
        let (out_header, after) = read_elements(&output);
        assert_eq!(out_header, header);
        assert_eq!(before.len(), after.len());
        assert_eq!(before[..4], after[..4]);
        assert_eq!(after[4].tag("name"), Some("大阪"));
        assert_eq!(after[4].tag("name:ja_rm"), Some("Osaka"));
        assert_eq!(after[4].tag("int_name"), Some("Osaka"));
        assert_eq!(after[4].tag("name:ja"), Some("大阪"));
    }

    #[test]
    fn pipeline_leaves_untouched_elements_intact() {
        romanize_sample_into("out.osm");
    }

    #[test]
    fn pbf_output_keeps_metadata_and_bounds() {
        romanize_sample_into("out.osm.pbf");
    }
}
