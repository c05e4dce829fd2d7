use std::io;
use std::path::{Path, PathBuf};

use romatag_core::config::{ErrorPolicy, TransliterationConfig};
use romatag_core::pipeline::{Pipeline, PipelineError, PipelineOptions, RunStats};
use romatag_core::policy::TagPolicy;
use romatag_core::transliterate::RomajiSystem;
use romatag_osm::{create_writer, open_reader};
use tracing::{error, info};

use super::{load_config, load_transliterator, ReadingSources};

/// Command-line settings layered over the config file.
///
/// Switches can only turn a behavior on; a `false` here leaves the file's
/// value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub romaji_system: Option<RomajiSystem>,
    pub kana_source_tags: Option<Vec<String>>,
    pub romaji_source_tags: Option<Vec<String>>,
    pub romaji_dest_tags: Option<Vec<String>>,
    pub kana_dest_tags: Option<Vec<String>>,
    pub disable_foreign_spelling: bool,
    pub clobber_romaji: bool,
    pub clobber_kana: bool,
    pub ensure_ascii: bool,
    pub on_error: Option<ErrorPolicy>,
}

impl ConfigOverrides {
    pub fn apply_to(self, config: &mut TransliterationConfig) {
        if let Some(system) = self.romaji_system {
            config.romaji_system = system;
        }
        if let Some(tags) = self.kana_source_tags {
            config.kana_source_tags = tags;
        }
        if let Some(tags) = self.romaji_source_tags {
            config.romaji_source_tags = tags;
        }
        if let Some(tags) = self.romaji_dest_tags {
            config.romaji_dest_tags = tags;
        }
        if let Some(tags) = self.kana_dest_tags {
            config.kana_dest_tags = tags;
        }
        config.disable_foreign_spelling |= self.disable_foreign_spelling;
        config.clobber_romaji |= self.clobber_romaji;
        config.clobber_kana |= self.clobber_kana;
        config.ensure_ascii |= self.ensure_ascii;
        if let Some(policy) = self.on_error {
            config.on_error = policy;
        }
    }
}

pub struct RomanizeArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub lexicon: Option<PathBuf>,
    pub dictionary: Option<PathBuf>,
    pub reading_field: Option<usize>,
    pub overrides: ConfigOverrides,
    pub jobs: Option<usize>,
    pub batch_size: Option<usize>,
}

/// Effective config: file (or defaults), then command-line overrides,
/// then validation of the merged result.
pub fn build_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<TransliterationConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    overrides.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

fn pipeline_options(args: &RomanizeArgs) -> PipelineOptions {
    let mut options = PipelineOptions {
        verbose: args.verbose,
        ..PipelineOptions::default()
    };
    if let Some(jobs) = args.jobs {
        options.jobs = jobs.max(1);
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size.max(1);
    }
    options
}

/// Read `input`, apply the tag policy to every element, write `output`.
pub fn run(
    args: &RomanizeArgs,
    config: &TransliterationConfig,
    report: &mut dyn io::Write,
) -> Result<RunStats, Box<dyn std::error::Error>> {
    let transliterator = load_transliterator(ReadingSources {
        lexicon: args.lexicon.as_deref(),
        dictionary: args.dictionary.as_deref(),
        reading_field: args.reading_field,
    })?;
    let policy = TagPolicy::new(config, &transliterator);

    let reader = open_reader(&args.input).map_err(PipelineError::Read)?;
    let mut writer =
        create_writer(&args.output, reader.header()).map_err(PipelineError::Write)?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        system = %config.romaji_system,
        "romanizing"
    );
    let stats = Pipeline::new(policy, pipeline_options(args)).run(reader, &mut writer, report)?;
    Ok(stats)
}

pub fn romanize_cmd(args: RomanizeArgs) {
    let overrides = args.overrides.clone();
    let config = die!(
        build_config(args.config.as_deref(), overrides),
        "Error: invalid configuration: {}"
    );
    let stdout = io::stdout();
    let mut report = stdout.lock();
    match run(&args, &config, &mut report) {
        Ok(stats) => {
            if args.verbose {
                eprintln!("{stats}");
            }
        }
        Err(e) => {
            error!(error = %e, "romanization failed");
            eprintln!("Error: {e}");
            if args.output.exists() {
                eprintln!(
                    "Output {} is incomplete and should not be used",
                    args.output.display()
                );
            }
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INPUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <node id="1" lat="35.0" lon="135.0">
    <tag k="name" v="東京"/>
  </node>
  <node id="2" lat="35.1" lon="135.1">
    <tag k="name" v="渋谷区"/>
    <tag k="name:en" v="Shibuya"/>
  </node>
  <way id="3">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <node id="4" lat="35.2" lon="135.2">
    <tag k="name" v="髙"/>
  </node>
</osm>
"#;

    fn args(dir: &Path) -> RomanizeArgs {
        let input = dir.join("in.osm");
        fs::write(&input, INPUT).unwrap();
        RomanizeArgs {
            input,
            output: dir.join("out.osm"),
            verbose: true,
            config: None,
            lexicon: None,
            dictionary: None,
            reading_field: None,
            overrides: ConfigOverrides::default(),
            jobs: Some(2),
            batch_size: Some(2),
        }
    }

    #[test]
    fn overrides_layer_over_file() {
        let mut config = TransliterationConfig::default();
        ConfigOverrides {
            romaji_system: Some(RomajiSystem::Kunrei),
            kana_dest_tags: Some(vec!["name:ja-Hira".into()]),
            ensure_ascii: true,
            on_error: Some(ErrorPolicy::Skip),
            ..Default::default()
        }
        .apply_to(&mut config);
        assert_eq!(config.romaji_system, RomajiSystem::Kunrei);
        assert_eq!(config.kana_dest_tags, vec!["name:ja-Hira".to_string()]);
        assert!(config.ensure_ascii);
        assert!(!config.clobber_romaji);
        assert_eq!(config.on_error, ErrorPolicy::Skip);
    }

    #[test]
    fn merged_config_is_validated() {
        let overrides = ConfigOverrides {
            romaji_dest_tags: Some(vec!["int_name".into(), "int_name".into()]),
            ..Default::default()
        };
        assert!(build_config(None, overrides).is_err());
    }

    #[test]
    fn abort_on_unknown_reading() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path());
        let config = TransliterationConfig::default();
        let mut report = Vec::new();
        assert!(run(&args, &config, &mut report).is_err());
    }

    #[test]
    fn skip_mode_romanizes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path());
        let mut config = TransliterationConfig::default();
        config.on_error = ErrorPolicy::Skip;
        let mut report = Vec::new();
        let stats = run(&args, &config, &mut report).unwrap();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.ways, 1);
        assert_eq!(stats.converted, 1);
        assert_eq!(stats.swapped, 1);
        assert_eq!(stats.skipped, 1);

        let out = fs::read_to_string(&args.output).unwrap();
        assert!(out.contains(r#"<tag k="name:ja_rm" v="Tokyo"/>"#));
        assert!(out.contains(r#"<tag k="name:ja" v="東京"/>"#));
        assert!(out.contains(r#"<tag k="name:ja_rm" v="Shibuya"/>"#));
        assert!(out.contains(r#"<tag k="name" v="髙"/>"#));
        assert!(out.contains(r#"<nd ref="2"/>"#));

        let report = String::from_utf8(report).unwrap();
        assert!(report.contains("東京 ==> Tokyo"));
    }

    #[test]
    fn unsupported_output_fails_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.output = dir.path().join("out.o5m");
        let config = TransliterationConfig::default();
        let err = run(&args, &config, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
        assert!(!args.output.exists());
    }

    #[test]
    fn pbf_output_is_written() {
        use romatag_core::pipeline::MapReader;

        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.output = dir.path().join("out.osm.pbf");
        let mut config = TransliterationConfig::default();
        config.on_error = ErrorPolicy::Skip;
        let stats = run(&args, &config, &mut Vec::new()).unwrap();
        assert_eq!(stats.converted, 1);

        let mut reader = open_reader(&args.output).unwrap();
        let first = reader.next_element().unwrap().unwrap();
        assert_eq!(first.tag("name:ja_rm"), Some("Tokyo"));
        let mut rest = 0;
        while reader.next_element().unwrap().is_some() {
            rest += 1;
        }
        assert_eq!(rest, 3);
    }
}
