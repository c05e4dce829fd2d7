use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use romatag_cli::commands::romanize_ops::{self, ConfigOverrides, RomanizeArgs};
use romatag_cli::logging;
use romatag_core::config::ErrorPolicy;
use romatag_core::transliterate::RomajiSystem;

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    /// Stop at the first name that cannot be transliterated
    Abort,
    /// Leave the element unchanged and continue
    Skip,
}

#[derive(Parser)]
#[command(
    name = "romatag",
    about = "Add romanized names to Japanese place names in an OSM map"
)]
struct Cli {
    /// osm/xml/pbf input map file
    #[arg(long)]
    input_osm: PathBuf,
    /// osm/xml/pbf output map file (replaced if it exists). PBF stores
    /// only the standard metadata attributes
    #[arg(long)]
    output_osm: PathBuf,
    /// Print conversions
    #[arg(long)]
    verbose: bool,

    /// Romanization system: hepburn, nihon, or kunrei [default: hepburn]
    #[arg(long)]
    romaji_system: Option<RomajiSystem>,
    /// Source tags for kana names, checked in order
    #[arg(long, num_args = 1.., value_name = "TAG")]
    kana_source_tags: Option<Vec<String>>,
    /// Source tags for existing romaji, checked in order
    #[arg(long, num_args = 1.., value_name = "TAG")]
    romaji_source_tags: Option<Vec<String>>,
    /// Destination tags for generated romaji
    #[arg(long, num_args = 1.., value_name = "TAG")]
    romaji_dest_tags: Option<Vec<String>>,
    /// Copy the original kana name to these tags
    #[arg(long, num_args = 1.., value_name = "TAG")]
    kana_dest_tags: Option<Vec<String>>,

    /// Romanize katakana loanwords phonetically instead of by spelling
    #[arg(long, visible_alias = "disable-loanwords")]
    disable_foreign_spelling: bool,
    /// Always write romaji to --romaji-dest-tags, even if they already have data
    #[arg(long)]
    clobber_romaji_tags: bool,
    /// Always write kana to --kana-dest-tags, even if they already have data
    #[arg(long)]
    clobber_kana_tags: bool,
    /// Force ASCII romaji; non-ASCII characters become "????"
    #[arg(long)]
    ensure_ascii: bool,

    /// Policy file (see `romatool config-export`); flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extra lexicon entries (see `romatool lexicon-export`); they win over
    /// the dictionary where both match the same text
    #[arg(long)]
    lexicon: Option<PathBuf>,
    /// Compiled vibrato system dictionary (IPADIC or UniDic, .dic or
    /// .dic.zst) used to read kanji
    #[arg(long)]
    dictionary: Option<PathBuf>,
    /// Feature column holding the katakana reading [default: 7, IPADIC]
    #[arg(long)]
    reading_field: Option<usize>,
    /// Worker threads [default: available cores]
    #[arg(long, short = 'j')]
    jobs: Option<usize>,
    /// Elements per worker batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// What to do with names that cannot be transliterated
    #[arg(long, value_enum)]
    on_error: Option<OnError>,
    /// Log as JSON lines on stderr
    #[arg(long)]
    log_json: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json);

    let overrides = ConfigOverrides {
        romaji_system: cli.romaji_system,
        kana_source_tags: cli.kana_source_tags,
        romaji_source_tags: cli.romaji_source_tags,
        romaji_dest_tags: cli.romaji_dest_tags,
        kana_dest_tags: cli.kana_dest_tags,
        disable_foreign_spelling: cli.disable_foreign_spelling,
        clobber_romaji: cli.clobber_romaji_tags,
        clobber_kana: cli.clobber_kana_tags,
        ensure_ascii: cli.ensure_ascii,
        on_error: cli.on_error.map(|p| match p {
            OnError::Abort => ErrorPolicy::Abort,
            OnError::Skip => ErrorPolicy::Skip,
        }),
    };
    romanize_ops::romanize_cmd(RomanizeArgs {
        input: cli.input_osm,
        output: cli.output_osm,
        verbose: cli.verbose,
        config: cli.config,
        lexicon: cli.lexicon,
        dictionary: cli.dictionary,
        reading_field: cli.reading_field,
        overrides,
        jobs: cli.jobs,
        batch_size: cli.batch_size,
    });
}
