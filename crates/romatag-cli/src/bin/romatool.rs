use std::path::PathBuf;

use clap::{Parser, Subcommand};

use romatag_cli::commands::{config_ops, ReadingSources};
use romatag_cli::commands::transliterate_ops::{self, TransliterateArgs};
use romatag_cli::logging;
use romatag_core::transliterate::RomajiSystem;

#[derive(Parser)]
#[command(name = "romatool", about = "romatag policy and lexicon tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the default tag policy as TOML
    ConfigExport,
    /// Validate a custom tag policy TOML file
    ConfigValidate {
        /// Path to the TOML file
        file: String,
    },
    /// Export the built-in lexicon as TOML
    LexiconExport,
    /// Validate a custom lexicon TOML file
    LexiconValidate {
        /// Path to the TOML file
        file: String,
    },
    /// Romanize a single name, as romatag would write it
    Transliterate {
        /// Text to romanize
        text: String,
        /// Romanization system
        #[arg(long, default_value = "hepburn")]
        system: RomajiSystem,
        /// Replace non-ASCII output characters with "????"
        #[arg(long)]
        ensure_ascii: bool,
        /// Romanize loanwords phonetically
        #[arg(long)]
        disable_loanwords: bool,
        /// Do not capitalize words
        #[arg(long)]
        no_title: bool,
        /// Extra lexicon entries
        #[arg(long)]
        lexicon: Option<PathBuf>,
        /// Compiled vibrato system dictionary for kanji readings
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Feature column holding the katakana reading
        #[arg(long)]
        reading_field: Option<usize>,
    },
    /// Run the tag policy on a set of tags and show what it would write
    Explain {
        /// Tags as key=value
        #[arg(required = true)]
        tags: Vec<String>,
        /// Tag policy file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Extra lexicon entries
        #[arg(long)]
        lexicon: Option<PathBuf>,
        /// Compiled vibrato system dictionary for kanji readings
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Feature column holding the katakana reading
        #[arg(long)]
        reading_field: Option<usize>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(false);

    match cli.command {
        Command::ConfigExport => config_ops::config_export(),
        Command::ConfigValidate { file } => config_ops::config_validate(&file),
        Command::LexiconExport => config_ops::lexicon_export(),
        Command::LexiconValidate { file } => config_ops::lexicon_validate(&file),
        Command::Transliterate {
            text,
            system,
            ensure_ascii,
            disable_loanwords,
            no_title,
            lexicon,
            dictionary,
            reading_field,
        } => transliterate_ops::transliterate_cmd(&TransliterateArgs {
            text: &text,
            system,
            ensure_ascii,
            disable_loanwords,
            no_title,
            sources: ReadingSources {
                lexicon: lexicon.as_deref(),
                dictionary: dictionary.as_deref(),
                reading_field,
            },
        }),
        Command::Explain {
            tags,
            config,
            lexicon,
            dictionary,
            reading_field,
            json,
        } => {
            let sources = ReadingSources {
                lexicon: lexicon.as_deref(),
                dictionary: dictionary.as_deref(),
                reading_field,
            };
            transliterate_ops::explain_cmd(&tags, config.as_deref(), sources, json)
        }
    }
}
