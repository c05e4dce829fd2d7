//! Streaming driver: map reader → policy on a worker pool → map writer.
//!
//! A named reader thread pulls elements in file order and ships them in
//! batches over a bounded channel. Each batch is transformed on a rayon
//! pool; `collect` keeps input order, so the writer sees elements exactly
//! as the reader produced them. Only the calling thread writes, which also
//! keeps verbose report lines whole.

use std::fmt;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::thread;

use rayon::prelude::*;
use tracing::{debug, debug_span, info, warn};

use crate::config::ErrorPolicy;
use crate::policy::{Applied, Outcome, Rejected, TagPolicy};
use crate::tags::{ElementKind, Tagged};
use crate::transliterate::TransliterateError;

/// Batches queued between the reader thread and the workers.
const READ_AHEAD: usize = 4;

pub const DEFAULT_BATCH_SIZE: usize = 2048;

/// Map container errors, shared by every reader and writer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("PBF error: {0}")]
    Pbf(String),

    #[error("malformed {element}: {reason}")]
    Malformed { element: String, reason: String },

    #[error("unsupported map format: {0}")]
    UnsupportedFormat(String),
}

/// Sequential source of map elements in the container's native order.
pub trait MapReader {
    type Element: Tagged;

    /// Next element, or `None` at end of input.
    fn next_element(&mut self) -> Result<Option<Self::Element>, StoreError>;
}

/// Sequential sink; nodes, ways and relations are routed by the element's
/// own kind.
pub trait MapWriter {
    type Element: Tagged;

    fn write_element(&mut self, element: &Self::Element) -> Result<(), StoreError>;

    /// Flush and close the output. Nothing may be written afterwards.
    fn finish(&mut self) -> Result<(), StoreError>;
}

impl<R: MapReader + ?Sized> MapReader for Box<R> {
    type Element = R::Element;

    fn next_element(&mut self) -> Result<Option<Self::Element>, StoreError> {
        (**self).next_element()
    }
}

impl<W: MapWriter + ?Sized> MapWriter for Box<W> {
    type Element = W::Element;

    fn write_element(&mut self, element: &Self::Element) -> Result<(), StoreError> {
        (**self).write_element(element)
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        (**self).finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("reading input: {0}")]
    Read(#[source] StoreError),

    #[error("writing output: {0}")]
    Write(#[source] StoreError),

    #[error("writing report: {0}")]
    Report(#[source] io::Error),

    #[error("{element}: {source}")]
    Transliterate {
        element: String,
        #[source]
        source: TransliterateError,
    },

    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("reader thread panicked")]
    ReaderPanicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Worker threads for the policy.
    pub jobs: usize,
    /// Elements per batch handed to the workers.
    pub batch_size: usize,
    /// Print `original ==> romaji` lines for converted names.
    pub verbose: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jobs: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            batch_size: DEFAULT_BATCH_SIZE,
            verbose: false,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    pub converted: u64,
    pub swapped: u64,
    pub unchanged: u64,
    pub skipped: u64,
}

impl RunStats {
    fn count_kind(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Node => self.nodes += 1,
            ElementKind::Way => self.ways += 1,
            ElementKind::Relation => self.relations += 1,
        }
    }

    fn count_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Converted { .. } => self.converted += 1,
            Outcome::Swapped { .. } => self.swapped += 1,
            Outcome::NoSource | Outcome::AlreadyLatin => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} ways, {} relations: {} converted, {} swapped, {} unchanged, {} skipped",
            self.nodes,
            self.ways,
            self.relations,
            self.converted,
            self.swapped,
            self.unchanged,
            self.skipped
        )
    }
}

pub struct Pipeline<'a> {
    policy: TagPolicy<'a>,
    options: PipelineOptions,
}

type Batch<E> = Result<Vec<E>, StoreError>;

fn read_batches<R: MapReader>(
    mut reader: R,
    batch_size: usize,
    tx: mpsc::SyncSender<Batch<R::Element>>,
) {
    let mut batch = Vec::with_capacity(batch_size);
    loop {
        match reader.next_element() {
            Ok(Some(element)) => {
                batch.push(element);
                if batch.len() == batch_size {
                    let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    if tx.send(Ok(full)).is_err() {
                        // Receiver gone: the run was aborted.
                        return;
                    }
                }
            }
            Ok(None) => {
                if !batch.is_empty() {
                    let _ = tx.send(Ok(batch));
                }
                return;
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

fn describe<E: Tagged>(element: &E) -> String {
    format!("{} {}", element.kind(), element.id())
}

impl<'a> Pipeline<'a> {
    pub fn new(policy: TagPolicy<'a>, options: PipelineOptions) -> Self {
        Self { policy, options }
    }

    /// Stream every element from `reader` through the policy into `writer`,
    /// then finish the writer.
    ///
    /// On error the output is left incomplete and must not be used.
    pub fn run<R, W>(
        &self,
        reader: R,
        writer: &mut W,
        report: &mut dyn Write,
    ) -> Result<RunStats, PipelineError>
    where
        R: MapReader + Send,
        R::Element: Send,
        W: MapWriter<Element = R::Element>,
    {
        let jobs = self.options.jobs.max(1);
        let batch_size = self.options.batch_size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("romatag-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
        debug!(jobs, batch_size, "pipeline start");

        let stats = thread::scope(|scope| -> Result<RunStats, PipelineError> {
            let (tx, rx) = mpsc::sync_channel::<Batch<R::Element>>(READ_AHEAD);
            let reader_thread = thread::Builder::new()
                .name("romatag-reader".into())
                .spawn_scoped(scope, move || read_batches(reader, batch_size, tx))
                .map_err(PipelineError::Spawn)?;

            let mut stats = RunStats::default();
            for batch in rx {
                let batch = batch.map_err(PipelineError::Read)?;
                let _span = debug_span!("batch", len = batch.len()).entered();
                let results: Vec<_> = pool.install(|| {
                    batch
                        .into_par_iter()
                        .map(|element| self.policy.apply(element))
                        .collect()
                });
                for result in results {
                    self.emit(result, writer, report, &mut stats)?;
                }
            }

            reader_thread
                .join()
                .map_err(|_| PipelineError::ReaderPanicked)?;
            Ok(stats)
        })?;

        writer.finish().map_err(PipelineError::Write)?;
        info!(%stats, "run complete");
        Ok(stats)
    }

    fn emit<E, W>(
        &self,
        result: Result<Applied<E>, Rejected<E>>,
        writer: &mut W,
        report: &mut dyn Write,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError>
    where
        E: Tagged,
        W: MapWriter<Element = E>,
    {
        let element = match result {
            Ok(applied) => {
                stats.count_outcome(&applied.outcome);
                if self.options.verbose {
                    self.report_line(&applied.outcome, report)?;
                }
                applied.element
            }
            Err(Rejected { element, error }) => match self.policy.config().on_error {
                ErrorPolicy::Abort => {
                    return Err(PipelineError::Transliterate {
                        element: describe(&element),
                        source: error,
                    });
                }
                ErrorPolicy::Skip => {
                    warn!(element = %describe(&element), %error, "skipped");
                    stats.skipped += 1;
                    element
                }
            },
        };
        stats.count_kind(element.kind());
        writer
            .write_element(&element)
            .map_err(PipelineError::Write)
    }

    fn report_line(&self, outcome: &Outcome, report: &mut dyn Write) -> Result<(), PipelineError> {
        let Outcome::Converted {
            original,
            romaji,
            romaji_tags,
            ..
        } = outcome
        else {
            return Ok(());
        };
        let line = if self.policy.config().clobber_romaji {
            writeln!(report, "{original} ==> {romaji}")
        } else {
            writeln!(report, "{original} ==> {romaji} ({})", romaji_tags.join(", "))
        };
        line.map_err(PipelineError::Report)
    }
}
