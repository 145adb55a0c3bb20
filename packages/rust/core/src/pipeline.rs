//! One ingestion run: folder → fetch → extract → report → commit.
//!
//! Each discovered file moves through
//! `Discovered → Fetching → Extracting → Reporting → Committed`, or ends early
//! as `SkippedAlreadyProcessed` or `Failed { stage }`. The processed-set is
//! written only after the report is on disk, so a crash at any earlier point
//! leaves the file eligible for the next run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use sheetdrop_discovery::FolderResolver;
use sheetdrop_fetcher::Fetcher;
use sheetdrop_report::ReportEmitter;
use sheetdrop_shared::{
    FileIdentity, FileReference, PipelineSettings, RawFile, Result, SheetdropError,
};
use sheetdrop_tracker::ProcessedSet;

/// Stage a file was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Extracting,
    Reporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Reporting => "reporting",
        })
    }
}

/// Terminal state of one file in one run.
#[derive(Debug)]
pub enum FileOutcome {
    /// Report written and identity committed.
    Committed { report: PathBuf },
    /// Identity was already in the processed-set; nothing was done.
    SkippedAlreadyProcessed,
    /// Processing stopped at `stage`; the file stays eligible for later runs.
    Failed { stage: Stage, error: SheetdropError },
}

impl FileOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// What a run did.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Files listed in the folder.
    pub discovered: usize,
    /// One entry per discovered file, in listing order.
    pub outcomes: Vec<(FileIdentity, FileOutcome)>,
}

impl RunSummary {
    pub fn committed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Committed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::SkippedAlreadyProcessed))
    }

    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failed)
    }

    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, identity: &FileIdentity) -> Option<&FileOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a discovered file is looked at.
    fn file_started(&self, reference: &FileReference, current: usize, total: usize);
    /// Called once a file reaches a terminal state.
    fn file_finished(&self, identity: &FileIdentity, outcome: &FileOutcome);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_started(&self, _reference: &FileReference, _current: usize, _total: usize) {}
    fn file_finished(&self, _identity: &FileIdentity, _outcome: &FileOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// The ingestion driver. Settings are fixed at construction.
pub struct Pipeline<E> {
    settings: PipelineSettings,
    resolver: FolderResolver,
    fetcher: Fetcher,
    emitter: E,
}

impl<E: ReportEmitter> Pipeline<E> {
    pub fn new(settings: PipelineSettings, emitter: E) -> Result<Self> {
        settings.validate()?;
        let resolver = FolderResolver::new(&settings.resolver)?;
        let fetcher = Fetcher::new(&settings.fetch)?;
        Ok(Self {
            settings,
            resolver,
            fetcher,
            emitter,
        })
    }

    /// Where the report for `identity` is written.
    pub fn report_path(&self, identity: &FileIdentity) -> PathBuf {
        self.settings
            .report
            .reports_dir
            .join(format!("{identity}.pdf"))
    }

    /// Run one pass over the folder.
    ///
    /// Returns `Err` only for run-fatal conditions (folder unreachable,
    /// processed-set unreadable or unwritable). Per-file failures are reported
    /// in the summary and do not stop the run.
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let run_id = Uuid::now_v7();
        let span = info_span!("run", %run_id, folder = %self.settings.folder_url);
        self.run_inner(run_id, progress).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let start = Instant::now();
        let started_at = Utc::now();
        info!("starting run");

        progress.phase("Loading processed files");
        let mut processed = ProcessedSet::open(&self.settings.processed_log)?;

        progress.phase("Resolving folder");
        let references = self.resolver.resolve(&self.settings.folder_url).await?;
        let total = references.len();

        progress.phase("Processing files");
        let mut outcomes = Vec::with_capacity(total);
        for (index, reference) in references.iter().enumerate() {
            progress.file_started(reference, index + 1, total);
            let outcome = self.process(reference, &mut processed).await?;
            progress.file_finished(&reference.identity, &outcome);
            outcomes.push((reference.identity.clone(), outcome));
        }

        let summary = RunSummary {
            run_id,
            started_at,
            elapsed: start.elapsed(),
            discovered: total,
            outcomes,
        };

        info!(
            discovered = summary.discovered,
            committed = summary.committed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            elapsed_ms = summary.elapsed.as_millis(),
            "run complete"
        );
        progress.done(&summary);
        Ok(summary)
    }

    /// Drive one reference to a terminal state. `Err` only for tracker failures.
    async fn process(
        &self,
        reference: &FileReference,
        processed: &mut ProcessedSet,
    ) -> Result<FileOutcome> {
        let identity = &reference.identity;

        if processed.contains(identity) {
            debug!(%identity, "already processed, skipping");
            return Ok(FileOutcome::SkippedAlreadyProcessed);
        }

        let report = match self.produce_report(reference).await {
            Ok(report) => report,
            Err((stage, error)) => {
                if error.is_run_fatal() {
                    return Err(error);
                }
                warn!(%identity, %stage, %error, "file failed, continuing");
                return Ok(FileOutcome::Failed { stage, error });
            }
        };

        processed.commit(identity)?;
        info!(%identity, report = %report.display(), "file committed");
        Ok(FileOutcome::Committed { report })
    }

    async fn produce_report(
        &self,
        reference: &FileReference,
    ) -> std::result::Result<PathBuf, (Stage, SheetdropError)> {
        let identity = &reference.identity;

        debug!(%identity, stage = %Stage::Fetching, "stage");
        let raw = self
            .fetcher
            .fetch(reference)
            .await
            .map_err(|e| (Stage::Fetching, e))?;

        debug!(%identity, stage = %Stage::Extracting, "stage");
        let extracted = sheetdrop_extractor::extract(&raw, &self.settings.layout);
        if !self.settings.keep_downloads {
            discard_download(&raw);
        }
        let record = extracted.map_err(|e| (Stage::Extracting, e))?;

        debug!(%identity, stage = %Stage::Reporting, "stage");
        let dest = self.report_path(identity);
        self.emitter
            .render(&self.settings.report.title, record.as_rows(), &dest)
            .map_err(|e| (Stage::Reporting, e))?;

        Ok(dest)
    }
}

fn discard_download(raw: &RawFile) {
    match std::fs::remove_file(&raw.path) {
        Ok(()) => debug!(path = %raw.path.display(), "download removed"),
        Err(e) => warn!(path = %raw.path.display(), error = %e, "failed to remove download"),
    }
}
