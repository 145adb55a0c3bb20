//! Pipeline orchestration for sheetdrop.
//!
//! This crate ties together folder resolution, the processed-set tracker,
//! downloading, cell extraction, and report rendering into a single run.

pub mod pipeline;

pub use pipeline::{FileOutcome, Pipeline, ProgressReporter, RunSummary, SilentProgress, Stage};
