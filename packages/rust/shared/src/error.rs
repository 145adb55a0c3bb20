//! Error types for sheetdrop.
//!
//! Library crates use [`SheetdropError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sheetdrop operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetdropError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The remote folder listing could not be reached or parsed.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Transport failure while downloading one file.
    #[error("fetch error for {locator}{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Fetch {
        locator: String,
        status: Option<u16>,
        message: String,
    },

    /// The raw file carries a format tag no parser handles.
    #[error("unsupported format: {tag}")]
    UnsupportedFormat { tag: String },

    /// Expected sheet, cell, or column is missing or not numeric.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// The processed-set store could not be read or written.
    #[error("tracker I/O error at {path:?}: {source}")]
    TrackerIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The report document could not be written.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifier, invalid setting, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SheetdropError>;

impl SheetdropError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error for `locator`.
    pub fn fetch(locator: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            locator: locator.into(),
            status,
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create an unsupported-format error for `tag`.
    pub fn unsupported_format(tag: impl Into<String>) -> Self {
        Self::UnsupportedFormat { tag: tag.into() }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a processed-set store `std::io::Error` with its path.
    pub fn tracker_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::TrackerIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must stop the whole run rather than just one file.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_) | Self::TrackerIo { .. } | Self::Config { .. }
        )
    }

    /// HTTP status carried by a fetch error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}
