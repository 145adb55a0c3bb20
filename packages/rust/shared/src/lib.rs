//! Shared types, error model, and configuration for sheetdrop.
//!
//! This crate is the foundation depended on by all other sheetdrop crates.
//! It provides:
//! - [`SheetdropError`]: the unified error type
//! - Domain types: [`FileIdentity`], [`FileReference`], [`RawFile`], [`ResultRecord`]
//! - Configuration: [`AppConfig`], [`PipelineSettings`], config loading

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractConfig, ExtractLayout, FetchSettings, FieldSpec, HttpConfig, PathsConfig,
    PipelineSettings, ReportConfig, ReportSettings, ResolverSettings, SourceConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, locate_config,
};
pub use error::{Result, SheetdropError};
pub use types::{FieldValue, FileIdentity, FileReference, FormatTag, RawFile, ResultRecord};
