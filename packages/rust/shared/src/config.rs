//! Application configuration for sheetdrop.
//!
//! Config lookup: an explicit path (CLI flag / `SHEETDROP_CONFIG`), then
//! `./sheetdrop.toml`, then `~/.sheetdrop/sheetdrop.toml`, then defaults.
//! The loaded [`AppConfig`] is turned into an immutable [`PipelineSettings`]
//! that the driver receives at construction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SheetdropError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sheetdrop.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sheetdrop";

// ---------------------------------------------------------------------------
// Config structs (matching sheetdrop.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Shared folder whose files are ingested.
    #[serde(default = "default_folder_url")]
    pub folder_url: String,

    /// Direct-download endpoint; `?id=<id>&export=download` is appended.
    #[serde(default = "default_download_base")]
    pub download_base: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            folder_url: default_folder_url(),
            download_base: default_download_base(),
        }
    }
}

fn default_folder_url() -> String {
    "https://drive.google.com/drive/folders/1TrnQQGpon33QP0WQ-bFS7WoMLQAuAPyE?usp=sharing".into()
}
fn default_download_base() -> String {
    "https://drive.google.com/uc".into()
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Append-only list of processed file identities.
    #[serde(default = "default_processed_log")]
    pub processed_log: String,

    /// Where raw downloads are stored.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Where report documents are written.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,

    /// Keep raw downloads after extraction.
    #[serde(default = "default_true")]
    pub keep_downloads: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            processed_log: default_processed_log(),
            download_dir: default_download_dir(),
            reports_dir: default_reports_dir(),
            keep_downloads: true,
        }
    }
}

fn default_processed_log() -> String {
    "processed_files.txt".into()
}
fn default_download_dir() -> String {
    "downloads".into()
}
fn default_reports_dir() -> String {
    "reports".into()
}
fn default_true() -> bool {
    true
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest download accepted, in bytes.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_download_bytes() -> u64 {
    50 * 1024 * 1024
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Worksheet read from workbooks.
    #[serde(default = "default_sheet")]
    pub sheet: String,

    /// Cells read into the result record, in report order.
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldSpec>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            sheet: default_sheet(),
            fields: default_fields(),
        }
    }
}

fn default_sheet() -> String {
    "Overall Quad".into()
}
fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec {
            name: "80 Customer".into(),
            row: 5,
            col: 1,
        },
        FieldSpec {
            name: "80 Part".into(),
            row: 4,
            col: 1,
        },
    ]
}

/// `[[extract.fields]]` entry: one named cell.
///
/// `row` counts data rows below the header row, `col` counts from the first
/// used column; both zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub row: usize,
    pub col: usize,
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_title")]
    pub title: String,

    /// Columns per table block before wrapping to the next block.
    #[serde(default = "default_max_columns")]
    pub max_columns_per_table: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            max_columns_per_table: default_max_columns(),
        }
    }
}

fn default_title() -> String {
    "Executive Summary Dashboard".into()
}
fn default_max_columns() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Runtime settings (immutable, injected into the driver)
// ---------------------------------------------------------------------------

/// Settings for the link resolver.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub download_base: Url,
    pub timeout_secs: u64,
}

/// Settings for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub download_dir: PathBuf,
    pub timeout_secs: u64,
    pub max_download_bytes: u64,
}

/// Cell layout the extractor reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractLayout {
    pub sheet: String,
    pub fields: Vec<FieldSpec>,
}

impl ExtractLayout {
    /// Deepest data row any field needs.
    pub fn max_row(&self) -> Option<usize> {
        self.fields.iter().map(|f| f.row).max()
    }
}

impl Default for ExtractLayout {
    fn default() -> Self {
        let extract = ExtractConfig::default();
        Self {
            sheet: extract.sheet,
            fields: extract.fields,
        }
    }
}

/// Settings for the report emitter.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub title: String,
    pub reports_dir: PathBuf,
    pub max_columns_per_table: usize,
}

/// Everything one pipeline run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub folder_url: Url,
    pub processed_log: PathBuf,
    pub keep_downloads: bool,
    pub resolver: ResolverSettings,
    pub fetch: FetchSettings,
    pub layout: ExtractLayout,
    pub report: ReportSettings,
}

impl PipelineSettings {
    /// Build settings from a loaded config. Relative paths resolve against `base_dir`.
    pub fn from_config(config: &AppConfig, base_dir: &Path) -> Result<Self> {
        let folder_url = parse_url("source.folder_url", &config.source.folder_url)?;
        let download_base = parse_url("source.download_base", &config.source.download_base)?;

        let settings = Self {
            folder_url,
            processed_log: base_dir.join(&config.paths.processed_log),
            keep_downloads: config.paths.keep_downloads,
            resolver: ResolverSettings {
                download_base,
                timeout_secs: config.http.timeout_secs,
            },
            fetch: FetchSettings {
                download_dir: base_dir.join(&config.paths.download_dir),
                timeout_secs: config.http.timeout_secs,
                max_download_bytes: config.http.max_download_bytes,
            },
            layout: ExtractLayout {
                sheet: config.extract.sheet.clone(),
                fields: config.extract.fields.clone(),
            },
            report: ReportSettings {
                title: config.report.title.clone(),
                reports_dir: base_dir.join(&config.paths.reports_dir),
                max_columns_per_table: config.report.max_columns_per_table,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.layout.fields.is_empty() {
            return Err(SheetdropError::config("extract.fields must not be empty"));
        }

        let mut seen = HashSet::new();
        for field in &self.layout.fields {
            if field.name.trim().is_empty() {
                return Err(SheetdropError::config("extract field names must not be blank"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SheetdropError::config(format!(
                    "duplicate extract field name: {:?}",
                    field.name
                )));
            }
        }

        if self.layout.sheet.trim().is_empty() {
            return Err(SheetdropError::config("extract.sheet must not be blank"));
        }
        if self.report.max_columns_per_table == 0 {
            return Err(SheetdropError::config(
                "report.max_columns_per_table must be at least 1",
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(SheetdropError::config("http.timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| SheetdropError::config(format!("{key} is not a valid URL ({raw:?}): {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.sheetdrop/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SheetdropError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.sheetdrop/sheetdrop.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Find the config file to use, if any.
///
/// An explicit path must exist; the implicit locations are optional.
pub fn locate_config(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(SheetdropError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = cwd.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    match config_file_path() {
        Ok(user) if user.exists() => Ok(Some(user)),
        _ => Ok(None),
    }
}

/// Load the application config. Returns defaults if no config file is found.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<AppConfig> {
    match locate_config(explicit, cwd)? {
        Some(path) => {
            tracing::debug!(?path, "loading config file");
            load_config_from(&path)
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SheetdropError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SheetdropError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path`, creating parent directories.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| SheetdropError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SheetdropError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| SheetdropError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}
