//! Core domain types for the ingestion pipeline.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{Result, SheetdropError};

/// Number of hex chars kept from a locator hash.
const LOCATOR_HASH_LEN: usize = 32;

/// Prefix marking identities derived from a locator hash.
const LOCATOR_PREFIX: &str = "url-";

/// Drive file ids (and anything else we accept verbatim) use this alphabet.
static REMOTE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("remote id regex"));

// ---------------------------------------------------------------------------
// FileIdentity
// ---------------------------------------------------------------------------

/// Stable key naming one remote file across runs.
///
/// Derived from the provider's own file id or from the file's URL, never from
/// its position in a listing. Always safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity(String);

impl FileIdentity {
    /// Identity from a provider-assigned file id (e.g. a Drive file id).
    pub fn from_remote_id(id: &str) -> Result<Self> {
        let id = id.trim();
        if !REMOTE_ID_RE.is_match(id) {
            return Err(SheetdropError::validation(format!(
                "invalid remote file id: {id:?}"
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Identity from a file URL, for listings that carry no provider id.
    pub fn from_locator(url: &Url) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_str().as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        Self(format!("{LOCATOR_PREFIX}{}", &hex[..LOCATOR_HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// FileReference
// ---------------------------------------------------------------------------

/// A fetchable file discovered in the remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Where the bytes can be downloaded from.
    pub locator: Url,
    /// Durable dedup key.
    pub identity: FileIdentity,
    /// Display name from the listing, if it showed one.
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// FormatTag
// ---------------------------------------------------------------------------

/// Declared format of a downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatTag {
    /// Office Open XML spreadsheet (`.xlsx` / `.xlsm`).
    Workbook,
    /// Comma-separated text (`.csv`).
    DelimitedText,
    /// Anything else; carries the tag we saw.
    Other(String),
}

impl FormatTag {
    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" => Self::Workbook,
            "csv" => Self::DelimitedText,
            other => Self::Other(other.to_string()),
        }
    }

    /// Format implied by a file name's extension, if it has one.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.trim().rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.contains(['/', ' ']) {
            return None;
        }
        Some(Self::from_extension(ext))
    }

    /// File extension used when storing a raw file of this format.
    pub fn extension(&self) -> &str {
        match self {
            Self::Workbook => "xlsx",
            Self::DelimitedText => "csv",
            Self::Other(_) => "bin",
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Workbook => f.write_str("spreadsheet-workbook"),
            Self::DelimitedText => f.write_str("delimited-text"),
            Self::Other(tag) => f.write_str(tag),
        }
    }
}

// ---------------------------------------------------------------------------
// RawFile
// ---------------------------------------------------------------------------

/// A downloaded file persisted under its identity.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub identity: FileIdentity,
    /// Final local path (`<download_dir>/<identity>.<ext>`).
    pub path: PathBuf,
    pub format: FormatTag,
    /// SHA-256 of the bytes, for audit logs.
    pub sha256: String,
    pub size_bytes: u64,
}

// ---------------------------------------------------------------------------
// ResultRecord
// ---------------------------------------------------------------------------

/// A single extracted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Ordered field → value mapping extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRecord {
    entries: Vec<(String, FieldValue)>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. An existing field keeps its position and gets the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// The `(field, value)` rows handed to the report emitter.
    pub fn as_rows(&self) -> &[(String, FieldValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
