//! Durable processed-set for the ingestion pipeline.
//!
//! The [`ProcessedSet`] is a newline-delimited, append-only file of file
//! identities. Membership test and insertion are the only operations; nothing
//! is ever removed by normal operation.
//!
//! **Crash rules:**
//! - Each commit is a single `write_all` on an append handle followed by
//!   `sync_data`, so a commit that returns `Ok` survives a restart.
//! - A last line without its `\n` is a torn append. It is treated as not
//!   committed and is truncated away on open, before any new entry is written.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sheetdrop_shared::{FileIdentity, Result, SheetdropError};
use tracing::{debug, info, warn};

/// Handle on the processed-set store.
#[derive(Debug)]
pub struct ProcessedSet {
    path: PathBuf,
    entries: HashSet<String>,
}

impl ProcessedSet {
    /// Load the store at `path`, creating its parent directory if needed.
    ///
    /// A missing file is an empty set; the file itself is created on first commit.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SheetdropError::tracker_io(parent, e))?;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(SheetdropError::tracker_io(path, e)),
        };

        let (complete, torn) = split_torn_tail(&content);
        if let Some(fragment) = torn {
            warn!(
                path = %path.display(),
                fragment = %fragment.trim(),
                "discarding partially written processed-set entry"
            );
            truncate_to(path, complete.len() as u64)?;
        }

        let entries: HashSet<String> = complete
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        info!(path = %path.display(), entries = entries.len(), "processed-set loaded");

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// True iff `identity` was previously committed.
    pub fn contains(&self, identity: &FileIdentity) -> bool {
        self.entries.contains(identity.as_str())
    }

    /// Durably record `identity` as processed.
    ///
    /// Committing an identity that is already present is a no-op.
    pub fn commit(&mut self, identity: &FileIdentity) -> Result<()> {
        if self.contains(identity) {
            debug!(%identity, "already committed");
            return Ok(());
        }

        let line = format!("{identity}\n");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SheetdropError::tracker_io(&self.path, e))?;

        file.write_all(line.as_bytes())
            .map_err(|e| SheetdropError::tracker_io(&self.path, e))?;
        file.sync_data()
            .map_err(|e| SheetdropError::tracker_io(&self.path, e))?;

        self.entries.insert(identity.as_str().to_string());
        debug!(%identity, "committed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cut the store back to its last complete line.
fn truncate_to(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| SheetdropError::tracker_io(path, e))?;
    file.set_len(len)
        .map_err(|e| SheetdropError::tracker_io(path, e))?;
    file.sync_data()
        .map_err(|e| SheetdropError::tracker_io(path, e))
}

/// Split content into its newline-terminated part and a trailing fragment.
fn split_torn_tail(content: &str) -> (&str, Option<&str>) {
    if content.is_empty() || content.ends_with('\n') {
        return (content, None);
    }
    match content.rfind('\n') {
        Some(idx) => (&content[..=idx], Some(&content[idx + 1..])),
        None => ("", Some(content)),
    }
}
