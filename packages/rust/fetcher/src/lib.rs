//! Raw file download for discovered folder entries.
//!
//! The [`Fetcher`] downloads one [`FileReference`], declares its format, and
//! stores the bytes under `<download_dir>/<identity>.<ext>`. Bytes land in a
//! hidden `.part` file first and are renamed into place only once complete,
//! so a failed download never leaves a partial artifact behind.

mod format;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderName};
use sha2::{Digest, Sha256};
use sheetdrop_shared::{
    FetchSettings, FileIdentity, FileReference, RawFile, Result, SheetdropError,
};
use tracing::{debug, info, instrument, warn};

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("sheetdrop/", env!("CARGO_PKG_VERSION"));

/// Downloads files into the local download directory.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    download_dir: PathBuf,
    max_bytes: u64,
}

impl Fetcher {
    /// Create a fetcher with the given settings.
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                SheetdropError::fetch("<client>", None, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            download_dir: settings.download_dir.clone(),
            max_bytes: settings.max_download_bytes,
        })
    }

    /// Download `reference` and persist it under its identity.
    #[instrument(skip_all, fields(identity = %reference.identity))]
    pub async fn fetch(&self, reference: &FileReference) -> Result<RawFile> {
        let locator = reference.locator.as_str();
        debug!(%locator, "downloading");

        let mut response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| SheetdropError::fetch(locator, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetdropError::fetch(
                locator,
                Some(status.as_u16()),
                format!("HTTP {status}"),
            ));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large(locator, len));
            }
        }

        let (content_type, disposition) = header_hints(response.headers());

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SheetdropError::fetch(locator, Some(status.as_u16()), e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_bytes {
                return Err(self.too_large(locator, bytes.len() as u64));
            }
        }

        let format = format::declare_format(
            content_type.as_deref(),
            disposition.as_deref(),
            reference.name.as_deref(),
            &bytes,
        );

        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| SheetdropError::io(&self.download_dir, e))?;

        let target = self
            .download_dir
            .join(format!("{}.{}", reference.identity, format.extension()));
        write_atomic(&self.download_dir, &reference.identity, &target, &bytes)?;

        let raw = RawFile {
            identity: reference.identity.clone(),
            path: target,
            format,
            sha256: compute_hash(&bytes),
            size_bytes: bytes.len() as u64,
        };

        info!(
            path = %raw.path.display(),
            format = %raw.format,
            size_bytes = raw.size_bytes,
            sha256 = %raw.sha256,
            "file downloaded"
        );

        Ok(raw)
    }

    fn too_large(&self, locator: &str, len: u64) -> SheetdropError {
        SheetdropError::fetch(
            locator,
            None,
            format!("response too large ({len} bytes, max {})", self.max_bytes),
        )
    }
}

fn header_hints(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let get = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    (get(CONTENT_TYPE), get(CONTENT_DISPOSITION))
}

/// Write `bytes` to `target` via a temp file in the same directory.
fn write_atomic(dir: &Path, identity: &FileIdentity, target: &Path, bytes: &[u8]) -> Result<()> {
    let temp = dir.join(format!(".{identity}.part"));

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp, target)
    })();

    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_file(&temp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(temp = %temp.display(), error = %cleanup, "failed to remove partial download");
            }
        }
        return Err(SheetdropError::io(target, e));
    }
    Ok(())
}

/// Compute SHA-256 hash of content.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
