//! Remote folder link resolution.
//!
//! Fetches the shared folder page and turns it into an ordered list of
//! [`FileReference`]s. Each reference carries a durable [`FileIdentity`]
//! taken from the provider's file id (or the file URL), so a file keeps its
//! identity when its position in the listing changes between runs.
//!
//! [`FileIdentity`]: sheetdrop_shared::FileIdentity

mod parser;

use std::time::Duration;

use reqwest::Client;
use sheetdrop_shared::{FileReference, ResolverSettings, Result, SheetdropError};
use tracing::{debug, info, instrument};
use url::Url;

/// Maximum number of redirects to follow when fetching the listing.
const MAX_REDIRECTS: usize = 5;

/// Maximum listing size we consider valid (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("sheetdrop/", env!("CARGO_PKG_VERSION"));

/// Resolves a folder URL into the files currently visible in it.
#[derive(Debug, Clone)]
pub struct FolderResolver {
    client: Client,
    download_base: Url,
}

impl FolderResolver {
    /// Build a resolver with its own HTTP client.
    pub fn new(settings: &ResolverSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SheetdropError::Discovery(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            download_base: settings.download_base.clone(),
        })
    }

    /// List the files in `folder`, in listing order, one entry per identity.
    ///
    /// Fails with [`SheetdropError::Discovery`] when the folder cannot be
    /// reached or its body is not a listing. Read-only.
    #[instrument(skip_all, fields(folder = %folder))]
    pub async fn resolve(&self, folder: &Url) -> Result<Vec<FileReference>> {
        let body = self.fetch_listing(folder).await?;

        if body.trim().is_empty() {
            return Err(SheetdropError::Discovery(format!(
                "{folder}: empty folder listing"
            )));
        }

        let refs = parser::parse_listing(&body, folder, &self.download_base);

        info!(files = refs.len(), "folder listing resolved");
        for r in &refs {
            debug!(identity = %r.identity, name = r.name.as_deref().unwrap_or(""), "listed file");
        }

        Ok(refs)
    }

    async fn fetch_listing(&self, folder: &Url) -> Result<String> {
        let mut response = self
            .client
            .get(folder.as_str())
            .send()
            .await
            .map_err(|e| SheetdropError::Discovery(format!("{folder}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetdropError::Discovery(format!("{folder}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(too_large(folder, len));
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SheetdropError::Discovery(format!("{folder}: failed to read body: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > MAX_RESPONSE_SIZE {
                return Err(too_large(folder, body.len() as u64));
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn too_large(folder: &Url, len: u64) -> SheetdropError {
    SheetdropError::Discovery(format!(
        "{folder}: listing too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
    ))
}
