//! Folder listing parser.
//!
//! Recognizes, in document order:
//! - `a[href]` pointing at `/file/d/<id>/...` (public Drive share links)
//! - `a[href]` pointing at `.../open?id=<id>` or `.../uc?id=<id>`
//! - any element carrying `data-id="<id>"` (the script-rendered Drive grid)
//!   whose display name has a tabular extension; subfolders are skipped
//! - `a[href]` whose path ends in a tabular extension (plain directory indexes)
//!
//! The first three yield the provider's file id as identity; the last falls
//! back to a hash of the absolute URL.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sheetdrop_shared::{FileIdentity, FileReference};
use tracing::debug;
use url::Url;

static FILE_D_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").expect("file/d regex"));

static FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([A-Za-z0-9_-]+)").expect("folders regex"));

static ENTRY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href], [data-id]").expect("entry selector"));

/// Extensions a plain link must end with to count as a folder entry.
const TABULAR_EXTENSIONS: &[&str] = &[".xlsx", ".xlsm", ".csv"];

/// Parse a folder listing into file references, deduplicated by identity.
///
/// `page_url` resolves relative links; `download_base` builds direct-download
/// locators for provider ids.
pub(crate) fn parse_listing(html: &str, page_url: &Url, download_base: &Url) -> Vec<FileReference> {
    let doc = Html::parse_document(html);
    let own_folder_id = FOLDER_RE
        .captures(page_url.path())
        .map(|caps| caps[1].to_string());

    let mut order: Vec<FileReference> = Vec::new();
    let mut index: HashMap<FileIdentity, usize> = HashMap::new();

    for el in doc.select(&ENTRY_SEL) {
        let Some(entry) = classify(&el, page_url, download_base, own_folder_id.as_deref()) else {
            continue;
        };

        match index.get(&entry.identity) {
            Some(&pos) => {
                // Same file listed twice (icon + title link); keep the first,
                // but take a display name if the first had none.
                if order[pos].name.is_none() {
                    order[pos].name = entry.name;
                }
            }
            None => {
                index.insert(entry.identity.clone(), order.len());
                order.push(entry);
            }
        }
    }

    debug!(entries = order.len(), "folder listing parsed");
    order
}

/// Turn one element into a file reference, if it names a file.
fn classify(
    el: &ElementRef<'_>,
    page_url: &Url,
    download_base: &Url,
    own_folder_id: Option<&str>,
) -> Option<FileReference> {
    let name = display_name(el);

    if let Some(href) = el.value().attr("href") {
        if let Some(id) = remote_id_from_href(href, page_url) {
            return remote_reference(&id, name, download_base);
        }
        if let Some(url) = tabular_link(href, page_url) {
            let name = name.or_else(|| last_segment(&url));
            return Some(FileReference {
                identity: FileIdentity::from_locator(&url),
                locator: url,
                name,
            });
        }
    }

    let id = el.value().attr("data-id")?;
    if Some(id) == own_folder_id {
        return None;
    }
    if !name.as_deref().is_some_and(has_tabular_extension) {
        debug!(id, name = name.as_deref().unwrap_or(""), "skipping non-tabular grid entry");
        return None;
    }
    remote_reference(id, name, download_base)
}

fn remote_reference(id: &str, name: Option<String>, download_base: &Url) -> Option<FileReference> {
    let identity = FileIdentity::from_remote_id(id).ok()?;
    Some(FileReference {
        locator: download_locator(download_base, identity.as_str()),
        identity,
        name,
    })
}

/// `<base>?id=<id>&export=download`.
pub(crate) fn download_locator(download_base: &Url, id: &str) -> Url {
    let mut url = download_base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("id", id)
        .append_pair("export", "download");
    url
}

/// Provider file id carried by a share link, if any.
fn remote_id_from_href(href: &str, page_url: &Url) -> Option<String> {
    if let Some(caps) = FILE_D_RE.captures(href) {
        return Some(caps[1].to_string());
    }

    let url = page_url.join(href).ok()?;
    let path = url.path();
    if !(path.ends_with("/open") || path.ends_with("/uc")) {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
}

/// Absolute URL of a link to a tabular file, fragment stripped.
fn tabular_link(href: &str, page_url: &Url) -> Option<Url> {
    if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let mut url = page_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);

    has_tabular_extension(url.path()).then_some(url)
}

fn has_tabular_extension(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    TABULAR_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn display_name(el: &ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        return Some(text);
    }
    ["aria-label", "data-tooltip", "title"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

fn last_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(String::from)
}
