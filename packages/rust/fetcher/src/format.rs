//! Format declaration for downloaded bytes.
//!
//! Sources are consulted in order and the first one that says anything wins:
//! 1. `Content-Type` (only the spreadsheet and CSV media types are decisive)
//! 2. `Content-Disposition` filename extension
//! 3. the display name from the folder listing
//! 4. magic bytes (`PK\x03\x04` is an OOXML container)

use std::sync::LazyLock;

use regex::Regex;
use sheetdrop_shared::FormatTag;

/// ZIP local file header, the container for `.xlsx`.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// `filename*=UTF-8''name.xlsx` (RFC 5987) or `filename="name.xlsx"`.
static DISPOSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:[\w-]+'[\w-]*')?"?([^";]+)"?"#)
        .expect("disposition regex")
});

/// Decide the format of a download.
pub(crate) fn declare_format(
    content_type: Option<&str>,
    disposition: Option<&str>,
    listed_name: Option<&str>,
    bytes: &[u8],
) -> FormatTag {
    if let Some(tag) = content_type.and_then(from_content_type) {
        return tag;
    }
    if let Some(tag) = disposition
        .and_then(disposition_filename)
        .and_then(|name| FormatTag::from_file_name(&name))
    {
        return tag;
    }
    if let Some(tag) = listed_name.and_then(FormatTag::from_file_name) {
        return tag;
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return FormatTag::Workbook;
    }

    let fallback = content_type
        .map(media_type)
        .filter(|m| !m.is_empty())
        .unwrap_or("unknown");
    FormatTag::Other(fallback.to_string())
}

fn from_content_type(content_type: &str) -> Option<FormatTag> {
    match media_type(content_type).to_ascii_lowercase().as_str() {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel.sheet.macroenabled.12" => Some(FormatTag::Workbook),
        "text/csv" | "application/csv" => Some(FormatTag::DelimitedText),
        _ => None,
    }
}

/// `text/csv; charset=utf-8` → `text/csv`.
fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

fn disposition_filename(disposition: &str) -> Option<String> {
    DISPOSITION_RE
        .captures_iter(disposition)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .last()
}
