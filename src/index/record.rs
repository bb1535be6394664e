//! Index record parsing.
//!
//! A page of index results is newline-delimited JSON, one capture per line:
//!
//! ```text
//! {"urlkey": "ch,shop)/", "timestamp": "20240301120000", "url": "https://shop.ch/",
//!  "mime": "text/html", "status": "200", "languages": "deu,eng", ...}
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::domain::normalize_domain;
use crate::filter::{cms_hint, country_for_tld, is_ecommerce_url};
use crate::models::DomainRecord;

/// Why a line could not be turned into a candidate.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MalformedRecord {
    /// The line is not a capture object
    #[error("invalid JSON: {0}")]
    Json(String),

    /// The URL is not http(s) or has no host
    #[error("no usable host in URL '{0}'")]
    Url(String),

    /// The timestamp is not `YYYYMMDD...` digits
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
}

#[derive(Debug, Deserialize)]
struct CdxLine {
    url: String,
    timestamp: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    mime: Option<String>,
    #[serde(default, rename = "mime-detected")]
    mime_detected: Option<String>,
    #[serde(default)]
    languages: Option<String>,
}

/// Parses one index line into a candidate for `tld`.
///
/// A missing or non-numeric status (revisit records carry `-`) becomes `0`
/// and is left to the status filter.
pub fn parse_line(line: &str, tld: &str) -> Result<DomainRecord, MalformedRecord> {
    let cdx: CdxLine =
        serde_json::from_str(line).map_err(|e| MalformedRecord::Json(e.to_string()))?;

    // Captures always carry an explicit scheme; anything else is not a web page
    let scheme = cdx.url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
    if !matches!(scheme.as_deref(), Some("http" | "https")) {
        return Err(MalformedRecord::Url(cdx.url));
    }
    let domain = normalize_domain(&cdx.url).ok_or_else(|| MalformedRecord::Url(cdx.url.clone()))?;

    let timestamp = cdx.timestamp.trim();
    if timestamp.len() < 8 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedRecord::Timestamp(cdx.timestamp));
    }

    let http_status = cdx
        .status
        .as_deref()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or(0);
    let mime_type = cdx
        .mime
        .filter(|m| !m.is_empty() && m != "unk")
        .or(cdx.mime_detected)
        .unwrap_or_default();

    Ok(DomainRecord {
        domain,
        tld: tld.to_string(),
        country: country_for_tld(tld).to_string(),
        is_ecommerce: is_ecommerce_url(&cdx.url),
        cms_hint: cms_hint(&cdx.url).map(str::to_string),
        capture_timestamp: timestamp.to_string(),
        source_url: cdx.url,
        http_status,
        language: cdx.languages.unwrap_or_default(),
        mime_type,
    })
}

/// Parses every non-blank line of a page, keeping page order.
///
/// Returns the candidates and the number of malformed lines.
pub fn parse_page(body: &str, tld: &str) -> (Vec<DomainRecord>, usize) {
    let mut records = Vec::new();
    let mut malformed = 0;
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_line(line, tld) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::debug!("Skipping malformed index record: {e}");
                malformed += 1;
            }
        }
    }
    (records, malformed)
}
