//! Output records.
//!
//! Both record types are written as CSV rows by `export::ResultWriter`; the
//! column order is the struct field order.

use serde::Serialize;

use crate::config::{PLATFORM_UNKNOWN, PLATFORM_UNREACHABLE};
use crate::fingerprint::Verdict;

/// A record type with a fixed CSV header.
pub trait TabularRecord: Serialize {
    /// Column names, in field order.
    const HEADER: &'static [&'static str];
}

/// A domain admitted by the index query engine.
///
/// Uniquely keyed by `domain` within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRecord {
    /// Normalized domain (`host[:port]`, lower-case, no `www.`)
    pub domain: String,
    /// TLD the domain was discovered under
    pub tld: String,
    /// Country associated with the TLD
    pub country: String,
    /// First captured URL that admitted the domain
    pub source_url: String,
    /// Capture timestamp as reported by the index (`YYYYMMDDhhmmss`)
    pub capture_timestamp: String,
    /// HTTP status recorded by the index
    pub http_status: u16,
    /// Detected languages recorded by the index (comma-separated ISO 639-3)
    pub language: String,
    /// MIME type recorded by the index
    pub mime_type: String,
    /// URL contains an e-commerce keyword
    pub is_ecommerce: bool,
    /// Platform suggested by the URL
    pub cms_hint: Option<String>,
}

impl TabularRecord for DomainRecord {
    const HEADER: &'static [&'static str] = &[
        "domain",
        "tld",
        "country",
        "source_url",
        "timestamp",
        "status",
        "language",
        "mime",
        "is_ecommerce",
        "cms_hint",
    ];
}

/// The verdict for one probed domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    /// Canonical domain
    pub domain: String,
    /// Platform name, `unknown`, or `unreachable`
    pub platform: String,
    /// 0-100
    pub confidence: u8,
    /// Identifier of the deciding rule (empty when none matched)
    pub matched_rule: String,
    /// Final HTTP status (absent when unreachable)
    pub http_status: Option<u16>,
    /// Wall time of the probe, retries included
    pub elapsed_ms: u64,
    /// Failure kind for unreachable domains
    pub error: Option<String>,
}

impl TabularRecord for DetectionResult {
    const HEADER: &'static [&'static str] = &[
        "domain",
        "platform",
        "confidence",
        "matched_rule",
        "http_status",
        "elapsed_ms",
        "error",
    ];
}

impl DetectionResult {
    /// A verdict for a probe that returned a page.
    pub fn classified(domain: String, verdict: Option<Verdict>, status: u16, elapsed_ms: u64) -> Self {
        match verdict {
            Some(verdict) => DetectionResult {
                domain,
                platform: verdict.platform,
                confidence: verdict.confidence,
                matched_rule: verdict.rule_id,
                http_status: Some(status),
                elapsed_ms,
                error: None,
            },
            None => DetectionResult {
                domain,
                platform: PLATFORM_UNKNOWN.to_string(),
                confidence: 0,
                matched_rule: String::new(),
                http_status: Some(status),
                elapsed_ms,
                error: None,
            },
        }
    }

    /// A verdict for a probe that failed.
    pub fn unreachable(domain: String, error: &str, elapsed_ms: u64) -> Self {
        DetectionResult {
            domain,
            platform: PLATFORM_UNREACHABLE.to_string(),
            confidence: 0,
            matched_rule: String::new(),
            http_status: None,
            elapsed_ms,
            error: Some(error.to_string()),
        }
    }

    /// Returns `true` if the probe failed.
    pub fn is_unreachable(&self) -> bool {
        self.platform == PLATFORM_UNREACHABLE
    }

    /// Returns `true` if the page matched no signature.
    pub fn is_unknown(&self) -> bool {
        self.platform == PLATFORM_UNKNOWN
    }
}
