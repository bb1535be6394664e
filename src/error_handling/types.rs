//! Error type definitions.
//!
//! This module defines the typed errors returned by setup code and the
//! error, skip, and info categories counted while a run is in progress.

use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Errors raised while validating run configuration.
///
/// Every variant is fatal and is reported before any index query or probe is
/// issued. The binary maps these to exit code 1.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TLD list is empty
    #[error("No TLDs were given")]
    NoTlds,

    /// A TLD is not made of DNS labels
    #[error("Invalid TLD '{0}': expected labels of letters, digits, or hyphens (e.g. 'us', 'co.uk')")]
    InvalidTld(String),

    /// A `--from`/`--to` bound is not a date
    #[error("Invalid date '{value}': {reason}")]
    InvalidDate {
        /// Value as given
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// `--from` is after `--to`
    #[error("Date range is inverted: --from {from} is after --to {to}")]
    InvertedDateRange {
        /// `--from` as given
        from: String,
        /// `--to` as given
        to: String,
    },

    /// The exclude file could not be read
    #[error("Failed to read exclude file {}: {source}", path.display())]
    ExcludeFile {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The domain file could not be read
    #[error("Failed to read domain file {}: {source}", path.display())]
    InputFile {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An output directory or file cannot be created
    #[error("Output path {} is not writable: {source}", path.display())]
    OutputUnwritable {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// No requested TLD has any index page
    #[error("No index shard found for any requested TLD ({0})")]
    NoIndexFound(String),

    /// A `--crawl` id is not listed by the server
    #[error("Unknown crawl collection '{0}' (use --list-crawls to see available ids)")]
    UnknownCrawl(String),

    /// The collection listing could not be fetched
    #[error("Crawl index listing failed: {0}")]
    IndexUnavailable(String),

    /// `detect` was given no domain
    #[error("No domains to check: pass a DOMAIN argument or --file")]
    NoDomains,

    /// A numeric option is out of range
    #[error("Invalid value for {option}: {reason}")]
    InvalidSetting {
        /// Flag that carried the value
        option: &'static str,
        /// Accepted range
        reason: &'static str,
    },

    /// The signature table could not be loaded
    #[error(transparent)]
    Signatures(#[from] SignatureError),
}

/// Errors raised while loading a signature table.
#[derive(Error, Debug)]
pub enum SignatureError {
    /// The signature file could not be read
    #[error("Failed to read signature file {}: {source}", path.display())]
    Read {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The signature file is not valid JSON
    #[error("Failed to parse signature file {}: {source}", path.display())]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The table declares no rule
    #[error("Signature table is empty")]
    Empty,

    /// A rule has an empty or unusable pattern
    #[error("Invalid signature '{rule}': {reason}")]
    InvalidPattern {
        /// Identifier of the offending rule
        rule: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Errors raised by a single crawl index request.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Transport or body error from the HTTP client
    #[error("Index request failed: {0}")]
    Http(#[from] ReqwestError),

    /// Non-success status other than 404
    #[error("Index server returned HTTP {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// Status returned
        status: u16,
    },

    /// Body could not be decompressed or parsed
    #[error("Failed to decode index response: {0}")]
    Decode(String),

    /// The collection's CDX endpoint is not a valid URL
    #[error("Invalid index URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors raised by a result writer.
#[derive(Error, Debug)]
pub enum WriterError {
    /// The output file could not be created
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A row could not be serialized
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing to disk failed
    #[error("Flush error: {0}")]
    Io(#[from] std::io::Error),

    /// Another writer panicked while holding the lock
    #[error("Writer lock poisoned")]
    Poisoned,
}

/// Failures counted during a run.
///
/// These never abort the run; they are converted into a recorded outcome at
/// their origin and surfaced in the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    // Crawl index
    /// A page failed after its retries
    IndexPageFetchError,
    /// A shard stopped early after a failed page
    IndexShardAbandoned,
    /// Page count lookup failed for a TLD
    IndexListingError,
    // Live probes
    /// Probe exceeded its timeout
    ProbeTimeout,
    /// Probe could not connect
    ProbeConnectionError,
    /// TLS handshake or certificate failure
    ProbeTlsError,
    /// Redirect chain longer than allowed
    ProbeTooManyRedirects,
    /// A spawned task panicked
    WorkerFailure,
    // Output
    /// A result row could not be written
    WriterError,
}

/// Reasons a candidate was dropped without producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum SkipReason {
    /// Index line that is not a usable capture
    MalformedRecord,
    /// Domain already admitted
    DuplicateDomain,
    /// Host is not under the requested TLD
    OutsideTld,
    /// Capture outside `--from`/`--to`
    OutsideDateRange,
    /// Capture status not accepted
    StatusFiltered,
    /// Capture MIME type not accepted
    MimeFiltered,
    /// Capture lacks the requested language
    LanguageFiltered,
    /// URL matches no keyword
    KeywordFiltered,
    /// Domain is on the exclude list
    Excluded,
    /// Placeholder domain such as `example.*`
    BadDomainPattern,
    /// URL hints at no allowed platform
    CmsFiltered,
    /// The TLD already has `--limit` domains
    TldLimitReached,
    /// Domain-list entry with no usable host
    InvalidInputDomain,
    /// Domain-list entry repeating an earlier one
    DuplicateInputDomain,
}

/// Informational metrics recorded during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    /// Pages fetched successfully
    IndexPageFetched,
    /// Pages that held no capture
    IndexPageEmpty,
    /// Page request retries
    IndexPageRetried,
    /// Index lines parsed into candidates
    IndexRecordParsed,
    /// Domains written to the discovery output
    DomainAdmitted,
    /// Domains seen fewer than `--min` times
    BelowMinOccurrences,
    /// Probe retries after a connection error
    ProbeRetried,
    /// Pages matched to a platform
    PlatformDetected,
    /// Pages matching no signature
    PlatformUnknown,
    /// Probes that ended on a different URL
    HttpRedirect,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    /// Label used in the end-of-run summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::IndexPageFetchError => "Index page fetch failed",
            ErrorType::IndexShardAbandoned => "Index shard abandoned",
            ErrorType::IndexListingError => "Index shard lookup failed",
            ErrorType::ProbeTimeout => "Probe timeout",
            ErrorType::ProbeConnectionError => "Probe connection error",
            ErrorType::ProbeTlsError => "Probe TLS error",
            ErrorType::ProbeTooManyRedirects => "Probe too many redirects",
            ErrorType::WorkerFailure => "Worker failure",
            ErrorType::WriterError => "Result write error",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SkipReason {
    /// Label used in the end-of-run summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MalformedRecord => "Malformed index record",
            SkipReason::DuplicateDomain => "Duplicate domain",
            SkipReason::OutsideTld => "Outside requested TLD",
            SkipReason::OutsideDateRange => "Outside date range",
            SkipReason::StatusFiltered => "Status filtered",
            SkipReason::MimeFiltered => "MIME type filtered",
            SkipReason::LanguageFiltered => "Language filtered",
            SkipReason::KeywordFiltered => "No keyword match",
            SkipReason::Excluded => "Excluded domain",
            SkipReason::BadDomainPattern => "Placeholder domain",
            SkipReason::CmsFiltered => "CMS filtered",
            SkipReason::TldLimitReached => "TLD limit reached",
            SkipReason::InvalidInputDomain => "Invalid input domain",
            SkipReason::DuplicateInputDomain => "Duplicate input domain",
        }
    }
}

impl std::fmt::Display for InfoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InfoType {
    /// Label used in the end-of-run summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::IndexPageFetched => "Index pages fetched",
            InfoType::IndexPageEmpty => "Index pages with no captures",
            InfoType::IndexPageRetried => "Index page retries",
            InfoType::IndexRecordParsed => "Index records parsed",
            InfoType::DomainAdmitted => "Domains admitted",
            InfoType::BelowMinOccurrences => "Sightings below minimum",
            InfoType::ProbeRetried => "Probe retries",
            InfoType::PlatformDetected => "Platform detected",
            InfoType::PlatformUnknown => "Platform unknown",
            InfoType::HttpRedirect => "Redirected probes",
        }
    }
}
