//! Configuration types.
//!
//! This module defines the library configuration structs. They can be
//! constructed programmatically without any CLI dependencies; the CLI in
//! `config::cli` converts into them.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::*;
use crate::domain::is_valid_tld;
use crate::error_handling::ConfigError;
use crate::filter::DateBound;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Crawl index access settings.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// Base URL of the index server (serves `/collinfo.json`)
    pub server: String,

    /// Per-page request timeout
    pub timeout: Duration,

    /// Maximum pages paginated per shard
    pub pages: usize,

    /// Retries for a failed page before its shard is abandoned
    pub retries: usize,

    /// Base delay for page retries in milliseconds
    pub retry_delay_ms: u64,

    /// Explicit collection ids (e.g. `CC-MAIN-2024-33`); empty means newest
    pub crawls: Vec<String>,

    /// Number of newest collections to query when `crawls` is empty
    pub crawl_count: usize,

    /// HTTP User-Agent header value
    pub user_agent: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_INDEX_SERVER.to_string(),
            timeout: Duration::from_secs(DEFAULT_INDEX_TIMEOUT_SECS),
            pages: DEFAULT_INDEX_PAGES,
            retries: DEFAULT_INDEX_RETRIES,
            retry_delay_ms: RETRY_INITIAL_DELAY_MS,
            crawls: Vec::new(),
            crawl_count: DEFAULT_CRAWL_COUNT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Live probe settings.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Hard per-probe timeout
    pub timeout: Duration,

    /// Retries for refused or reset connections
    pub retries: usize,

    /// Base delay for connection retries in milliseconds
    pub retry_delay_ms: u64,

    /// Maximum body prefix read per probe, in bytes
    pub body_limit: usize,

    /// Maximum redirect hops followed
    pub max_redirects: usize,

    /// HTTP User-Agent header value
    pub user_agent: String,
}

impl IndexSettings {
    /// Rejects settings that would make every page request fail or query nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive_timeout("--index-timeout", self.timeout)?;
        if self.pages == 0 {
            return Err(ConfigError::InvalidSetting {
                option: "--pages",
                reason: "must be at least 1",
            });
        }
        if self.crawls.is_empty() && self.crawl_count == 0 {
            return Err(ConfigError::InvalidSetting {
                option: "--crawls",
                reason: "must be at least 1 when no --crawl id is given",
            });
        }
        Ok(())
    }
}

impl ProbeSettings {
    /// Rejects a zero timeout, under which every probe would record `timeout`.
    ///
    /// `option` names the flag that set the timeout in the error message.
    pub fn validate(&self, option: &'static str) -> Result<(), ConfigError> {
        ensure_positive_timeout(option, self.timeout)
    }
}

fn ensure_positive_timeout(option: &'static str, timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::InvalidSetting {
            option,
            reason: "timeout must be greater than zero",
        });
    }
    Ok(())
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            retries: DEFAULT_PROBE_RETRIES,
            retry_delay_ms: PROBE_RETRY_DELAY_MS,
            body_limit: MAX_BODY_PREFIX_BYTES,
            max_redirects: MAX_REDIRECT_HOPS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Discovery filters as given by the operator.
///
/// Converted into a `FilterCriteria` once per run.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Keep only URLs containing at least one of these substrings
    pub keywords: Vec<String>,

    /// Keep only domains whose URL suggests one of these platforms
    pub cms: Vec<String>,

    /// Accepted index status codes (empty accepts any)
    pub status: Vec<u16>,

    /// Accepted MIME type prefix
    pub mime: Option<String>,

    /// Required index language (ISO 639-3, e.g. `eng`, `deu`)
    pub language: Option<String>,

    /// Earliest capture date (`YYYY`, `YYYYMM`, `YYYYMMDD`, or longer)
    pub date_from: Option<String>,

    /// Latest capture date
    pub date_to: Option<String>,

    /// File of domains to skip, one per line
    pub exclude_file: Option<PathBuf>,

    /// Number of sightings required before a domain is admitted
    pub min_occurrences: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            cms: Vec::new(),
            status: vec![DEFAULT_STATUS],
            mime: Some(DEFAULT_MIME.to_string()),
            language: None,
            date_from: None,
            date_to: None,
            exclude_file: None,
            min_occurrences: 1,
        }
    }
}

/// Configuration of a discovery run (`shopscan crawl`).
///
/// # Examples
///
/// ```no_run
/// use shopscan::CrawlConfig;
///
/// let config = CrawlConfig {
///     tlds: vec!["ch".to_string(), "de".to_string()],
///     limit: 500,
///     live_check: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// TLDs to discover domains under
    pub tlds: Vec<String>,

    /// Maximum admitted domains per TLD
    pub limit: usize,

    /// Directory receiving `crawl_domains.csv` and `live_detected.csv`
    pub output_dir: PathBuf,

    /// Index shard workers (values <= 0 use the default)
    pub workers: i64,

    /// Crawl index access
    pub index: IndexSettings,

    /// Discovery filters
    pub filters: FilterOptions,

    /// Probe every admitted domain while crawling
    pub live_check: bool,

    /// Live detection concurrency (values <= 0 use the default)
    pub live_threads: i64,

    /// Live probe settings
    pub probe: ProbeSettings,

    /// Signature table file replacing the built-in table
    pub signatures: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            tlds: Vec::new(),
            limit: DEFAULT_TLD_LIMIT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            workers: DEFAULT_INDEX_WORKERS as i64,
            index: IndexSettings::default(),
            filters: FilterOptions::default(),
            live_check: false,
            live_threads: DEFAULT_LIVE_THREADS as i64,
            probe: ProbeSettings::default(),
            signatures: None,
        }
    }
}

impl CrawlConfig {
    /// Normalizes the TLD list and checks everything that can be checked
    /// without touching the network or the filesystem.
    ///
    /// TLDs are lower-cased, stripped of a leading dot, and deduplicated
    /// in their given order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty or invalid TLD list, a zero limit,
    /// threshold, page count or timeout, an unparseable date bound, or an
    /// inverted date range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let mut tlds: Vec<String> = Vec::new();
        for raw in &self.tlds {
            let tld = raw.trim().trim_start_matches('.').to_lowercase();
            if tld.is_empty() {
                continue;
            }
            if !is_valid_tld(&tld) {
                return Err(ConfigError::InvalidTld(raw.clone()));
            }
            if !tlds.contains(&tld) {
                tlds.push(tld);
            }
        }
        if tlds.is_empty() {
            return Err(ConfigError::NoTlds);
        }
        self.tlds = tlds;

        if self.limit == 0 {
            return Err(ConfigError::InvalidSetting {
                option: "--limit",
                reason: "must be at least 1",
            });
        }
        if self.filters.min_occurrences == 0 {
            return Err(ConfigError::InvalidSetting {
                option: "--min",
                reason: "must be at least 1",
            });
        }
        self.index.validate()?;
        if self.live_check {
            self.probe.validate("--live-timeout")?;
        }

        let from = self
            .filters
            .date_from
            .as_deref()
            .map(DateBound::lower)
            .transpose()?;
        let to = self
            .filters
            .date_to
            .as_deref()
            .map(DateBound::upper)
            .transpose()?;
        if let (Some(from), Some(to)) = (&from, &to) {
            if from.as_str() > to.as_str() {
                return Err(ConfigError::InvertedDateRange {
                    from: self.filters.date_from.clone().unwrap_or_default(),
                    to: self.filters.date_to.clone().unwrap_or_default(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration of a standalone detection run (`shopscan detect`).
#[derive(Debug, Clone)]
pub struct DetectConfig {
    /// Domains given directly
    pub domains: Vec<String>,

    /// File of domains, one per line
    pub file: Option<PathBuf>,

    /// Probe concurrency (values <= 0 use the default)
    pub workers: i64,

    /// Live probe settings
    pub probe: ProbeSettings,

    /// Output CSV path
    pub output: PathBuf,

    /// Signature table file replacing the built-in table
    pub signatures: Option<PathBuf>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            file: None,
            workers: DEFAULT_DETECT_WORKERS as i64,
            probe: ProbeSettings::default(),
            output: PathBuf::from(DEFAULT_DETECT_OUTPUT),
            signatures: None,
        }
    }
}

impl DetectConfig {
    /// Checks the probe settings before any domain is read or probed.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidSetting` for a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.probe.validate("--timeout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_crawl_config_defaults() {
        let config = CrawlConfig::default();
        assert_eq!(config.limit, DEFAULT_TLD_LIMIT);
        assert_eq!(config.index.pages, DEFAULT_INDEX_PAGES);
        assert_eq!(config.filters.status, vec![200]);
        assert_eq!(config.filters.mime.as_deref(), Some("text/html"));
        assert_eq!(config.filters.min_occurrences, 1);
        assert!(!config.live_check);
    }

    #[test]
    fn test_validate_normalizes_tlds() {
        let mut config = CrawlConfig {
            tlds: vec![".US".to_string(), "de".to_string(), "us".to_string()],
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.tlds, vec!["us".to_string(), "de".to_string()]);
    }

    #[test]
    fn test_validate_accepts_multi_label_tld() {
        let mut config = CrawlConfig {
            tlds: vec!["co.uk".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_tld_list() {
        let mut config = CrawlConfig {
            tlds: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoTlds)));
    }

    #[test]
    fn test_validate_rejects_invalid_tld() {
        let mut config = CrawlConfig {
            tlds: vec!["u s".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTld(_))
        ));
    }

    fn crawl_config(tld: &str) -> CrawlConfig {
        CrawlConfig {
            tlds: vec![tld.to_string()],
            ..Default::default()
        }
    }

    fn invalid_option(result: Result<(), ConfigError>) -> Option<&'static str> {
        match result {
            Err(ConfigError::InvalidSetting { option, .. }) => Some(option),
            _ => None,
        }
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = crawl_config("ch");
        config.limit = 0;
        assert_eq!(invalid_option(config.validate()), Some("--limit"));

        let mut config = crawl_config("ch");
        config.index.pages = 0;
        assert_eq!(invalid_option(config.validate()), Some("--pages"));

        let mut config = crawl_config("ch");
        config.filters.min_occurrences = 0;
        assert_eq!(invalid_option(config.validate()), Some("--min"));

        let mut config = crawl_config("ch");
        config.index.crawl_count = 0;
        assert_eq!(invalid_option(config.validate()), Some("--crawls"));
        config.index.crawls = vec!["CC-MAIN-2024-33".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = crawl_config("ch");
        config.index.timeout = Duration::ZERO;
        assert_eq!(invalid_option(config.validate()), Some("--index-timeout"));

        // The live timeout only matters when probing
        let mut config = crawl_config("ch");
        config.probe.timeout = Duration::ZERO;
        assert!(config.validate().is_ok());
        config.live_check = true;
        assert_eq!(invalid_option(config.validate()), Some("--live-timeout"));

        let detect = DetectConfig {
            probe: ProbeSettings {
                timeout: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(invalid_option(detect.validate()), Some("--timeout"));
        assert!(DetectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_dates() {
        let mut config = CrawlConfig {
            tlds: vec!["us".to_string()],
            ..Default::default()
        };
        config.filters.date_from = Some("2024".to_string());
        config.filters.date_to = Some("2023".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedDateRange { .. })
        ));
    }

    #[test]
    fn test_validate_same_year_range_is_valid() {
        let mut config = CrawlConfig {
            tlds: vec!["us".to_string()],
            ..Default::default()
        };
        config.filters.date_from = Some("2024".to_string());
        config.filters.date_to = Some("2024".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_date() {
        let mut config = CrawlConfig {
            tlds: vec!["us".to_string()],
            ..Default::default()
        };
        config.filters.date_from = Some("20x4".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDate { .. })
        ));
    }
}
