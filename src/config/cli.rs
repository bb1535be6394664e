//! Command-line options.
//!
//! The CLI is a thin shell: each subcommand converts into the matching
//! library configuration struct.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::constants::*;
use crate::config::types::{
    CrawlConfig, DetectConfig, FilterOptions, IndexSettings, LogFormat, LogLevel, ProbeSettings,
};

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Discover up to 5000 domains per TLD and probe them live
/// shopscan crawl -t us,ch,de -l 5000 --live-check
///
/// # Only PrestaShop-looking URLs from 2024 onwards
/// shopscan crawl -t fr --cms PrestaShop --from 2024
///
/// # Classify a domain list
/// shopscan detect -f domains.txt -w 50 -o results.csv
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "shopscan",
    version,
    about = "Discovers e-commerce domains from the Common Crawl index and detects their storefront platform."
)]
/// Command-line options.
pub struct Opt {
    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover domains from the crawl index
    Crawl(CrawlArgs),
    /// Detect the platform of given domains
    Detect(DetectArgs),
}

/// Options of `shopscan crawl`.
#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Comma-separated TLDs (e.g. us,ch,co.uk)
    #[arg(short = 't', long = "tld", value_delimiter = ',')]
    pub tlds: Vec<String>,

    /// Maximum domains per TLD
    #[arg(short, long, default_value_t = DEFAULT_TLD_LIMIT)]
    pub limit: usize,

    /// Output directory
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Index shard workers (<= 0 uses the default)
    #[arg(short, long, default_value_t = DEFAULT_INDEX_WORKERS as i64, allow_negative_numbers = true)]
    pub workers: i64,

    /// Maximum index pages per shard
    #[arg(short, long, default_value_t = DEFAULT_INDEX_PAGES)]
    pub pages: usize,

    /// Comma-separated URL keywords (any must match)
    #[arg(short, long, value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// File of domains to skip, one per line
    #[arg(short = 'x', long)]
    pub exclude: Option<PathBuf>,

    /// Sightings required before a domain is kept
    #[arg(long = "min", default_value_t = 1)]
    pub min_occurrences: usize,

    /// Earliest capture date (YYYY, YYYYMM or YYYYMMDD)
    #[arg(long = "from")]
    pub date_from: Option<String>,

    /// Latest capture date (YYYY, YYYYMM or YYYYMMDD)
    #[arg(long = "to")]
    pub date_to: Option<String>,

    /// MIME type filter
    #[arg(long, default_value = DEFAULT_MIME)]
    pub mime: String,

    /// Comma-separated HTTP status filter
    #[arg(long, value_delimiter = ',', default_value = "200")]
    pub status: Vec<u16>,

    /// Language filter as reported by the index (e.g. eng, deu)
    #[arg(long = "lang")]
    pub language: Option<String>,

    /// Comma-separated platforms suggested by the URL (e.g. Shopify,Magento)
    #[arg(long, value_delimiter = ',')]
    pub cms: Vec<String>,

    /// Probe every discovered domain and detect its platform
    #[arg(long)]
    pub live_check: bool,

    /// Live detection concurrency (<= 0 uses the default)
    #[arg(long, default_value_t = DEFAULT_LIVE_THREADS as i64, allow_negative_numbers = true)]
    pub live_threads: i64,

    /// Live probe timeout in seconds
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_SECS)]
    pub live_timeout: u64,

    /// Retries for refused or reset live connections
    #[arg(long, default_value_t = DEFAULT_PROBE_RETRIES)]
    pub live_retries: usize,

    /// List available crawl collections and exit
    #[arg(long)]
    pub list_crawls: bool,

    /// Crawl collection id to query (repeatable)
    #[arg(long = "crawl")]
    pub crawls: Vec<String>,

    /// Number of newest collections to query when --crawl is not given
    #[arg(long = "crawls", default_value_t = DEFAULT_CRAWL_COUNT)]
    pub crawl_count: usize,

    /// Crawl index server
    #[arg(long, default_value = DEFAULT_INDEX_SERVER)]
    pub index_server: String,

    /// Index page timeout in seconds
    #[arg(long, default_value_t = DEFAULT_INDEX_TIMEOUT_SECS)]
    pub index_timeout: u64,

    /// Retries for a failed index page
    #[arg(long, default_value_t = DEFAULT_INDEX_RETRIES)]
    pub index_retries: usize,

    /// JSON signature table replacing the built-in one
    #[arg(long)]
    pub signatures: Option<PathBuf>,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

/// Options of `shopscan detect`.
#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Single domain to check
    pub domain: Option<String>,

    /// File of domains, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Concurrent probes (<= 0 uses the default)
    #[arg(short, long, default_value_t = DEFAULT_DETECT_WORKERS as i64, allow_negative_numbers = true)]
    pub workers: i64,

    /// Probe timeout in seconds
    #[arg(short, long, default_value_t = DEFAULT_PROBE_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Retries for refused or reset connections
    #[arg(long, default_value_t = DEFAULT_PROBE_RETRIES)]
    pub retries: usize,

    /// Output CSV file
    #[arg(short, long, default_value = DEFAULT_DETECT_OUTPUT)]
    pub output: PathBuf,

    /// JSON signature table replacing the built-in one
    #[arg(long)]
    pub signatures: Option<PathBuf>,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl From<CrawlArgs> for CrawlConfig {
    fn from(args: CrawlArgs) -> Self {
        CrawlConfig {
            tlds: args.tlds,
            limit: args.limit,
            output_dir: args.output,
            workers: args.workers,
            index: IndexSettings {
                server: args.index_server,
                timeout: Duration::from_secs(args.index_timeout),
                pages: args.pages,
                retries: args.index_retries,
                crawls: args.crawls,
                crawl_count: args.crawl_count,
                user_agent: args.user_agent.clone(),
                ..Default::default()
            },
            filters: FilterOptions {
                keywords: args.keywords,
                cms: args.cms,
                status: args.status,
                mime: Some(args.mime).filter(|m| !m.trim().is_empty()),
                language: args.language,
                date_from: args.date_from,
                date_to: args.date_to,
                exclude_file: args.exclude,
                min_occurrences: args.min_occurrences,
            },
            live_check: args.live_check,
            live_threads: args.live_threads,
            probe: ProbeSettings {
                timeout: Duration::from_secs(args.live_timeout),
                retries: args.live_retries,
                user_agent: args.user_agent,
                ..Default::default()
            },
            signatures: args.signatures,
        }
    }
}

impl From<DetectArgs> for DetectConfig {
    fn from(args: DetectArgs) -> Self {
        DetectConfig {
            domains: args.domain.into_iter().collect(),
            file: args.file,
            workers: args.workers,
            probe: ProbeSettings {
                timeout: Duration::from_secs(args.timeout),
                retries: args.retries,
                user_agent: args.user_agent,
                ..Default::default()
            },
            output: args.output,
            signatures: args.signatures,
        }
    }
}
