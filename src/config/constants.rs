//! Configuration constants.
//!
//! This module defines the defaults and limits used throughout the application,
//! including timeouts, concurrency ceilings, and retry timing.

// Crawl index
/// Default crawl index server (Common Crawl CDX)
pub const DEFAULT_INDEX_SERVER: &str = "https://index.commoncrawl.org";
/// Per-request timeout for index pages in seconds
/// Index pages are large NDJSON batches and the public server is often slow
pub const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 60;
/// Default number of index pages paginated per shard
pub const DEFAULT_INDEX_PAGES: usize = 80;
/// Default number of index shard workers
pub const DEFAULT_INDEX_WORKERS: usize = 4;
/// Upper bound for index shard workers
/// The public index server rate-limits aggressively above a handful of clients
pub const MAX_INDEX_WORKERS: usize = 64;
/// Default number of retries for a failed index page before the shard is abandoned
pub const DEFAULT_INDEX_RETRIES: usize = 3;
/// Default number of newest crawl collections to query
pub const DEFAULT_CRAWL_COUNT: usize = 1;
/// Default per-TLD domain limit
pub const DEFAULT_TLD_LIMIT: usize = 1000;
/// Capacity of the channel between index shard workers and the ingestion path
pub const INGEST_CHANNEL_CAPACITY: usize = 64;
/// Capacity of the channel feeding admitted domains into live detection
pub const LIVE_CHANNEL_CAPACITY: usize = 1024;

// Discovery filters
/// Default MIME type filter applied server-side and client-side
pub const DEFAULT_MIME: &str = "text/html";
/// Default HTTP status filter
pub const DEFAULT_STATUS: u16 = 200;

// Live probing
/// Default live detection concurrency
pub const DEFAULT_LIVE_THREADS: usize = 50;
/// Default concurrency for the standalone detector
pub const DEFAULT_DETECT_WORKERS: usize = 20;
/// Upper bound for live detection concurrency
pub const MAX_LIVE_CONCURRENCY: usize = 1000;
/// Default per-probe timeout in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
/// Number of retries for refused or reset connections
/// Timeouts are never retried so a probe stays bounded by one timeout
pub const DEFAULT_PROBE_RETRIES: usize = 1;
/// Maximum body prefix read per probe (100KB)
pub const MAX_BODY_PREFIX_BYTES: usize = 100 * 1024;
/// Maximum number of redirect hops to follow
pub const MAX_REDIRECT_HOPS: usize = 10;

/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
/// Accept header sent with live probes
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
/// Accept-Language header sent with live probes
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

// Classification
/// Minimum accumulated body-pattern weight for a verdict
pub const BODY_MATCH_THRESHOLD: u32 = 40;
/// Confidence for header, cookie, and meta-generator matches
pub const UNAMBIGUOUS_CONFIDENCE: u8 = 100;
/// Highest confidence a body-pattern verdict can reach
pub const MAX_BODY_CONFIDENCE: u8 = 99;
/// Platform name for probes that returned a page but matched nothing
pub const PLATFORM_UNKNOWN: &str = "unknown";
/// Platform name for probes that failed
pub const PLATFORM_UNREACHABLE: &str = "unreachable";

// Output
/// Discovery output file name inside the output directory
pub const DISCOVERY_FILE_NAME: &str = "crawl_domains.csv";
/// Live detection output file name inside the output directory
pub const DETECTION_FILE_NAME: &str = "live_detected.csv";
/// Default output directory for crawl runs
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Default output file for the standalone detector
pub const DEFAULT_DETECT_OUTPUT: &str = "detected.csv";
/// Flush result writers after this many rows
pub const DEFAULT_FLUSH_EVERY: usize = 1;

// Progress logging interval in seconds
/// Seconds between progress lines.
pub const LOGGING_INTERVAL: u64 = 5;

// Retry strategy
/// Base delay in milliseconds for index page retries
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Base delay in milliseconds for probe connection retries
pub const PROBE_RETRY_DELAY_MS: u64 = 250;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 15;

// HTTP status codes
/// Rate limiting status; index requests retry on it.
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Index pages past the end of a shard answer 404.
pub const HTTP_STATUS_NOT_FOUND: u16 = 404;
