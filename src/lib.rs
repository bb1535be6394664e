//! shopscan library: e-commerce domain discovery and storefront detection
//!
//! This library discovers domains under a set of TLDs from the Common Crawl
//! CDX index, and detects the e-commerce platform (Shopify, Magento,
//! WooCommerce, ...) a live site runs by probing its home page.
//!
//! # Example
//!
//! ```no_run
//! use shopscan::{run_crawl, CrawlConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlConfig {
//!     tlds: vec!["ch".to_string()],
//!     limit: 500,
//!     live_check: true,
//!     ..Default::default()
//! };
//!
//! let report = run_crawl(config, CancellationToken::new()).await?;
//! println!("Discovered {} domains", report.index.domains_admitted);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

mod app;
pub mod config;
pub mod domain;
pub mod error_handling;
pub mod export;
pub mod filter;
pub mod fingerprint;
pub mod index;
pub mod initialization;
pub mod live;
pub mod models;
pub mod pool;
pub mod probe;
mod run;

// Re-export public API
pub use config::{CrawlConfig, DetectConfig, LogFormat, LogLevel};
pub use error_handling::{ConfigError, ProcessingStats};
pub use fingerprint::{Classifier, SignatureRegistry, Verdict};
pub use models::{DetectionResult, DomainRecord};
pub use run::{list_crawls, run_crawl, run_detect, CrawlReport, DetectReport};
