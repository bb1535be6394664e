//! Error handling and processing statistics.
//!
//! This module provides:
//! - Typed errors for configuration, index access, signatures, and output
//! - Processing statistics tracking (errors, skips, info metrics)
//! - Retry strategy configuration
//! - Categorization of transport errors into recorded failure kinds
//!
//! Counted categories are:
//! - **Errors**: Per-page or per-domain failures that were contained and recorded
//! - **Skips**: Candidates dropped by a filter, dedup, or parsing
//! - **Info**: Informational metrics (pages fetched, retries, verdicts)

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_probe_error, get_retry_strategy, is_retriable_index_error};
pub use stats::ProcessingStats;
pub use types::{
    ConfigError, ErrorType, IndexError, InfoType, InitializationError, SignatureError,
    SkipReason, WriterError,
};
