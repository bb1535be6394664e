//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults, limits, retry timing)
//! - Library configuration types usable without the CLI
//! - CLI option types and parsing

pub mod cli;
mod constants;
mod types;

// Re-export all constants
pub use cli::{Command, CrawlArgs, DetectArgs, Opt};
pub use constants::*;
pub use types::{
    CrawlConfig, DetectConfig, FilterOptions, IndexSettings, LogFormat, LogLevel, ProbeSettings,
};
