//! Run-level utilities: progress logging, shutdown, and final statistics.

pub mod logging;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::{log_progress, spawn_progress_logger, Progress};
pub use shutdown::shutdown_gracefully;
pub use statistics::{print_discovery_breakdown, print_error_statistics, print_live_breakdown};
