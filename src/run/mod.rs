//! Run orchestration.
//!
//! `run_crawl` and `run_detect` validate their configuration, build the
//! shared resources, drive the engines, and return a report. Configuration
//! problems surface as `ConfigError` before any network request is made.

mod crawl;
mod detect;

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::error_handling::{ConfigError, WriterError};
use crate::export::ResultWriter;
use crate::fingerprint::{Classifier, SignatureRegistry};
use crate::models::TabularRecord;

pub use crawl::{list_crawls, run_crawl, CrawlReport};
pub use detect::{run_detect, DetectReport};

/// Loads the signature table (built-in unless `path` is given).
fn load_classifier(path: Option<&Path>) -> Result<Classifier, ConfigError> {
    let registry = SignatureRegistry::load(path)?;
    info!(
        "Using {} signatures for {} platforms",
        registry.len(),
        registry.platforms().len()
    );
    Ok(Classifier::new(Arc::new(registry)))
}

/// Creates `dir` (and its parents) if missing.
fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::OutputUnwritable {
        path: dir.to_path_buf(),
        source,
    })
}

/// Opens a result file, reporting failures as configuration errors.
fn open_writer<R: TabularRecord>(path: &Path, flush_every: usize) -> Result<ResultWriter<R>, ConfigError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    ResultWriter::create(path, flush_every).map_err(|e| match e {
        WriterError::Open { path, source } => ConfigError::OutputUnwritable { path, source },
        other => ConfigError::OutputUnwritable {
            path: path.to_path_buf(),
            source: std::io::Error::other(other.to_string()),
        },
    })
}
