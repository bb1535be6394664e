//! Standalone detection run (`shopscan detect`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::info;
use tokio_util::sync::CancellationToken;

use super::{load_classifier, open_writer};
use crate::app::{
    print_error_statistics, print_live_breakdown, shutdown_gracefully, spawn_progress_logger,
    Progress,
};
use crate::config::{
    DetectConfig, DEFAULT_DETECT_WORKERS, DEFAULT_FLUSH_EVERY, LOGGING_INTERVAL, MAX_LIVE_CONCURRENCY,
};
use crate::domain::load_domain_list;
use crate::error_handling::{ConfigError, ProcessingStats};
use crate::initialization::init_crypto_provider;
use crate::live::{prepare_targets, LiveDetectionEngine, LiveReport};
use crate::models::DetectionResult;
use crate::pool::clamp_concurrency;
use crate::probe::ProbeClient;

/// Results of a detection run.
#[derive(Debug)]
pub struct DetectReport {
    /// Distinct, valid domains that were queued
    pub targets: usize,
    /// Verdict counts
    pub live: LiveReport,
    /// Path of the result file
    pub output: PathBuf,
    /// Error, skip and info counters
    pub stats: Arc<ProcessingStats>,
    /// Wall time of the run
    pub elapsed_seconds: f64,
}

/// Probes and classifies a list of domains.
///
/// Domains come from `config.domains` followed by the lines of
/// `config.file`. Invalid and repeated entries are skipped and counted.
///
/// # Errors
///
/// Returns a `ConfigError` (wrapped) when the probe timeout is zero, no
/// domain is given, the domain file or signature table cannot be read, or
/// the output is unwritable.
pub async fn run_detect(config: DetectConfig, cancel: CancellationToken) -> Result<DetectReport> {
    let start_time = Instant::now();
    config.validate()?;

    let mut entries = config.domains.clone();
    if let Some(path) = &config.file {
        entries.extend(load_domain_list(path)?);
    }
    if entries.iter().all(|e| e.trim().is_empty()) {
        return Err(ConfigError::NoDomains.into());
    }

    let classifier = load_classifier(config.signatures.as_deref())?;
    let writer = open_writer::<DetectionResult>(&config.output, DEFAULT_FLUSH_EVERY)?;

    let stats = Arc::new(ProcessingStats::new());
    let targets = prepare_targets(&entries, &stats);
    info!(
        "Detecting {} domains ({} input lines)",
        targets.len(),
        entries.len()
    );

    init_crypto_provider();
    let probe = ProbeClient::new(&config.probe).context("Failed to initialize the probe client")?;
    let concurrency = clamp_concurrency(config.workers, DEFAULT_DETECT_WORKERS, MAX_LIVE_CONCURRENCY);
    let engine = LiveDetectionEngine::new(probe, classifier, concurrency, Arc::clone(&stats), cancel);

    let cancel_logging = CancellationToken::new();
    let progress = Progress::new();
    let logging_task = spawn_progress_logger(
        "live",
        Arc::clone(&progress),
        Duration::from_secs(LOGGING_INTERVAL),
        cancel_logging.clone(),
    );

    let target_count = targets.len();
    let live = engine
        .run(futures::stream::iter(targets), &writer, &progress)
        .await
        .context("Failed to write detection results")?;
    writer.finish().context("Failed to flush detection results")?;

    shutdown_gracefully(cancel_logging, Some(logging_task)).await;
    print_error_statistics(&stats);
    print_live_breakdown(&live);

    let elapsed_seconds = start_time.elapsed().as_secs_f64();
    info!(
        "Classified {} domains ({} detected, {} unknown, {} unreachable) in {:.1}s -> {}",
        live.probed,
        live.detected,
        live.unknown,
        live.unreachable,
        elapsed_seconds,
        config.output.display()
    );
    Ok(DetectReport {
        targets: target_count,
        live,
        output: config.output,
        stats,
        elapsed_seconds,
    })
}
