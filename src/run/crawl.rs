//! Discovery run (`shopscan crawl`).

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::StreamExt;
use log::info;
use tokio_util::sync::CancellationToken;

use super::{ensure_dir, load_classifier, open_writer};
use crate::app::{
    print_discovery_breakdown, print_error_statistics, print_live_breakdown, shutdown_gracefully,
    spawn_progress_logger, Progress,
};
use crate::config::{
    CrawlConfig, IndexSettings, DEFAULT_FLUSH_EVERY, DEFAULT_INDEX_WORKERS, DEFAULT_LIVE_THREADS,
    DETECTION_FILE_NAME, DISCOVERY_FILE_NAME, LOGGING_INTERVAL, MAX_INDEX_WORKERS,
    MAX_LIVE_CONCURRENCY,
};
use crate::domain::parse_target;
use crate::error_handling::ProcessingStats;
use crate::filter::FilterCriteria;
use crate::index::{CdxClient, Collection, IndexQueryEngine, IndexReport};
use crate::initialization::init_crypto_provider;
use crate::live::{LiveDetectionEngine, LiveReport};
use crate::models::{DetectionResult, DomainRecord};
use crate::pool::clamp_concurrency;
use crate::probe::ProbeClient;

/// Results of a discovery run.
#[derive(Debug)]
pub struct CrawlReport {
    /// Index query counts
    pub index: IndexReport,
    /// Present when live detection ran
    pub live: Option<LiveReport>,
    /// Path of `crawl_domains.csv`
    pub discovery_path: PathBuf,
    /// Path of `live_detected.csv`, when live detection ran
    pub detection_path: Option<PathBuf>,
    /// Error, skip and info counters
    pub stats: Arc<ProcessingStats>,
    /// Wall time of the run
    pub elapsed_seconds: f64,
}

/// Lists the collections of the configured index server, newest first.
///
/// # Errors
///
/// Returns an error if the listing cannot be fetched or decoded.
pub async fn list_crawls(settings: &IndexSettings) -> Result<Vec<Collection>> {
    init_crypto_provider();
    let client = CdxClient::new(settings, Arc::new(ProcessingStats::new()))
        .context("Failed to initialize the index client")?;
    client
        .list_crawls()
        .await
        .with_context(|| format!("Failed to list collections of {}", settings.server))
}

/// Discovers domains from the crawl index and optionally probes them.
///
/// Admitted domains are written to `<output_dir>/crawl_domains.csv` as they
/// are found. With `live_check`, each one is also probed while the index is
/// still being paginated, and verdicts go to `<output_dir>/live_detected.csv`.
///
/// Cancelling `cancel` stops index pagination and probe dispatch; work in
/// flight finishes and every row written so far stays on disk.
///
/// # Errors
///
/// Returns a `ConfigError` (wrapped) for invalid settings, an unwritable
/// output directory, or an index with nothing to query, and an error if a
/// result file cannot be written.
pub async fn run_crawl(mut config: CrawlConfig, cancel: CancellationToken) -> Result<CrawlReport> {
    let start_time = Instant::now();
    config.validate()?;
    init_crypto_provider();

    let criteria = Arc::new(FilterCriteria::from_options(&config.tlds, &config.filters)?);
    let live_classifier = if config.live_check {
        Some(load_classifier(config.signatures.as_deref())?)
    } else {
        None
    };

    ensure_dir(&config.output_dir)?;
    let discovery_path = config.output_dir.join(DISCOVERY_FILE_NAME);
    let discovery = Arc::new(open_writer::<DomainRecord>(&discovery_path, DEFAULT_FLUSH_EVERY)?);
    let detection_path = live_classifier
        .as_ref()
        .map(|_| config.output_dir.join(DETECTION_FILE_NAME));
    let detections = detection_path
        .as_deref()
        .map(|path| open_writer::<DetectionResult>(path, DEFAULT_FLUSH_EVERY))
        .transpose()?;

    let stats = Arc::new(ProcessingStats::new());
    let client = CdxClient::new(&config.index, Arc::clone(&stats))
        .context("Failed to initialize the index client")?;
    let index_workers = clamp_concurrency(config.workers, DEFAULT_INDEX_WORKERS, MAX_INDEX_WORKERS);
    let engine = IndexQueryEngine::new(
        client,
        Arc::clone(&criteria),
        config.tlds.clone(),
        index_workers,
        config.limit,
        config.filters.min_occurrences,
        Arc::clone(&stats),
        cancel.clone(),
    );

    let collections = engine.resolve_collections().await?;
    let shards = engine.resolve_shards(&collections).await?;
    info!(
        "Paginating {} shards with {} workers (limit {} per TLD)",
        shards.len(),
        index_workers,
        config.limit
    );

    let cancel_logging = CancellationToken::new();
    let index_progress = Progress::new();
    let mut logging_tasks = vec![spawn_progress_logger(
        "index",
        Arc::clone(&index_progress),
        Duration::from_secs(LOGGING_INTERVAL),
        cancel_logging.clone(),
    )];

    let mut run = engine.start(shards, Arc::clone(&discovery), index_progress);

    let live = match (live_classifier, detections.as_ref()) {
        (Some(classifier), Some(writer)) => {
            let probe = ProbeClient::new(&config.probe).context("Failed to initialize the probe client")?;
            let concurrency =
                clamp_concurrency(config.live_threads, DEFAULT_LIVE_THREADS, MAX_LIVE_CONCURRENCY);
            info!("Live detection enabled with {} concurrent probes", concurrency);
            let live_engine = LiveDetectionEngine::new(
                probe,
                classifier,
                concurrency,
                Arc::clone(&stats),
                cancel.clone(),
            );
            let live_progress = Progress::new();
            logging_tasks.push(spawn_progress_logger(
                "live",
                Arc::clone(&live_progress),
                Duration::from_secs(LOGGING_INTERVAL),
                cancel_logging.clone(),
            ));
            let targets = run
                .records()
                .filter_map(|record| async move { parse_target(&record.domain, "https") });
            let report = live_engine
                .run(targets, writer, &live_progress)
                .await
                .context("Failed to write live detection results")?;
            Some(report)
        }
        _ => {
            let mut records = pin!(run.records());
            while records.next().await.is_some() {}
            None
        }
    };

    let index = run
        .finish()
        .await
        .context("Failed to write discovered domains")?;
    discovery.finish().context("Failed to flush discovered domains")?;

    for task in logging_tasks {
        shutdown_gracefully(cancel_logging.clone(), Some(task)).await;
    }
    print_error_statistics(&stats);
    print_discovery_breakdown(&index.discovery);
    if let Some(live) = &live {
        print_live_breakdown(live);
    }

    let elapsed_seconds = start_time.elapsed().as_secs_f64();
    info!(
        "Discovered {} domains in {:.1}s -> {}",
        index.domains_admitted,
        elapsed_seconds,
        discovery_path.display()
    );
    Ok(CrawlReport {
        index,
        live,
        discovery_path,
        detection_path,
        stats,
        elapsed_seconds,
    })
}
