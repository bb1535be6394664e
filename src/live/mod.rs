//! Live detection engine.
//!
//! Probes each target with the `ProbeClient`, classifies fetched pages, and
//! writes exactly one `DetectionResult` per target as soon as it completes.
//! Targets are dispatched through the `WorkerPool`, so at most `concurrency`
//! probes are in flight and the input is only pulled when a slot is free.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::Stream;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::app::Progress;
use crate::domain::{parse_target, DedupSet, Target};
use crate::error_handling::{ErrorType, InfoType, ProcessingStats, SkipReason, WriterError};
use crate::export::ResultWriter;
use crate::fingerprint::Classifier;
use crate::models::DetectionResult;
use crate::pool::{TaskOutcome, WorkerPool};
use crate::probe::ProbeClient;

/// Error value recorded when a detection task panicked.
pub const WORKER_FAILURE: &str = "worker_failure";

/// Counts of one live detection run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LiveReport {
    /// Rows written (one per dispatched target)
    pub probed: usize,
    /// Rows with a platform verdict
    pub detected: usize,
    /// Rows fetched but matching no signature
    pub unknown: usize,
    /// Rows whose fetch failed
    pub unreachable: usize,
    /// Rows produced for a panicked detection task
    pub worker_failures: usize,
    /// Detected rows per platform
    pub platforms: BTreeMap<String, usize>,
    /// Dispatch stopped early on cancellation
    pub cancelled: bool,
}

impl LiveReport {
    fn record(&mut self, result: &DetectionResult) {
        self.probed += 1;
        if result.is_unreachable() {
            self.unreachable += 1;
        } else if result.is_unknown() {
            self.unknown += 1;
        } else {
            self.detected += 1;
            *self.platforms.entry(result.platform.clone()).or_insert(0) += 1;
        }
    }

    /// Share of probed domains with a platform verdict, in percent.
    pub fn detection_rate(&self) -> f64 {
        if self.probed == 0 {
            return 0.0;
        }
        100.0 * self.detected as f64 / self.probed as f64
    }
}

/// Parses and deduplicates raw domain-list entries.
///
/// Invalid entries and repeats of an earlier entry are skipped and counted;
/// order of first appearance is kept.
pub fn prepare_targets<I, S>(entries: I, stats: &ProcessingStats) -> Vec<Target>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let seen = DedupSet::new();
    let mut targets = Vec::new();
    for entry in entries {
        let entry = entry.as_ref();
        let Some(target) = parse_target(entry, "https") else {
            warn!("Skipping invalid domain: {}", entry.trim());
            stats.increment_skip(SkipReason::InvalidInputDomain);
            continue;
        };
        if !seen.insert(&target.domain) {
            debug!("Skipping duplicate domain: {}", target.domain);
            stats.increment_skip(SkipReason::DuplicateInputDomain);
            continue;
        }
        targets.push(target);
    }
    targets
}

/// Probes targets and records a verdict for each.
#[derive(Clone)]
pub struct LiveDetectionEngine {
    probe: ProbeClient,
    classifier: Classifier,
    stats: Arc<ProcessingStats>,
    pool: WorkerPool,
}

impl LiveDetectionEngine {
    /// Creates an engine running at most `concurrency` probes at once.
    pub fn new(
        probe: ProbeClient,
        classifier: Classifier,
        concurrency: usize,
        stats: Arc<ProcessingStats>,
        cancel: CancellationToken,
    ) -> Self {
        LiveDetectionEngine {
            probe,
            classifier,
            stats,
            pool: WorkerPool::new(concurrency, cancel),
        }
    }

    /// Maximum probes in flight.
    pub fn concurrency(&self) -> usize {
        self.pool.concurrency()
    }

    /// Probes and classifies a single target.
    pub async fn detect(&self, target: &Target) -> DetectionResult {
        detect_target(&self.probe, &self.classifier, &self.stats, target).await
    }

    /// Runs detection over `targets`, writing each verdict as it completes.
    ///
    /// # Arguments
    ///
    /// * `targets` - Targets to probe, pulled lazily; must already be distinct
    /// * `writer` - Sink for the verdicts
    /// * `progress` - Counters for the progress logger
    ///
    /// # Errors
    ///
    /// Returns the first `WriterError`. A write failure cancels the run so no
    /// more probes are dispatched; in-flight probes still finish.
    pub async fn run<S>(
        &self,
        targets: S,
        writer: &ResultWriter<DetectionResult>,
        progress: &Progress,
    ) -> Result<LiveReport, WriterError>
    where
        S: Stream<Item = Target>,
    {
        let mut report = LiveReport::default();
        let mut write_error: Option<WriterError> = None;

        let handler = {
            let probe = self.probe.clone();
            let classifier = self.classifier.clone();
            let stats = Arc::clone(&self.stats);
            move |target: Target| {
                let probe = probe.clone();
                let classifier = classifier.clone();
                let stats = Arc::clone(&stats);
                async move { detect_target(&probe, &classifier, &stats, &target).await }
            }
        };

        let pool_report = self
            .pool
            .run(targets, handler, |outcome| {
                let result = match outcome {
                    TaskOutcome::Completed { output, .. } => output,
                    TaskOutcome::Failed { item, error } => {
                        error!("Detection of {} failed: {}", item.domain, error);
                        self.stats.increment_error(ErrorType::WorkerFailure);
                        report.worker_failures += 1;
                        DetectionResult::unreachable(item.domain, WORKER_FAILURE, 0)
                    }
                };
                report.record(&result);
                progress.record(result.is_unreachable());

                if write_error.is_some() {
                    return;
                }
                if let Err(e) = writer.write(&result) {
                    error!("Failed to write verdict for {}: {}", result.domain, e);
                    self.stats.increment_error(ErrorType::WriterError);
                    self.pool_cancel();
                    write_error = Some(e);
                }
            })
            .await;

        report.cancelled = pool_report.cancelled;
        if let Some(e) = write_error {
            return Err(e);
        }
        writer.flush()?;

        info!(
            "Live detection finished: {} probed, {} detected, {} unknown, {} unreachable",
            report.probed, report.detected, report.unknown, report.unreachable
        );
        Ok(report)
    }

    fn pool_cancel(&self) {
        self.pool.cancel_token().cancel();
    }
}

async fn detect_target(
    probe: &ProbeClient,
    classifier: &Classifier,
    stats: &ProcessingStats,
    target: &Target,
) -> DetectionResult {
    let probed = probe.fetch(&target.url).await;
    if probed.attempts > 1 {
        stats.add_info(InfoType::ProbeRetried, (probed.attempts - 1) as usize);
    }
    let elapsed_ms = u64::try_from(probed.elapsed.as_millis()).unwrap_or(u64::MAX);

    match probed.outcome.into_result() {
        Ok(page) => {
            if page.final_url.trim_end_matches('/') != target.url.trim_end_matches('/') {
                stats.increment_info(InfoType::HttpRedirect);
            }
            let verdict = classifier.classify(&page);
            match &verdict {
                Some(v) => {
                    debug!("{}: {} ({}, {})", target.domain, v.platform, v.confidence, v.rule_id);
                    stats.increment_info(InfoType::PlatformDetected);
                }
                None => stats.increment_info(InfoType::PlatformUnknown),
            }
            DetectionResult::classified(target.domain.clone(), verdict, page.status, elapsed_ms)
        }
        Err(failure) => {
            debug!("{}: unreachable ({})", target.domain, failure);
            stats.increment_error(failure.error_type());
            DetectionResult::unreachable(target.domain.clone(), failure.as_str(), elapsed_ms)
        }
    }
}
