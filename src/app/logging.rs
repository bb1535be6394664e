//! Progress logging utilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Counters behind the periodic progress line of one stage.
#[derive(Debug, Default)]
pub struct Progress {
    /// Items finished, successfully or not
    pub completed: AtomicUsize,
    /// Items that ended in a failure
    pub failed: AtomicUsize,
}

impl Progress {
    /// Creates zeroed counters behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Progress::default())
    }

    /// Counts one finished item.
    pub fn record(&self, failed: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Logs progress of one stage.
///
/// # Arguments
///
/// * `stage` - Label of the stage (`index`, `live`)
/// * `start_time` - The start time of the stage
/// * `progress` - Its counters
pub fn log_progress(stage: &str, start_time: Instant, progress: &Progress) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let completed = progress.completed.load(Ordering::Relaxed);
    let failed = progress.failed.load(Ordering::Relaxed);
    let rate = if elapsed_secs > 0.0 {
        completed as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "[{}] {} done ({} failed) in {:.1}s (~{:.2}/sec)",
        stage, completed, failed, elapsed_secs, rate
    );
}

/// Spawns a task logging progress every `interval` until `cancel` fires.
pub fn spawn_progress_logger(
    stage: &'static str,
    progress: Arc<Progress>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let start_time = Instant::now();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => log_progress(stage, start_time, &progress),
                _ = cancel.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_record() {
        let progress = Progress::new();
        progress.record(false);
        progress.record(true);
        assert_eq!(progress.completed.load(Ordering::Relaxed), 2);
        assert_eq!(progress.failed.load(Ordering::Relaxed), 1);
        log_progress("test", Instant::now(), &progress);
    }

    #[tokio::test]
    async fn test_progress_logger_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = spawn_progress_logger(
            "test",
            Progress::new(),
            Duration::from_millis(10),
            cancel.clone(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger should stop")
            .unwrap();
    }
}
