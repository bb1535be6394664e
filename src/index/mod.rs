//! Index query engine.
//!
//! Turns a set of TLDs and a `FilterCriteria` into a lazy, deduplicated
//! stream of `DomainRecord`s:
//!
//! 1. `resolve_collections` picks the crawl collections to query.
//! 2. `resolve_shards` asks each collection how many pages `*.<tld>` spans.
//! 3. `start` paginates the shards on a `WorkerPool`, parses and filters each
//!    page, and hands the survivors, in page order, to a single ingestion
//!    task that deduplicates, writes the discovery CSV and feeds the stream.
//!
//! A page that keeps failing after retries abandons its shard; the run goes
//! on with the remaining shards.

mod client;
mod ingest;
mod record;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::stream::{self, Stream};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use client::{CdxClient, Collection, PageQuery};
pub use record::{parse_line, parse_page, MalformedRecord};

use crate::app::Progress;
use crate::config::{INGEST_CHANNEL_CAPACITY, LIVE_CHANNEL_CAPACITY};
use crate::domain::DedupSet;
use crate::error_handling::{ConfigError, ErrorType, InfoType, ProcessingStats, SkipReason, WriterError};
use crate::export::ResultWriter;
use crate::filter::FilterCriteria;
use crate::models::DomainRecord;
use crate::pool::{TaskOutcome, WorkerPool};
use ingest::{run_ingestion, Ingestor};

/// One TLD within one collection.
#[derive(Debug, Clone)]
pub struct Shard {
    /// TLD queried as `*.<tld>`
    pub tld: String,
    /// Collection holding the shard
    pub collection: Collection,
    /// Pages to fetch (`0..pages`)
    pub pages: u64,
}

/// Admitted domains broken down by TLD, shop flag and URL platform hint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveryBreakdown {
    /// Admitted domains per TLD
    pub per_tld: BTreeMap<String, usize>,
    /// Admitted domains whose captured URL looks like a shop page
    pub ecommerce: usize,
    /// Admitted domains per platform hinted by the captured URL
    pub cms_hints: BTreeMap<String, usize>,
}

impl DiscoveryBreakdown {
    /// Total admitted domains.
    pub fn admitted(&self) -> usize {
        self.per_tld.values().sum()
    }
}

/// Counts of one index run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Shards (TLD and collection pairs) dispatched
    pub shards: usize,
    /// Shards given up on after a page kept failing
    pub shards_abandoned: usize,
    /// Pages fetched successfully
    pub pages_fetched: usize,
    /// Index lines parsed into candidates
    pub records_parsed: usize,
    /// Domains written to the discovery output
    pub domains_admitted: usize,
    /// Breakdown of the admitted domains
    pub discovery: DiscoveryBreakdown,
    /// Dispatch stopped early on cancellation
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct ShardReport {
    pages_fetched: usize,
    records_parsed: usize,
    abandoned: bool,
}

/// A running index query.
pub struct IndexRun {
    records: mpsc::Receiver<DomainRecord>,
    handle: JoinHandle<Result<IndexReport, WriterError>>,
}

impl IndexRun {
    /// Admitted records in admission order.
    ///
    /// Producers block once the stream is not consumed, so the stream must be
    /// drained (or dropped) for the run to finish.
    pub fn records(&mut self) -> impl Stream<Item = DomainRecord> + '_ {
        stream::unfold(&mut self.records, |rx| async move {
            rx.recv().await.map(|record| (record, rx))
        })
    }

    /// Waits for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns the discovery writer's error, if any.
    pub async fn finish(self) -> anyhow::Result<IndexReport> {
        drop(self.records);
        let report = self.handle.await??;
        Ok(report)
    }
}

/// Queries the crawl index for domains under a set of TLDs.
pub struct IndexQueryEngine {
    client: CdxClient,
    criteria: Arc<FilterCriteria>,
    tlds: Vec<String>,
    workers: usize,
    limit: usize,
    min_occurrences: usize,
    dedup: Arc<DedupSet>,
    stats: Arc<ProcessingStats>,
    cancel: CancellationToken,
}

impl IndexQueryEngine {
    /// Creates an engine; nothing is requested until `resolve_collections`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: CdxClient,
        criteria: Arc<FilterCriteria>,
        tlds: Vec<String>,
        workers: usize,
        limit: usize,
        min_occurrences: usize,
        stats: Arc<ProcessingStats>,
        cancel: CancellationToken,
    ) -> Self {
        IndexQueryEngine {
            client,
            criteria,
            tlds,
            workers,
            limit,
            min_occurrences,
            dedup: Arc::new(DedupSet::new()),
            stats,
            cancel,
        }
    }

    /// The set of domains emitted so far.
    pub fn dedup(&self) -> Arc<DedupSet> {
        Arc::clone(&self.dedup)
    }

    /// Picks the collections to query.
    ///
    /// Explicit ids are looked up in the server's listing; otherwise the
    /// newest `crawl_count` collections are used.
    ///
    /// # Errors
    ///
    /// `ConfigError::IndexUnavailable` if the listing cannot be fetched,
    /// `ConfigError::UnknownCrawl` for an id the server does not list.
    pub async fn resolve_collections(&self) -> Result<Vec<Collection>, ConfigError> {
        let available = self
            .client
            .list_crawls()
            .await
            .map_err(|e| ConfigError::IndexUnavailable(e.to_string()))?;
        let settings = self.client.settings();

        let selected: Vec<Collection> = if settings.crawls.is_empty() {
            available
                .into_iter()
                .take(settings.crawl_count.max(1))
                .collect()
        } else {
            settings
                .crawls
                .iter()
                .map(|id| {
                    available
                        .iter()
                        .find(|c| c.id.eq_ignore_ascii_case(id.trim()))
                        .cloned()
                        .ok_or_else(|| ConfigError::UnknownCrawl(id.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        if selected.is_empty() {
            return Err(ConfigError::IndexUnavailable(
                "the index lists no collections".to_string(),
            ));
        }
        info!(
            "Querying {}",
            selected
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(selected)
    }

    /// Resolves the page count of every TLD in every collection.
    ///
    /// TLDs without pages are skipped with a warning.
    ///
    /// # Errors
    ///
    /// `ConfigError::NoIndexFound` if no TLD has any page.
    pub async fn resolve_shards(&self, collections: &[Collection]) -> Result<Vec<Shard>, ConfigError> {
        let max_pages = self.client.settings().pages.max(1) as u64;
        let mut shards = Vec::new();

        for tld in &self.tlds {
            let mut found = false;
            for collection in collections {
                match self.client.num_pages(collection, tld).await {
                    Ok(0) => debug!("No pages for .{} in {}", tld, collection.id),
                    Ok(pages) => {
                        let pages = pages.min(max_pages);
                        info!(".{}: {} pages in {}", tld, pages, collection.id);
                        shards.push(Shard {
                            tld: tld.clone(),
                            collection: collection.clone(),
                            pages,
                        });
                        found = true;
                    }
                    Err(e) => {
                        warn!("Failed to list pages for .{} in {}: {}", tld, collection.id, e);
                        self.stats.increment_error(ErrorType::IndexListingError);
                    }
                }
            }
            if !found {
                warn!("No index shard found for .{}; skipping it", tld);
            }
        }

        if shards.is_empty() {
            return Err(ConfigError::NoIndexFound(self.tlds.join(", ")));
        }
        Ok(shards)
    }

    /// Starts paginating `shards`.
    ///
    /// Admitted records are written to `discovery` as they are produced and
    /// exposed through `IndexRun::records`.
    pub fn start(
        &self,
        shards: Vec<Shard>,
        discovery: Arc<ResultWriter<DomainRecord>>,
        progress: Arc<Progress>,
    ) -> IndexRun {
        let tld_tokens: HashMap<String, CancellationToken> = self
            .tlds
            .iter()
            .map(|tld| (tld.clone(), self.cancel.child_token()))
            .collect();
        let (page_tx, page_rx) = mpsc::channel::<Vec<DomainRecord>>(INGEST_CHANNEL_CAPACITY);
        let (record_tx, record_rx) = mpsc::channel::<DomainRecord>(LIVE_CHANNEL_CAPACITY);

        let ingestion = tokio::spawn(run_ingestion(
            Ingestor::new(
                Arc::clone(&self.dedup),
                self.min_occurrences,
                self.limit,
                tld_tokens.clone(),
            ),
            page_rx,
            discovery,
            record_tx,
            Arc::clone(&self.stats),
            self.cancel.clone(),
        ));

        let context = Arc::new(ShardContext {
            client: self.client.clone(),
            criteria: Arc::clone(&self.criteria),
            query: server_query(&self.criteria),
            stats: Arc::clone(&self.stats),
            tld_tokens,
            pages: page_tx,
        });
        let pool = WorkerPool::new(self.workers, self.cancel.clone());
        let stats = Arc::clone(&self.stats);

        let handle = tokio::spawn(async move {
            let mut report = IndexReport {
                shards: shards.len(),
                ..Default::default()
            };
            let handler = {
                let context = Arc::clone(&context);
                move |shard: Shard| {
                    let context = Arc::clone(&context);
                    async move { context.paginate(&shard).await }
                }
            };
            // The pool only holds clones; dropping ours closes the page channel
            // once every shard has finished
            drop(context);

            let pool_report = pool
                .run(stream::iter(shards), handler, |outcome| match outcome {
                    TaskOutcome::Completed { output, .. } => {
                        report.pages_fetched += output.pages_fetched;
                        report.records_parsed += output.records_parsed;
                        if output.abandoned {
                            report.shards_abandoned += 1;
                        }
                        progress.record(output.abandoned);
                    }
                    TaskOutcome::Failed { item, error } => {
                        warn!("Shard .{} in {} failed: {}", item.tld, item.collection.id, error);
                        stats.increment_error(ErrorType::WorkerFailure);
                        report.shards_abandoned += 1;
                        progress.record(true);
                    }
                })
                .await;
            report.cancelled = pool_report.cancelled;

            report.discovery = ingestion.await.unwrap_or_else(|e| {
                warn!("Ingestion task failed: {e}");
                Ok(DiscoveryBreakdown::default())
            })?;
            report.domains_admitted = report.discovery.admitted();
            info!(
                "Index query finished: {} shards ({} abandoned), {} pages, {} records, {} domains",
                report.shards,
                report.shards_abandoned,
                report.pages_fetched,
                report.records_parsed,
                report.domains_admitted
            );
            Ok::<IndexReport, WriterError>(report)
        });

        IndexRun {
            records: record_rx,
            handle,
        }
    }
}

/// Shared state of the shard workers.
struct ShardContext {
    client: CdxClient,
    criteria: Arc<FilterCriteria>,
    query: PageQuery,
    stats: Arc<ProcessingStats>,
    tld_tokens: HashMap<String, CancellationToken>,
    pages: mpsc::Sender<Vec<DomainRecord>>,
}

impl ShardContext {
    async fn paginate(&self, shard: &Shard) -> ShardReport {
        let mut report = ShardReport::default();
        let Some(token) = self.tld_tokens.get(&shard.tld) else {
            return report;
        };

        for page in 0..shard.pages {
            if token.is_cancelled() {
                debug!("Stopping .{} in {} before page {}", shard.tld, shard.collection.id, page);
                break;
            }
            let fetched = tokio::select! {
                _ = token.cancelled() => break,
                fetched = self.client.fetch_page(&shard.collection, &shard.tld, page, &self.query) => fetched,
            };
            let body = match fetched {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        "Abandoning .{} in {} at page {}: {}",
                        shard.tld, shard.collection.id, page, e
                    );
                    self.stats.increment_error(ErrorType::IndexPageFetchError);
                    self.stats.increment_error(ErrorType::IndexShardAbandoned);
                    report.abandoned = true;
                    break;
                }
            };
            report.pages_fetched += 1;

            let (records, malformed) = parse_page(&body, &shard.tld);
            if records.is_empty() && malformed == 0 {
                self.stats.increment_info(InfoType::IndexPageEmpty);
            } else {
                self.stats.increment_info(InfoType::IndexPageFetched);
            }
            for _ in 0..malformed {
                self.stats.increment_skip(SkipReason::MalformedRecord);
            }
            report.records_parsed += records.len();
            self.stats.add_info(InfoType::IndexRecordParsed, records.len());

            let admitted: Vec<DomainRecord> = records
                .into_iter()
                .filter(|record| match self.criteria.evaluate(record) {
                    Ok(()) => true,
                    Err(reason) => {
                        self.stats.increment_skip(reason);
                        false
                    }
                })
                .collect();
            if admitted.is_empty() {
                continue;
            }
            if self.pages.send(admitted).await.is_err() {
                debug!("Ingestion closed; stopping .{} in {}", shard.tld, shard.collection.id);
                break;
            }
        }
        report
    }
}

/// Server-side filters derived from the criteria.
///
/// These only narrow what the server sends; every record is still checked
/// locally by `FilterCriteria::evaluate`.
pub fn server_query(criteria: &FilterCriteria) -> PageQuery {
    let status = criteria.status.as_ref().and_then(|set| {
        let mut codes: Vec<u16> = set.iter().copied().collect();
        codes.sort_unstable();
        match codes.as_slice() {
            [] => None,
            [single] => Some(format!("status:{single}")),
            many => Some(format!(
                "status:({})",
                many.iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join("|")
            )),
        }
    });
    PageQuery {
        status,
        mime: criteria.mime.as_ref().map(|m| format!("mimetype:{m}")),
        from: criteria.date_from.as_ref().map(|d| d.raw().to_string()),
        to: criteria.date_to.as_ref().map(|d| d.raw().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterOptions;

    #[test]
    fn test_server_query_defaults() {
        let criteria = FilterCriteria::from_options(&["ch".to_string()], &FilterOptions::default()).unwrap();
        let query = server_query(&criteria);
        assert_eq!(query.status.as_deref(), Some("status:200"));
        assert_eq!(query.mime.as_deref(), Some("mimetype:text/html"));
        assert_eq!(query.from, None);
        assert_eq!(query.to, None);
    }

    #[test]
    fn test_server_query_multiple_statuses_and_dates() {
        let options = FilterOptions {
            status: vec![301, 200],
            mime: None,
            date_from: Some("2023".to_string()),
            date_to: Some("202406".to_string()),
            ..Default::default()
        };
        let criteria = FilterCriteria::from_options(&["ch".to_string()], &options).unwrap();
        let query = server_query(&criteria);
        assert_eq!(query.status.as_deref(), Some("status:(200|301)"));
        assert_eq!(query.mime, None);
        assert_eq!(query.from.as_deref(), Some("2023"));
        assert_eq!(query.to.as_deref(), Some("202406"));
    }
}
