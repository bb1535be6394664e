//! Single-owner ingestion of filtered index candidates.
//!
//! Shard workers send each page's admitted candidates, in page order, over a
//! bounded channel. The ingestion task is the only consumer: it applies the
//! dedup set, the minimum-occurrence threshold and the per-TLD limit, writes
//! each admitted domain to the discovery sink, and forwards it downstream.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::DedupSet;
use crate::error_handling::{ErrorType, InfoType, ProcessingStats, SkipReason, WriterError};
use crate::export::ResultWriter;
use crate::models::DomainRecord;

use super::DiscoveryBreakdown;

/// What ingestion decided for one candidate.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted(DomainRecord),
    /// Seen fewer times than the threshold so far
    Pending,
    Skipped(SkipReason),
}

/// Dedup, occurrence and limit bookkeeping.
pub(crate) struct Ingestor {
    dedup: Arc<DedupSet>,
    min_occurrences: usize,
    limit: usize,
    /// First record and sighting count of domains below the threshold
    pending: HashMap<String, (DomainRecord, usize)>,
    breakdown: DiscoveryBreakdown,
    tld_tokens: HashMap<String, CancellationToken>,
}

impl Ingestor {
    pub(crate) fn new(
        dedup: Arc<DedupSet>,
        min_occurrences: usize,
        limit: usize,
        tld_tokens: HashMap<String, CancellationToken>,
    ) -> Self {
        Ingestor {
            dedup,
            min_occurrences: min_occurrences.max(1),
            limit: limit.max(1),
            pending: HashMap::new(),
            breakdown: DiscoveryBreakdown::default(),
            tld_tokens,
        }
    }

    /// Decides one candidate.
    ///
    /// With a threshold above one, the admitted record is the domain's first
    /// sighting, with its platform hint taken from the first sighting that
    /// had one and its shop flag set if any sighting looked like a shop.
    /// Reaching a TLD's limit cancels that TLD's token.
    pub(crate) fn offer(&mut self, record: DomainRecord) -> Admission {
        if self.dedup.contains(&record.domain) {
            return Admission::Skipped(SkipReason::DuplicateDomain);
        }
        if self.limit_reached(&record.tld) {
            return Admission::Skipped(SkipReason::TldLimitReached);
        }

        let record = if self.min_occurrences > 1 {
            let domain = record.domain.clone();
            let hint = record.cms_hint.clone();
            let is_ecommerce = record.is_ecommerce;
            let entry = self
                .pending
                .entry(domain.clone())
                .or_insert_with(|| (record, 0));
            entry.1 += 1;
            if entry.0.cms_hint.is_none() {
                entry.0.cms_hint = hint;
            }
            entry.0.is_ecommerce |= is_ecommerce;
            if entry.1 < self.min_occurrences {
                return Admission::Pending;
            }
            let Some((first, _)) = self.pending.remove(&domain) else {
                return Admission::Pending;
            };
            first
        } else {
            record
        };

        if !self.dedup.insert(&record.domain) {
            return Admission::Skipped(SkipReason::DuplicateDomain);
        }
        if record.is_ecommerce {
            self.breakdown.ecommerce += 1;
        }
        if let Some(hint) = &record.cms_hint {
            *self.breakdown.cms_hints.entry(hint.clone()).or_insert(0) += 1;
        }
        let admitted = self.breakdown.per_tld.entry(record.tld.clone()).or_insert(0);
        *admitted += 1;
        if *admitted >= self.limit {
            info!("Reached the limit of {} domains for .{}", self.limit, record.tld);
            if let Some(token) = self.tld_tokens.get(&record.tld) {
                token.cancel();
            }
        }
        Admission::Admitted(record)
    }

    fn limit_reached(&self, tld: &str) -> bool {
        self.breakdown
            .per_tld
            .get(tld)
            .is_some_and(|count| *count >= self.limit)
    }

    pub(crate) fn admitted(&self) -> usize {
        self.breakdown.admitted()
    }

    /// Domains that never reached the threshold.
    pub(crate) fn below_threshold(&self) -> usize {
        self.pending.len()
    }
}

/// Consumes page batches until every sender is gone.
///
/// Admitted records are written to `discovery` and then sent to
/// `downstream`; once the downstream receiver is dropped, records are only
/// written.
///
/// Returns the breakdown of admitted domains.
///
/// # Errors
///
/// Returns the first `WriterError`, after cancelling `cancel` so the shard
/// workers stop.
pub(crate) async fn run_ingestion(
    mut ingestor: Ingestor,
    mut pages: mpsc::Receiver<Vec<DomainRecord>>,
    discovery: Arc<ResultWriter<DomainRecord>>,
    downstream: mpsc::Sender<DomainRecord>,
    stats: Arc<ProcessingStats>,
    cancel: CancellationToken,
) -> Result<DiscoveryBreakdown, WriterError> {
    let mut downstream = Some(downstream);

    while let Some(batch) = pages.recv().await {
        for record in batch {
            let record = match ingestor.offer(record) {
                Admission::Admitted(record) => record,
                Admission::Pending => continue,
                Admission::Skipped(reason) => {
                    stats.increment_skip(reason);
                    continue;
                }
            };

            if let Err(e) = discovery.write(&record) {
                error!("Failed to write discovered domain {}: {}", record.domain, e);
                stats.increment_error(ErrorType::WriterError);
                cancel.cancel();
                return Err(e);
            }
            stats.increment_info(InfoType::DomainAdmitted);
            debug!("Admitted {} from {}", record.domain, record.source_url);

            if let Some(tx) = &downstream {
                if tx.send(record).await.is_err() {
                    debug!("Downstream consumer closed; continuing discovery only");
                    downstream = None;
                }
            }
        }
    }

    stats.add_info(InfoType::BelowMinOccurrences, ingestor.below_threshold());
    discovery.flush()?;
    Ok(ingestor.breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(domain: &str, tld: &str, url: &str) -> DomainRecord {
        DomainRecord {
            domain: domain.to_string(),
            tld: tld.to_string(),
            country: String::new(),
            source_url: url.to_string(),
            capture_timestamp: "20240301000000".to_string(),
            http_status: 200,
            language: String::new(),
            mime_type: "text/html".to_string(),
            is_ecommerce: false,
            cms_hint: None,
        }
    }

    fn ingestor(min: usize, limit: usize, tokens: HashMap<String, CancellationToken>) -> Ingestor {
        Ingestor::new(Arc::new(DedupSet::new()), min, limit, tokens)
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let mut ingestor = ingestor(1, 100, HashMap::new());
        assert!(matches!(ingestor.offer(record("a.ch", "ch", "u1")), Admission::Admitted(_)));
        assert_eq!(
            ingestor.offer(record("a.ch", "ch", "u2")),
            Admission::Skipped(SkipReason::DuplicateDomain)
        );
        assert_eq!(ingestor.admitted(), 1);
    }

    #[test]
    fn test_min_occurrences_admits_first_sighting_at_threshold() {
        let mut ingestor = ingestor(3, 100, HashMap::new());
        assert_eq!(ingestor.offer(record("a.ch", "ch", "first")), Admission::Pending);
        assert_eq!(ingestor.offer(record("b.ch", "ch", "other")), Admission::Pending);
        assert_eq!(ingestor.offer(record("a.ch", "ch", "second")), Admission::Pending);
        let Admission::Admitted(admitted) = ingestor.offer(record("a.ch", "ch", "third")) else {
            panic!("expected admission at the third sighting");
        };
        assert_eq!(admitted.source_url, "first");
        assert_eq!(
            ingestor.offer(record("a.ch", "ch", "fourth")),
            Admission::Skipped(SkipReason::DuplicateDomain)
        );
        assert_eq!(ingestor.below_threshold(), 1);
    }

    #[test]
    fn test_min_occurrences_takes_first_available_hint() {
        let mut ingestor = ingestor(3, 100, HashMap::new());
        assert_eq!(ingestor.offer(record("a.ch", "ch", "first")), Admission::Pending);

        let mut second = record("a.ch", "ch", "second");
        second.cms_hint = Some("Shopify".to_string());
        second.is_ecommerce = true;
        assert_eq!(ingestor.offer(second), Admission::Pending);

        let mut third = record("a.ch", "ch", "third");
        third.cms_hint = Some("Magento".to_string());
        let Admission::Admitted(admitted) = ingestor.offer(third) else {
            panic!("expected admission at the third sighting");
        };
        assert_eq!(admitted.source_url, "first");
        assert_eq!(admitted.cms_hint.as_deref(), Some("Shopify"));
        assert!(admitted.is_ecommerce);
    }

    #[test]
    fn test_breakdown_counts_admitted_domains() {
        let mut ingestor = ingestor(1, 100, HashMap::new());
        let mut shop = record("a.ch", "ch", "https://a.ch/cart");
        shop.is_ecommerce = true;
        shop.cms_hint = Some("PrestaShop".to_string());
        ingestor.offer(shop.clone());
        ingestor.offer(shop);
        ingestor.offer(record("b.ch", "ch", "u"));
        ingestor.offer(record("c.de", "de", "u"));

        let breakdown = &ingestor.breakdown;
        assert_eq!(breakdown.admitted(), 3);
        assert_eq!(breakdown.per_tld.get("ch"), Some(&2));
        assert_eq!(breakdown.per_tld.get("de"), Some(&1));
        assert_eq!(breakdown.ecommerce, 1);
        assert_eq!(breakdown.cms_hints.get("PrestaShop"), Some(&1));
        assert_eq!(breakdown.cms_hints.len(), 1);
    }

    #[test]
    fn test_limit_cancels_tld_token() {
        let token = CancellationToken::new();
        let tokens = HashMap::from([("ch".to_string(), token.clone())]);
        let mut ingestor = ingestor(1, 2, tokens);

        assert!(matches!(ingestor.offer(record("a.ch", "ch", "u")), Admission::Admitted(_)));
        assert!(!token.is_cancelled());
        assert!(matches!(ingestor.offer(record("b.ch", "ch", "u")), Admission::Admitted(_)));
        assert!(token.is_cancelled());
        assert_eq!(
            ingestor.offer(record("c.ch", "ch", "u")),
            Admission::Skipped(SkipReason::TldLimitReached)
        );
        assert!(matches!(ingestor.offer(record("a.de", "de", "u")), Admission::Admitted(_)));
    }

    #[tokio::test]
    async fn test_run_ingestion_writes_and_forwards_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("crawl_domains.csv");
        let discovery = Arc::new(ResultWriter::<DomainRecord>::create(&path, 1).unwrap());
        let stats = Arc::new(ProcessingStats::new());
        let (page_tx, page_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(16);

        let task = tokio::spawn(run_ingestion(
            ingestor(1, 100, HashMap::new()),
            page_rx,
            Arc::clone(&discovery),
            out_tx,
            Arc::clone(&stats),
            CancellationToken::new(),
        ));

        page_tx
            .send(vec![record("c.ch", "ch", "u"), record("a.ch", "ch", "u")])
            .await
            .unwrap();
        page_tx
            .send(vec![record("a.ch", "ch", "u"), record("b.ch", "ch", "u")])
            .await
            .unwrap();
        drop(page_tx);

        let breakdown = task.await.unwrap().unwrap();
        assert_eq!(breakdown.admitted(), 3);
        assert_eq!(breakdown.per_tld.get("ch"), Some(&3));

        let mut forwarded = Vec::new();
        while let Some(r) = out_rx.recv().await {
            forwarded.push(r.domain);
        }
        assert_eq!(forwarded, vec!["c.ch", "a.ch", "b.ch"]);
        assert_eq!(stats.get_skip_count(SkipReason::DuplicateDomain), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let domains: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(domains, vec!["c.ch", "a.ch", "b.ch"]);
    }

    #[tokio::test]
    async fn test_run_ingestion_survives_dropped_downstream() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("crawl_domains.csv");
        let discovery = Arc::new(ResultWriter::<DomainRecord>::create(&path, 1).unwrap());
        let (page_tx, page_rx) = mpsc::channel(4);
        let (out_tx, out_rx) = mpsc::channel(1);
        drop(out_rx);

        let task = tokio::spawn(run_ingestion(
            ingestor(1, 100, HashMap::new()),
            page_rx,
            Arc::clone(&discovery),
            out_tx,
            Arc::new(ProcessingStats::new()),
            CancellationToken::new(),
        ));
        page_tx
            .send(vec![record("a.ch", "ch", "u"), record("b.ch", "ch", "u")])
            .await
            .unwrap();
        drop(page_tx);

        assert_eq!(task.await.unwrap().unwrap().admitted(), 2);
        assert_eq!(discovery.rows_written(), 2);
    }
}
