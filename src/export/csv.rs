//! CSV result writer.
//!
//! One writer per output file, shared across tasks behind an `Arc`. Rows are
//! serialized under a mutex so concurrent writers never interleave, and the
//! file is flushed every `flush_every` rows so a killed run keeps what it wrote.

use std::fs::File;
use std::io::BufWriter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use csv::Writer;

use crate::error_handling::WriterError;
use crate::models::TabularRecord;

struct Inner {
    writer: Writer<BufWriter<File>>,
    pending: usize,
}

/// Append-only CSV sink for one record type.
pub struct ResultWriter<R: TabularRecord> {
    path: PathBuf,
    inner: Mutex<Inner>,
    flush_every: usize,
    rows: AtomicUsize,
    _record: PhantomData<fn(&R)>,
}

impl<R: TabularRecord> ResultWriter<R> {
    /// Creates (or truncates) the file at `path` and writes the header.
    ///
    /// An existing file is overwritten, never appended to, so two runs never
    /// mix rows in one file.
    ///
    /// # Arguments
    ///
    /// * `path` - Output file path; its parent directory must exist
    /// * `flush_every` - Flush after this many rows (0 is treated as 1)
    ///
    /// # Errors
    ///
    /// Returns `WriterError::Open` if the file cannot be created.
    pub fn create(path: &Path, flush_every: usize) -> Result<Self, WriterError> {
        let file = File::create(path).map_err(|source| WriterError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer.write_record(R::HEADER)?;
        writer.flush()?;

        Ok(ResultWriter {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner { writer, pending: 0 }),
            flush_every: flush_every.max(1),
            rows: AtomicUsize::new(0),
            _record: PhantomData,
        })
    }

    /// Writes one row.
    ///
    /// The whole row is written while holding the lock.
    pub fn write(&self, record: &R) -> Result<(), WriterError> {
        let mut inner = self.inner.lock().map_err(|_| WriterError::Poisoned)?;
        inner.writer.serialize(record)?;
        inner.pending += 1;
        if inner.pending >= self.flush_every {
            inner.writer.flush()?;
            inner.pending = 0;
        }
        self.rows.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Flushes buffered rows to disk.
    pub fn flush(&self) -> Result<(), WriterError> {
        let mut inner = self.inner.lock().map_err(|_| WriterError::Poisoned)?;
        inner.writer.flush()?;
        inner.pending = 0;
        Ok(())
    }

    /// Number of rows written so far (header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows.load(Ordering::SeqCst)
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and reports the final row count.
    pub fn finish(&self) -> Result<usize, WriterError> {
        self.flush()?;
        Ok(self.rows_written())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionResult, DomainRecord};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn detection(domain: &str) -> DetectionResult {
        DetectionResult::unreachable(domain.to_string(), "timeout", 10_000)
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_create_writes_header_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.csv");
        let _writer = ResultWriter::<DetectionResult>::create(&path, 1).unwrap();
        assert_eq!(
            read(&path),
            "domain,platform,confidence,matched_rule,http_status,elapsed_ms,error\n"
        );
    }

    #[test]
    fn test_rows_visible_without_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.csv");
        let writer = ResultWriter::<DetectionResult>::create(&path, 1).unwrap();
        writer.write(&detection("a.ch")).unwrap();

        let content = read(&path);
        assert_eq!(content.lines().count(), 2);
        assert_eq!(
            content.lines().nth(1),
            Some("a.ch,unreachable,0,,,10000,timeout")
        );
    }

    #[test]
    fn test_existing_file_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.csv");
        std::fs::write(&path, "old,schema\n1,2\n3,4\n").unwrap();

        let writer = ResultWriter::<DetectionResult>::create(&path, 1).unwrap();
        writer.write(&detection("a.ch")).unwrap();
        let content = read(&path);
        assert!(!content.contains("old,schema"));
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_unwritable_path_is_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("live.csv");
        let result = ResultWriter::<DetectionResult>::create(&path, 1);
        assert!(matches!(result, Err(WriterError::Open { .. })));
    }

    #[test]
    fn test_discovery_row_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crawl.csv");
        let writer = ResultWriter::<DomainRecord>::create(&path, 1).unwrap();
        writer
            .write(&DomainRecord {
                domain: "shop.ch".to_string(),
                tld: "ch".to_string(),
                country: "Switzerland".to_string(),
                source_url: "https://shop.ch/cart?a=1,2".to_string(),
                capture_timestamp: "20240315120000".to_string(),
                http_status: 200,
                language: "deu,eng".to_string(),
                mime_type: "text/html".to_string(),
                is_ecommerce: true,
                cms_hint: None,
            })
            .unwrap();
        let content = read(&path);
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("domain,tld,country,source_url,timestamp,status,language,mime,is_ecommerce,cms_hint")
        );
        assert_eq!(
            lines.next(),
            Some("shop.ch,ch,Switzerland,\"https://shop.ch/cart?a=1,2\",20240315120000,200,\"deu,eng\",text/html,true,")
        );
    }

    #[test]
    fn test_batched_flush_on_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.csv");
        let writer = ResultWriter::<DetectionResult>::create(&path, 100).unwrap();
        for i in 0..5 {
            writer.write(&detection(&format!("d{i}.ch"))).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 5);
        assert_eq!(read(&path).lines().count(), 6);
    }

    #[test]
    fn test_explicit_flush_exposes_batched_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.csv");
        let writer = ResultWriter::<DetectionResult>::create(&path, 100).unwrap();
        writer.write(&detection("a.ch")).unwrap();
        writer.write(&detection("b.ch")).unwrap();
        assert_eq!(read(&path).lines().count(), 1);

        writer.flush().unwrap();
        assert_eq!(read(&path).lines().count(), 3);
        assert_eq!(writer.rows_written(), 2);
    }

    #[test]
    fn test_concurrent_writes_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.csv");
        let writer = Arc::new(ResultWriter::<DetectionResult>::create(&path, 1).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let writer = Arc::clone(&writer);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        writer
                            .write(&detection(&format!("t{t}-d{i}.ch")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(writer.finish().unwrap(), 400);
        let content = read(&path);
        let rows: Vec<&str> = content.lines().skip(1).collect();
        assert_eq!(rows.len(), 400);
        for row in rows {
            assert_eq!(row.split(',').count(), 7, "malformed row: {row}");
        }
    }
}
