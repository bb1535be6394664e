//! Crawl index HTTP client.
//!
//! Talks to a CDX index server: the collection listing (`collinfo.json`),
//! page counts per URL pattern (`showNumPages=true`), and result pages.

use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use log::{debug, warn};
use serde::Deserialize;
use tokio_retry::RetryIf;

use crate::config::{IndexSettings, HTTP_STATUS_NOT_FOUND};
use crate::error_handling::{
    get_retry_strategy, is_retriable_index_error, IndexError, InfoType, InitializationError,
    ProcessingStats,
};
use crate::initialization::init_index_client;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One crawl collection as listed by the index server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    /// e.g. `CC-MAIN-2024-33`
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// CDX endpoint of this collection
    #[serde(rename = "cdx-api")]
    pub cdx_api: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumPages {
    Object { pages: u64 },
    Bare(u64),
}

/// Server-side filters sent with every page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    /// `status:200` or `status:(200|301)`
    pub status: Option<String>,
    /// `mimetype:text/html`
    pub mime: Option<String>,
    /// `from` timestamp bound
    pub from: Option<String>,
    /// `to` timestamp bound
    pub to: Option<String>,
}

impl PageQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = &self.status {
            params.push(("filter", status.clone()));
        }
        if let Some(mime) = &self.mime {
            params.push(("filter", mime.clone()));
        }
        if let Some(from) = &self.from {
            params.push(("from", from.clone()));
        }
        if let Some(to) = &self.to {
            params.push(("to", to.clone()));
        }
        params
    }
}

/// Client for one index server.
#[derive(Debug, Clone)]
pub struct CdxClient {
    client: reqwest::Client,
    settings: IndexSettings,
    stats: Arc<ProcessingStats>,
}

impl CdxClient {
    /// # Errors
    ///
    /// Returns `InitializationError::HttpClientError` if the HTTP client
    /// cannot be built.
    pub fn new(settings: &IndexSettings, stats: Arc<ProcessingStats>) -> Result<Self, InitializationError> {
        Ok(CdxClient {
            client: init_index_client(settings)?,
            settings: settings.clone(),
            stats,
        })
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Lists the server's collections, newest first.
    pub async fn list_crawls(&self) -> Result<Vec<Collection>, IndexError> {
        let url = format!("{}/collinfo.json", self.settings.server.trim_end_matches('/'));
        let body = self.get_with_retry(&url, &[]).await?;
        let collections: Vec<Collection> =
            serde_json::from_slice(&body).map_err(|e| IndexError::Decode(e.to_string()))?;
        debug!("Index lists {} collections", collections.len());
        Ok(collections)
    }

    /// Number of result pages for `*.<tld>` in a collection (0 when nothing matched).
    pub async fn num_pages(&self, collection: &Collection, tld: &str) -> Result<u64, IndexError> {
        let pattern = format!("*.{tld}");
        let params = [
            ("url", pattern),
            ("output", "json".to_string()),
            ("showNumPages", "true".to_string()),
        ];
        let body = self.get_with_retry(&collection.cdx_api, &params).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(0);
        }
        match serde_json::from_slice::<NumPages>(&body) {
            Ok(NumPages::Object { pages }) | Ok(NumPages::Bare(pages)) => Ok(pages),
            Err(e) => Err(IndexError::Decode(format!("page count for .{tld}: {e}"))),
        }
    }

    /// Fetches one result page as text, one record per line.
    ///
    /// A 404 (the server's "no captures found") is an empty page.
    pub async fn fetch_page(
        &self,
        collection: &Collection,
        tld: &str,
        page: u64,
        query: &PageQuery,
    ) -> Result<String, IndexError> {
        let mut params = vec![
            ("url", format!("*.{tld}")),
            ("output", "json".to_string()),
            ("page", page.to_string()),
        ];
        params.extend(query.params());
        let body = self.get_with_retry(&collection.cdx_api, &params).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn get_with_retry(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<u8>, IndexError> {
        let mut attempts = 0u32;
        let result = RetryIf::spawn(
            get_retry_strategy(self.settings.retry_delay_ms, self.settings.retries),
            || {
                attempts += 1;
                self.get(url, params)
            },
            |e: &IndexError| {
                let retry = is_retriable_index_error(e);
                if retry {
                    warn!("Index request to {} failed, retrying: {}", url, e);
                }
                retry
            },
        )
        .await;
        if attempts > 1 {
            self.stats
                .add_info(InfoType::IndexPageRetried, (attempts - 1) as usize);
        }
        result
    }

    async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<u8>, IndexError> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        if status.as_u16() == HTTP_STATUS_NOT_FOUND {
            debug!("No captures at {}", response.url());
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(IndexError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        decode_body(&bytes)
    }
}

/// Gunzips a body that arrived still compressed; returns others unchanged.
fn decode_body(bytes: &[u8]) -> Result<Vec<u8>, IndexError> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut decoded = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut decoded)
        .map_err(|e| IndexError::Decode(format!("gzip body: {e}")))?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_plain_body() {
        assert_eq!(decode_body(b"{\"a\":1}\n").unwrap(), b"{\"a\":1}\n");
    }

    #[test]
    fn test_decode_gzip_body() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"line one\nline two\n").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(decode_body(&compressed).unwrap(), b"line one\nline two\n");
    }

    #[test]
    fn test_decode_truncated_gzip_is_an_error() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[b'x'; 4096]).unwrap();
        let compressed = encoder.finish().unwrap();
        assert!(matches!(
            decode_body(&compressed[..compressed.len() / 2]),
            Err(IndexError::Decode(_))
        ));
    }

    #[test]
    fn test_page_query_params() {
        let query = PageQuery {
            status: Some("status:200".to_string()),
            mime: Some("mimetype:text/html".to_string()),
            from: Some("2024".to_string()),
            to: None,
        };
        assert_eq!(
            query.params(),
            vec![
                ("filter", "status:200".to_string()),
                ("filter", "mimetype:text/html".to_string()),
                ("from", "2024".to_string()),
            ]
        );
    }

    #[test]
    fn test_num_pages_shapes() {
        let object: NumPages = serde_json::from_str(r#"{"pages": 7, "pageSize": 5, "blocks": 31}"#).unwrap();
        assert!(matches!(object, NumPages::Object { pages: 7 }));
        let bare: NumPages = serde_json::from_str("3").unwrap();
        assert!(matches!(bare, NumPages::Bare(3)));
    }
}
