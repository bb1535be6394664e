//! Live HTTP probe.
//!
//! `ProbeClient::fetch` issues one GET to a target, follows a bounded number
//! of redirects, and reads at most a fixed prefix of the body. Every attempt
//! runs under a hard `tokio::time::timeout`, so a server that accepts the
//! connection and never answers costs one probe timeout. Refused or reset
//! connections are retried with a short backoff; timeouts never are.

use std::time::{Duration, Instant};

use log::debug;
use reqwest::header::HeaderMap;
use tokio_retry::RetryIf;

use crate::config::ProbeSettings;
use crate::error_handling::{categorize_probe_error, get_retry_strategy, ErrorType, InitializationError};
use crate::initialization::init_probe_client;

/// Why a probe produced no page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No response within the timeout
    Timeout,
    /// Connection refused, reset, or unresolvable host
    ConnectionError,
    /// TLS handshake or certificate failure
    TlsError,
    /// Redirect chain longer than allowed
    TooManyRedirects,
}

impl ProbeFailure {
    /// Value recorded in the `error` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::ConnectionError => "connection_error",
            ProbeFailure::TlsError => "tls_error",
            ProbeFailure::TooManyRedirects => "too_many_redirects",
        }
    }

    /// Counter bumped for this failure.
    pub fn error_type(&self) -> ErrorType {
        match self {
            ProbeFailure::Timeout => ErrorType::ProbeTimeout,
            ProbeFailure::ConnectionError => ErrorType::ProbeConnectionError,
            ProbeFailure::TlsError => ErrorType::ProbeTlsError,
            ProbeFailure::TooManyRedirects => ErrorType::ProbeTooManyRedirects,
        }
    }
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page returned by a successful probe.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Status of the final response (after redirects)
    pub status: u16,
    /// Headers of the final response
    pub headers: HeaderMap,
    /// At most `ProbeSettings::body_limit` bytes of the body, decoded lossily
    pub body_prefix: String,
    /// URL after redirects
    pub final_url: String,
}

/// Outcome of probing one target.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A page was fetched
    Success(FetchedPage),
    /// No response within the timeout
    Timeout,
    /// Connection refused, reset, or unresolvable host
    ConnectionError,
    /// TLS handshake or certificate failure
    TlsError,
    /// Redirect chain longer than allowed
    TooManyRedirects,
}

impl From<ProbeFailure> for FetchOutcome {
    fn from(failure: ProbeFailure) -> Self {
        match failure {
            ProbeFailure::Timeout => FetchOutcome::Timeout,
            ProbeFailure::ConnectionError => FetchOutcome::ConnectionError,
            ProbeFailure::TlsError => FetchOutcome::TlsError,
            ProbeFailure::TooManyRedirects => FetchOutcome::TooManyRedirects,
        }
    }
}

impl FetchOutcome {
    /// Splits the outcome into a page or its failure kind.
    pub fn into_result(self) -> Result<FetchedPage, ProbeFailure> {
        match self {
            FetchOutcome::Success(page) => Ok(page),
            FetchOutcome::Timeout => Err(ProbeFailure::Timeout),
            FetchOutcome::ConnectionError => Err(ProbeFailure::ConnectionError),
            FetchOutcome::TlsError => Err(ProbeFailure::TlsError),
            FetchOutcome::TooManyRedirects => Err(ProbeFailure::TooManyRedirects),
        }
    }

    /// The failure kind, or `None` for a fetched page.
    pub fn failure(&self) -> Option<ProbeFailure> {
        match self {
            FetchOutcome::Success(_) => None,
            FetchOutcome::Timeout => Some(ProbeFailure::Timeout),
            FetchOutcome::ConnectionError => Some(ProbeFailure::ConnectionError),
            FetchOutcome::TlsError => Some(ProbeFailure::TlsError),
            FetchOutcome::TooManyRedirects => Some(ProbeFailure::TooManyRedirects),
        }
    }
}

/// A finished probe.
#[derive(Debug)]
pub struct ProbeResult {
    /// Final outcome after retries
    pub outcome: FetchOutcome,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Wall time across all attempts
    pub elapsed: Duration,
}

/// HTTP client for live probes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
    settings: ProbeSettings,
}

impl ProbeClient {
    /// Builds a probe client from settings.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::HttpClientError` if the underlying client
    /// cannot be built.
    pub fn new(settings: &ProbeSettings) -> Result<Self, InitializationError> {
        Ok(ProbeClient {
            client: init_probe_client(settings)?,
            settings: settings.clone(),
        })
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Probes `url`, retrying refused or reset connections.
    pub async fn fetch(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        let mut attempts = 0u32;

        let result = RetryIf::spawn(
            get_retry_strategy(self.settings.retry_delay_ms, self.settings.retries),
            || {
                attempts += 1;
                self.attempt(url)
            },
            |failure: &ProbeFailure| {
                let retry = *failure == ProbeFailure::ConnectionError;
                if retry {
                    debug!("Connection to {} failed, retrying", url);
                }
                retry
            },
        )
        .await;

        let outcome = match result {
            Ok(page) => FetchOutcome::Success(page),
            Err(failure) => failure.into(),
        };
        ProbeResult {
            outcome,
            attempts,
            elapsed: start.elapsed(),
        }
    }

    async fn attempt(&self, url: &str) -> Result<FetchedPage, ProbeFailure> {
        match tokio::time::timeout(self.settings.timeout, self.request(url)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Probe of {} timed out after {:?}", url, self.settings.timeout);
                Err(ProbeFailure::Timeout)
            }
        }
    }

    async fn request(&self, url: &str) -> Result<FetchedPage, ProbeFailure> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                debug!("Probe of {} failed: {e}", url);
                categorize_probe_error(&e)
            })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();

        let limit = self.settings.body_limit;
        let mut body: Vec<u8> = Vec::with_capacity(limit.min(16 * 1024));
        while body.len() < limit {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let take = chunk.len().min(limit - body.len());
                    body.extend_from_slice(&chunk[..take]);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => return Err(ProbeFailure::Timeout),
                Err(e) => {
                    // The server answered; classify what arrived
                    debug!("Body of {} cut short after {} bytes: {e}", url, body.len());
                    break;
                }
            }
        }

        Ok(FetchedPage {
            status,
            headers,
            body_prefix: String::from_utf8_lossy(&body).into_owned(),
            final_url,
        })
    }
}
