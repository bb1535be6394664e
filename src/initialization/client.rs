//! HTTP client initialization.
//!
//! Live probes and index queries use separate clients: probes follow a
//! bounded number of redirects and send browser-like Accept headers, while
//! the index client has its own, longer timeout.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect, ClientBuilder};

use crate::config::{IndexSettings, ProbeSettings, ACCEPT_HTML, ACCEPT_LANGUAGE as ACCEPT_LANGUAGE_VALUE};
use crate::error_handling::InitializationError;

/// Initializes the HTTP client used for live probes.
///
/// Creates a `reqwest::Client` configured with:
/// - User-Agent header from settings
/// - Timeout from settings (the probe also applies a hard timeout around each attempt)
/// - Redirect following limited to `max_redirects` hops
/// - Rustls TLS backend
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if client creation fails.
pub fn init_probe_client(settings: &ProbeSettings) -> Result<reqwest::Client, InitializationError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

    let client = ClientBuilder::new()
        .use_rustls_tls()
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout)
        .redirect(redirect::Policy::limited(settings.max_redirects))
        .user_agent(settings.user_agent.clone())
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Initializes the HTTP client used for crawl index queries.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if client creation fails.
pub fn init_index_client(settings: &IndexSettings) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .use_rustls_tls()
        .timeout(settings.timeout)
        .connect_timeout(Duration::from_secs(30).min(settings.timeout))
        .user_agent(settings.user_agent.clone())
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_clients_with_defaults() {
        crate::initialization::init_crypto_provider();
        assert!(init_probe_client(&ProbeSettings::default()).is_ok());
        assert!(init_index_client(&IndexSettings::default()).is_ok());
    }
}
