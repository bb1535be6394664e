//! Error categorization and retry strategy.
//!
//! This module maps transport errors onto the failure kinds recorded in the
//! output and configures the backoff used for retries.

use std::error::Error as StdError;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::IndexError;
use crate::probe::ProbeFailure;

/// Creates an exponential backoff retry strategy.
///
/// The first delay is `initial_delay_ms * RETRY_FACTOR` and each further
/// delay is multiplied by `RETRY_FACTOR`, capped at `RETRY_MAX_DELAY_SECS`.
///
/// # Arguments
///
/// * `initial_delay_ms` - Base delay in milliseconds
/// * `retries` - Number of retries after the initial attempt
///
/// # Returns
///
/// A retry strategy iterator ready for use with `tokio_retry::Retry`.
pub fn get_retry_strategy(initial_delay_ms: u64, retries: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_FACTOR)
        .factor(initial_delay_ms)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(retries)
}

/// Categorizes a `reqwest::Error` raised by a live probe into a `ProbeFailure`.
///
/// Redirect-limit and timeout errors are identified by reqwest itself. TLS
/// failures are found by walking the source chain for a `rustls::Error`
/// (possibly wrapped in an `io::Error`); everything else is a connection error.
///
/// # Arguments
///
/// * `error` - The `reqwest::Error` to categorize
///
/// # Returns
///
/// The failure kind to record for the domain.
pub fn categorize_probe_error(error: &reqwest::Error) -> ProbeFailure {
    if error.is_redirect() {
        return ProbeFailure::TooManyRedirects;
    }
    if error.is_timeout() {
        return ProbeFailure::Timeout;
    }
    if is_tls_error(error) {
        return ProbeFailure::TlsError;
    }
    ProbeFailure::ConnectionError
}

fn is_tls_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(cause) = current {
        if cause.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
            if let Some(inner) = io_err.get_ref() {
                if inner.downcast_ref::<rustls::Error>().is_some() {
                    return true;
                }
            }
        }
        // Fallback for TLS errors that only surface through their message
        let msg = cause.to_string().to_lowercase();
        if msg.contains("certificate")
            || msg.contains("tls handshake")
            || msg.contains("invalid peer")
            || msg.contains("received fatal alert")
        {
            return true;
        }
        current = cause.source();
    }
    false
}

/// Determines if a failed index request should be retried.
///
/// Server errors (5xx), rate limiting (429), timeouts, connection failures
/// and truncated bodies are transient. Other client errors are permanent.
pub fn is_retriable_index_error(error: &IndexError) -> bool {
    match error {
        IndexError::Status { status, .. } => {
            *status == crate::config::HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(status)
        }
        IndexError::Http(e) => {
            if let Some(status) = e.status() {
                let code = status.as_u16();
                return code == crate::config::HTTP_STATUS_TOO_MANY_REQUESTS
                    || (500..600).contains(&code);
            }
            !e.is_builder()
        }
        IndexError::Decode(_) => true,
        IndexError::Url(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_retry_strategy_initial_delay() {
        let mut strategy = get_retry_strategy(500, 3);
        let first_delay = strategy.next().unwrap();
        assert!(
            first_delay.as_millis() >= 500,
            "Expected delay >= 500ms, got {}ms",
            first_delay.as_millis()
        );
    }

    #[test]
    fn test_get_retry_strategy_exponential_backoff() {
        let delays: Vec<Duration> = get_retry_strategy(100, 4).collect();
        assert_eq!(delays.len(), 4);
        for i in 1..delays.len() {
            assert!(
                delays[i] >= delays[i - 1],
                "Delay should not decrease: {:?} >= {:?}",
                delays[i],
                delays[i - 1]
            );
        }
    }

    #[test]
    fn test_get_retry_strategy_respects_max_delay() {
        let max = Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS);
        for delay in get_retry_strategy(10_000, 8) {
            assert!(delay <= max, "{:?} exceeds max delay {:?}", delay, max);
        }
    }

    #[test]
    fn test_get_retry_strategy_zero_retries() {
        assert_eq!(get_retry_strategy(500, 0).count(), 0);
    }

    #[test]
    fn test_is_retriable_index_error_status_codes() {
        let status = |status| IndexError::Status {
            url: "http://index.test/cdx".to_string(),
            status,
        };
        assert!(is_retriable_index_error(&status(503)));
        assert!(is_retriable_index_error(&status(500)));
        assert!(is_retriable_index_error(&status(429)));
        assert!(!is_retriable_index_error(&status(400)));
        assert!(!is_retriable_index_error(&status(403)));
    }

    #[test]
    fn test_is_retriable_index_error_decode_and_url() {
        assert!(is_retriable_index_error(&IndexError::Decode(
            "truncated gzip stream".to_string()
        )));
        let url_err = url::Url::parse("not a url").unwrap_err();
        assert!(!is_retriable_index_error(&IndexError::Url(url_err)));
    }

    #[test]
    fn test_is_tls_error_detects_wrapped_rustls_error() {
        let io_err = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::Expired),
        );
        assert!(is_tls_error(&io_err));
    }

    #[test]
    fn test_is_tls_error_ignores_plain_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_tls_error(&io_err));
    }
}
