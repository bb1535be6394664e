//! Domain normalization and bookkeeping.
//!
//! This module provides:
//! - `normalize_domain()` - canonical host form used as the dedup key
//! - `parse_target()` - domain plus the URL a probe should fetch
//! - TLD validation and membership checks
//! - Exclude-list and domain-list loading
//! - `DedupSet`, the synchronized set of domains already emitted

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use log::warn;

use crate::error_handling::ConfigError;

/// Maximum input length (2048 characters), matching common browser and server limits.
const MAX_URL_LENGTH: usize = 2048;

/// Normalizes a URL or bare domain into its canonical host form.
///
/// The scheme, path, query, and fragment are stripped, the host is
/// lower-cased, a leading `www.` and a trailing dot are removed, and an
/// explicit non-default port is kept (`host:port`).
///
/// # Returns
///
/// `None` if the input is empty, too long, not http(s), or has no host.
pub fn normalize_domain(input: &str) -> Option<String> {
    parse_target(input, "https").map(|target| target.domain)
}

/// A probe target: the canonical domain and the URL to fetch for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Canonical domain, the dedup key and the `domain` column
    pub domain: String,
    /// Site root to fetch
    pub url: String,
}

/// Parses a domain-list entry into a probe target.
///
/// Entries with an explicit `http://` or `https://` scheme keep it; bare
/// domains are fetched with `default_scheme`. The fetched URL always points
/// at the site root of the host as given, while `domain` drops a leading
/// `www.` so both spellings dedup to one key.
pub fn parse_target(input: &str, default_scheme: &str) -> Option<Target> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() > MAX_URL_LENGTH {
        warn!(
            "Skipping input exceeding maximum length ({} > {}): {}...",
            trimmed.len(),
            MAX_URL_LENGTH,
            trimmed.chars().take(50).collect::<String>()
        );
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{default_scheme}://{trimmed}")
    };

    let parsed = url::Url::parse(&with_scheme).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    // `mailto:x@y.de` turns into userinfo plus host once a scheme is prepended
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return None;
    }
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    let key = host.strip_prefix("www.").unwrap_or(&host);
    if key.is_empty() {
        return None;
    }

    let (domain, fetched) = match parsed.port() {
        Some(port) => (format!("{key}:{port}"), format!("{host}:{port}")),
        None => (key.to_string(), host.clone()),
    };
    Some(Target {
        domain,
        url: format!("{}://{}/", parsed.scheme(), fetched),
    })
}

/// Returns the host part of a normalized domain (drops `:port`).
pub fn host_of(domain: &str) -> &str {
    if domain.starts_with('[') {
        // IPv6 literal, keep brackets
        return domain.find(']').map(|idx| &domain[..=idx]).unwrap_or(domain);
    }
    domain.rsplit_once(':').map(|(h, _)| h).unwrap_or(domain)
}

/// Checks that a TLD is made of valid DNS labels (`us`, `co.uk`, `xn--p1ai`).
pub fn is_valid_tld(tld: &str) -> bool {
    !tld.is_empty()
        && tld.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Checks that a normalized domain is a proper subdomain of `tld`.
///
/// The bare TLD itself does not count.
pub fn in_tld(domain: &str, tld: &str) -> bool {
    let host = host_of(domain);
    host.len() > tld.len() + 1
        && host.ends_with(tld)
        && host.as_bytes()[host.len() - tld.len() - 1] == b'.'
}

/// Loads an exclude list: one domain or URL per line.
///
/// Blank lines and lines starting with `#` are ignored. Entries are
/// normalized the same way as discovered domains.
///
/// # Errors
///
/// A missing or unreadable file is a configuration error.
pub fn load_exclude_list(path: &Path) -> Result<HashSet<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ExcludeFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(normalize_domain)
        .collect())
}

/// Loads a domain list for detection: one entry per line, in file order.
///
/// Blank lines and `#` comments are dropped; entries are returned as written
/// so invalid ones can be counted by the caller.
pub fn load_domain_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::InputFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Set of normalized domains already emitted or queued.
///
/// `insert` is an atomic check-and-insert, so concurrent callers never both
/// see a domain as new.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `domain`, returning `true` if it was not present.
    pub fn insert(&self, domain: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(domain) {
            false
        } else {
            seen.insert(domain.to_string())
        }
    }

    /// Checks membership without inserting.
    pub fn contains(&self, domain: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(domain)
    }

    /// Number of domains in the set.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if no domain was inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
