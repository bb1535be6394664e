//! Discovery-time filters.
//!
//! `FilterCriteria` is built once per run from `FilterOptions` and shared
//! read-only by every index worker. Each field is optional; an unset field
//! accepts everything. `FilterCriteria::evaluate` applies the predicates in a
//! fixed order and reports the first one that rejects a record.

pub mod hints;

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::config::FilterOptions;
use crate::domain::{in_tld, load_exclude_list};
use crate::error_handling::{ConfigError, SkipReason};
use crate::models::DomainRecord;

pub use hints::{cms_hint, country_for_tld, is_ecommerce_url, is_placeholder_domain};

/// Length of a full index timestamp (`YYYYMMDDhhmmss`).
const TIMESTAMP_LEN: usize = 14;

/// A date bound padded to a full 14-digit index timestamp.
///
/// Lower bounds are padded with `0`, upper bounds with `9`, so that
/// `--from 2024 --to 2024` covers the whole year and bounds compare
/// lexicographically against capture timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBound {
    raw: String,
    padded: String,
}

impl DateBound {
    /// Parses a `--from` value, padding missing digits with `0`.
    pub fn lower(value: &str) -> Result<Self, ConfigError> {
        Self::parse(value, '0')
    }

    /// Parses a `--to` value, padding missing digits with `9`.
    pub fn upper(value: &str) -> Result<Self, ConfigError> {
        Self::parse(value, '9')
    }

    fn parse(value: &str, pad: char) -> Result<Self, ConfigError> {
        let raw = value.trim().replace('-', "");
        let invalid = |reason: &str| ConfigError::InvalidDate {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected digits (YYYY, YYYYMM or YYYYMMDD)"));
        }
        if raw.len() < 4 || raw.len() > TIMESTAMP_LEN || (raw.len() > 4 && raw.len() % 2 != 0) {
            return Err(invalid("expected YYYY, YYYYMM, YYYYMMDD or a longer timestamp"));
        }
        if raw.len() >= 6 {
            let month: u32 = raw[4..6].parse().unwrap_or(0);
            if !(1..=12).contains(&month) {
                return Err(invalid("month out of range"));
            }
        }
        if raw.len() >= 8 && NaiveDate::parse_from_str(&raw[..8], "%Y%m%d").is_err() {
            return Err(invalid("not a calendar date"));
        }

        let mut padded = raw.clone();
        while padded.len() < TIMESTAMP_LEN {
            padded.push(pad);
        }
        Ok(DateBound { raw, padded })
    }

    /// The bound as given (digits only), for server-side `from`/`to` parameters.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The bound padded to 14 digits.
    pub fn as_str(&self) -> &str {
        &self.padded
    }
}

/// Filters applied to every candidate record.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Requested TLDs
    pub tlds: HashSet<String>,
    /// Earliest accepted capture
    pub date_from: Option<DateBound>,
    /// Latest accepted capture
    pub date_to: Option<DateBound>,
    /// Accepted statuses; `None` accepts any
    pub status: Option<HashSet<u16>>,
    /// Accepted MIME type prefix
    pub mime: Option<String>,
    /// Language the capture must list
    pub language: Option<String>,
    /// URL keywords, at least one must match
    pub keywords: Option<Vec<String>>,
    /// Platforms the URL hint must name
    pub cms_allow: Option<HashSet<String>>,
    /// Normalized domains to drop
    pub exclude_set: HashSet<String>,
}

impl FilterCriteria {
    /// Builds the criteria for a run, loading the exclude file if one is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparseable dates or an unreadable exclude file.
    pub fn from_options(tlds: &[String], options: &FilterOptions) -> Result<Self, ConfigError> {
        let exclude_set = match &options.exclude_file {
            Some(path) => {
                let set = load_exclude_list(path)?;
                log::info!("Loaded {} excluded domains from {}", set.len(), path.display());
                set
            }
            None => HashSet::new(),
        };

        let keywords: Vec<String> = options
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let cms_allow: HashSet<String> = options
            .cms
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        for cms in &cms_allow {
            if !hints::is_known_cms(cms) {
                log::warn!("--cms '{}' is not a platform recognized from URLs; it will match nothing", cms);
            }
        }

        Ok(FilterCriteria {
            tlds: tlds.iter().cloned().collect(),
            date_from: options.date_from.as_deref().map(DateBound::lower).transpose()?,
            date_to: options.date_to.as_deref().map(DateBound::upper).transpose()?,
            status: Some(options.status.iter().copied().collect::<HashSet<u16>>())
                .filter(|s| !s.is_empty()),
            mime: options
                .mime
                .as_ref()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty()),
            language: options
                .language
                .as_ref()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty()),
            keywords: Some(keywords).filter(|k| !k.is_empty()),
            cms_allow: Some(cms_allow).filter(|c| !c.is_empty()),
            exclude_set,
        })
    }

    /// Applies the predicate chain to a candidate.
    ///
    /// Order: TLD, date range, status, MIME type, language, keywords,
    /// exclude set, placeholder domains, CMS allow-list.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the record is admitted, otherwise the first rejecting reason.
    pub fn evaluate(&self, record: &DomainRecord) -> Result<(), SkipReason> {
        check(self.tld_ok(record), SkipReason::OutsideTld)?;
        check(self.date_ok(&record.capture_timestamp), SkipReason::OutsideDateRange)?;
        check(self.status_ok(record.http_status), SkipReason::StatusFiltered)?;
        check(self.mime_ok(&record.mime_type), SkipReason::MimeFiltered)?;
        check(self.language_ok(&record.language), SkipReason::LanguageFiltered)?;
        check(self.keywords_ok(&record.source_url), SkipReason::KeywordFiltered)?;
        check(!self.exclude_set.contains(&record.domain), SkipReason::Excluded)?;
        check(!is_placeholder_domain(&record.domain), SkipReason::BadDomainPattern)?;
        check(self.cms_ok(record.cms_hint.as_deref()), SkipReason::CmsFiltered)?;
        Ok(())
    }

    fn tld_ok(&self, record: &DomainRecord) -> bool {
        self.tlds.is_empty() || (self.tlds.contains(&record.tld) && in_tld(&record.domain, &record.tld))
    }

    fn date_ok(&self, timestamp: &str) -> bool {
        if let Some(from) = &self.date_from {
            if timestamp < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.date_to {
            if timestamp > to.as_str() {
                return false;
            }
        }
        true
    }

    fn status_ok(&self, status: u16) -> bool {
        self.status.as_ref().is_none_or(|s| s.contains(&status))
    }

    fn mime_ok(&self, mime: &str) -> bool {
        self.mime
            .as_ref()
            .is_none_or(|m| mime.to_lowercase().starts_with(m.as_str()))
    }

    fn language_ok(&self, languages: &str) -> bool {
        self.language.as_ref().is_none_or(|wanted| {
            languages
                .split(',')
                .any(|l| l.trim().eq_ignore_ascii_case(wanted))
        })
    }

    fn keywords_ok(&self, url: &str) -> bool {
        self.keywords.as_ref().is_none_or(|keywords| {
            let url = url.to_lowercase();
            keywords.iter().any(|k| url.contains(k.as_str()))
        })
    }

    fn cms_ok(&self, hint: Option<&str>) -> bool {
        self.cms_allow.as_ref().is_none_or(|allow| {
            hint.is_some_and(|h| allow.contains(&h.to_lowercase()))
        })
    }
}

fn check(ok: bool, reason: SkipReason) -> Result<(), SkipReason> {
    if ok {
        Ok(())
    } else {
        Err(reason)
    }
}
