//! Platform classification from a fetched page.
//!
//! A `Classifier` evaluates the registry's rules against a `FetchedPage` in a
//! fixed order: header rules, cookie rules, body patterns, then generator
//! meta tags. Header, cookie and meta rules are unambiguous and decide the
//! verdict with full confidence as soon as one matches (a meta match also
//! overrides any body score). Body patterns accumulate weights per platform
//! and only decide the verdict when the best score reaches the threshold.
//!
//! Classification is a pure function of the page, so the same page always
//! yields the same verdict.

pub mod detection;
mod models;
mod registry;

use std::sync::Arc;

use log::trace;

pub use models::{CmsSignature, CompiledRule, RuleKind, Verdict};
pub use registry::SignatureRegistry;

use crate::config::{BODY_MATCH_THRESHOLD, MAX_BODY_CONFIDENCE, UNAMBIGUOUS_CONFIDENCE};
use crate::probe::FetchedPage;
use detection::{
    check_cookies, check_headers, check_meta, extract_cookies_from_headers,
    extract_meta_generators, normalize_headers_to_map, score_body,
};

/// Classifies pages against a shared signature registry.
#[derive(Debug, Clone)]
pub struct Classifier {
    registry: Arc<SignatureRegistry>,
    threshold: u32,
}

impl Classifier {
    /// Creates a classifier over a compiled registry.
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self::with_threshold(registry, BODY_MATCH_THRESHOLD)
    }

    /// Creates a classifier with a custom minimum body score.
    pub fn with_threshold(registry: Arc<SignatureRegistry>, threshold: u32) -> Self {
        Classifier {
            registry,
            threshold: threshold.max(1),
        }
    }

    /// The registry this classifier evaluates.
    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Returns the winning platform, or `None` when nothing conclusive matched.
    pub fn classify(&self, page: &FetchedPage) -> Option<Verdict> {
        let registry = self.registry.as_ref();

        let headers = normalize_headers_to_map(&page.headers);
        if let Some(rule) = check_headers(registry, &headers) {
            return Some(unambiguous(rule));
        }

        let cookies = extract_cookies_from_headers(&page.headers);
        if let Some(rule) = check_cookies(registry, &cookies) {
            return Some(unambiguous(rule));
        }

        let body = page.body_prefix.to_lowercase();
        let body_best = score_body(registry, &body).into_iter().next();

        let generators = extract_meta_generators(&page.body_prefix);
        if let Some(rule) = check_meta(registry, &generators) {
            return Some(unambiguous(rule));
        }

        let best = body_best?;
        if best.score < self.threshold {
            trace!(
                "Best body score {} for {} is below the threshold of {}",
                best.score,
                best.platform,
                self.threshold
            );
            return None;
        }
        Some(Verdict {
            platform: best.platform.to_string(),
            confidence: u8::try_from(best.score.min(u32::from(MAX_BODY_CONFIDENCE)))
                .unwrap_or(MAX_BODY_CONFIDENCE),
            rule_id: best.best_rule.id.clone(),
            kind: RuleKind::BodyPattern,
        })
    }
}

fn unambiguous(rule: &CompiledRule) -> Verdict {
    Verdict {
        platform: rule.platform.clone(),
        confidence: UNAMBIGUOUS_CONFIDENCE,
        rule_id: rule.id.clone(),
        kind: rule.kind,
    }
}
