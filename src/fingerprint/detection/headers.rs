//! Header-based platform detection.

use std::collections::HashMap;

use crate::fingerprint::models::{CompiledRule, HeaderName, Matcher, RuleKind};
use crate::fingerprint::registry::SignatureRegistry;

/// Returns the first header rule, in declaration order, that matches.
///
/// `headers` must come from `normalize_headers_to_map` (lower-cased names
/// and values).
pub fn check_headers<'r>(
    registry: &'r SignatureRegistry,
    headers: &HashMap<String, String>,
) -> Option<&'r CompiledRule> {
    if headers.is_empty() {
        return None;
    }
    registry
        .rules(RuleKind::HeaderMatch)
        .find(|rule| header_rule_matches(rule, headers))
}

fn header_rule_matches(rule: &CompiledRule, headers: &HashMap<String, String>) -> bool {
    let Matcher::Header { name, value } = &rule.matcher else {
        return false;
    };
    let value_ok = |header_value: &String| {
        value
            .as_deref()
            .is_none_or(|needle| header_value.contains(needle))
    };
    match name {
        HeaderName::Exact(name) => headers.get(name).is_some_and(value_ok),
        HeaderName::Prefix(prefix) => headers
            .iter()
            .any(|(header_name, header_value)| header_name.starts_with(prefix.as_str()) && value_ok(header_value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::models::CmsSignature;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn registry() -> SignatureRegistry {
        SignatureRegistry::from_signatures(vec![
            CmsSignature::new("First", RuleKind::HeaderMatch, "x-powered-by:first", 0),
            CmsSignature::new("Second", RuleKind::HeaderMatch, "X-Second-*", 0),
            CmsSignature::new("Third", RuleKind::HeaderMatch, "x-powered-by", 0),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_name_with_value_substring() {
        let registry = registry();
        let rule = check_headers(&registry, &map(&[("x-powered-by", "firstcommerce 2.1")])).unwrap();
        assert_eq!(rule.platform, "First");
    }

    #[test]
    fn test_exact_name_without_value_matches_presence() {
        let registry = registry();
        let rule = check_headers(&registry, &map(&[("x-powered-by", "php/8.2")])).unwrap();
        assert_eq!(rule.platform, "Third");
    }

    #[test]
    fn test_prefix_name() {
        let registry = registry();
        let rule = check_headers(&registry, &map(&[("x-second-cache", "hit")])).unwrap();
        assert_eq!(rule.platform, "Second");
    }

    #[test]
    fn test_first_declared_rule_wins() {
        let registry = registry();
        let headers = map(&[("x-second-cache", "hit"), ("x-powered-by", "first")]);
        assert_eq!(check_headers(&registry, &headers).unwrap().platform, "First");
    }

    #[test]
    fn test_no_match() {
        let registry = registry();
        assert!(check_headers(&registry, &map(&[("server", "nginx")])).is_none());
        assert!(check_headers(&registry, &HashMap::new()).is_none());
    }
}
