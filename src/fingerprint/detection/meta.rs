//! Generator meta-tag detection.

use crate::fingerprint::models::{CompiledRule, Matcher, RuleKind};
use crate::fingerprint::registry::SignatureRegistry;

/// Returns the first meta rule, in declaration order, contained in any of
/// the page's generator values.
///
/// `generators` must come from `extract_meta_generators` (normalized).
pub fn check_meta<'r>(
    registry: &'r SignatureRegistry,
    generators: &[String],
) -> Option<&'r CompiledRule> {
    if generators.is_empty() {
        return None;
    }
    registry.rules(RuleKind::MetaGenerator).find(|rule| {
        let Matcher::Meta { needle } = &rule.matcher else {
            return false;
        };
        generators
            .iter()
            .any(|generator| generator.contains(needle.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::detection::extract_meta_generators;
    use crate::fingerprint::models::CmsSignature;

    #[test]
    fn test_hyphenated_pattern_matches_spaced_generator() {
        let registry = SignatureRegistry::from_signatures(vec![CmsSignature::new(
            "ShopLike",
            RuleKind::MetaGenerator,
            "shoplike-engine",
            0,
        )])
        .unwrap();
        let generators =
            extract_meta_generators(r#"<meta name="generator" content="ShopLike Engine v3">"#);
        let rule = check_meta(&registry, &generators).unwrap();
        assert_eq!(rule.id, "shoplike:meta:shoplike-engine");
    }

    #[test]
    fn test_no_generator() {
        let registry = SignatureRegistry::builtin().unwrap();
        assert!(check_meta(&registry, &[]).is_none());
        let generators = vec!["hugo 0.120".to_string()];
        assert!(check_meta(&registry, &generators).is_none());
    }
}
