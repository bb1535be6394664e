//! Cookie-based platform detection.

use std::collections::HashMap;

use crate::fingerprint::models::{CompiledRule, Matcher, RuleKind};
use crate::fingerprint::registry::SignatureRegistry;

/// Returns the first cookie rule, in declaration order, whose names are all
/// present.
///
/// Wildcard names (`_shopify_*`) were compiled to anchored regexes, so a
/// rule part matches when any cookie name matches it. Cookie values are not
/// inspected.
pub fn check_cookies<'r>(
    registry: &'r SignatureRegistry,
    cookies: &HashMap<String, String>,
) -> Option<&'r CompiledRule> {
    if cookies.is_empty() {
        return None;
    }
    registry.rules(RuleKind::CookieName).find(|rule| {
        let Matcher::Cookie { names } = &rule.matcher else {
            return false;
        };
        !names.is_empty()
            && names
                .iter()
                .all(|re| cookies.keys().any(|cookie_name| re.is_match(cookie_name)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::models::CmsSignature;

    fn cookies(names: &[&str]) -> HashMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), "1".to_string()))
            .collect()
    }

    fn registry() -> SignatureRegistry {
        SignatureRegistry::from_signatures(vec![
            CmsSignature::new("Cart", RuleKind::CookieName, "phpsessid&&currency", 0),
            CmsSignature::new("Shop", RuleKind::CookieName, "_shop_*", 0),
            CmsSignature::new("Sess", RuleKind::CookieName, "phpsessid", 0),
        ])
        .unwrap()
    }

    #[test]
    fn test_wildcard_cookie() {
        let registry = registry();
        let rule = check_cookies(&registry, &cookies(&["_shop_y", "other"])).unwrap();
        assert_eq!(rule.platform, "Shop");
        assert_eq!(rule.id, "shop:cookie:_shop_*");
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let registry = registry();
        assert!(check_cookies(&registry, &cookies(&["x_shop_y"])).is_none());
    }

    #[test]
    fn test_conjunction_requires_every_name() {
        let registry = registry();
        assert_eq!(
            check_cookies(&registry, &cookies(&["phpsessid", "currency"]))
                .unwrap()
                .platform,
            "Cart"
        );
        assert_eq!(
            check_cookies(&registry, &cookies(&["phpsessid"])).unwrap().platform,
            "Sess"
        );
    }

    #[test]
    fn test_no_cookies() {
        let registry = registry();
        assert!(check_cookies(&registry, &HashMap::new()).is_none());
    }
}
