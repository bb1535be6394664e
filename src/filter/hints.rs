//! URL-derived hints attached to discovered domains.

/// Country names for common TLDs.
const TLD_COUNTRIES: &[(&str, &str)] = &[
    ("us", "United States"),
    ("ch", "Switzerland"),
    ("co.uk", "United Kingdom"),
    ("uk", "United Kingdom"),
    ("de", "Germany"),
    ("fr", "France"),
    ("es", "Spain"),
    ("it", "Italy"),
    ("nl", "Netherlands"),
    ("be", "Belgium"),
    ("at", "Austria"),
    ("au", "Australia"),
    ("com.au", "Australia"),
    ("ca", "Canada"),
    ("jp", "Japan"),
    ("co.jp", "Japan"),
    ("br", "Brazil"),
    ("com.br", "Brazil"),
    ("mx", "Mexico"),
    ("pl", "Poland"),
    ("ru", "Russia"),
    ("cn", "China"),
    ("cl", "Chile"),
    ("pe", "Peru"),
    ("ar", "Argentina"),
    ("za", "South Africa"),
    ("co.za", "South Africa"),
    ("se", "Sweden"),
    ("dk", "Denmark"),
    ("no", "Norway"),
    ("fi", "Finland"),
    ("pt", "Portugal"),
    ("cz", "Czechia"),
    ("ie", "Ireland"),
    ("in", "India"),
    ("nz", "New Zealand"),
    ("store", "Generic"),
    ("shop", "Generic"),
    ("online", "Generic"),
    ("com", "Global"),
];

/// URL substrings suggesting a storefront platform, checked in order.
pub const CMS_URL_PATTERNS: &[(&str, &[&str])] = &[
    (
        "PrestaShop",
        &[
            "prestashop",
            "/modules/ps_",
            "id_product=",
            "blockcart",
            "/themes/classic/",
        ],
    ),
    (
        "Magento",
        &[
            "magento",
            "/checkout/cart/",
            "/static/frontend/",
            "/skin/frontend/",
        ],
    ),
    (
        "WooCommerce",
        &[
            "/wp-content/plugins/woocommerce",
            "wc-ajax",
            "add-to-cart=",
            "woocommerce",
        ],
    ),
    ("Shopify", &[".myshopify.com", "cdn.shopify", "/cart.js", "shopify"]),
    (
        "OpenCart",
        &[
            "route=product",
            "route=checkout",
            "opencart",
            "catalog/view/theme",
        ],
    ),
    ("VTEX", &["vtex", ".vteximg.com", "vtexcommercestable"]),
    ("BigCommerce", &["bigcommerce"]),
    ("Wix", &["wix.com", "wixsite.com", "_wix_"]),
    ("Squarespace", &["squarespace"]),
];

/// URL substrings suggesting a shop page.
const ECOMMERCE_KEYWORDS: &[&str] = &[
    "cart", "checkout", "buy", "shop", "store", "product", "catalog", "price", "order", "basket",
    "purchase", "payment",
];

/// Placeholder domains that are never real shops.
const BAD_DOMAIN_PATTERNS: &[&str] = &["example.", "test.", "localhost"];

/// Country associated with a TLD, or `Unknown`.
pub fn country_for_tld(tld: &str) -> &'static str {
    TLD_COUNTRIES
        .iter()
        .find(|(t, _)| *t == tld)
        .map(|(_, country)| *country)
        .unwrap_or("Unknown")
}

/// First platform whose URL pattern occurs in `url`.
pub fn cms_hint(url: &str) -> Option<&'static str> {
    let url = url.to_lowercase();
    CMS_URL_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| url.contains(p)))
        .map(|(cms, _)| *cms)
}

/// Checks whether a URL contains a shop keyword (`cart`, `checkout`, ...).
pub fn is_ecommerce_url(url: &str) -> bool {
    let url = url.to_lowercase();
    ECOMMERCE_KEYWORDS.iter().any(|k| url.contains(k))
}

/// Checks for placeholder domains such as `example.*` or `localhost`.
pub fn is_placeholder_domain(domain: &str) -> bool {
    BAD_DOMAIN_PATTERNS.iter().any(|p| domain.contains(p))
}

/// Checks whether `name` is a platform known to `cms_hint`.
pub fn is_known_cms(name: &str) -> bool {
    CMS_URL_PATTERNS
        .iter()
        .any(|(cms, _)| cms.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_for_tld() {
        assert_eq!(country_for_tld("ch"), "Switzerland");
        assert_eq!(country_for_tld("co.uk"), "United Kingdom");
        assert_eq!(country_for_tld("zz"), "Unknown");
    }

    #[test]
    fn test_cms_hint_from_url() {
        assert_eq!(
            cms_hint("https://shop.ch/index.php?id_product=12&controller=product"),
            Some("PrestaShop")
        );
        assert_eq!(
            cms_hint("https://store.de/wp-content/plugins/woocommerce/x.js"),
            Some("WooCommerce")
        );
        assert_eq!(cms_hint("https://a.myshopify.com/"), Some("Shopify"));
        assert_eq!(cms_hint("https://plain.ch/about"), None);
    }

    #[test]
    fn test_cms_hint_is_case_insensitive() {
        assert_eq!(cms_hint("https://X.CH/Skin/Frontend/default"), Some("Magento"));
    }

    #[test]
    fn test_is_ecommerce_url() {
        assert!(is_ecommerce_url("https://x.ch/Checkout"));
        assert!(is_ecommerce_url("https://x.ch/products/1"));
        assert!(!is_ecommerce_url("https://x.ch/about-us"));
    }

    #[test]
    fn test_is_placeholder_domain() {
        assert!(is_placeholder_domain("example.ch"));
        assert!(is_placeholder_domain("my.test.de"));
        assert!(!is_placeholder_domain("contest-shop.de"));
    }

    #[test]
    fn test_is_known_cms() {
        assert!(is_known_cms("shopify"));
        assert!(is_known_cms("PrestaShop"));
        assert!(!is_known_cms("Drupal"));
    }
}
