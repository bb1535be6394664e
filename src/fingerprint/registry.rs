//! Signature registry.
//!
//! The built-in table is ordered by expected prevalence, most common
//! platforms first. Declaration order decides both which unambiguous rule
//! wins and how body-score ties are broken.

use std::path::Path;

use log::info;
use regex::Regex;

use super::detection::normalize_generator;
use super::models::{CmsSignature, CompiledRule, HeaderName, Matcher, RuleKind};
use crate::error_handling::SignatureError;

use super::models::RuleKind::{BodyPattern as B, CookieName as C, HeaderMatch as H, MetaGenerator as M};

/// Weight of a body pattern specific to one platform.
const STRONG: u32 = 60;
/// Weight of a body pattern that can occur on unrelated sites.
const GENERIC: u32 = 40;

#[rustfmt::skip]
const BUILTIN: &[(&str, RuleKind, &str, u32)] = &[
    ("Shopify", H, "x-shopify-stage", 0),
    ("Shopify", H, "x-shopid", 0),
    ("Shopify", H, "server:shopify", 0),
    ("Shopify", C, "_shopify_*", 0),
    ("Shopify", C, "shopify_pay*", 0),
    ("Shopify", B, "cdn.shopify.com", STRONG),
    ("Shopify", B, "myshopify.com", STRONG),
    ("Shopify", B, "shopify", GENERIC),
    ("Shopify", M, "shopify", 0),

    ("WooCommerce", C, "woocommerce_*", 0),
    ("WooCommerce", C, "wp_woocommerce_*", 0),
    ("WooCommerce", B, "/wp-content/plugins/woocommerce/", STRONG),
    ("WooCommerce", B, "wc-block", STRONG),
    ("WooCommerce", B, "woocommerce", GENERIC),
    ("WooCommerce", M, "woocommerce", 0),

    ("Magento", H, "x-magento-*", 0),
    ("Magento", C, "mage-*", 0),
    ("Magento", C, "form_key", 0),
    ("Magento", B, "/static/frontend/", STRONG),
    ("Magento", B, "/skin/frontend/", STRONG),
    ("Magento", B, "mage.cookies", STRONG),
    ("Magento", B, "magento", GENERIC),
    ("Magento", M, "magento", 0),

    ("BigCommerce", H, "x-bc-*", 0),
    ("BigCommerce", B, "cdn.bigcommerce.com", STRONG),
    ("BigCommerce", B, "bigcommerce", GENERIC),

    ("PrestaShop", C, "prestashop*", 0),
    ("PrestaShop", B, "/modules/ps_", STRONG),
    ("PrestaShop", B, "prestashop-ui-kit", STRONG),
    ("PrestaShop", B, "ps_shoppingcart", STRONG),
    ("PrestaShop", B, "ps_customersignin", STRONG),
    ("PrestaShop", B, "id_product&&id_product_attribute", STRONG),
    ("PrestaShop", B, "/themes/classic/assets/", GENERIC),
    ("PrestaShop", B, "blockcart", GENERIC),
    ("PrestaShop", B, "prestashop", GENERIC),
    ("PrestaShop", M, "prestashop", 0),

    ("Wix", H, "x-wix-request-id", 0),
    ("Wix", B, "wixsite.com", STRONG),
    ("Wix", B, "_wix_", STRONG),
    ("Wix", B, "wix.com", GENERIC),
    ("Wix", M, "wix.com", 0),

    ("Squarespace", B, "static.squarespace.com", STRONG),
    ("Squarespace", B, "squarespace", GENERIC),
    ("Squarespace", M, "squarespace", 0),

    ("BigCartel", B, "bigcartel", GENERIC),

    ("OpenCart", C, "phpsessid&&currency&&language", 0),
    ("OpenCart", B, "catalog/view/theme", STRONG),
    ("OpenCart", B, "index.php?route=", STRONG),
    ("OpenCart", B, "opencart", GENERIC),
    ("OpenCart", M, "opencart", 0),

    ("3DCart", B, "3dcart", GENERIC),
    ("3DCart", B, "shift4shop", GENERIC),

    ("Volusion", B, "volusion", GENERIC),

    ("Demandware", H, "x-dw-request-base-id", 0),
    ("Demandware", B, "dwvar_", STRONG),
    ("Demandware", B, "dwfrm_", STRONG),
    ("Demandware", B, "demandware", GENERIC),

    ("Sellfy", B, "sellfy", GENERIC),

    ("Ecwid", B, "ecwid", GENERIC),
    ("Ecwid", M, "ecwid", 0),

    ("Weebly", B, "editmysite.com", STRONG),
    ("Weebly", B, "weebly", GENERIC),
    ("Weebly", M, "weebly", 0),

    ("SalesforceCommerce", B, "salesforce&&commerce", GENERIC),

    ("VTEX", B, "vteximg.com", STRONG),
    ("VTEX", B, "vtex", GENERIC),

    ("Shopware", B, "shopware", GENERIC),
    ("Shopware", M, "shopware", 0),

    ("nopCommerce", B, "nopcommerce", GENERIC),

    ("Lightspeed", B, "seoshop", STRONG),
    ("Lightspeed", B, "lightspeed", GENERIC),

    ("Tilda", B, "tildacdn", STRONG),
    ("Tilda", B, "tilda", GENERIC),
    ("Tilda", M, "tilda", 0),

    ("Bitrix", C, "bitrix_*", 0),
    ("Bitrix", B, "1c-bitrix", STRONG),
    ("Bitrix", B, "bitrix", GENERIC),
    ("Bitrix", M, "bitrix", 0),

    ("InSales", B, "insales", GENERIC),

    ("CS-Cart", B, "cs-cart", GENERIC),
    ("CS-Cart", B, "cscart", GENERIC),
];

/// Immutable, compiled signature table.
///
/// Built once at startup and shared across workers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    platforms: Vec<String>,
    rules: Vec<CompiledRule>,
}

impl SignatureRegistry {
    /// The built-in table.
    pub fn builtin() -> Result<Self, SignatureError> {
        Self::from_signatures(
            BUILTIN
                .iter()
                .map(|(platform, kind, pattern, weight)| {
                    CmsSignature::new(platform, *kind, pattern, *weight)
                })
                .collect(),
        )
    }

    /// Loads a JSON array of signatures from `path`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` if the file cannot be read or parsed, is
    /// empty, or contains an invalid pattern.
    pub fn from_json_file(path: &Path) -> Result<Self, SignatureError> {
        let content = std::fs::read_to_string(path).map_err(|source| SignatureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let signatures: Vec<CmsSignature> =
            serde_json::from_str(&content).map_err(|source| SignatureError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let registry = Self::from_signatures(signatures)?;
        info!(
            "Loaded {} signatures for {} platforms from {}",
            registry.len(),
            registry.platforms.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Loads `path` if given, otherwise the built-in table.
    pub fn load(path: Option<&Path>) -> Result<Self, SignatureError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Self::builtin(),
        }
    }

    /// Compiles signatures, keeping their order.
    pub fn from_signatures(signatures: Vec<CmsSignature>) -> Result<Self, SignatureError> {
        if signatures.is_empty() {
            return Err(SignatureError::Empty);
        }

        let mut platforms: Vec<String> = Vec::new();
        let mut rules = Vec::with_capacity(signatures.len());
        for signature in signatures {
            let platform_rank = match platforms.iter().position(|p| *p == signature.platform) {
                Some(rank) => rank,
                None => {
                    platforms.push(signature.platform.clone());
                    platforms.len() - 1
                }
            };
            rules.push(compile(&signature, platform_rank)?);
        }

        Ok(SignatureRegistry { platforms, rules })
    }

    /// Rules of one kind, in declaration order.
    pub fn rules(&self, kind: RuleKind) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }

    /// Platform names in declaration order.
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is compiled.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile(signature: &CmsSignature, platform_rank: usize) -> Result<CompiledRule, SignatureError> {
    let id = signature.rule_id();
    let invalid = |reason: &str| SignatureError::InvalidPattern {
        rule: id.clone(),
        reason: reason.to_string(),
    };

    if signature.platform.trim().is_empty() {
        return Err(invalid("platform name is empty"));
    }
    let pattern = signature.pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return Err(invalid("pattern is empty"));
    }

    let matcher = match signature.kind {
        RuleKind::HeaderMatch => {
            let (name, value) = match pattern.split_once(':') {
                Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
                None => (pattern.as_str(), None),
            };
            if name.is_empty() {
                return Err(invalid("header name is empty"));
            }
            let name = match name.strip_suffix('*') {
                Some(prefix) => HeaderName::Prefix(prefix.to_string()),
                None => HeaderName::Exact(name.to_string()),
            };
            Matcher::Header {
                name,
                value: value.filter(|v| !v.is_empty()),
            }
        }
        RuleKind::CookieName => {
            let names = split_conjunction(&pattern)
                .map(|name| wildcard_regex(name).map_err(|e| invalid(&e.to_string())))
                .collect::<Result<Vec<_>, _>>()?;
            Matcher::Cookie { names }
        }
        RuleKind::BodyPattern => {
            if signature.weight == 0 {
                return Err(invalid("body patterns need a weight above 0"));
            }
            Matcher::Body {
                needles: split_conjunction(&pattern).map(str::to_string).collect(),
            }
        }
        RuleKind::MetaGenerator => Matcher::Meta {
            needle: normalize_generator(&pattern),
        },
    };

    Ok(CompiledRule {
        id,
        platform: signature.platform.clone(),
        platform_rank,
        kind: signature.kind,
        weight: signature.weight,
        matcher,
    })
}

fn split_conjunction(pattern: &str) -> impl Iterator<Item = &str> {
    pattern.split("&&").map(str::trim).filter(|p| !p.is_empty())
}

/// Converts a wildcard cookie name to an anchored regex (`_ga_*` -> `^_ga_.*$`).
fn wildcard_regex(name: &str) -> Result<Regex, regex::Error> {
    let escaped: Vec<String> = name.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", escaped.join(".*")))
}
