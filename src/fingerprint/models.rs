//! Signature and verdict types.

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Kind of a signature rule.
///
/// Rules are evaluated kind by kind in declaration order of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// `name` or `name:value-substring`; a trailing `*` on the name is a prefix match
    HeaderMatch,
    /// Cookie name, `*` wildcard allowed; `a&&b` requires every name
    CookieName,
    /// Body substring; `a&&b` requires every substring. Weights accumulate.
    BodyPattern,
    /// Substring of `<meta name="generator">` content
    MetaGenerator,
}

impl RuleKind {
    /// Kind name used in rule ids and signature files.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::HeaderMatch => "header",
            RuleKind::CookieName => "cookie",
            RuleKind::BodyPattern => "body",
            RuleKind::MetaGenerator => "meta",
        }
    }

    /// Header, cookie and meta rules decide a verdict on their own.
    pub fn is_unambiguous(&self) -> bool {
        !matches!(self, RuleKind::BodyPattern)
    }
}

/// A platform fingerprint rule as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsSignature {
    /// Platform the rule points at
    pub platform: String,
    /// Where the pattern is matched
    pub kind: RuleKind,
    /// Pattern in the syntax of `kind`
    pub pattern: String,
    /// Only used by body rules
    #[serde(default)]
    pub weight: u32,
}

impl CmsSignature {
    /// Creates a signature.
    pub fn new(platform: &str, kind: RuleKind, pattern: &str, weight: u32) -> Self {
        CmsSignature {
            platform: platform.to_string(),
            kind,
            pattern: pattern.to_string(),
            weight,
        }
    }

    /// Stable rule identifier: `<platform-slug>:<kind>:<pattern>`.
    pub fn rule_id(&self) -> String {
        format!("{}:{}:{}", slug(&self.platform), self.kind.as_str(), self.pattern)
    }
}

pub(crate) fn slug(platform: &str) -> String {
    platform
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// How a header rule matches the header name.
#[derive(Debug, Clone)]
pub(crate) enum HeaderName {
    Exact(String),
    Prefix(String),
}

/// A compiled pattern.
#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Header {
        name: HeaderName,
        value: Option<String>,
    },
    Cookie {
        names: Vec<Regex>,
    },
    Body {
        needles: Vec<String>,
    },
    Meta {
        needle: String,
    },
}

/// A rule ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// `<platform-slug>:<kind>:<pattern>`
    pub id: String,
    /// Platform name
    pub platform: String,
    /// Position of the platform in the registry (lower is more prevalent)
    pub platform_rank: usize,
    /// Rule kind
    pub kind: RuleKind,
    /// Weight added to the platform's body score
    pub weight: u32,
    pub(crate) matcher: Matcher,
}

/// Outcome of classifying one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Platform name
    pub platform: String,
    /// 0-100
    pub confidence: u8,
    /// Identifier of the deciding rule
    pub rule_id: String,
    /// Kind of the deciding rule
    pub kind: RuleKind,
}
