//! Body-based platform scoring.
//!
//! Unlike header, cookie and meta rules, body patterns are weak evidence on
//! their own: every matching rule adds its weight to its platform's score,
//! and only a score that reaches the classifier's threshold yields a verdict.

use std::collections::HashMap;

use crate::fingerprint::models::{CompiledRule, Matcher, RuleKind};
use crate::fingerprint::registry::SignatureRegistry;

/// Accumulated body evidence for one platform.
#[derive(Debug, Clone)]
pub struct BodyScore<'r> {
    /// Platform name
    pub platform: &'r str,
    /// Registry position, used to break ties
    pub platform_rank: usize,
    /// Sum of matching rule weights
    pub score: u32,
    /// Highest-weight matching rule, first declared on ties
    pub best_rule: &'r CompiledRule,
}

/// Scores every platform with at least one matching body rule.
///
/// `body` must already be lower-cased. Scores are returned best first:
/// highest score, then lowest platform rank.
pub fn score_body<'r>(registry: &'r SignatureRegistry, body: &str) -> Vec<BodyScore<'r>> {
    if body.is_empty() {
        return Vec::new();
    }

    let mut scores: HashMap<usize, BodyScore<'r>> = HashMap::new();
    for rule in registry.rules(RuleKind::BodyPattern) {
        let Matcher::Body { needles } = &rule.matcher else {
            continue;
        };
        if needles.is_empty() || !needles.iter().all(|needle| body.contains(needle.as_str())) {
            continue;
        }
        scores
            .entry(rule.platform_rank)
            .and_modify(|entry| {
                entry.score = entry.score.saturating_add(rule.weight);
                if rule.weight > entry.best_rule.weight {
                    entry.best_rule = rule;
                }
            })
            .or_insert(BodyScore {
                platform: &rule.platform,
                platform_rank: rule.platform_rank,
                score: rule.weight,
                best_rule: rule,
            });
    }

    let mut ranked: Vec<BodyScore<'r>> = scores.into_values().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.platform_rank.cmp(&b.platform_rank)));
    ranked
}
