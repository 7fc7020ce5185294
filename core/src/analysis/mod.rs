//! Field analyzers. Each one is a pure function over a [`BusinessRecord`]
//! snapshot that produces a 0–100 score plus structured findings.
//!
//! Scores are never accumulated in place: an analyzer collects independent
//! [`Contribution`]s and the final score is `clamp(base + Σ delta, 0, 100)`,
//! so the order in which checks run cannot change the result.
//!
//! [`BusinessRecord`]: crate::business::BusinessRecord

pub mod completeness;
pub mod legitimacy;
pub mod moderation;
pub mod quality;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use completeness::{CompletenessAnalysis, analyze_completeness};
pub use legitimacy::{LegitimacyAnalysis, analyze_legitimacy};
pub use moderation::{ModerationAnalysis, analyze_content};
pub use quality::{QualityAnalysis, analyze_quality};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Promotional phrasing that marks a bio as spam-like.
pub(crate) const SPAM_PHRASES: &[&str] = &[
    "buy now",
    "click here",
    "limited time",
    "act now",
    "100% free",
    "guaranteed",
    "best price",
    "call now",
    "free money",
    "no obligation",
    "risk free",
    "cheapest",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A signed score adjustment with the reason it applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Contribution {
    pub reason: String,
    pub delta: f64,
}

impl Contribution {
    pub fn new(reason: impl Into<String>, delta: f64) -> Self {
        Self {
            reason: reason.into(),
            delta,
        }
    }
}

/// Sum independent contributions onto a base score and clamp to [0, 100].
pub fn settle_score(base: f64, contributions: &[Contribution]) -> f64 {
    let total: f64 = contributions.iter().map(|c| c.delta).sum();
    clamp_score(base + total)
}

pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_SCORE;
    }
    value.clamp(MIN_SCORE, MAX_SCORE)
}

/// Case-insensitive phrase hits in `text`, in list order.
pub(crate) fn phrase_hits<'a>(text: &str, phrases: &[&'a str]) -> Vec<&'a str> {
    let lowered = text.to_lowercase();
    phrases
        .iter()
        .copied()
        .filter(|phrase| lowered.contains(phrase))
        .collect()
}
