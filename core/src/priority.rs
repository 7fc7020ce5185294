use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::analysis::clamp_score;
use crate::config::PriorityWeights;
use crate::duplicates::DuplicateTier;

pub const HIGH_PRIORITY: f64 = 70.0;
pub const MEDIUM_PRIORITY: f64 = 40.0;

/// Each risk factor adds this much risk pressure, up to 100.
const RISK_FACTOR_STEP: f64 = 20.0;
/// A listing waiting this long counts as fully stale.
const STALE_AFTER_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

/// Review-queue signals, each on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrioritySignals {
    pub confidence_gap: f64,
    pub risk_factors: f64,
    pub duplicate_pressure: f64,
    pub staleness: f64,
}

impl PrioritySignals {
    pub fn derive(
        confidence: u8,
        threshold: f64,
        risk_factor_count: usize,
        highest_duplicate_tier: Option<DuplicateTier>,
        listed_days: i64,
    ) -> Self {
        let confidence_gap = if threshold > 0.0 {
            clamp_score((threshold - f64::from(confidence)) / threshold * 100.0)
        } else {
            0.0
        };
        let duplicate_pressure = match highest_duplicate_tier {
            Some(DuplicateTier::Merge) => 100.0,
            Some(DuplicateTier::MarkDuplicate) => 70.0,
            Some(DuplicateTier::Investigate) => 30.0,
            None => 0.0,
        };
        Self {
            confidence_gap,
            risk_factors: clamp_score(risk_factor_count as f64 * RISK_FACTOR_STEP),
            duplicate_pressure,
            staleness: clamp_score(listed_days as f64 / STALE_AFTER_DAYS * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewPriority {
    pub score: f64,
    pub tier: PriorityTier,
    pub signals: PrioritySignals,
}

pub fn review_priority(signals: PrioritySignals, weights: &PriorityWeights) -> ReviewPriority {
    let weighted = weights.confidence_gap * signals.confidence_gap
        + weights.risk_factors * signals.risk_factors
        + weights.duplicate_pressure * signals.duplicate_pressure
        + weights.staleness * signals.staleness;
    let score = clamp_score(weighted / 100.0);
    let tier = if score >= HIGH_PRIORITY {
        PriorityTier::High
    } else if score >= MEDIUM_PRIORITY {
        PriorityTier::Medium
    } else {
        PriorityTier::Low
    };
    ReviewPriority {
        score,
        tier,
        signals,
    }
}
