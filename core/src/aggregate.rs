//! Weighted confidence over the analyzer scores and the duplicate term.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::analysis::clamp_score;
use crate::config::ConfidenceWeights;
use crate::duplicates::DuplicateTier;
use crate::error::TrustError;

pub const MERGE_DUPLICATE_PENALTY: f64 = 30.0;
pub const MARK_DUPLICATE_PENALTY: f64 = 15.0;
pub const INVESTIGATE_DUPLICATE_PENALTY: f64 = 5.0;

/// Penalty for the most severe duplicate tier found.
pub fn duplicate_penalty(highest: Option<DuplicateTier>) -> f64 {
    match highest {
        Some(DuplicateTier::Merge) => MERGE_DUPLICATE_PENALTY,
        Some(DuplicateTier::MarkDuplicate) => MARK_DUPLICATE_PENALTY,
        Some(DuplicateTier::Investigate) => INVESTIGATE_DUPLICATE_PENALTY,
        None => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceComponent {
    Completeness,
    DataQuality,
    Legitimacy,
    ContentModeration,
    Duplicates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceTerm {
    pub component: ConfidenceComponent,
    pub score: f64,
    /// Share of the total after excluded terms are dropped (0..1)
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceBreakdown {
    pub overall: u8,
    pub terms: Vec<ConfidenceTerm>,
    /// `None` when duplicate analysis was not run
    pub duplicate_penalty: Option<f64>,
}

/// Scores feeding the aggregator. `None` excludes a term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    pub completeness: f64,
    pub data_quality: f64,
    pub legitimacy: f64,
    pub content_moderation: Option<f64>,
    /// Highest tier found, or `None` inside the outer option when nothing matched
    pub duplicates: Option<Option<DuplicateTier>>,
}

pub fn aggregate(
    inputs: &ConfidenceInputs,
    weights: &ConfidenceWeights,
) -> Result<ConfidenceBreakdown, TrustError> {
    let penalty = inputs.duplicates.map(duplicate_penalty);
    let candidates = [
        (ConfidenceComponent::Completeness, Some(inputs.completeness), weights.completeness),
        (ConfidenceComponent::DataQuality, Some(inputs.data_quality), weights.data_quality),
        (ConfidenceComponent::Legitimacy, Some(inputs.legitimacy), weights.legitimacy),
        (
            ConfidenceComponent::ContentModeration,
            inputs.content_moderation,
            weights.content_moderation,
        ),
        (
            ConfidenceComponent::Duplicates,
            penalty.map(|p| 100.0 - p),
            weights.duplicates,
        ),
    ];

    let included_weight: f64 = candidates
        .iter()
        .filter(|(_, score, _)| score.is_some())
        .map(|(_, _, weight)| weight)
        .sum();
    if !(included_weight.is_finite() && included_weight > 0.0) {
        return Err(TrustError::Computation {
            stage: "confidence aggregation".to_string(),
            message: format!("included weights sum to {included_weight}"),
        });
    }

    let terms: Vec<ConfidenceTerm> = candidates
        .into_iter()
        .filter_map(|(component, score, weight)| {
            score.map(|score| {
                let weight = weight / included_weight;
                ConfidenceTerm {
                    component,
                    score,
                    weight,
                    contribution: weight * score,
                }
            })
        })
        .collect();

    let total: f64 = terms.iter().map(|t| t.contribution).sum();
    Ok(ConfidenceBreakdown {
        overall: clamp_score(total).round() as u8,
        terms,
        duplicate_penalty: penalty,
    })
}
