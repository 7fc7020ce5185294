//! Ordered decision rules: hard reject, manual review, approve, then default.
//!
//! The first rule with a matching condition decides. Conditions on an
//! analyzer that did not run are skipped rather than treated as passing or
//! failing.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Configuration;
use crate::duplicates::DuplicateTier;

pub const HARD_REJECT_LEGITIMACY: f64 = 40.0;
pub const HARD_REJECT_MODERATION: f64 = 40.0;
pub const REVIEW_COMPLETENESS: f64 = 60.0;
pub const REVIEW_DATA_QUALITY: f64 = 60.0;
pub const APPROVE_COMPLETENESS: f64 = 75.0;
pub const APPROVE_DATA_QUALITY: f64 = 75.0;
pub const APPROVE_LEGITIMACY: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    ManualReview,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
            Decision::ManualReview => "manual_review",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(Decision::Approve),
            "reject" => Some(Decision::Reject),
            "manual_review" => Some(Decision::ManualReview),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    HardReject,
    ManualReview,
    Approve,
    Default,
}

/// Everything the classifier looks at. Nothing else influences the decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    pub completeness: f64,
    pub data_quality: f64,
    pub legitimacy: f64,
    pub content_moderation: Option<f64>,
    pub highest_duplicate_tier: Option<DuplicateTier>,
    pub high_severity_legitimacy_flag: bool,
    /// A placeholder or too-short name, for example
    pub high_severity_quality_issue: bool,
    pub confidence: u8,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classification {
    pub decision: Decision,
    pub rule: DecisionRule,
    /// Every condition of the firing rule that held
    pub reasons: Vec<String>,
}

pub fn classify(input: &ClassifierInput) -> Classification {
    let hard_reject = hard_reject_reasons(input);
    if !hard_reject.is_empty() {
        return Classification {
            decision: Decision::Reject,
            rule: DecisionRule::HardReject,
            reasons: hard_reject,
        };
    }

    let review = manual_review_reasons(input);
    if !review.is_empty() {
        return Classification {
            decision: Decision::ManualReview,
            rule: DecisionRule::ManualReview,
            reasons: review,
        };
    }

    if f64::from(input.confidence) >= input.threshold
        && input.completeness >= APPROVE_COMPLETENESS
        && input.data_quality >= APPROVE_DATA_QUALITY
        && input.legitimacy >= APPROVE_LEGITIMACY
    {
        return Classification {
            decision: Decision::Approve,
            rule: DecisionRule::Approve,
            reasons: vec![format!(
                "Confidence {} meets the threshold of {} and every analyzer is within approval bounds",
                input.confidence, input.threshold
            )],
        };
    }

    Classification {
        decision: Decision::ManualReview,
        rule: DecisionRule::Default,
        reasons: vec![
            "Scores are acceptable but not strong enough for approval; a reviewer should decide"
                .to_string(),
        ],
    }
}

fn hard_reject_reasons(input: &ClassifierInput) -> Vec<String> {
    let mut reasons = Vec::new();
    if input.legitimacy < HARD_REJECT_LEGITIMACY {
        reasons.push(format!(
            "Legitimacy score {:.0} is below {HARD_REJECT_LEGITIMACY}",
            input.legitimacy
        ));
    }
    if let Some(moderation) = input.content_moderation
        && moderation < HARD_REJECT_MODERATION
    {
        reasons.push(format!(
            "Content moderation score {moderation:.0} is below {HARD_REJECT_MODERATION}"
        ));
    }
    if input.highest_duplicate_tier == Some(DuplicateTier::Merge) {
        reasons.push("A merge-tier duplicate listing already exists".to_string());
    }
    reasons
}

fn manual_review_reasons(input: &ClassifierInput) -> Vec<String> {
    let mut reasons = Vec::new();
    if f64::from(input.confidence) < input.threshold {
        reasons.push(format!(
            "Confidence {} is below the review threshold of {}",
            input.confidence, input.threshold
        ));
    }
    if input.completeness < REVIEW_COMPLETENESS {
        reasons.push(format!(
            "Completeness score {:.0} is below {REVIEW_COMPLETENESS}",
            input.completeness
        ));
    }
    if input.data_quality < REVIEW_DATA_QUALITY {
        reasons.push(format!(
            "Data quality score {:.0} is below {REVIEW_DATA_QUALITY}",
            input.data_quality
        ));
    }
    if input.highest_duplicate_tier == Some(DuplicateTier::MarkDuplicate) {
        reasons.push("A likely duplicate listing was found".to_string());
    }
    if input.high_severity_legitimacy_flag {
        reasons.push("A high-severity legitimacy flag was raised".to_string());
    }
    if input.high_severity_quality_issue {
        reasons.push("A high-severity data quality issue was found".to_string());
    }
    reasons
}

/// Whether a decision may be applied without a reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AutomationEligibility {
    pub eligible: bool,
    pub reason: String,
}

pub fn automation_eligibility(
    decision: Decision,
    confidence: u8,
    config: &Configuration,
) -> AutomationEligibility {
    let confidence = f64::from(confidence);
    let thresholds = &config.confidence_thresholds;
    let (eligible, reason) = match decision {
        Decision::Approve if !config.system.auto_approve_enabled => {
            (false, "Auto-approval is disabled".to_string())
        }
        Decision::Approve if confidence >= thresholds.auto_approve => (
            true,
            format!(
                "Confidence {confidence} meets the auto-approve threshold of {}",
                thresholds.auto_approve
            ),
        ),
        Decision::Approve => (
            false,
            format!(
                "Confidence {confidence} is below the auto-approve threshold of {}",
                thresholds.auto_approve
            ),
        ),
        Decision::Reject if !config.system.auto_reject_enabled => {
            (false, "Auto-rejection is disabled".to_string())
        }
        Decision::Reject if confidence < thresholds.auto_reject => (
            true,
            format!(
                "Confidence {confidence} is below the auto-reject threshold of {}",
                thresholds.auto_reject
            ),
        ),
        Decision::Reject => (
            false,
            format!(
                "Confidence {confidence} is not below the auto-reject threshold of {}",
                thresholds.auto_reject
            ),
        ),
        Decision::ManualReview => (false, "Manual review always needs a reviewer".to_string()),
    };
    AutomationEligibility { eligible, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong() -> ClassifierInput {
        ClassifierInput {
            completeness: 100.0,
            data_quality: 100.0,
            legitimacy: 100.0,
            content_moderation: Some(100.0),
            highest_duplicate_tier: None,
            high_severity_legitimacy_flag: false,
            high_severity_quality_issue: false,
            confidence: 100,
            threshold: 75.0,
        }
    }

    #[test]
    fn strong_input_is_approved() {
        let classification = classify(&strong());
        assert_eq!(classification.decision, Decision::Approve);
        assert_eq!(classification.rule, DecisionRule::Approve);
    }

    #[test]
    fn low_legitimacy_rejects_regardless_of_confidence() {
        let input = ClassifierInput {
            legitimacy: 39.0,
            ..strong()
        };
        let classification = classify(&input);
        assert_eq!(classification.decision, Decision::Reject);
        assert_eq!(classification.rule, DecisionRule::HardReject);
    }

    #[test]
    fn hard_reject_wins_over_review_conditions() {
        let input = ClassifierInput {
            content_moderation: Some(20.0),
            data_quality: 10.0,
            confidence: 30,
            ..strong()
        };
        let classification = classify(&input);
        assert_eq!(classification.rule, DecisionRule::HardReject);
        assert_eq!(classification.reasons.len(), 1);
    }

    #[test]
    fn merge_tier_rejects_and_mark_duplicate_reviews() {
        let merge = ClassifierInput {
            highest_duplicate_tier: Some(DuplicateTier::Merge),
            ..strong()
        };
        assert_eq!(classify(&merge).decision, Decision::Reject);

        let mark = ClassifierInput {
            highest_duplicate_tier: Some(DuplicateTier::MarkDuplicate),
            ..strong()
        };
        assert_eq!(classify(&mark).decision, Decision::ManualReview);

        let investigate = ClassifierInput {
            highest_duplicate_tier: Some(DuplicateTier::Investigate),
            ..strong()
        };
        assert_eq!(classify(&investigate).decision, Decision::Approve);
    }

    #[test]
    fn high_severity_quality_issue_blocks_approval() {
        let input = ClassifierInput {
            high_severity_quality_issue: true,
            ..strong()
        };
        let classification = classify(&input);
        assert_eq!(classification.decision, Decision::ManualReview);
        assert_eq!(classification.rule, DecisionRule::ManualReview);
        assert_eq!(
            classification.reasons,
            vec!["A high-severity data quality issue was found".to_string()]
        );
    }

    #[test]
    fn skipped_moderation_cannot_reject() {
        let input = ClassifierInput {
            content_moderation: None,
            ..strong()
        };
        assert_eq!(classify(&input).decision, Decision::Approve);
    }

    #[test]
    fn confidence_equal_to_threshold_is_not_below_it() {
        let input = ClassifierInput {
            confidence: 75,
            ..strong()
        };
        assert_eq!(classify(&input).decision, Decision::Approve);
    }

    #[test]
    fn middling_scores_fall_through_to_default() {
        let input = ClassifierInput {
            data_quality: 70.0,
            ..strong()
        };
        let classification = classify(&input);
        assert_eq!(classification.decision, Decision::ManualReview);
        assert_eq!(classification.rule, DecisionRule::Default);
    }

    #[test]
    fn automation_needs_toggle_and_threshold() {
        let mut config = Configuration::default();
        assert!(!automation_eligibility(Decision::Approve, 95, &config).eligible);

        config.system.auto_approve_enabled = true;
        assert!(automation_eligibility(Decision::Approve, 85, &config).eligible);
        assert!(!automation_eligibility(Decision::Approve, 84, &config).eligible);

        config.system.auto_reject_enabled = true;
        assert!(automation_eligibility(Decision::Reject, 39, &config).eligible);
        assert!(!automation_eligibility(Decision::Reject, 40, &config).eligible);
        assert!(!automation_eligibility(Decision::ManualReview, 10, &config).eligible);
    }
}
