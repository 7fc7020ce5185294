//! Human-readable explanation and action lists derived from computed results.
//! Nothing here scores; every entry is read off an analyzer output.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::analysis::legitimacy::{
    LegitimacyFlagKind, LocationVerification, TaxIdVerification, WebsiteVerification,
};
use crate::analysis::{
    CompletenessAnalysis, LegitimacyAnalysis, ModerationAnalysis, QualityAnalysis, Severity,
};
use crate::decision::{Classification, Decision};
use crate::duplicates::{DuplicateReport, DuplicateTier};

/// Score at or above which an analyzer counts as clean.
const CLEAN_SCORE: f64 = 90.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rationale {
    pub primary_reasons: Vec<String>,
    pub supporting_factors: Vec<String>,
    pub risk_factors: Vec<String>,
    pub mitigating_factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecommendedActions {
    pub immediate: Vec<String>,
    pub before_approval: Vec<String>,
    pub post_approval: Vec<String>,
    pub monitoring: Vec<String>,
}

pub struct RationaleInput<'a> {
    pub completeness: &'a CompletenessAnalysis,
    pub data_quality: &'a QualityAnalysis,
    pub legitimacy: &'a LegitimacyAnalysis,
    pub content_moderation: Option<&'a ModerationAnalysis>,
    pub duplicates: Option<&'a DuplicateReport>,
    pub classification: &'a Classification,
    pub confidence: u8,
    pub auto_approve_threshold: f64,
}

pub fn build_rationale(input: &RationaleInput<'_>) -> Rationale {
    let mut supporting = Vec::new();
    if input.completeness.score >= CLEAN_SCORE {
        supporting.push(format!(
            "Listing is {:.0}% complete",
            input.completeness.score
        ));
    }
    if input.data_quality.issues.is_empty() {
        supporting.push("No data quality issues found".to_string());
    }
    if input.legitimacy.score >= CLEAN_SCORE && input.legitimacy.flags.is_empty() {
        supporting.push("No legitimacy concerns raised".to_string());
    }
    if let Some(moderation) = input.content_moderation
        && moderation.flags.is_empty()
    {
        supporting.push("Content passed moderation".to_string());
    }
    if input.duplicates.is_some_and(|report| report.total_candidates == 0) {
        supporting.push("No duplicate listings found".to_string());
    }

    let mut risks: Vec<String> = input
        .completeness
        .missing_required
        .iter()
        .map(|field| format!("Missing required field: {}", field.as_str()))
        .collect();
    risks.extend(
        input
            .data_quality
            .issues
            .iter()
            .filter(|issue| issue.severity == Severity::High)
            .map(|issue| issue.description.clone()),
    );
    risks.extend(input.legitimacy.flags.iter().map(|flag| flag.description.clone()));
    if let Some(moderation) = input.content_moderation {
        risks.extend(moderation.flags.iter().cloned());
    }
    if let Some(report) = input.duplicates.filter(|r| r.total_candidates > 0) {
        risks.push(format!(
            "{} potential duplicate(s) found ({} merge, {} mark duplicate, {} investigate)",
            report.total_candidates,
            report.merge_count,
            report.mark_duplicate_count,
            report.investigate_count
        ));
    }

    let mut mitigating = Vec::new();
    let factors = &input.legitimacy.factors;
    if factors.tax_id == TaxIdVerification::Verified {
        mitigating.push("ABN verified against the business register".to_string());
    }
    if factors.website == WebsiteVerification::Verified {
        mitigating.push("Website matches the business name".to_string());
    }
    if input.completeness.score >= CLEAN_SCORE {
        mitigating.push("High profile completeness".to_string());
    }

    Rationale {
        primary_reasons: input.classification.reasons.clone(),
        supporting_factors: supporting,
        risk_factors: risks,
        mitigating_factors: mitigating,
    }
}

pub fn recommend_actions(input: &RationaleInput<'_>) -> RecommendedActions {
    let mut actions = RecommendedActions::default();
    let decision = input.classification.decision;
    let highest_tier = input.duplicates.and_then(DuplicateReport::highest_tier);

    match decision {
        Decision::Reject => actions
            .immediate
            .push("Notify the owner of the rejection and its reasons".to_string()),
        Decision::ManualReview => actions
            .immediate
            .push("Assign the listing to a reviewer".to_string()),
        Decision::Approve => {}
    }
    if highest_tier == Some(DuplicateTier::Merge) {
        actions
            .immediate
            .push("Merge this listing into the existing duplicate".to_string());
    }
    if input.content_moderation.is_some_and(|m| m.profanity_detected) {
        actions
            .immediate
            .push("Remove offensive language from the description".to_string());
    }

    for field in &input.completeness.missing_required {
        actions
            .before_approval
            .push(format!("Collect the missing {}", field.as_str()));
    }
    for issue in &input.data_quality.issues {
        if issue.severity >= Severity::Medium {
            actions.before_approval.push(issue.suggestion.clone());
        }
    }
    match input.legitimacy.factors.tax_id {
        TaxIdVerification::Missing | TaxIdVerification::Invalid => actions
            .before_approval
            .push("Obtain a valid ABN".to_string()),
        TaxIdVerification::FormatValid => actions
            .before_approval
            .push("Confirm the ABN against the business register".to_string()),
        TaxIdVerification::Verified => {}
    }
    if input.legitimacy.factors.website == WebsiteVerification::Mismatch {
        actions
            .before_approval
            .push("Confirm the website belongs to this business".to_string());
    }
    if let Some(report) = input.duplicates {
        for candidate in report
            .candidates
            .iter()
            .filter(|c| c.tier == DuplicateTier::MarkDuplicate)
        {
            actions.before_approval.push(format!(
                "Confirm this is not a duplicate of \"{}\" ({})",
                candidate.name, candidate.candidate_id
            ));
        }
    }

    for field in &input.completeness.missing_optional {
        actions
            .post_approval
            .push(format!("Encourage the owner to add {}", field.as_str()));
    }
    if input
        .legitimacy
        .flags
        .iter()
        .any(|f| f.kind == LegitimacyFlagKind::DuplicateListingRisk)
    {
        actions
            .post_approval
            .push("Invite the owner to claim and verify the listing".to_string());
    }
    if input.legitimacy.factors.location == LocationVerification::AddressOnly {
        actions
            .post_approval
            .push("Geocode the street address".to_string());
    }

    if input.content_moderation.is_some_and(|m| m.spam_indicators > 0) {
        actions
            .monitoring
            .push("Watch public content for further spam".to_string());
    }
    if input
        .legitimacy
        .flags
        .iter()
        .any(|f| f.kind == LegitimacyFlagKind::NoRecentInteraction)
    {
        actions
            .monitoring
            .push("Re-check the listing if it stays inactive".to_string());
    }
    if let Some(report) = input.duplicates.filter(|r| r.investigate_count > 0) {
        actions.monitoring.push(format!(
            "Keep an eye on {} low-confidence duplicate match(es)",
            report.investigate_count
        ));
    }
    if decision == Decision::Approve && f64::from(input.confidence) < input.auto_approve_threshold
    {
        actions
            .monitoring
            .push("Spot-check this approval; confidence is below the auto-approve threshold".to_string());
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_completeness, analyze_content, analyze_legitimacy, analyze_quality};
    use crate::business::fixtures::{complete_record, now};
    use crate::decision::DecisionRule;

    fn approved() -> Classification {
        Classification {
            decision: Decision::Approve,
            rule: DecisionRule::Approve,
            reasons: vec!["strong".to_string()],
        }
    }

    #[test]
    fn clean_record_has_only_supporting_and_mitigating_factors() {
        let record = complete_record();
        let completeness = analyze_completeness(&record);
        let quality = analyze_quality(&record);
        let legitimacy = analyze_legitimacy(&record, now());
        let moderation = analyze_content(&record);
        let report = DuplicateReport::default();
        let classification = approved();
        let input = RationaleInput {
            completeness: &completeness,
            data_quality: &quality,
            legitimacy: &legitimacy,
            content_moderation: Some(&moderation),
            duplicates: Some(&report),
            classification: &classification,
            confidence: 100,
            auto_approve_threshold: 85.0,
        };

        let rationale = build_rationale(&input);
        assert_eq!(rationale.primary_reasons, vec!["strong"]);
        assert_eq!(rationale.supporting_factors.len(), 5);
        assert!(rationale.risk_factors.is_empty());
        assert_eq!(rationale.mitigating_factors.len(), 3);

        let actions = recommend_actions(&input);
        assert!(actions.immediate.is_empty());
        assert!(actions.before_approval.is_empty());
        assert!(actions.monitoring.is_empty());
    }

    #[test]
    fn missing_fields_drive_risks_and_before_approval_actions() {
        let mut record = complete_record();
        record.phone = None;
        record.abn = None;
        record.abn_verified = false;
        let completeness = analyze_completeness(&record);
        let quality = analyze_quality(&record);
        let legitimacy = analyze_legitimacy(&record, now());
        let classification = Classification {
            decision: Decision::ManualReview,
            rule: DecisionRule::ManualReview,
            reasons: vec!["low".to_string()],
        };
        let input = RationaleInput {
            completeness: &completeness,
            data_quality: &quality,
            legitimacy: &legitimacy,
            content_moderation: None,
            duplicates: None,
            classification: &classification,
            confidence: 70,
            auto_approve_threshold: 85.0,
        };

        let rationale = build_rationale(&input);
        assert!(rationale
            .risk_factors
            .contains(&"Missing required field: phone".to_string()));

        let actions = recommend_actions(&input);
        assert_eq!(actions.immediate, vec!["Assign the listing to a reviewer"]);
        assert!(actions.before_approval.contains(&"Collect the missing phone".to_string()));
        assert!(actions.before_approval.contains(&"Obtain a valid ABN".to_string()));
        assert!(actions.post_approval.contains(&"Encourage the owner to add abn".to_string()));
    }
}
