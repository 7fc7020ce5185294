//! The verification pipeline: analyzers and duplicate report in, one
//! [`VerificationResult`] out.
//!
//! Every stage reads the same [`ConfigSnapshot`]. A score outside [0, 100]
//! from any stage fails the whole evaluation; there is no partial result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::aggregate::{ConfidenceBreakdown, ConfidenceInputs, aggregate};
use crate::analysis::{
    CompletenessAnalysis, LegitimacyAnalysis, ModerationAnalysis, QualityAnalysis,
    analyze_completeness, analyze_content, analyze_legitimacy, analyze_quality,
};
use crate::business::{BusinessRecord, MAX_CONTENT_ITEMS};
use crate::config::{ConfigSnapshot, ConfigVersion, Configuration};
use crate::decision::{
    AutomationEligibility, ClassifierInput, Decision, DecisionRule, automation_eligibility,
    classify,
};
use crate::duplicates::{CandidateSource, DuplicateReport, find_duplicates};
use crate::error::TrustError;
use crate::priority::{PrioritySignals, ReviewPriority, review_priority};
use crate::rationale::{
    Rationale, RationaleInput, RecommendedActions, build_rationale, recommend_actions,
};

fn default_true() -> bool {
    true
}

/// Per-request switches for one verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VerifyOptions {
    /// Ignore any cached result
    #[serde(default)]
    pub force_recompute: bool,
    /// Overrides the configured review threshold (0–100)
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default = "default_true")]
    pub include_duplicate_analysis: bool,
    #[serde(default = "default_true")]
    pub include_content_moderation: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            force_recompute: false,
            confidence_threshold: None,
            include_duplicate_analysis: true,
            include_content_moderation: true,
        }
    }
}

impl VerifyOptions {
    pub fn validate(&self) -> Result<(), TrustError> {
        if let Some(threshold) = self.confidence_threshold
            && !(threshold.is_finite() && (0.0..=100.0).contains(&threshold))
        {
            return Err(TrustError::validation_with(
                "confidence_threshold",
                "confidence_threshold must be between 0 and 100",
                serde_json::json!(threshold),
            ));
        }
        Ok(())
    }

    /// Requested and enabled by the system toggles.
    pub fn duplicates_enabled(&self, config: &Configuration) -> bool {
        self.include_duplicate_analysis && config.system.duplicate_detection_enabled
    }

    pub fn moderation_enabled(&self, config: &Configuration) -> bool {
        self.include_content_moderation && config.system.content_moderation_enabled
    }

    pub fn threshold(&self, record: &BusinessRecord, config: &Configuration) -> f64 {
        self.confidence_threshold
            .unwrap_or_else(|| config.threshold_for_category(record.category.as_deref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationResult {
    pub business_id: Uuid,
    pub completeness: CompletenessAnalysis,
    pub data_quality: QualityAnalysis,
    pub legitimacy: LegitimacyAnalysis,
    /// Absent when moderation was switched off
    pub content_moderation: Option<ModerationAnalysis>,
    /// Absent when duplicate analysis was switched off
    pub duplicates: Option<DuplicateReport>,
    pub confidence: ConfidenceBreakdown,
    pub threshold: f64,
    pub decision: Decision,
    pub decision_rule: DecisionRule,
    pub rationale: Rationale,
    pub actions: RecommendedActions,
    /// Only set for manual review
    pub review_priority: Option<ReviewPriority>,
    pub automation: AutomationEligibility,
    #[schema(value_type = String, example = "1.0.4")]
    pub config_version: ConfigVersion,
    pub evaluated_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn overall_confidence(&self) -> u8 {
        self.confidence.overall
    }
}

/// Field-level analyzer output, computed before the duplicate report is known.
#[derive(Debug, Clone)]
pub struct FieldAnalyses {
    pub completeness: CompletenessAnalysis,
    pub data_quality: QualityAnalysis,
    pub legitimacy: LegitimacyAnalysis,
    pub content_moderation: Option<ModerationAnalysis>,
}

/// Run the independent analyzers. They share no state, so callers may run
/// this next to the duplicate query.
pub fn analyze_fields(
    record: &BusinessRecord,
    config: &Configuration,
    options: &VerifyOptions,
    now: DateTime<Utc>,
) -> Result<FieldAnalyses, TrustError> {
    options.validate()?;
    if record.content_items.len() > MAX_CONTENT_ITEMS {
        return Err(TrustError::validation_with(
            "content_items",
            format!("at most {MAX_CONTENT_ITEMS} content items can be evaluated"),
            serde_json::json!(record.content_items.len()),
        ));
    }

    let analyses = FieldAnalyses {
        completeness: analyze_completeness(record),
        data_quality: analyze_quality(record),
        legitimacy: analyze_legitimacy(record, now),
        content_moderation: options
            .moderation_enabled(config)
            .then(|| analyze_content(record)),
    };

    ensure_score("completeness", analyses.completeness.score)?;
    ensure_score("data quality", analyses.data_quality.score)?;
    ensure_score("legitimacy", analyses.legitimacy.score)?;
    if let Some(moderation) = &analyses.content_moderation {
        ensure_score("content moderation", moderation.score)?;
    }
    Ok(analyses)
}

/// Combine analyzer output and the duplicate report into the final result.
///
/// `duplicates` is ignored when duplicate analysis is disabled for this request.
pub fn conclude(
    record: &BusinessRecord,
    analyses: FieldAnalyses,
    duplicates: Option<DuplicateReport>,
    snapshot: &ConfigSnapshot,
    options: &VerifyOptions,
    now: DateTime<Utc>,
) -> Result<VerificationResult, TrustError> {
    let config = &snapshot.configuration;
    let FieldAnalyses {
        completeness,
        data_quality,
        legitimacy,
        content_moderation,
    } = analyses;
    let duplicates = duplicates.filter(|_| options.duplicates_enabled(config));

    if let Some(report) = &duplicates
        && let Some(bad) = report.candidates.iter().find(|c| c.confidence > 100)
    {
        return Err(TrustError::Computation {
            stage: "duplicate matching".to_string(),
            message: format!("candidate {} has confidence {}", bad.candidate_id, bad.confidence),
        });
    }

    let highest_tier = duplicates.as_ref().and_then(DuplicateReport::highest_tier);
    let confidence = aggregate(
        &ConfidenceInputs {
            completeness: completeness.score,
            data_quality: data_quality.score,
            legitimacy: legitimacy.score,
            content_moderation: content_moderation.as_ref().map(|m| m.score),
            duplicates: duplicates.as_ref().map(|_| highest_tier),
        },
        &config.confidence_weights,
    )?;

    let threshold = options.threshold(record, config);
    let classification = classify(&ClassifierInput {
        completeness: completeness.score,
        data_quality: data_quality.score,
        legitimacy: legitimacy.score,
        content_moderation: content_moderation.as_ref().map(|m| m.score),
        highest_duplicate_tier: highest_tier,
        high_severity_legitimacy_flag: legitimacy.has_high_severity_flag(),
        high_severity_quality_issue: data_quality.has_high_severity_issue(),
        confidence: confidence.overall,
        threshold,
    });

    let rationale_input = RationaleInput {
        completeness: &completeness,
        data_quality: &data_quality,
        legitimacy: &legitimacy,
        content_moderation: content_moderation.as_ref(),
        duplicates: duplicates.as_ref(),
        classification: &classification,
        confidence: confidence.overall,
        auto_approve_threshold: config.confidence_thresholds.auto_approve,
    };
    let rationale = build_rationale(&rationale_input);
    let actions = recommend_actions(&rationale_input);

    let review_priority = (classification.decision == Decision::ManualReview).then(|| {
        review_priority(
            PrioritySignals::derive(
                confidence.overall,
                threshold,
                rationale.risk_factors.len(),
                highest_tier,
                record.listed_days(now),
            ),
            &config.priority_weights,
        )
    });
    let automation = automation_eligibility(classification.decision, confidence.overall, config);

    tracing::debug!(
        business_id = %record.id,
        confidence = confidence.overall,
        decision = classification.decision.as_str(),
        config_version = %snapshot.version(),
        "verification evaluated"
    );

    Ok(VerificationResult {
        business_id: record.id,
        completeness,
        data_quality,
        legitimacy,
        content_moderation,
        duplicates,
        confidence,
        threshold,
        decision: classification.decision,
        decision_rule: classification.rule,
        rationale,
        actions,
        review_priority,
        automation,
        config_version: snapshot.version(),
        evaluated_at: now,
    })
}

/// Evaluate `record` against `snapshot` in one pass.
///
/// `duplicates` is the report the caller built from its record store.
pub fn verify(
    record: &BusinessRecord,
    duplicates: Option<DuplicateReport>,
    snapshot: &ConfigSnapshot,
    options: &VerifyOptions,
    now: DateTime<Utc>,
) -> Result<VerificationResult, TrustError> {
    let analyses = analyze_fields(record, &snapshot.configuration, options, now)?;
    conclude(record, analyses, duplicates, snapshot, options, now)
}

/// [`verify`] with the duplicate report built from `source`.
pub fn verify_with_source(
    record: &BusinessRecord,
    source: &impl CandidateSource,
    snapshot: &ConfigSnapshot,
    options: &VerifyOptions,
    now: DateTime<Utc>,
) -> Result<VerificationResult, TrustError> {
    let config = &snapshot.configuration;
    let duplicates = if options.duplicates_enabled(config) {
        Some(find_duplicates(record, source, &config.duplicate_matching)?)
    } else {
        None
    };
    verify(record, duplicates, snapshot, options, now)
}

fn ensure_score(stage: &str, score: f64) -> Result<(), TrustError> {
    if score.is_finite() && (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        Err(TrustError::Computation {
            stage: stage.to_string(),
            message: format!("score {score} is outside [0, 100]"),
        })
    }
}
