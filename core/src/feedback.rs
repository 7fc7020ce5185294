//! Reviewer feedback on engine recommendations.
//!
//! Records are immutable once built and never touch scores or configuration.
//! The summary exists for whoever calibrates thresholds later.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::decision::Decision;
use crate::error::TrustError;
use crate::review::AdminAction;

pub const MIN_ACCURACY_RATING: u8 = 1;
pub const MAX_ACCURACY_RATING: u8 = 5;
const MAX_NOTES_LENGTH: usize = 4000;

/// Reviewer assessment of one recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewFeedback {
    pub agreement: bool,
    /// 1 (misleading) to 5 (spot on)
    pub accuracy_rating: u8,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub missed_issues: Vec<String>,
    #[serde(default)]
    pub false_positives: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ReviewFeedback {
    pub fn validate(&self) -> Result<(), TrustError> {
        if !(MIN_ACCURACY_RATING..=MAX_ACCURACY_RATING).contains(&self.accuracy_rating) {
            return Err(TrustError::validation_with(
                "feedback.accuracy_rating",
                format!(
                    "accuracy_rating must be between {MIN_ACCURACY_RATING} and {MAX_ACCURACY_RATING}"
                ),
                serde_json::json!(self.accuracy_rating),
            ));
        }
        if self
            .notes
            .as_ref()
            .is_some_and(|notes| notes.chars().count() > MAX_NOTES_LENGTH)
        {
            return Err(TrustError::validation(
                "feedback.notes",
                format!("notes must be at most {MAX_NOTES_LENGTH} characters"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub business_id: Uuid,
    pub original_recommendation: Decision,
    pub original_confidence: u8,
    pub admin_decision: AdminAction,
    pub agreement: bool,
    pub accuracy_rating: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub missed_issues: Vec<String>,
    pub false_positives: Vec<String>,
    pub notes: Option<String>,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        business_id: Uuid,
        original_recommendation: Decision,
        original_confidence: u8,
        admin_decision: AdminAction,
        feedback: ReviewFeedback,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, TrustError> {
        feedback.validate()?;
        Ok(Self {
            id: Uuid::now_v7(),
            business_id,
            original_recommendation,
            original_confidence,
            admin_decision,
            agreement: feedback.agreement,
            accuracy_rating: feedback.accuracy_rating,
            strengths: feedback.strengths,
            weaknesses: feedback.weaknesses,
            missed_issues: feedback.missed_issues,
            false_positives: feedback.false_positives,
            notes: feedback.notes,
            actor: actor.to_string(),
            recorded_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecommendationAgreement {
    pub recommendation: Decision,
    pub total: usize,
    pub agreed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackSummary {
    pub total: usize,
    /// Share of records where the reviewer agreed (0..1); `None` without records
    pub agreement_rate: Option<f64>,
    pub mean_accuracy: Option<f64>,
    pub mean_confidence_when_disagreed: Option<f64>,
    pub by_recommendation: Vec<RecommendationAgreement>,
}

pub fn summarize(records: &[FeedbackRecord]) -> FeedbackSummary {
    let total = records.len();
    let mean = |values: Vec<f64>| {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };

    let mut by_recommendation: BTreeMap<Decision, RecommendationAgreement> = BTreeMap::new();
    for record in records {
        let entry = by_recommendation
            .entry(record.original_recommendation)
            .or_insert(RecommendationAgreement {
                recommendation: record.original_recommendation,
                total: 0,
                agreed: 0,
            });
        entry.total += 1;
        if record.agreement {
            entry.agreed += 1;
        }
    }

    FeedbackSummary {
        total,
        agreement_rate: mean(
            records
                .iter()
                .map(|r| if r.agreement { 1.0 } else { 0.0 })
                .collect(),
        ),
        mean_accuracy: mean(records.iter().map(|r| f64::from(r.accuracy_rating)).collect()),
        mean_confidence_when_disagreed: mean(
            records
                .iter()
                .filter(|r| !r.agreement)
                .map(|r| f64::from(r.original_confidence))
                .collect(),
        ),
        by_recommendation: by_recommendation.into_values().collect(),
    }
}

/// Append-only feedback log kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryFeedbackRecorder {
    records: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryFeedbackRecorder {
    pub fn record(&self, record: FeedbackRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn for_business(&self, business_id: Uuid) -> Vec<FeedbackRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.business_id == business_id)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> FeedbackSummary {
        summarize(&self.records.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::fixtures::now;

    fn feedback(agreement: bool, rating: u8) -> ReviewFeedback {
        ReviewFeedback {
            agreement,
            accuracy_rating: rating,
            strengths: vec![],
            weaknesses: vec![],
            missed_issues: vec![],
            false_positives: vec![],
            notes: None,
        }
    }

    fn record(recommendation: Decision, confidence: u8, agreement: bool, rating: u8) -> FeedbackRecord {
        FeedbackRecord::new(
            Uuid::from_u128(1),
            recommendation,
            confidence,
            AdminAction::Approve,
            feedback(agreement, rating),
            "ana",
            now(),
        )
        .unwrap()
    }

    #[test]
    fn rating_must_be_one_to_five() {
        for rating in [0, 6] {
            let err = FeedbackRecord::new(
                Uuid::nil(),
                Decision::Approve,
                90,
                AdminAction::Approve,
                feedback(true, rating),
                "ana",
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, TrustError::Validation { .. }));
        }
    }

    #[test]
    fn summary_tracks_agreement_per_recommendation() {
        let recorder = InMemoryFeedbackRecorder::default();
        recorder.record(record(Decision::Approve, 92, true, 5));
        recorder.record(record(Decision::Approve, 86, false, 2));
        recorder.record(record(Decision::ManualReview, 70, true, 4));

        let summary = recorder.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.mean_accuracy, Some(11.0 / 3.0));
        assert_eq!(summary.mean_confidence_when_disagreed, Some(86.0));
        assert_eq!(
            summary.by_recommendation,
            vec![
                RecommendationAgreement {
                    recommendation: Decision::Approve,
                    total: 2,
                    agreed: 1,
                },
                RecommendationAgreement {
                    recommendation: Decision::ManualReview,
                    total: 1,
                    agreed: 1,
                },
            ]
        );
        assert_eq!(recorder.for_business(Uuid::from_u128(1)).len(), 3);
    }

    #[test]
    fn empty_summary_has_no_rates() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.agreement_rate, None);
        assert!(summary.by_recommendation.is_empty());
    }
}
