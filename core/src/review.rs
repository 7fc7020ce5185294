//! Planning for the administrator review flow.
//!
//! [`plan_review`] validates a review request and turns it into the writes the
//! caller has to perform: business field updates, an optional feedback record,
//! an optional threshold patch and the audit events. Nothing is persisted here.
//! Threshold changes are only accepted alongside feedback, so every manual
//! recalibration carries the reviewer's assessment with it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::business::{BusinessRecord, ListingStatus};
use crate::config::{AppliedConfiguration, ConfigSnapshot, ConfigVersion, evaluate_test_mode};
use crate::decision::Decision;
use crate::error::TrustError;
use crate::feedback::{FeedbackRecord, ReviewFeedback};

/// Listing columns a reviewer may overwrite.
pub const OVERRIDABLE_FIELDS: &[&str] = &[
    "name", "phone", "email", "website", "address", "suburb", "category", "bio", "abn",
];
const MAX_REASON_LENGTH: usize = 1000;
const MAX_FIELD_LENGTH: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Approve,
    Reject,
    RequestChanges,
    MarkDuplicate,
}

impl AdminAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminAction::Approve => "approve",
            AdminAction::Reject => "reject",
            AdminAction::RequestChanges => "request_changes",
            AdminAction::MarkDuplicate => "mark_duplicate",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(AdminAction::Approve),
            "reject" => Some(AdminAction::Reject),
            "request_changes" => Some(AdminAction::RequestChanges),
            "mark_duplicate" => Some(AdminAction::MarkDuplicate),
            _ => None,
        }
    }

    pub fn target_status(self) -> ListingStatus {
        match self {
            AdminAction::Approve => ListingStatus::Approved,
            AdminAction::Reject => ListingStatus::Rejected,
            AdminAction::RequestChanges => ListingStatus::ChangesRequested,
            AdminAction::MarkDuplicate => ListingStatus::Duplicate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Fold this listing's content into the existing one
    Merge,
    MarkDuplicate,
    /// The match was a false positive
    KeepBoth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateResolution {
    pub duplicate_of: Uuid,
    pub strategy: DuplicateStrategy,
}

/// New confidence thresholds requested together with feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdAdjustment {
    #[serde(default)]
    pub auto_approve: Option<f64>,
    #[serde(default)]
    pub manual_review: Option<f64>,
    #[serde(default)]
    pub auto_reject: Option<f64>,
}

impl ThresholdAdjustment {
    pub fn is_empty(&self) -> bool {
        self.auto_approve.is_none() && self.manual_review.is_none() && self.auto_reject.is_none()
    }

    /// Merge patch over the configuration.
    pub fn to_patch(&self) -> Value {
        let mut thresholds = serde_json::Map::new();
        for (key, value) in [
            ("auto_approve", self.auto_approve),
            ("manual_review", self.manual_review),
            ("auto_reject", self.auto_reject),
        ] {
            if let Some(value) = value {
                thresholds.insert(key.to_string(), json!(value));
            }
        }
        json!({ "confidence_thresholds": thresholds })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub action: AdminAction,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub feedback: Option<ReviewFeedback>,
    #[serde(default)]
    pub threshold_adjustment: Option<ThresholdAdjustment>,
    /// Listing fields to overwrite; `null` clears an optional field
    #[serde(default)]
    pub field_overrides: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub duplicate_resolution: Option<DuplicateResolution>,
}

/// What the engine recommended before the reviewer acted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorVerification {
    pub decision: Decision,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessUpdate {
    pub status: ListingStatus,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub review_reason: String,
    pub review_notes: Option<String>,
    /// Overridden listing fields, keyed by column name
    pub fields: BTreeMap<String, Option<String>>,
    pub duplicate_of: Option<Uuid>,
}

/// One entry for the audit log. Recording it may fail without affecting the review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_type: String,
    pub target_id: Uuid,
    pub actor: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NextSteps {
    pub immediate: Vec<String>,
    pub follow_up: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPlan {
    pub business_id: Uuid,
    pub update: BusinessUpdate,
    pub feedback: Option<FeedbackRecord>,
    /// Merge patch for the configuration service; already checked in test mode
    pub threshold_patch: Option<Value>,
    pub duplicate_resolution: Option<DuplicateResolution>,
    pub events: Vec<AuditEvent>,
    pub next_steps: NextSteps,
    actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SystemImpact {
    pub threshold_changed: bool,
    #[schema(value_type = Option<String>)]
    pub config_version: Option<ConfigVersion>,
    pub feedback_recorded: bool,
    pub duplicate_resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewOutcome {
    pub business_id: Uuid,
    pub applied_updates: BusinessUpdate,
    pub impact: SystemImpact,
    pub next_steps: NextSteps,
    /// Audit-log failures; the review itself succeeded
    pub warnings: Vec<String>,
}

pub fn plan_review(
    business: &BusinessRecord,
    request: ReviewRequest,
    prior: Option<PriorVerification>,
    config: &ConfigSnapshot,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<ReviewPlan, TrustError> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(TrustError::validation("reason", "a review reason is required"));
    }
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(TrustError::validation(
            "reason",
            format!("reason must be at most {MAX_REASON_LENGTH} characters"),
        ));
    }

    let duplicate_resolution = check_duplicate_resolution(business, &request)?;
    let fields = check_field_overrides(&request.field_overrides)?;

    let feedback = match (request.feedback, prior) {
        (Some(_), None) => {
            return Err(TrustError::validation(
                "feedback",
                "feedback needs a prior verification of this business",
            ));
        }
        (Some(feedback), Some(prior)) => Some(FeedbackRecord::new(
            business.id,
            prior.decision,
            prior.confidence,
            request.action,
            feedback,
            actor,
            now,
        )?),
        (None, _) => None,
    };

    let threshold_patch = match request.threshold_adjustment {
        None => None,
        Some(_) if feedback.is_none() => {
            return Err(TrustError::validation(
                "threshold_adjustment",
                "threshold adjustments are only accepted together with feedback",
            ));
        }
        Some(adjustment) if adjustment.is_empty() => {
            return Err(TrustError::validation(
                "threshold_adjustment",
                "threshold adjustment names no threshold",
            ));
        }
        Some(adjustment) => {
            let patch = adjustment.to_patch();
            evaluate_test_mode(config, &patch)?;
            Some(patch)
        }
    };

    let status = request.action.target_status();
    let update = BusinessUpdate {
        status,
        reviewed_by: actor.to_string(),
        reviewed_at: now,
        review_reason: reason.to_string(),
        review_notes: request.notes.filter(|n| !n.trim().is_empty()),
        fields,
        duplicate_of: duplicate_resolution
            .as_ref()
            .filter(|r| r.strategy != DuplicateStrategy::KeepBoth)
            .map(|r| r.duplicate_of),
    };

    let mut events = vec![AuditEvent {
        event_type: "business.reviewed".to_string(),
        target_id: business.id,
        actor: actor.to_string(),
        payload: json!({
            "action": request.action.as_str(),
            "previous_status": business.status.as_str(),
            "status": status.as_str(),
            "reason": reason,
            "overridden_fields": update.fields.keys().collect::<Vec<_>>(),
        }),
    }];
    if let Some(record) = &feedback {
        events.push(AuditEvent {
            event_type: "feedback.recorded".to_string(),
            target_id: business.id,
            actor: actor.to_string(),
            payload: json!({
                "feedback_id": record.id,
                "original_recommendation": record.original_recommendation.as_str(),
                "agreement": record.agreement,
                "accuracy_rating": record.accuracy_rating,
            }),
        });
    }
    if let Some(resolution) = &duplicate_resolution {
        events.push(AuditEvent {
            event_type: "duplicate.resolved".to_string(),
            target_id: business.id,
            actor: actor.to_string(),
            payload: json!({
                "duplicate_of": resolution.duplicate_of,
                "strategy": resolution.strategy,
            }),
        });
    }

    let next_steps = next_steps(
        request.action,
        duplicate_resolution.as_ref(),
        feedback.as_ref(),
        threshold_patch.is_some(),
    );

    Ok(ReviewPlan {
        business_id: business.id,
        update,
        feedback,
        threshold_patch,
        duplicate_resolution,
        events,
        next_steps,
        actor: actor.to_string(),
    })
}

fn check_duplicate_resolution(
    business: &BusinessRecord,
    request: &ReviewRequest,
) -> Result<Option<DuplicateResolution>, TrustError> {
    let Some(resolution) = &request.duplicate_resolution else {
        if request.action == AdminAction::MarkDuplicate {
            return Err(TrustError::validation(
                "duplicate_resolution",
                "mark_duplicate needs the listing this one duplicates",
            ));
        }
        return Ok(None);
    };
    if resolution.duplicate_of == business.id {
        return Err(TrustError::validation(
            "duplicate_resolution.duplicate_of",
            "a listing cannot duplicate itself",
        ));
    }
    let contradicts = match request.action {
        AdminAction::Approve => resolution.strategy != DuplicateStrategy::KeepBoth,
        AdminAction::MarkDuplicate => resolution.strategy == DuplicateStrategy::KeepBoth,
        AdminAction::Reject | AdminAction::RequestChanges => false,
    };
    if contradicts {
        return Err(TrustError::validation_with(
            "duplicate_resolution.strategy",
            format!(
                "strategy does not fit the '{}' action",
                request.action.as_str()
            ),
            json!(resolution.strategy),
        ));
    }
    Ok(Some(resolution.clone()))
}

fn check_field_overrides(
    overrides: &BTreeMap<String, Option<String>>,
) -> Result<BTreeMap<String, Option<String>>, TrustError> {
    let mut fields = BTreeMap::new();
    for (field, value) in overrides {
        if !OVERRIDABLE_FIELDS.contains(&field.as_str()) {
            return Err(TrustError::validation_with(
                format!("field_overrides.{field}"),
                format!("'{field}' cannot be overridden"),
                json!(OVERRIDABLE_FIELDS),
            ));
        }
        let value = value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        if field == "name" && value.is_none() {
            return Err(TrustError::validation(
                "field_overrides.name",
                "the business name cannot be cleared",
            ));
        }
        if value
            .as_ref()
            .is_some_and(|v| v.chars().count() > MAX_FIELD_LENGTH)
        {
            return Err(TrustError::validation(
                format!("field_overrides.{field}"),
                format!("value must be at most {MAX_FIELD_LENGTH} characters"),
            ));
        }
        fields.insert(field.clone(), value);
    }
    Ok(fields)
}

fn next_steps(
    action: AdminAction,
    resolution: Option<&DuplicateResolution>,
    feedback: Option<&FeedbackRecord>,
    threshold_changed: bool,
) -> NextSteps {
    let mut steps = NextSteps::default();
    match action {
        AdminAction::Approve => {
            steps
                .immediate
                .push("Notify the owner that the listing is live".to_string());
            steps
                .follow_up
                .push("Monitor early customer feedback on the listing".to_string());
        }
        AdminAction::Reject => {
            steps
                .immediate
                .push("Notify the owner of the rejection reason".to_string());
            steps
                .follow_up
                .push("Watch for resubmission under a different name".to_string());
        }
        AdminAction::RequestChanges => {
            steps
                .immediate
                .push("Send the owner the list of requested changes".to_string());
            steps
                .follow_up
                .push("Re-verify once the owner resubmits".to_string());
        }
        AdminAction::MarkDuplicate => {
            steps
                .immediate
                .push("Point the owner to the existing listing".to_string());
        }
    }
    if let Some(resolution) = resolution
        && resolution.strategy == DuplicateStrategy::Merge
    {
        steps.follow_up.push(format!(
            "Merge reviews and content into listing {}",
            resolution.duplicate_of
        ));
    }
    if feedback.is_some_and(|f| !f.agreement) {
        steps
            .follow_up
            .push("Include this case in the next threshold calibration".to_string());
    }
    if threshold_changed {
        steps
            .follow_up
            .push("Re-verify pending listings against the new thresholds".to_string());
    }
    steps
}

impl ReviewPlan {
    /// Audit event for a threshold patch the configuration service accepted.
    pub fn threshold_event(&self, applied: &AppliedConfiguration) -> AuditEvent {
        AuditEvent {
            event_type: "configuration.threshold_adjusted".to_string(),
            target_id: self.business_id,
            actor: self.actor.clone(),
            payload: json!({
                "change_id": applied.change.id,
                "from_version": applied.change.from_version,
                "to_version": applied.change.to_version,
                "changes": applied.change.changes,
            }),
        }
    }

    pub fn threshold_reason(&self) -> String {
        format!(
            "Threshold adjustment during review of {}: {}",
            self.business_id, self.update.review_reason
        )
    }

    pub fn into_outcome(
        self,
        config_version: Option<ConfigVersion>,
        warnings: Vec<String>,
    ) -> ReviewOutcome {
        ReviewOutcome {
            business_id: self.business_id,
            impact: SystemImpact {
                threshold_changed: config_version.is_some(),
                config_version,
                feedback_recorded: self.feedback.is_some(),
                duplicate_resolved: self.duplicate_resolution.is_some(),
            },
            applied_updates: self.update,
            next_steps: self.next_steps,
            warnings,
        }
    }
}
