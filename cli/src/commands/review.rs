use clap::{Args, ValueEnum};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::util::{ApiCall, api_request, exit_error, require_actor};

#[derive(Clone, Copy, ValueEnum)]
pub enum Action {
    Approve,
    Reject,
    RequestChanges,
    MarkDuplicate,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::RequestChanges => "request_changes",
            Action::MarkDuplicate => "mark_duplicate",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Strategy {
    Merge,
    MarkDuplicate,
    KeepBoth,
}

impl Strategy {
    fn as_str(self) -> &'static str {
        match self {
            Strategy::Merge => "merge",
            Strategy::MarkDuplicate => "mark_duplicate",
            Strategy::KeepBoth => "keep_both",
        }
    }
}

#[derive(Args)]
pub struct ReviewArgs {
    /// Business id
    pub business_id: Uuid,
    #[arg(long, value_enum)]
    pub action: Action,
    #[arg(long)]
    pub reason: String,
    #[arg(long)]
    pub notes: Option<String>,
    /// Whether you agree with the engine's recommendation (enables feedback)
    #[arg(long)]
    pub agree: Option<bool>,
    /// Accuracy of the recommendation, 1-5 (required with --agree)
    #[arg(long)]
    pub rating: Option<u8>,
    /// Issue the engine missed (repeatable)
    #[arg(long = "missed")]
    pub missed_issues: Vec<String>,
    /// Issue the engine flagged wrongly (repeatable)
    #[arg(long = "false-positive")]
    pub false_positives: Vec<String>,
    /// Field override as FIELD=VALUE; an empty value clears the field (repeatable)
    #[arg(long = "set")]
    pub overrides: Vec<String>,
    /// Listing this one duplicates
    #[arg(long)]
    pub duplicate_of: Option<Uuid>,
    #[arg(long, value_enum, requires = "duplicate_of")]
    pub strategy: Option<Strategy>,
    /// New auto-approve threshold (requires feedback)
    #[arg(long)]
    pub auto_approve: Option<f64>,
    /// New manual-review threshold (requires feedback)
    #[arg(long)]
    pub manual_review: Option<f64>,
    /// New auto-reject threshold (requires feedback)
    #[arg(long)]
    pub auto_reject: Option<f64>,
}

/// Split `FIELD=VALUE`; an empty value means clear.
pub fn parse_override(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("override '{raw}' must look like FIELD=VALUE"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("override '{raw}' names no field"));
    }
    let value = if value.trim().is_empty() {
        Value::Null
    } else {
        json!(value)
    };
    Ok((field.to_string(), value))
}

pub fn request_body(args: &ReviewArgs) -> Result<Value, String> {
    let mut body = json!({
        "action": args.action.as_str(),
        "reason": args.reason,
    });
    if let Some(notes) = &args.notes {
        body["notes"] = json!(notes);
    }

    match (args.agree, args.rating) {
        (Some(agreement), Some(rating)) => {
            body["feedback"] = json!({
                "agreement": agreement,
                "accuracy_rating": rating,
                "missed_issues": args.missed_issues,
                "false_positives": args.false_positives,
            });
        }
        (Some(_), None) => return Err("--agree needs --rating".to_string()),
        (None, Some(_)) => return Err("--rating needs --agree".to_string()),
        (None, None) => {}
    }

    let mut overrides = Map::new();
    for raw in &args.overrides {
        let (field, value) = parse_override(raw)?;
        overrides.insert(field, value);
    }
    if !overrides.is_empty() {
        body["field_overrides"] = Value::Object(overrides);
    }

    if let Some(duplicate_of) = args.duplicate_of {
        let strategy = args.strategy.unwrap_or(match args.action {
            Action::Approve => Strategy::KeepBoth,
            _ => Strategy::MarkDuplicate,
        });
        body["duplicate_resolution"] = json!({
            "duplicate_of": duplicate_of,
            "strategy": strategy.as_str(),
        });
    }

    let mut thresholds = Map::new();
    for (key, value) in [
        ("auto_approve", args.auto_approve),
        ("manual_review", args.manual_review),
        ("auto_reject", args.auto_reject),
    ] {
        if let Some(value) = value {
            thresholds.insert(key.to_string(), json!(value));
        }
    }
    if !thresholds.is_empty() {
        body["threshold_adjustment"] = Value::Object(thresholds);
    }

    Ok(body)
}

pub async fn run(api_url: &str, actor: Option<&str>, args: ReviewArgs) -> i32 {
    let actor = require_actor(actor);
    let body = request_body(&args).unwrap_or_else(|e| exit_error(&e, None));
    api_request(
        api_url,
        ApiCall::post(format!("/v1/businesses/{}/review", args.business_id), body)
            .actor(Some(actor)),
        false,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(action: Action) -> ReviewArgs {
        ReviewArgs {
            business_id: Uuid::nil(),
            action,
            reason: "ABN checked".to_string(),
            notes: None,
            agree: None,
            rating: None,
            missed_issues: vec![],
            false_positives: vec![],
            overrides: vec![],
            duplicate_of: None,
            strategy: None,
            auto_approve: None,
            manual_review: None,
            auto_reject: None,
        }
    }

    #[test]
    fn empty_override_clears_the_field() {
        assert_eq!(
            parse_override("website=").unwrap(),
            ("website".to_string(), Value::Null)
        );
        assert_eq!(
            parse_override("phone=02 9555 0000").unwrap(),
            ("phone".to_string(), json!("02 9555 0000"))
        );
        assert!(parse_override("phone").is_err());
        assert!(parse_override("=x").is_err());
    }

    #[test]
    fn feedback_needs_agreement_and_rating() {
        let mut review = args(Action::Approve);
        review.agree = Some(false);
        assert!(request_body(&review).is_err());
        review.rating = Some(2);
        review.auto_approve = Some(90.0);
        let body = request_body(&review).unwrap();
        assert_eq!(body["feedback"]["accuracy_rating"], 2);
        assert_eq!(body["threshold_adjustment"]["auto_approve"], 90.0);
    }

    #[test]
    fn duplicate_strategy_defaults_from_action() {
        let mut review = args(Action::MarkDuplicate);
        review.duplicate_of = Some(Uuid::from_u128(7));
        let body = request_body(&review).unwrap();
        assert_eq!(body["duplicate_resolution"]["strategy"], "mark_duplicate");
        assert!(body.get("feedback").is_none());
    }
}
