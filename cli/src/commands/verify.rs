use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::util::{ApiCall, api_request};

#[derive(Args)]
pub struct VerifyArgs {
    /// Business id
    pub business_id: Uuid,
    /// Ignore any cached result
    #[arg(long)]
    pub force: bool,
    /// Review threshold override (0-100)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Skip duplicate detection
    #[arg(long)]
    pub no_duplicates: bool,
    /// Skip content moderation
    #[arg(long)]
    pub no_moderation: bool,
}

pub fn options_body(args: &VerifyArgs) -> serde_json::Value {
    let mut body = json!({
        "force_recompute": args.force,
        "include_duplicate_analysis": !args.no_duplicates,
        "include_content_moderation": !args.no_moderation,
    });
    if let Some(threshold) = args.threshold {
        body["confidence_threshold"] = json!(threshold);
    }
    body
}

pub async fn run(api_url: &str, args: VerifyArgs) -> i32 {
    api_request(
        api_url,
        ApiCall::post(
            format!("/v1/businesses/{}/verify", args.business_id),
            options_body(&args),
        ),
        false,
    )
    .await
}
