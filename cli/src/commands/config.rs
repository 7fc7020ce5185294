use clap::Subcommand;
use serde_json::json;

use crate::util::{ApiCall, api_request, exit_error, read_json_from_file, require_actor};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the active configuration and its version
    Get,
    /// Merge a partial configuration into the active one
    Update {
        /// JSON file with the partial configuration ("-" for stdin)
        #[arg(long)]
        file: String,
        /// Why the change is made
        #[arg(long)]
        reason: Option<String>,
        /// Validate and diff only; nothing is stored
        #[arg(long)]
        test_mode: bool,
        /// Refuse the update unless this is still the current version
        #[arg(long)]
        expected_version: Option<String>,
    },
    /// List configuration changes, newest first
    History {
        #[arg(long)]
        actor: Option<String>,
        /// Only changes at or after this time (RFC3339)
        #[arg(long)]
        from: Option<String>,
        /// Only changes at or before this time (RFC3339)
        #[arg(long)]
        to: Option<String>,
        /// Top-level section, e.g. "confidence_thresholds"
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        include_test_mode: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
}

pub async fn run(api_url: &str, actor: Option<&str>, command: ConfigCommands) -> i32 {
    match command {
        ConfigCommands::Get => api_request(api_url, ApiCall::get("/v1/config"), false).await,
        ConfigCommands::Update {
            file,
            reason,
            test_mode,
            expected_version,
        } => {
            let actor = require_actor(actor);
            let partial = read_json_from_file(&file).unwrap_or_else(|e| exit_error(&e, None));
            let mut body = json!({
                "configuration": partial,
                "test_mode": test_mode,
            });
            if let Some(reason) = reason {
                body["reason"] = json!(reason);
            }
            if let Some(version) = expected_version {
                body["expected_version"] = json!(version);
            }
            api_request(
                api_url,
                ApiCall::post("/v1/config", body).actor(Some(actor)),
                false,
            )
            .await
        }
        ConfigCommands::History {
            actor: filter_actor,
            from,
            to,
            category,
            include_test_mode,
            limit,
            offset,
        } => {
            let call = ApiCall::get("/v1/config/history")
                .query("actor", filter_actor)
                .query("from", from)
                .query("to", to)
                .query("category", category)
                .query("include_test_mode", include_test_mode.then_some(true))
                .query("limit", limit)
                .query("offset", offset);
            api_request(api_url, call, false).await
        }
    }
}
