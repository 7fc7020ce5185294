use clap::Subcommand;

use crate::util::{ApiCall, api_request};

#[derive(Subcommand)]
pub enum FeedbackCommands {
    /// Reviewer agreement with engine recommendations
    Summary,
}

pub async fn run(api_url: &str, command: FeedbackCommands) -> i32 {
    match command {
        FeedbackCommands::Summary => {
            api_request(api_url, ApiCall::get("/v1/feedback/summary"), false).await
        }
    }
}
