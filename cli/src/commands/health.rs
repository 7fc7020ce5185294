use crate::util::{ApiCall, api_request};

pub async fn run(api_url: &str) -> i32 {
    api_request(api_url, ApiCall::get("/health"), false).await
}
