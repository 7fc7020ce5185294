use serde_json::json;

pub const ACTOR_HEADER: &str = "x-actor-id";

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{err:#}");
    std::process::exit(4);
}

/// One API call: method, path, optional body, query pairs and the acting admin.
pub struct ApiCall<'a> {
    pub method: reqwest::Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    pub actor: Option<&'a str>,
}

impl<'a> ApiCall<'a> {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            path: path.into(),
            body: None,
            query: Vec::new(),
            actor: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            path: path.into(),
            body: Some(body),
            query: Vec::new(),
            actor: None,
        }
    }

    pub fn actor(mut self, actor: Option<&'a str>) -> Self {
        self.actor = actor;
        self
    }

    pub fn query(mut self, key: &str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }
}

/// Execute an API request, print the response, return a structured exit code.
///
/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub async fn api_request(api_url: &str, call: ApiCall<'_>, raw: bool) -> i32 {
    let mut url = match reqwest::Url::parse(&format!("{api_url}{}", call.path)) {
        Ok(u) => u,
        Err(e) => {
            let err = json!({
                "error": "cli_error",
                "message": format!("Invalid URL: {api_url}{}: {e}", call.path)
            });
            eprintln!("{err:#}");
            return 4;
        }
    };
    if !call.query.is_empty() {
        let mut q = url.query_pairs_mut();
        for (k, v) in &call.query {
            q.append_pair(k, v);
        }
    }

    tracing::debug!(method = %call.method, %url, "sending request");
    let mut req = client().request(call.method, url);
    if let Some(actor) = call.actor {
        req = req.header(ACTOR_HEADER, actor);
    }
    if let Some(b) = call.body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            let err = json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the API server running? Check LISTING_TRUST_API_URL."
            });
            eprintln!("{err:#}");
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let exit_code = match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    };

    let body: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
    };

    let formatted = if raw {
        body.to_string()
    } else {
        format!("{body:#}")
    };
    if exit_code == 0 {
        println!("{formatted}");
    } else {
        eprintln!("{formatted}");
    }

    exit_code
}

/// Read JSON from a file path or stdin (when path is "-").
pub fn read_json_from_file(path: &str) -> Result<serde_json::Value, String> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| format!("Failed to read stdin: {e}"))?
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?
    };
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}

/// Resolve the acting administrator or exit with a usage error.
pub fn require_actor(actor: Option<&str>) -> &str {
    match actor.map(str::trim).filter(|a| !a.is_empty()) {
        Some(actor) => actor,
        None => exit_error(
            "an acting administrator is required",
            Some("Set --actor or LISTING_TRUST_ACTOR"),
        ),
    }
}
