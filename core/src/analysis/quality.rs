use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::business::{BusinessRecord, present};
use crate::normalize::{email_domain, is_valid_abn, parse_website};

use super::{Contribution, SPAM_PHRASES, Severity, phrase_hits, settle_score};

pub const MALFORMED_EMAIL_PENALTY: f64 = 15.0;
pub const DISPOSABLE_EMAIL_PENALTY: f64 = 20.0;
pub const MALFORMED_PHONE_PENALTY: f64 = 10.0;
pub const SUSPICIOUS_WEBSITE_PENALTY: f64 = 8.0;
pub const MALFORMED_WEBSITE_PENALTY: f64 = 10.0;
pub const MALFORMED_ABN_PENALTY: f64 = 8.0;
pub const SHORT_NAME_PENALTY: f64 = 15.0;
pub const PLACEHOLDER_NAME_PENALTY: f64 = 20.0;
pub const SHORT_BIO_PENALTY: f64 = 5.0;
pub const PROMOTIONAL_BIO_PENALTY: f64 = 15.0;

pub const MIN_NAME_LENGTH: usize = 3;
pub const MIN_BIO_LENGTH: usize = 50;

const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "yopmail.com",
    "trashmail.com",
    "sharklasers.com",
    "throwaway.email",
    "getnada.com",
];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

// Australian landline/mobile (+61 or leading 0), 1300/1800 and 13xxxx numbers,
// after spaces, dashes, dots and brackets have been removed.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\+?61|0)[23478]\d{8}|1[38]00\d{6}|13\d{4})$")
        .expect("phone pattern is valid")
});

static SUSPICIOUS_WEBSITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(bit\.ly|tinyurl\.com|goo\.gl|ow\.ly|is\.gd|buff\.ly|\bt\.co/|[?&](url|redirect|redir|goto)=|/redirect|\.(tk|ml|ga|cf|gq)(/|$))",
    )
    .expect("suspicious website pattern is valid")
});

static PLACEHOLDER_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(test|testing|demo|sample|dummy|placeholder|asdf|qwerty|lorem|ipsum|fake)\b|^\s*(x+|n/?a|tbc|tbd|none)\s*$",
    )
    .expect("placeholder name pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Format,
    Validity,
    Suspicious,
    Content,
}

/// One data-quality finding and the deduction it caused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QualityIssue {
    pub field: String,
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
    pub penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QualityAnalysis {
    pub score: f64,
    pub issues: Vec<QualityIssue>,
    pub recommendation: String,
}

impl QualityAnalysis {
    pub fn has_high_severity_issue(&self) -> bool {
        self.issues.iter().any(|issue| issue.severity == Severity::High)
    }
}

pub fn analyze_quality(record: &BusinessRecord) -> QualityAnalysis {
    let mut issues = Vec::new();
    issues.extend(email_issues(record));
    issues.extend(phone_issue(record));
    issues.extend(website_issue(record));
    issues.extend(abn_issue(record));
    issues.extend(name_issues(record));
    issues.extend(bio_issues(record));

    let contributions: Vec<Contribution> = issues
        .iter()
        .map(|issue| Contribution::new(issue.description.clone(), -issue.penalty))
        .collect();
    let score = settle_score(100.0, &contributions);

    QualityAnalysis {
        score,
        recommendation: quality_recommendation(score, issues.len()),
        issues,
    }
}

fn issue(
    field: &str,
    category: IssueCategory,
    severity: Severity,
    description: &str,
    suggestion: &str,
    penalty: f64,
) -> QualityIssue {
    QualityIssue {
        field: field.to_string(),
        category,
        severity,
        description: description.to_string(),
        suggestion: suggestion.to_string(),
        penalty,
    }
}

fn email_issues(record: &BusinessRecord) -> Vec<QualityIssue> {
    let Some(email) = present(&record.email) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if !EMAIL_RE.is_match(email) {
        found.push(issue(
            "email",
            IssueCategory::Format,
            Severity::Medium,
            "Email address is not in a valid format",
            "Confirm the contact email with the owner",
            MALFORMED_EMAIL_PENALTY,
        ));
    }
    if let Some(domain) = email_domain(email) {
        if DISPOSABLE_DOMAINS.contains(&domain.as_str()) {
            found.push(issue(
                "email",
                IssueCategory::Suspicious,
                Severity::High,
                "Email uses a disposable or suspicious domain",
                "Request a business or long-lived email address",
                DISPOSABLE_EMAIL_PENALTY,
            ));
        }
    }
    found
}

fn phone_issue(record: &BusinessRecord) -> Option<QualityIssue> {
    let phone = present(&record.phone)?;
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if PHONE_RE.is_match(&compact) {
        return None;
    }
    Some(issue(
        "phone",
        IssueCategory::Format,
        Severity::Medium,
        "Phone number does not match an Australian number format",
        "Use a landline, mobile, 13 or 1300/1800 number",
        MALFORMED_PHONE_PENALTY,
    ))
}

fn website_issue(record: &BusinessRecord) -> Option<QualityIssue> {
    let website = present(&record.website)?;
    if SUSPICIOUS_WEBSITE_RE.is_match(website) {
        return Some(issue(
            "website",
            IssueCategory::Suspicious,
            Severity::Medium,
            "Website looks like a shortener or redirect link",
            "Ask for the business's own domain",
            SUSPICIOUS_WEBSITE_PENALTY,
        ));
    }
    if parse_website(website).is_none() {
        return Some(issue(
            "website",
            IssueCategory::Format,
            Severity::Medium,
            "Website is not a valid URL",
            "Provide a full address such as https://example.com.au",
            MALFORMED_WEBSITE_PENALTY,
        ));
    }
    None
}

fn abn_issue(record: &BusinessRecord) -> Option<QualityIssue> {
    let abn = present(&record.abn)?;
    if is_valid_abn(abn) {
        return None;
    }
    Some(issue(
        "abn",
        IssueCategory::Format,
        Severity::Medium,
        "ABN is not a valid 11-digit business number",
        "Check the ABN against the public register",
        MALFORMED_ABN_PENALTY,
    ))
}

fn name_issues(record: &BusinessRecord) -> Vec<QualityIssue> {
    let name = record.name.trim();
    let mut found = Vec::new();
    if name.chars().count() < MIN_NAME_LENGTH {
        found.push(issue(
            "name",
            IssueCategory::Validity,
            Severity::High,
            "Business name is too short",
            "Use the registered trading name",
            SHORT_NAME_PENALTY,
        ));
    }
    if PLACEHOLDER_NAME_RE.is_match(name) {
        found.push(issue(
            "name",
            IssueCategory::Suspicious,
            Severity::High,
            "Business name looks like a placeholder or test entry",
            "Confirm this is a real trading business",
            PLACEHOLDER_NAME_PENALTY,
        ));
    }
    found
}

fn bio_issues(record: &BusinessRecord) -> Vec<QualityIssue> {
    let Some(bio) = present(&record.bio) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if bio.chars().count() < MIN_BIO_LENGTH {
        found.push(issue(
            "bio",
            IssueCategory::Content,
            Severity::Low,
            "Business description is very short",
            "Describe the services offered in a sentence or two",
            SHORT_BIO_PENALTY,
        ));
    }
    if !phrase_hits(bio, SPAM_PHRASES).is_empty() {
        found.push(issue(
            "bio",
            IssueCategory::Content,
            Severity::Medium,
            "Business description uses promotional or spam phrasing",
            "Rewrite the description in neutral language",
            PROMOTIONAL_BIO_PENALTY,
        ));
    }
    found
}

fn quality_recommendation(score: f64, issue_count: usize) -> String {
    if issue_count == 0 {
        "All contact details are well formed.".to_string()
    } else if score >= 75.0 {
        format!("{issue_count} minor data issue(s); correct before or after approval.")
    } else if score >= 60.0 {
        format!("{issue_count} data issue(s) need correction before approval.")
    } else {
        format!("Data quality is poor ({issue_count} issue(s)); verify the listing manually.")
    }
}
