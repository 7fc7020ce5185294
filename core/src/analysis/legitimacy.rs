use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::business::{BusinessRecord, RecordSource, present};
use crate::normalize::{email_domain, is_valid_abn, name_key, website_host};

use super::{Contribution, Severity, settle_score};

pub const WEBSITE_MISMATCH_PENALTY: f64 = 15.0;
pub const MISSING_GEOCODE_PENALTY: f64 = 10.0;
pub const DOMAIN_MATCH_BONUS: f64 = 5.0;
pub const UNCLAIMED_IMPORT_PENALTY: f64 = 5.0;
pub const ENGAGEMENT_BONUS: f64 = 10.0;
pub const INACTIVITY_PENALTY: f64 = 8.0;
/// Listings older than this with no enquiries are treated as dormant.
pub const INACTIVITY_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaxIdVerification {
    Verified,
    FormatValid,
    Invalid,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContactVerification {
    DomainMatched,
    Provided,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebsiteVerification {
    Verified,
    Mismatch,
    NotProvided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationVerification {
    Geocoded,
    AddressOnly,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LegitimacyFactors {
    pub tax_id: TaxIdVerification,
    pub contact: ContactVerification,
    pub website: WebsiteVerification,
    pub location: LocationVerification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LegitimacyFlagKind {
    PossibleFakeWebsite,
    DuplicateListingRisk,
    NoRecentInteraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LegitimacyFlag {
    pub kind: LegitimacyFlagKind,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LegitimacyAnalysis {
    pub score: f64,
    pub factors: LegitimacyFactors,
    pub flags: Vec<LegitimacyFlag>,
    pub contributions: Vec<Contribution>,
    pub recommendation: String,
}

impl LegitimacyAnalysis {
    pub fn has_high_severity_flag(&self) -> bool {
        self.flags.iter().any(|flag| flag.severity == Severity::High)
    }
}

pub fn analyze_legitimacy(record: &BusinessRecord, now: DateTime<Utc>) -> LegitimacyAnalysis {
    let mut contributions = Vec::new();
    let mut flags = Vec::new();

    let website = match present(&record.website) {
        None => WebsiteVerification::NotProvided,
        Some(site) => {
            let key = name_key(&record.name);
            let site_key: String = site
                .to_lowercase()
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect();
            if !key.is_empty() && site_key.contains(&key) {
                WebsiteVerification::Verified
            } else {
                flags.push(LegitimacyFlag {
                    kind: LegitimacyFlagKind::PossibleFakeWebsite,
                    severity: Severity::High,
                    description: "Possible fake website: the domain does not reference the business name"
                        .to_string(),
                });
                contributions.push(Contribution::new(
                    "website does not match business name",
                    -WEBSITE_MISMATCH_PENALTY,
                ));
                WebsiteVerification::Mismatch
            }
        }
    };

    let location = match (present(&record.address), record.geocode) {
        (_, Some(_)) => LocationVerification::Geocoded,
        (Some(_), None) => {
            contributions.push(Contribution::new(
                "street address has no geocode",
                -MISSING_GEOCODE_PENALTY,
            ));
            LocationVerification::AddressOnly
        }
        (None, None) => LocationVerification::Missing,
    };

    let mail_domain = present(&record.email).and_then(email_domain);
    let site_host = present(&record.website).and_then(website_host);
    let contact = match (&mail_domain, &site_host) {
        (Some(domain), Some(host)) if domain == host => {
            contributions.push(Contribution::new(
                "email domain matches website",
                DOMAIN_MATCH_BONUS,
            ));
            ContactVerification::DomainMatched
        }
        _ if mail_domain.is_some() || present(&record.phone).is_some() => {
            ContactVerification::Provided
        }
        _ => ContactVerification::Missing,
    };

    if record.source == RecordSource::BulkImport && !record.owner_verified {
        flags.push(LegitimacyFlag {
            kind: LegitimacyFlagKind::DuplicateListingRisk,
            severity: Severity::Medium,
            description: "Possible duplicate-listing risk: bulk-imported with no verified owner"
                .to_string(),
        });
        contributions.push(Contribution::new(
            "bulk import without verified owner",
            -UNCLAIMED_IMPORT_PENALTY,
        ));
    }

    if record.activity.has_recent_activity() {
        contributions.push(Contribution::new(
            "recent inquiries or leads",
            ENGAGEMENT_BONUS,
        ));
    } else if record.listed_days(now) > INACTIVITY_DAYS {
        flags.push(LegitimacyFlag {
            kind: LegitimacyFlagKind::NoRecentInteraction,
            severity: Severity::Low,
            description: format!(
                "No recent interaction: no inquiries or leads and listed over {INACTIVITY_DAYS} days"
            ),
        });
        contributions.push(Contribution::new(
            "no recent interaction",
            -INACTIVITY_PENALTY,
        ));
    }

    let tax_id = match present(&record.abn) {
        None => TaxIdVerification::Missing,
        Some(abn) if !is_valid_abn(abn) => TaxIdVerification::Invalid,
        Some(_) if record.abn_verified => TaxIdVerification::Verified,
        Some(_) => TaxIdVerification::FormatValid,
    };

    let score = settle_score(100.0, &contributions);
    LegitimacyAnalysis {
        score,
        factors: LegitimacyFactors {
            tax_id,
            contact,
            website,
            location,
        },
        recommendation: legitimacy_recommendation(score, &flags),
        flags,
        contributions,
    }
}

fn legitimacy_recommendation(score: f64, flags: &[LegitimacyFlag]) -> String {
    if flags.iter().any(|flag| flag.severity == Severity::High) {
        "High-severity legitimacy concern; verify the business identity before approval."
            .to_string()
    } else if score >= 85.0 {
        "Business appears legitimate.".to_string()
    } else if score >= 70.0 {
        "Business appears legitimate with minor gaps.".to_string()
    } else {
        "Legitimacy signals are weak; confirm ownership and location.".to_string()
    }
}
