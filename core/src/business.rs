use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Upper bound on public content items attached to one evaluation snapshot.
pub const MAX_CONTENT_ITEMS: usize = 20;

/// Immutable snapshot of a business listing as submitted for verification.
/// The record is owned by the listing store; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BusinessRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub suburb: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Australian Business Number (tax id)
    #[serde(default)]
    pub abn: Option<String>,
    /// Set once the ABN has been confirmed against the public register
    #[serde(default)]
    pub abn_verified: bool,
    #[serde(default)]
    pub geocode: Option<Geocode>,
    pub source: RecordSource,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub owner_verified: bool,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub activity: ActivityCounters,
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Geocode {
    pub lat: f64,
    pub lng: f64,
}

/// How the listing entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Manual,
    SelfService,
    BulkImport,
}

impl RecordSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordSource::Manual => "manual",
            RecordSource::SelfService => "self_service",
            RecordSource::BulkImport => "bulk_import",
        }
    }

    pub fn from_db_value(value: &str) -> Self {
        match value {
            "bulk_import" => RecordSource::BulkImport,
            "self_service" => RecordSource::SelfService,
            _ => RecordSource::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
    Duplicate,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
            ListingStatus::ChangesRequested => "changes_requested",
            ListingStatus::Duplicate => "duplicate",
        }
    }

    pub fn from_db_value(value: &str) -> Self {
        match value {
            "approved" => ListingStatus::Approved,
            "rejected" => ListingStatus::Rejected,
            "changes_requested" => ListingStatus::ChangesRequested,
            "duplicate" => ListingStatus::Duplicate,
            _ => ListingStatus::Pending,
        }
    }
}

/// Enquiry counters over the recent activity window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActivityCounters {
    pub recent_inquiries: u32,
    pub recent_leads: u32,
}

impl ActivityCounters {
    pub fn has_recent_activity(&self) -> bool {
        self.recent_inquiries > 0 || self.recent_leads > 0
    }
}

/// A public content item (review, post, photo caption) attached to the listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: String,
    pub text: String,
}

impl BusinessRecord {
    /// Days since the listing was created, never negative.
    pub fn listed_days(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_days().max(0)
    }
}

/// Returns the trimmed value when the field holds something other than whitespace.
pub fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    /// A fully complete, well-formed listing with recent leads.
    pub fn complete_record() -> BusinessRecord {
        BusinessRecord {
            id: Uuid::parse_str("0b5c1f8e-3a52-4d0e-9d6b-2f1c9e7a4b10").unwrap(),
            name: "Brewhouse Coffee".to_string(),
            phone: Some("(02) 9555 1234".to_string()),
            email: Some("hello@brewhousecoffee.com.au".to_string()),
            website: Some("https://www.brewhousecoffee.com.au".to_string()),
            address: Some("12 King Street".to_string()),
            suburb: Some("Newtown".to_string()),
            category: Some("cafe".to_string()),
            bio: Some(
                "Specialty coffee roasted on site, with breakfast and lunch served daily \
                 from our kitchen on King Street."
                    .to_string(),
            ),
            abn: Some("51 824 753 556".to_string()),
            abn_verified: true,
            geocode: Some(Geocode {
                lat: -33.8974,
                lng: 151.1794,
            }),
            source: RecordSource::SelfService,
            owner_id: Some(Uuid::parse_str("7d2a4c11-0f3b-4e58-8a61-93b5d2c0e6f4").unwrap()),
            owner_verified: true,
            status: ListingStatus::Pending,
            created_at: now() - Duration::days(30),
            activity: ActivityCounters {
                recent_inquiries: 2,
                recent_leads: 1,
            },
            content_items: vec![ContentItem {
                id: Uuid::parse_str("c4e8a1d2-5b7f-4c3e-9a0d-1e2f3a4b5c6d").unwrap(),
                kind: "review".to_string(),
                text: "Great flat white and friendly staff.".to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::fixtures::{complete_record, now};
    use super::*;

    #[test]
    fn present_ignores_blank_values() {
        assert_eq!(present(&Some("  ".to_string())), None);
        assert_eq!(present(&None), None);
        assert_eq!(present(&Some(" Newtown ".to_string())), Some("Newtown"));
    }

    #[test]
    fn listed_days_is_never_negative() {
        let mut record = complete_record();
        record.created_at = now() + Duration::days(3);
        assert_eq!(record.listed_days(now()), 0);
    }

    #[test]
    fn status_round_trips_through_db_value() {
        for status in [
            ListingStatus::Pending,
            ListingStatus::Approved,
            ListingStatus::Rejected,
            ListingStatus::ChangesRequested,
            ListingStatus::Duplicate,
        ] {
            assert_eq!(ListingStatus::from_db_value(status.as_str()), status);
        }
    }
}
