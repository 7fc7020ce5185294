use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::business::{BusinessRecord, present};

use super::clamp_score;

/// Points shared by the required fields when all are present.
pub const REQUIRED_FIELDS_TOTAL: f64 = 75.0;
/// Points shared by the optional fields when all are present.
pub const OPTIONAL_FIELDS_TOTAL: f64 = 25.0;

pub const REQUIRED_FIELDS: &[ListingField] = &[
    ListingField::Name,
    ListingField::Phone,
    ListingField::Email,
    ListingField::Address,
    ListingField::Suburb,
    ListingField::Category,
];

pub const OPTIONAL_FIELDS: &[ListingField] = &[
    ListingField::Website,
    ListingField::Bio,
    ListingField::Abn,
    ListingField::Geocode,
    ListingField::PublicContent,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingField {
    Name,
    Phone,
    Email,
    Address,
    Suburb,
    Category,
    Website,
    Bio,
    Abn,
    Geocode,
    PublicContent,
}

impl ListingField {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingField::Name => "name",
            ListingField::Phone => "phone",
            ListingField::Email => "email",
            ListingField::Address => "address",
            ListingField::Suburb => "suburb",
            ListingField::Category => "category",
            ListingField::Website => "website",
            ListingField::Bio => "bio",
            ListingField::Abn => "abn",
            ListingField::Geocode => "geocode",
            ListingField::PublicContent => "public_content",
        }
    }

    pub fn is_present(self, record: &BusinessRecord) -> bool {
        match self {
            ListingField::Name => !record.name.trim().is_empty(),
            ListingField::Phone => present(&record.phone).is_some(),
            ListingField::Email => present(&record.email).is_some(),
            ListingField::Address => present(&record.address).is_some(),
            ListingField::Suburb => present(&record.suburb).is_some(),
            ListingField::Category => present(&record.category).is_some(),
            ListingField::Website => present(&record.website).is_some(),
            ListingField::Bio => present(&record.bio).is_some(),
            ListingField::Abn => present(&record.abn).is_some(),
            ListingField::Geocode => record.geocode.is_some(),
            ListingField::PublicContent => record
                .content_items
                .iter()
                .any(|item| !item.text.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletenessAnalysis {
    pub score: f64,
    pub present_required: Vec<ListingField>,
    pub missing_required: Vec<ListingField>,
    pub present_optional: Vec<ListingField>,
    pub missing_optional: Vec<ListingField>,
    pub recommendation: String,
}

pub fn analyze_completeness(record: &BusinessRecord) -> CompletenessAnalysis {
    let (present_required, missing_required): (Vec<_>, Vec<_>) = REQUIRED_FIELDS
        .iter()
        .copied()
        .partition(|field| field.is_present(record));
    let (present_optional, missing_optional): (Vec<_>, Vec<_>) = OPTIONAL_FIELDS
        .iter()
        .copied()
        .partition(|field| field.is_present(record));

    let required_points = REQUIRED_FIELDS_TOTAL / REQUIRED_FIELDS.len() as f64;
    let optional_points = OPTIONAL_FIELDS_TOTAL / OPTIONAL_FIELDS.len() as f64;
    let score = clamp_score(
        present_required.len() as f64 * required_points
            + present_optional.len() as f64 * optional_points,
    );

    CompletenessAnalysis {
        score,
        recommendation: completeness_recommendation(score).to_string(),
        present_required,
        missing_required,
        present_optional,
        missing_optional,
    }
}

fn completeness_recommendation(score: f64) -> &'static str {
    if score >= 90.0 {
        "Profile is comprehensive."
    } else if score >= 75.0 {
        "Required details are complete; optional details would strengthen the listing."
    } else if score >= 60.0 {
        "Several fields are missing; request the missing details from the owner."
    } else {
        "Profile is incomplete; collect the required fields before approval."
    }
}
