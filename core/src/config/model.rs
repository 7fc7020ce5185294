use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Thresholds and weights that drive verification decisions.
///
/// A configuration is an immutable value: updates produce a new snapshot and
/// an explicit field-level diff, never an in-place edit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    pub system: SystemToggles,
    pub confidence_thresholds: ConfidenceThresholds,
    /// Per-category threshold offsets, keyed by listing category
    #[serde(default)]
    pub category_adjustments: BTreeMap<String, CategoryAdjustment>,
    pub confidence_weights: ConfidenceWeights,
    pub priority_weights: PriorityWeights,
    pub duplicate_matching: DuplicateMatching,
    pub rate_limits: RateLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SystemToggles {
    pub auto_approve_enabled: bool,
    pub auto_reject_enabled: bool,
    pub duplicate_detection_enabled: bool,
    pub content_moderation_enabled: bool,
}

impl Default for SystemToggles {
    fn default() -> Self {
        Self {
            auto_approve_enabled: false,
            auto_reject_enabled: false,
            duplicate_detection_enabled: true,
            content_moderation_enabled: true,
        }
    }
}

/// Must satisfy `auto_approve > manual_review > auto_reject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceThresholds {
    pub auto_approve: f64,
    /// Confidence below this always goes to manual review
    pub manual_review: f64,
    pub auto_reject: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            auto_approve: 85.0,
            manual_review: 75.0,
            auto_reject: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CategoryAdjustment {
    /// Added to the manual-review threshold for listings in this category
    pub threshold_offset: f64,
}

/// Percent partition over the confidence terms; must sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceWeights {
    pub completeness: f64,
    pub data_quality: f64,
    pub legitimacy: f64,
    pub content_moderation: f64,
    pub duplicates: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            completeness: 25.0,
            data_quality: 25.0,
            legitimacy: 30.0,
            content_moderation: 15.0,
            duplicates: 5.0,
        }
    }
}

impl ConfidenceWeights {
    pub fn total(&self) -> f64 {
        self.completeness
            + self.data_quality
            + self.legitimacy
            + self.content_moderation
            + self.duplicates
    }
}

/// Percent partition over the review-priority signals; must sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PriorityWeights {
    pub confidence_gap: f64,
    pub risk_factors: f64,
    pub duplicate_pressure: f64,
    pub staleness: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            confidence_gap: 40.0,
            risk_factors: 30.0,
            duplicate_pressure: 20.0,
            staleness: 10.0,
        }
    }
}

impl PriorityWeights {
    pub fn total(&self) -> f64 {
        self.confidence_gap + self.risk_factors + self.duplicate_pressure + self.staleness
    }
}

/// Per-field match weights and tier boundaries for duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DuplicateMatching {
    pub name_weight: u32,
    pub suburb_weight: u32,
    pub phone_weight: u32,
    pub email_weight: u32,
    pub website_weight: u32,
    pub abn_weight: u32,
    pub merge_threshold: u32,
    pub mark_duplicate_threshold: u32,
    /// Upper bound on candidates fetched and reported per evaluation
    pub max_candidates: usize,
}

impl Default for DuplicateMatching {
    fn default() -> Self {
        Self {
            name_weight: 30,
            suburb_weight: 10,
            phone_weight: 25,
            email_weight: 25,
            website_weight: 20,
            abn_weight: 35,
            merge_threshold: 80,
            mark_duplicate_threshold: 60,
            max_candidates: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RateLimits {
    pub verifications_per_minute: u32,
    pub config_updates_per_hour: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            verifications_per_minute: 60,
            config_updates_per_hour: 20,
        }
    }
}

impl Configuration {
    /// Threshold for a listing in `category` when the request gives no override.
    pub fn threshold_for_category(&self, category: Option<&str>) -> f64 {
        let offset = category
            .map(|c| c.trim().to_lowercase())
            .and_then(|c| self.category_adjustments.get(&c))
            .map(|adjustment| adjustment.threshold_offset)
            .unwrap_or(0.0);
        (self.confidence_thresholds.manual_review + offset).clamp(0.0, 100.0)
    }
}

/// Semantic version of the active configuration. Every applied change bumps the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ConfigVersion {
    pub const INITIAL: ConfigVersion = ConfigVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// The following patch version, or `None` once the patch number is exhausted.
    pub fn next_patch(self) -> Option<Self> {
        Some(Self {
            patch: self.patch.checked_add(1)?,
            ..self
        })
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ConfigVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(format!("'{s}' is not a major.minor.patch version"));
        };
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| format!("'{s}' is not a major.minor.patch version"))
        };
        Ok(Self {
            major: parse(*major)?,
            minor: parse(*minor)?,
            patch: parse(*patch)?,
        })
    }
}

impl TryFrom<String> for ConfigVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigVersion> for String {
    fn from(version: ConfigVersion) -> Self {
        version.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfigMetadata {
    #[schema(value_type = String, example = "1.0.4")]
    pub version: ConfigVersion,
    pub last_modified: DateTime<Utc>,
    pub modified_by: String,
}

/// The current configuration together with its version metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfigSnapshot {
    pub configuration: Configuration,
    pub metadata: ConfigMetadata,
}

impl ConfigSnapshot {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            configuration: Configuration::default(),
            metadata: ConfigMetadata {
                version: ConfigVersion::INITIAL,
                last_modified: now,
                modified_by: "system".to_string(),
            },
        }
    }

    pub fn version(&self) -> ConfigVersion {
        self.metadata.version
    }
}
