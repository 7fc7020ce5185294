use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::TrustError;

use super::diff::FieldChange;
use super::model::ConfigVersion;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Immutable record of one applied configuration update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfigurationChange {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    /// Field-level diff in path order
    pub changes: Vec<FieldChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub applied_successfully: bool,
    pub rollback_available: bool,
    pub test_mode: bool,
    #[schema(value_type = String, example = "1.0.3")]
    pub from_version: ConfigVersion,
    #[schema(value_type = String, example = "1.0.4")]
    pub to_version: ConfigVersion,
}

impl ConfigurationChange {
    pub fn is_critical(&self) -> bool {
        self.changes.iter().any(FieldChange::is_critical)
    }

    pub fn touches_category(&self, category: &str) -> bool {
        self.changes.iter().any(|c| c.category() == category)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    /// Top-level configuration section, e.g. "confidence_thresholds"
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub include_test_mode: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            actor: None,
            from: None,
            to: None,
            category: None,
            include_test_mode: false,
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
        }
    }
}

impl HistoryQuery {
    pub fn validate(&self) -> Result<(), TrustError> {
        if !(1..=MAX_HISTORY_LIMIT).contains(&self.limit) {
            return Err(TrustError::validation_with(
                "limit",
                format!("limit must be between 1 and {MAX_HISTORY_LIMIT}"),
                serde_json::json!(self.limit),
            ));
        }
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(TrustError::validation(
                "from",
                "from must not be later than to",
            ));
        }
        Ok(())
    }

    pub fn matches(&self, change: &ConfigurationChange) -> bool {
        if change.test_mode && !self.include_test_mode {
            return false;
        }
        if let Some(actor) = &self.actor
            && &change.actor != actor
        {
            return false;
        }
        if self.from.is_some_and(|from| change.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| change.timestamp > to) {
            return false;
        }
        match &self.category {
            Some(category) => change.touches_category(category),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentActivity {
    pub last_24h: usize,
    pub last_7d: usize,
    pub last_30d: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryStats {
    pub total_changes: usize,
    /// Records touching thresholds, confidence weights or automation toggles
    pub critical_changes: usize,
    pub unique_actors: usize,
    pub recent: RecentActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryPage {
    pub changes: Vec<ConfigurationChange>,
    pub total: usize,
    pub has_more: bool,
    pub stats: HistoryStats,
}

/// Filter, order newest first and paginate. Stats cover every matching record.
pub fn query_history(
    records: &[ConfigurationChange],
    query: &HistoryQuery,
    now: DateTime<Utc>,
) -> HistoryPage {
    let mut matching: Vec<&ConfigurationChange> =
        records.iter().filter(|c| query.matches(c)).collect();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.to_version.cmp(&a.to_version)));

    let stats = history_stats(&matching, now);
    let total = matching.len();
    let changes: Vec<ConfigurationChange> = matching
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .cloned()
        .collect();
    let has_more = query.offset + changes.len() < total;

    HistoryPage {
        changes,
        total,
        has_more,
        stats,
    }
}

fn history_stats(records: &[&ConfigurationChange], now: DateTime<Utc>) -> HistoryStats {
    let within = |days: i64| {
        records
            .iter()
            .filter(|c| c.timestamp > now - Duration::days(days))
            .count()
    };
    HistoryStats {
        total_changes: records.len(),
        critical_changes: records.iter().filter(|c| c.is_critical()).count(),
        unique_actors: records
            .iter()
            .map(|c| c.actor.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        recent: RecentActivity {
            last_24h: within(1),
            last_7d: within(7),
            last_30d: within(30),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn change(actor: &str, hours_ago: i64, path: &str, patch: u32) -> ConfigurationChange {
        ConfigurationChange {
            id: Uuid::now_v7(),
            timestamp: now() - Duration::hours(hours_ago),
            actor: actor.to_string(),
            changes: vec![FieldChange {
                path: path.to_string(),
                old: json!(1),
                new: json!(2),
            }],
            reason: None,
            applied_successfully: true,
            rollback_available: true,
            test_mode: false,
            from_version: ConfigVersion {
                patch: patch - 1,
                ..ConfigVersion::INITIAL
            },
            to_version: ConfigVersion {
                patch,
                ..ConfigVersion::INITIAL
            },
        }
    }

    fn records() -> Vec<ConfigurationChange> {
        vec![
            change("ana", 24 * 20, "rate_limits.verifications_per_minute", 1),
            change("ana", 24 * 3, "confidence_thresholds.auto_approve", 2),
            change("sam", 2, "duplicate_matching.phone_weight", 3),
        ]
    }

    #[test]
    fn newest_first_with_stats() {
        let page = query_history(&records(), &HistoryQuery::default(), now());
        let versions: Vec<String> = page.changes.iter().map(|c| c.to_version.to_string()).collect();
        assert_eq!(versions, vec!["1.0.3", "1.0.2", "1.0.1"]);
        assert_eq!(page.total, 3);
        assert!(!page.has_more);
        assert_eq!(
            page.stats,
            HistoryStats {
                total_changes: 3,
                critical_changes: 1,
                unique_actors: 2,
                recent: RecentActivity {
                    last_24h: 1,
                    last_7d: 2,
                    last_30d: 3,
                },
            }
        );
    }

    #[test]
    fn filters_by_actor_and_category() {
        let query = HistoryQuery {
            actor: Some("ana".to_string()),
            category: Some("confidence_thresholds".to_string()),
            ..HistoryQuery::default()
        };
        let page = query_history(&records(), &query, now());
        assert_eq!(page.total, 1);
        assert_eq!(page.changes[0].to_version.to_string(), "1.0.2");
    }

    #[test]
    fn paginates_and_reports_more() {
        let query = HistoryQuery {
            limit: 2,
            ..HistoryQuery::default()
        };
        let page = query_history(&records(), &query, now());
        assert_eq!(page.changes.len(), 2);
        assert!(page.has_more);

        let query = HistoryQuery {
            limit: 2,
            offset: 2,
            ..HistoryQuery::default()
        };
        let page = query_history(&records(), &query, now());
        assert_eq!(page.changes.len(), 1);
        assert!(!page.has_more);
    }

    #[test]
    fn test_mode_records_are_hidden_by_default() {
        let mut all = records();
        all[0].test_mode = true;
        assert_eq!(query_history(&all, &HistoryQuery::default(), now()).total, 2);
        let query = HistoryQuery {
            include_test_mode: true,
            ..HistoryQuery::default()
        };
        assert_eq!(query_history(&all, &query, now()).total, 3);
    }

    #[test]
    fn date_range_is_validated() {
        let query = HistoryQuery {
            from: Some(now()),
            to: Some(now() - Duration::days(1)),
            ..HistoryQuery::default()
        };
        assert!(query.validate().is_err());
        let query = HistoryQuery {
            limit: 0,
            ..HistoryQuery::default()
        };
        assert!(query.validate().is_err());
    }
}
