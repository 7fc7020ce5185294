//! Configuration service: get, propose, validate, apply and test-mode evaluation.
//!
//! Decision logic only ever sees a [`ConfigSnapshot`]. Writes go through
//! [`ConfigProposal`], which is computed against one base version and refuses
//! to commit when that version is no longer current.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::TrustError;

use super::diff::{FieldChange, diff, merge_patch};
use super::history::{ConfigurationChange, HistoryPage, HistoryQuery, query_history};
use super::model::{ConfigMetadata, ConfigSnapshot, ConfigVersion, Configuration};
use super::validate::ensure_valid;

/// A candidate configuration computed against `base_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProposal {
    pub base_version: ConfigVersion,
    pub configuration: Configuration,
    pub changes: Vec<FieldChange>,
}

/// Merge `partial` into the current configuration and diff the result.
///
/// Unknown keys, type mismatches and a partial that changes nothing are
/// validation errors. Invariants are checked separately by [`ConfigProposal::validate`].
pub fn propose(current: &ConfigSnapshot, partial: &Value) -> Result<ConfigProposal, TrustError> {
    if !partial.is_object() {
        return Err(TrustError::validation_with(
            "configuration",
            "partial configuration must be a JSON object",
            partial.clone(),
        ));
    }

    let base = to_json(&current.configuration)?;
    let merged = merge_patch(&base, partial);
    let configuration: Configuration = serde_json::from_value(merged).map_err(|err| {
        TrustError::validation_with(
            "configuration",
            format!("invalid configuration: {err}"),
            partial.clone(),
        )
    })?;

    // Diff the typed round trip so integer/float spellings of one value compare equal.
    let changes = diff(&base, &to_json(&configuration)?);
    if changes.is_empty() {
        return Err(TrustError::validation(
            "configuration",
            "no changes: the partial configuration matches the current one",
        ));
    }

    Ok(ConfigProposal {
        base_version: current.version(),
        configuration,
        changes,
    })
}

fn to_json(configuration: &Configuration) -> Result<Value, TrustError> {
    serde_json::to_value(configuration).map_err(|err| TrustError::Computation {
        stage: "configuration".to_string(),
        message: err.to_string(),
    })
}

impl ConfigProposal {
    pub fn validate(&self) -> Result<(), TrustError> {
        ensure_valid(&self.configuration)
    }

    /// Fail with a conflict unless `current` is the version this proposal was built on.
    pub fn check_base(&self, current: ConfigVersion) -> Result<(), TrustError> {
        if self.base_version == current {
            Ok(())
        } else {
            Err(TrustError::ConcurrencyConflict {
                expected: self.base_version.to_string(),
                actual: current.to_string(),
            })
        }
    }

    /// Stamp the next patch version and build the history record.
    /// Callers must have validated the proposal.
    pub fn commit(
        self,
        actor: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(ConfigSnapshot, ConfigurationChange), TrustError> {
        let to_version = self
            .base_version
            .next_patch()
            .ok_or_else(|| TrustError::Computation {
                stage: "configuration".to_string(),
                message: format!("version {} has no next patch version", self.base_version),
            })?;
        let change = ConfigurationChange {
            id: Uuid::now_v7(),
            timestamp: now,
            actor: actor.to_string(),
            changes: self.changes,
            reason,
            applied_successfully: true,
            rollback_available: true,
            test_mode: false,
            from_version: self.base_version,
            to_version,
        };
        let snapshot = ConfigSnapshot {
            configuration: self.configuration,
            metadata: ConfigMetadata {
                version: to_version,
                last_modified: now,
                modified_by: actor.to_string(),
            },
        };
        Ok((snapshot, change))
    }
}

/// Hypothetical outcome of an update. Nothing is persisted or versioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestModeEvaluation {
    #[schema(value_type = String)]
    pub current_version: ConfigVersion,
    pub configuration: Configuration,
    pub changes: Vec<FieldChange>,
    pub critical_changes: usize,
}

pub fn evaluate_test_mode(
    current: &ConfigSnapshot,
    partial: &Value,
) -> Result<TestModeEvaluation, TrustError> {
    let proposal = propose(current, partial)?;
    proposal.validate()?;
    Ok(TestModeEvaluation {
        current_version: proposal.base_version,
        critical_changes: proposal.changes.iter().filter(|c| c.is_critical()).count(),
        configuration: proposal.configuration,
        changes: proposal.changes,
    })
}

/// Result of a successful apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppliedConfiguration {
    pub snapshot: ConfigSnapshot,
    pub change: ConfigurationChange,
}

/// One update request against the configuration service.
#[derive(Debug, Clone)]
pub struct ApplyRequest<'a> {
    pub partial: &'a Value,
    /// Version the caller read. `None` applies against whatever is current.
    pub expected_version: Option<ConfigVersion>,
    pub actor: &'a str,
    pub reason: Option<String>,
    pub now: DateTime<Utc>,
}

/// Storage-independent configuration service.
pub trait ConfigService {
    fn get(&self) -> ConfigSnapshot;

    fn propose(&self, partial: &Value) -> Result<ConfigProposal, TrustError> {
        propose(&self.get(), partial)
    }

    fn validate(&self, proposal: &ConfigProposal) -> Result<(), TrustError> {
        proposal.validate()
    }

    fn apply(&self, request: ApplyRequest<'_>) -> Result<AppliedConfiguration, TrustError>;

    fn evaluate_test_mode(&self, partial: &Value) -> Result<TestModeEvaluation, TrustError> {
        evaluate_test_mode(&self.get(), partial)
    }
}

#[derive(Debug)]
struct StoreState {
    current: ConfigSnapshot,
    history: Vec<ConfigurationChange>,
}

/// Process-local configuration store. Applies compare versions under the write lock.
#[derive(Debug)]
pub struct InMemoryConfigStore {
    state: RwLock<StoreState>,
}

impl InMemoryConfigStore {
    pub fn new(initial: ConfigSnapshot) -> Self {
        Self {
            state: RwLock::new(StoreState {
                current: initial,
                history: Vec::new(),
            }),
        }
    }

    pub fn history(&self, query: &HistoryQuery, now: DateTime<Utc>) -> HistoryPage {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        query_history(&state.history, query, now)
    }
}

impl ConfigService for InMemoryConfigStore {
    fn get(&self) -> ConfigSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn apply(&self, request: ApplyRequest<'_>) -> Result<AppliedConfiguration, TrustError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current_version = state.current.version();
        if let Some(expected) = request.expected_version
            && expected != current_version
        {
            return Err(TrustError::ConcurrencyConflict {
                expected: expected.to_string(),
                actual: current_version.to_string(),
            });
        }

        let proposal = propose(&state.current, request.partial)?;
        proposal.validate()?;
        proposal.check_base(current_version)?;
        let (snapshot, change) = proposal.commit(request.actor, request.reason, request.now)?;

        tracing::info!(
            actor = %change.actor,
            from = %change.from_version,
            to = %change.to_version,
            fields = change.changes.len(),
            "configuration applied"
        );
        state.current = snapshot.clone();
        state.history.push(change.clone());
        Ok(AppliedConfiguration { snapshot, change })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::business::fixtures::now;

    fn store() -> InMemoryConfigStore {
        InMemoryConfigStore::new(ConfigSnapshot::initial(now()))
    }

    fn request<'a>(partial: &'a Value, expected: Option<ConfigVersion>) -> ApplyRequest<'a> {
        ApplyRequest {
            partial,
            expected_version: expected,
            actor: "ana",
            reason: Some("tighten approvals".to_string()),
            now: now(),
        }
    }

    #[test]
    fn propose_lists_changed_leaves_only() {
        let current = ConfigSnapshot::initial(now());
        let proposal = propose(
            &current,
            &json!({"confidence_thresholds": {"auto_approve": 90.0, "manual_review": 75.0}}),
        )
        .unwrap();
        assert_eq!(proposal.changes.len(), 1);
        assert_eq!(proposal.changes[0].path, "confidence_thresholds.auto_approve");
        assert_eq!(proposal.changes[0].old, json!(85.0));
        assert_eq!(proposal.changes[0].new, json!(90.0));
    }

    #[test]
    fn integer_spelling_of_same_value_is_not_a_change() {
        let current = ConfigSnapshot::initial(now());
        let err = propose(&current, &json!({"confidence_thresholds": {"auto_approve": 85}}))
            .unwrap_err();
        assert!(matches!(err, TrustError::Validation { .. }));
    }

    #[test]
    fn unknown_keys_are_validation_errors() {
        let current = ConfigSnapshot::initial(now());
        let err = propose(&current, &json!({"confidence_thresholds": {"approve": 90}})).unwrap_err();
        match err {
            TrustError::Validation { field, .. } => assert_eq!(field, "configuration"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn apply_bumps_patch_and_records_history() {
        let store = store();
        let partial = json!({"confidence_thresholds": {"auto_approve": 90.0}});
        let applied = store
            .apply(request(&partial, Some(ConfigVersion::INITIAL)))
            .unwrap();
        assert_eq!(applied.snapshot.version().to_string(), "1.0.1");
        assert_eq!(applied.snapshot.metadata.modified_by, "ana");
        assert!(applied.change.rollback_available);
        assert_eq!(store.get().configuration.confidence_thresholds.auto_approve, 90.0);

        let page = store.history(&HistoryQuery::default(), now());
        assert_eq!(page.total, 1);
        assert_eq!(page.changes[0].to_version.to_string(), "1.0.1");
    }

    #[test]
    fn stale_version_conflicts_and_leaves_store_untouched() {
        let store = store();
        let first = json!({"rate_limits": {"verifications_per_minute": 30}});
        store.apply(request(&first, Some(ConfigVersion::INITIAL))).unwrap();

        let second = json!({"rate_limits": {"verifications_per_minute": 90}});
        let err = store
            .apply(request(&second, Some(ConfigVersion::INITIAL)))
            .unwrap_err();
        assert!(matches!(err, TrustError::ConcurrencyConflict { .. }));
        assert_eq!(store.get().configuration.rate_limits.verifications_per_minute, 30);
        assert_eq!(store.history(&HistoryQuery::default(), now()).total, 1);
    }

    #[test]
    fn invalid_ordering_is_rejected_without_side_effects() {
        let store = store();
        let partial = json!({"confidence_thresholds": {"manual_review": 90.0}});
        let err = store.apply(request(&partial, None)).unwrap_err();
        assert!(matches!(err, TrustError::ConfigurationInvariant { .. }));
        assert_eq!(store.get().version(), ConfigVersion::INITIAL);
        assert_eq!(store.history(&HistoryQuery::default(), now()).total, 0);
    }

    #[test]
    fn test_mode_never_versions_or_records() {
        let store = store();
        let partial = json!({"system": {"auto_approve_enabled": true}});
        let evaluation = store.evaluate_test_mode(&partial).unwrap();
        assert!(evaluation.configuration.system.auto_approve_enabled);
        assert_eq!(evaluation.critical_changes, 1);
        assert_eq!(store.get().version(), ConfigVersion::INITIAL);
        assert!(!store.get().configuration.system.auto_approve_enabled);
        assert_eq!(store.history(&HistoryQuery::default(), now()).total, 0);
    }

    #[test]
    fn commit_refuses_a_moved_base() {
        let current = ConfigSnapshot::initial(now());
        let proposal = propose(&current, &json!({"priority_weights": {"staleness": 20.0, "confidence_gap": 30.0}})).unwrap();
        assert!(proposal.check_base(ConfigVersion::INITIAL).is_ok());
        assert!(
            proposal
                .check_base(ConfigVersion::INITIAL.next_patch().unwrap())
                .is_err()
        );
    }

    #[test]
    fn commit_fails_when_patch_number_is_exhausted() {
        let mut current = ConfigSnapshot::initial(now());
        current.metadata.version = ConfigVersion {
            major: 1,
            minor: 0,
            patch: u32::MAX,
        };
        let proposal = propose(&current, &json!({"priority_weights": {"staleness": 20.0, "confidence_gap": 30.0}})).unwrap();
        let err = proposal.commit("admin-1", None, now()).unwrap_err();
        assert!(matches!(err, TrustError::Computation { .. }));
    }
}
