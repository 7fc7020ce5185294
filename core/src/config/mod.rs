//! Versioned configuration for thresholds and weights.

pub mod diff;
pub mod history;
pub mod model;
pub mod store;
pub mod validate;

pub use diff::{FieldChange, apply_changes, diff, merge_patch};
pub use history::{
    ConfigurationChange, HistoryPage, HistoryQuery, HistoryStats, RecentActivity, query_history,
};
pub use model::{
    CategoryAdjustment, ConfidenceThresholds, ConfidenceWeights, ConfigMetadata, ConfigSnapshot,
    ConfigVersion, Configuration, DuplicateMatching, PriorityWeights, RateLimits, SystemToggles,
};
pub use store::{
    AppliedConfiguration, ApplyRequest, ConfigProposal, ConfigService, InMemoryConfigStore,
    TestModeEvaluation, evaluate_test_mode, propose,
};
pub use validate::{ensure_valid, violations};
