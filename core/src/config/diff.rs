//! Field-level diffing and merge-patch application over configuration JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Sections whose changes alter decisions directly.
const CRITICAL_PREFIXES: &[&str] = &[
    "confidence_thresholds.",
    "confidence_weights.",
    "system.auto_approve_enabled",
    "system.auto_reject_enabled",
];

/// One changed leaf. `Null` on either side means the key was absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldChange {
    /// Dotted path, e.g. "confidence_thresholds.auto_approve"
    pub path: String,
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    /// Top-level section the change belongs to.
    pub fn category(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }

    pub fn is_critical(&self) -> bool {
        CRITICAL_PREFIXES
            .iter()
            .any(|prefix| self.path.starts_with(prefix))
    }
}

/// Every leaf that differs between `base` and `target`, in key order.
/// Objects present on both sides are walked recursively; an object added or
/// removed as a whole is reported as one change at its own path.
pub fn diff(base: &Value, target: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    diff_into(&mut Vec::new(), base, target, &mut changes);
    changes
}

fn diff_into(path: &mut Vec<String>, base: &Value, target: &Value, out: &mut Vec<FieldChange>) {
    match (base, target) {
        (Value::Object(old), Value::Object(new)) => {
            let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                path.push(key.clone());
                diff_into(
                    path,
                    old.get(key).unwrap_or(&Value::Null),
                    new.get(key).unwrap_or(&Value::Null),
                    out,
                );
                path.pop();
            }
        }
        (old, new) if old == new => {}
        (old, new) => out.push(FieldChange {
            path: path.join("."),
            old: old.clone(),
            new: new.clone(),
        }),
    }
}

/// Replay `changes` on top of `base`. A `Null` new value removes the key.
pub fn apply_changes(base: &Value, changes: &[FieldChange]) -> Value {
    let mut result = base.clone();
    for change in changes {
        let segments: Vec<&str> = change.path.split('.').collect();
        set_path(&mut result, &segments, &change.new);
    }
    result
}

fn set_path(target: &mut Value, segments: &[&str], value: &Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };
    if rest.is_empty() {
        if value.is_null() {
            map.remove(*head);
        } else {
            map.insert((*head).to_string(), value.clone());
        }
        return;
    }
    let child = map
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    set_path(child, rest, value);
}

/// JSON merge patch: objects merge recursively, `null` deletes, anything else replaces.
pub fn merge_patch(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    merged.remove(key);
                    continue;
                }
                let next = match merged.get(key) {
                    Some(existing) => merge_patch(existing, patch_value),
                    None => merge_patch(&Value::Null, patch_value),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, Value::Object(_)) => merge_patch(&Value::Object(Map::new()), patch),
        (_, other) => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn diff_reports_only_changed_leaves() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": true});
        let target = json!({"a": {"x": 1, "y": 3}, "b": true});
        assert_eq!(
            diff(&base, &target),
            vec![FieldChange {
                path: "a.y".to_string(),
                old: json!(2),
                new: json!(3),
            }]
        );
        assert!(diff(&base, &base).is_empty());
    }

    #[test]
    fn added_and_removed_keys_use_null() {
        let base = json!({"category_adjustments": {"cafe": {"threshold_offset": 5.0}}});
        let target = json!({"category_adjustments": {"florist": {"threshold_offset": -2.0}}});
        let changes = diff(&base, &target);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "category_adjustments.cafe");
        assert_eq!(changes[0].new, Value::Null);
        assert_eq!(changes[1].path, "category_adjustments.florist");
        assert_eq!(changes[1].old, Value::Null);
        assert_eq!(changes[1].new, json!({"threshold_offset": -2.0}));
        assert_eq!(apply_changes(&base, &changes), target);

        let emptied = json!({"category_adjustments": {}});
        let changes = diff(&base, &emptied);
        assert_eq!(apply_changes(&base, &changes), emptied);
    }

    #[test]
    fn merge_patch_deletes_on_null_and_merges_objects() {
        let base = json!({"a": {"x": 1, "y": 2}, "m": {"k": 1}});
        let patch = json!({"a": {"y": 5}, "m": {"k": null}});
        assert_eq!(merge_patch(&base, &patch), json!({"a": {"x": 1, "y": 5}, "m": {}}));
    }

    #[test]
    fn critical_paths_and_categories() {
        let change = FieldChange {
            path: "confidence_thresholds.auto_approve".to_string(),
            old: json!(85.0),
            new: json!(90.0),
        };
        assert!(change.is_critical());
        assert_eq!(change.category(), "confidence_thresholds");

        let change = FieldChange {
            path: "rate_limits.verifications_per_minute".to_string(),
            old: json!(60),
            new: json!(30),
        };
        assert!(!change.is_critical());
    }
}
