use crate::error::{ConfigViolation, TrustError};

use super::model::Configuration;

/// Allowed deviation of a percent partition from 100.
pub const PARTITION_TOLERANCE: f64 = 0.1;
pub const MAX_CATEGORY_OFFSET: f64 = 25.0;
pub const MAX_DUPLICATE_CANDIDATES: usize = 50;

/// Every rule the configuration breaks. Empty means valid.
pub fn violations(config: &Configuration) -> Vec<ConfigViolation> {
    let mut found = Vec::new();
    let mut violation = |field: &str, message: String| {
        found.push(ConfigViolation {
            field: field.to_string(),
            message,
        })
    };

    let thresholds = &config.confidence_thresholds;
    for (field, value) in [
        ("confidence_thresholds.auto_approve", thresholds.auto_approve),
        ("confidence_thresholds.manual_review", thresholds.manual_review),
        ("confidence_thresholds.auto_reject", thresholds.auto_reject),
    ] {
        if !(0.0..=100.0).contains(&value) {
            violation(field, format!("must be between 0 and 100, got {value}"));
        }
    }
    if thresholds.auto_approve <= thresholds.manual_review {
        violation(
            "confidence_thresholds.auto_approve",
            format!(
                "must be greater than manual_review ({} <= {})",
                thresholds.auto_approve, thresholds.manual_review
            ),
        );
    }
    if thresholds.manual_review <= thresholds.auto_reject {
        violation(
            "confidence_thresholds.manual_review",
            format!(
                "must be greater than auto_reject ({} <= {})",
                thresholds.manual_review, thresholds.auto_reject
            ),
        );
    }

    let weights = &config.confidence_weights;
    let confidence_parts = [
        ("confidence_weights.completeness", weights.completeness),
        ("confidence_weights.data_quality", weights.data_quality),
        ("confidence_weights.legitimacy", weights.legitimacy),
        ("confidence_weights.content_moderation", weights.content_moderation),
        ("confidence_weights.duplicates", weights.duplicates),
    ];
    check_partition("confidence_weights", &confidence_parts, &mut violation);

    let priority = &config.priority_weights;
    let priority_parts = [
        ("priority_weights.confidence_gap", priority.confidence_gap),
        ("priority_weights.risk_factors", priority.risk_factors),
        ("priority_weights.duplicate_pressure", priority.duplicate_pressure),
        ("priority_weights.staleness", priority.staleness),
    ];
    check_partition("priority_weights", &priority_parts, &mut violation);

    let duplicates = &config.duplicate_matching;
    if duplicates.merge_threshold > 100 {
        violation(
            "duplicate_matching.merge_threshold",
            format!("must be at most 100, got {}", duplicates.merge_threshold),
        );
    }
    if duplicates.merge_threshold <= duplicates.mark_duplicate_threshold {
        violation(
            "duplicate_matching.merge_threshold",
            format!(
                "must be greater than mark_duplicate_threshold ({} <= {})",
                duplicates.merge_threshold, duplicates.mark_duplicate_threshold
            ),
        );
    }
    if !(1..=MAX_DUPLICATE_CANDIDATES).contains(&duplicates.max_candidates) {
        violation(
            "duplicate_matching.max_candidates",
            format!(
                "must be between 1 and {MAX_DUPLICATE_CANDIDATES}, got {}",
                duplicates.max_candidates
            ),
        );
    }

    if config.rate_limits.verifications_per_minute == 0 {
        violation(
            "rate_limits.verifications_per_minute",
            "must be greater than 0".to_string(),
        );
    }
    if config.rate_limits.config_updates_per_hour == 0 {
        violation(
            "rate_limits.config_updates_per_hour",
            "must be greater than 0".to_string(),
        );
    }

    for (category, adjustment) in &config.category_adjustments {
        let field = format!("category_adjustments.{category}");
        let well_formed = !category.is_empty()
            && category
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !well_formed {
            violation(
                &field,
                "category keys must be lowercase letters, digits, '_' or '-'".to_string(),
            );
        }
        if !adjustment.threshold_offset.is_finite()
            || adjustment.threshold_offset.abs() > MAX_CATEGORY_OFFSET
        {
            violation(
                &format!("{field}.threshold_offset"),
                format!(
                    "must be within ±{MAX_CATEGORY_OFFSET}, got {}",
                    adjustment.threshold_offset
                ),
            );
        }
    }

    found
}

fn check_partition(
    section: &str,
    parts: &[(&str, f64)],
    violation: &mut impl FnMut(&str, String),
) {
    for (field, value) in parts {
        if !value.is_finite() || *value < 0.0 {
            violation(field, format!("must be a non-negative number, got {value}"));
        }
    }
    let total: f64 = parts.iter().map(|(_, value)| value).sum();
    if (total - 100.0).abs() > PARTITION_TOLERANCE {
        violation(section, format!("weights must sum to 100, got {total}"));
    }
}

pub fn ensure_valid(config: &Configuration) -> Result<(), TrustError> {
    let violations = violations(config);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(TrustError::ConfigurationInvariant { violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::CategoryAdjustment;

    #[test]
    fn defaults_are_valid() {
        assert!(violations(&Configuration::default()).is_empty());
    }

    #[test]
    fn threshold_ordering_is_enforced() {
        let mut config = Configuration::default();
        config.confidence_thresholds.auto_approve = 75.0;
        let found = violations(&config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "confidence_thresholds.auto_approve");

        let mut config = Configuration::default();
        config.confidence_thresholds.auto_reject = 80.0;
        let found = violations(&config);
        assert_eq!(found[0].field, "confidence_thresholds.manual_review");
    }

    #[test]
    fn partition_tolerance_is_a_tenth() {
        let mut config = Configuration::default();
        config.confidence_weights.legitimacy = 30.1;
        assert!(violations(&config).is_empty());

        config.confidence_weights.legitimacy = 30.2;
        let found = violations(&config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "confidence_weights");
    }

    #[test]
    fn negative_weight_is_rejected_even_if_sum_holds() {
        let mut config = Configuration::default();
        config.priority_weights.staleness = -10.0;
        config.priority_weights.confidence_gap = 60.0;
        let found = violations(&config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "priority_weights.staleness");
    }

    #[test]
    fn category_keys_and_offsets_are_checked() {
        let mut config = Configuration::default();
        config.category_adjustments.insert(
            "Food.Trucks".to_string(),
            CategoryAdjustment {
                threshold_offset: 40.0,
            },
        );
        let fields: Vec<_> = violations(&config).into_iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            vec![
                "category_adjustments.Food.Trucks",
                "category_adjustments.Food.Trucks.threshold_offset"
            ]
        );
    }

    #[test]
    fn ensure_valid_wraps_violations() {
        let mut config = Configuration::default();
        config.duplicate_matching.mark_duplicate_threshold = 90;
        match ensure_valid(&config) {
            Err(TrustError::ConfigurationInvariant { violations }) => {
                assert_eq!(violations[0].field, "duplicate_matching.merge_threshold");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
