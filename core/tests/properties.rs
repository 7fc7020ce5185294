// Property-based tests for the trust engine and configuration store.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::{DateTime, Duration, TimeZone, Utc};
use listing_trust_core::aggregate::{ConfidenceInputs, aggregate};
use listing_trust_core::analysis::completeness::{OPTIONAL_FIELDS, REQUIRED_FIELDS};
use listing_trust_core::analysis::{
    analyze_completeness, analyze_content, analyze_legitimacy, analyze_quality,
};
use listing_trust_core::business::{
    ActivityCounters, BusinessRecord, ContentItem, Geocode, ListingStatus, RecordSource,
};
use listing_trust_core::config::{
    ConfigService, ConfigSnapshot, ConfidenceWeights, Configuration, DuplicateMatching,
    HistoryQuery, InMemoryConfigStore, apply_changes, diff, violations,
};
use listing_trust_core::decision::{ClassifierInput, Decision, classify};
use listing_trust_core::duplicates::{DuplicateTier, MatchField, score_candidate};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Free text, sometimes blank, sometimes shouting or spammy.
fn arb_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some("   ".to_string())),
        3 => r"[A-Za-z0-9 .,!?'@/:-]{0,80}".prop_map(Some),
        1 => Just(Some("BUY NOW!!! Best price, guaranteed. Click here, damn it".to_string())),
    ]
}

fn arb_email() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        2 => r"[a-z]{1,8}@[a-z]{2,10}\.(com|com\.au|net)".prop_map(Some),
        1 => r"[a-z@. ]{0,12}".prop_map(Some),
        1 => Just(Some("owner@mailinator.com".to_string())),
    ]
}

fn arb_website() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        2 => r"(https?://)?(www\.)?[a-z]{2,12}\.(com|com\.au)/?".prop_map(Some),
        1 => Just(Some("https://bit.ly/abc".to_string())),
        1 => r"[a-z:/ ]{0,10}".prop_map(Some),
    ]
}

fn arb_phone() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        2 => r"0[2-478] ?[0-9]{4} ?[0-9]{4}".prop_map(Some),
        1 => r"[0-9 ()+-]{0,14}".prop_map(Some),
    ]
}

fn arb_abn() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some("51 824 753 556".to_string())),
        2 => r"[0-9 ]{0,14}".prop_map(Some),
    ]
}

fn arb_source() -> impl Strategy<Value = RecordSource> {
    prop_oneof![
        Just(RecordSource::Manual),
        Just(RecordSource::SelfService),
        Just(RecordSource::BulkImport),
    ]
}

fn arb_record() -> impl Strategy<Value = BusinessRecord> {
    let contact = (
        r"[A-Za-z0-9 &'-]{0,30}",
        arb_phone(),
        arb_email(),
        arb_website(),
        arb_text(),
        arb_text(),
        arb_text(),
    );
    let rest = (
        arb_text(),
        arb_abn(),
        any::<bool>(),
        any::<bool>(),
        arb_source(),
        any::<bool>(),
        0i64..800,
        (0u32..5, 0u32..5),
        proptest::collection::vec(arb_text(), 0..4),
    );
    (contact, rest).prop_map(
        |(
            (name, phone, email, website, address, suburb, category),
            (bio, abn, abn_verified, geocoded, source, owner_verified, age, activity, content),
        )| BusinessRecord {
            id: Uuid::from_u128(1),
            name,
            phone,
            email,
            website,
            address,
            suburb,
            category,
            bio,
            abn,
            abn_verified,
            geocode: geocoded.then_some(Geocode {
                lat: -33.87,
                lng: 151.21,
            }),
            source,
            owner_id: None,
            owner_verified,
            status: ListingStatus::Pending,
            created_at: now() - Duration::days(age),
            activity: ActivityCounters {
                recent_inquiries: activity.0,
                recent_leads: activity.1,
            },
            content_items: content
                .into_iter()
                .enumerate()
                .map(|(i, text)| ContentItem {
                    id: Uuid::from_u128(100 + i as u128),
                    kind: "review".to_string(),
                    text: text.unwrap_or_default(),
                })
                .collect(),
        },
    )
}

fn arb_score() -> impl Strategy<Value = f64> {
    prop_oneof![
        3 => 0.0..=100.0f64,
        1 => Just(0.0),
        1 => Just(100.0),
    ]
}

fn arb_tier() -> impl Strategy<Value = Option<DuplicateTier>> {
    prop_oneof![
        Just(None),
        Just(Some(DuplicateTier::Investigate)),
        Just(Some(DuplicateTier::MarkDuplicate)),
        Just(Some(DuplicateTier::Merge)),
    ]
}

fn arb_classifier_input() -> impl Strategy<Value = ClassifierInput> {
    (
        arb_score(),
        arb_score(),
        arb_score(),
        proptest::option::of(arb_score()),
        arb_tier(),
        any::<bool>(),
        any::<bool>(),
        0u8..=100,
        0.0..=100.0f64,
    )
        .prop_map(
            |(
                completeness,
                data_quality,
                legitimacy,
                moderation,
                tier,
                flag,
                quality_issue,
                confidence,
                threshold,
            )| {
                ClassifierInput {
                    completeness,
                    data_quality,
                    legitimacy,
                    content_moderation: moderation,
                    highest_duplicate_tier: tier,
                    high_severity_legitimacy_flag: flag,
                    high_severity_quality_issue: quality_issue,
                    confidence,
                    threshold,
                }
            },
        )
}

/// A valid configuration reached by perturbing the defaults.
fn arb_configuration() -> impl Strategy<Value = Configuration> {
    (
        (80.0..=100.0f64, 41.0..=79.0f64, 0.0..=40.0f64),
        (0u32..=50, 0u32..=50, 1usize..=50),
        proptest::collection::btree_map("[a-z]{1,8}", -25.0..=25.0f64, 0..4),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |((approve, review, reject), (phone, abn, max), offsets, auto_approve, moderation)| {
                let mut config = Configuration::default();
                config.confidence_thresholds.auto_approve = approve;
                config.confidence_thresholds.manual_review = review;
                config.confidence_thresholds.auto_reject = reject;
                config.duplicate_matching.phone_weight = phone;
                config.duplicate_matching.abn_weight = abn;
                config.duplicate_matching.max_candidates = max;
                config.category_adjustments = offsets
                    .into_iter()
                    .map(|(category, offset)| {
                        (
                            category,
                            listing_trust_core::config::CategoryAdjustment {
                                threshold_offset: offset,
                            },
                        )
                    })
                    .collect();
                config.system.auto_approve_enabled = auto_approve;
                config.system.content_moderation_enabled = moderation;
                config
            },
        )
}

// ---------------------------------------------------------------------------
// Analyzers
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn every_analyzer_score_is_bounded(record in arb_record()) {
        let scores = [
            analyze_completeness(&record).score,
            analyze_quality(&record).score,
            analyze_legitimacy(&record, now()).score,
            analyze_content(&record).score,
        ];
        for score in scores {
            prop_assert!((0.0..=100.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn completeness_is_sum_of_present_fields(record in arb_record()) {
        let analysis = analyze_completeness(&record);
        let expected = analysis.present_required.len() as f64 * 12.5
            + analysis.present_optional.len() as f64 * 5.0;
        prop_assert!((analysis.score - expected.min(100.0)).abs() < 1e-9);

        for field in REQUIRED_FIELDS {
            let present = analysis.present_required.contains(field);
            let missing = analysis.missing_required.contains(field);
            prop_assert!(present != missing, "{} must be exactly one of present/missing", field.as_str());
        }
        prop_assert_eq!(
            analysis.present_optional.len() + analysis.missing_optional.len(),
            OPTIONAL_FIELDS.len()
        );
    }
}

// ---------------------------------------------------------------------------
// Aggregation and classification
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn raising_one_score_never_lowers_confidence(
        base in (arb_score(), arb_score(), arb_score(), arb_score()),
        tier in arb_tier(),
        which in 0usize..4,
        bump in 0.0..=100.0f64,
    ) {
        let weights = ConfidenceWeights::default();
        let inputs = ConfidenceInputs {
            completeness: base.0,
            data_quality: base.1,
            legitimacy: base.2,
            content_moderation: Some(base.3),
            duplicates: Some(tier),
        };
        let mut raised = inputs;
        match which {
            0 => raised.completeness = (base.0 + bump).min(100.0),
            1 => raised.data_quality = (base.1 + bump).min(100.0),
            2 => raised.legitimacy = (base.2 + bump).min(100.0),
            _ => raised.content_moderation = Some((base.3 + bump).min(100.0)),
        }
        let before = aggregate(&inputs, &weights).unwrap().overall;
        let after = aggregate(&raised, &weights).unwrap().overall;
        prop_assert!(after >= before, "{after} < {before}");
    }

    #[test]
    fn classifier_is_deterministic(input in arb_classifier_input()) {
        prop_assert_eq!(classify(&input), classify(&input));
    }

    #[test]
    fn low_legitimacy_always_rejects(input in arb_classifier_input(), legitimacy in 0.0..40.0f64) {
        let input = ClassifierInput { legitimacy, ..input };
        prop_assert_eq!(classify(&input).decision, Decision::Reject);
    }

    #[test]
    fn approval_implies_every_approval_bound(input in arb_classifier_input()) {
        if classify(&input).decision == Decision::Approve {
            prop_assert!(f64::from(input.confidence) >= input.threshold);
            prop_assert!(input.completeness >= 75.0);
            prop_assert!(input.data_quality >= 75.0);
            prop_assert!(input.legitimacy >= 70.0);
            prop_assert!(!input.high_severity_legitimacy_flag);
            prop_assert!(!input.high_severity_quality_issue);
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicate matching
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn more_matching_fields_never_lower_confidence(
        record in arb_record(),
        other in arb_record(),
        field_index in 0usize..6,
    ) {
        let weights = DuplicateMatching::default();
        let mut candidate = other;
        candidate.id = Uuid::from_u128(2);
        let before = score_candidate(&record, &candidate, &weights);

        match MatchField::ALL[field_index] {
            MatchField::Name => candidate.name = record.name.clone(),
            MatchField::Suburb => candidate.suburb = record.suburb.clone(),
            MatchField::Phone => candidate.phone = record.phone.clone(),
            MatchField::Email => candidate.email = record.email.clone(),
            MatchField::Website => candidate.website = record.website.clone(),
            MatchField::Abn => candidate.abn = record.abn.clone(),
        }
        let after = score_candidate(&record, &candidate, &weights);

        prop_assert!(after.matching_fields.len() >= before.matching_fields.len());
        prop_assert!(after.confidence >= before.confidence);
        prop_assert!(after.confidence <= 100);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn apply_of_diff_reproduces_target(base in arb_configuration(), target in arb_configuration()) {
        let base = serde_json::to_value(&base).unwrap();
        let target = serde_json::to_value(&target).unwrap();
        let changes = diff(&base, &target);
        for change in &changes {
            prop_assert_ne!(&change.old, &change.new, "no-op entry at {}", change.path);
        }
        prop_assert_eq!(apply_changes(&base, &changes), target);
    }

    #[test]
    fn generated_configurations_are_valid(config in arb_configuration()) {
        prop_assert!(violations(&config).is_empty(), "{:?}", violations(&config));
    }

    #[test]
    fn threshold_ordering_violations_are_rejected(
        config in arb_configuration(),
        review in 0.0..=100.0f64,
    ) {
        let mut config = config;
        config.confidence_thresholds.manual_review = review;
        let thresholds = &config.confidence_thresholds;
        let ordered = thresholds.auto_approve > thresholds.manual_review
            && thresholds.manual_review > thresholds.auto_reject;
        prop_assert_eq!(violations(&config).is_empty(), ordered);
    }

    #[test]
    fn test_mode_never_versions_or_records(approve in 76.0..=100.0f64) {
        let store = InMemoryConfigStore::new(ConfigSnapshot::initial(now()));
        let before = store.get();
        let _ = store.evaluate_test_mode(&json!({"confidence_thresholds": {"auto_approve": approve}}));
        prop_assert_eq!(store.get(), before);
        prop_assert_eq!(store.history(&HistoryQuery::default(), now()).total, 0);
    }
}
