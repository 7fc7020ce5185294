//! Duplicate listing detection.
//!
//! Candidate lookup is an explicit union of independent [`MatchPredicate`]s,
//! one per identifying field the record actually carries. Whatever the store
//! returns is re-scored here field by field, so the confidence of a match
//! never depends on how the store evaluated the query.
//!
//! A single shared value (one phone number, one email) is enough for a
//! record to come back as a candidate. Such matches usually land in the
//! `investigate` tier, but a shared reception line or ABN can still push a
//! legitimately distinct business into `mark_duplicate`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::business::{BusinessRecord, ListingStatus, present};
use crate::config::DuplicateMatching;
use crate::error::TrustError;
use crate::normalize::{digits_only, normalize_email, text_key, website_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Name,
    Suburb,
    Phone,
    Email,
    Website,
    Abn,
}

impl MatchField {
    pub const ALL: [MatchField; 6] = [
        MatchField::Name,
        MatchField::Suburb,
        MatchField::Phone,
        MatchField::Email,
        MatchField::Website,
        MatchField::Abn,
    ];

    pub fn weight(self, weights: &DuplicateMatching) -> u32 {
        match self {
            MatchField::Name => weights.name_weight,
            MatchField::Suburb => weights.suburb_weight,
            MatchField::Phone => weights.phone_weight,
            MatchField::Email => weights.email_weight,
            MatchField::Website => weights.website_weight,
            MatchField::Abn => weights.abn_weight,
        }
    }

    /// Normalised comparison key for this field on `record`, if the field is present.
    pub fn key(self, record: &BusinessRecord) -> Option<String> {
        let key = match self {
            MatchField::Name => {
                let name = record.name.trim();
                (!name.is_empty()).then(|| text_key(name))
            }
            MatchField::Suburb => present(&record.suburb).map(text_key),
            MatchField::Phone => present(&record.phone).map(digits_only),
            MatchField::Email => present(&record.email).map(normalize_email),
            MatchField::Website => present(&record.website).map(website_key),
            MatchField::Abn => present(&record.abn).map(digits_only),
        }?;
        (!key.is_empty()).then_some(key)
    }
}

/// One way a stored listing can be pulled in as a duplicate candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum MatchPredicate {
    /// Same name (case-insensitive) within the same suburb.
    NameInSuburb { name: String, suburb: String },
    Phone { digits: String },
    Email { email: String },
    Website { key: String },
    Abn { digits: String },
}

impl MatchPredicate {
    pub fn matches(&self, candidate: &BusinessRecord) -> bool {
        match self {
            MatchPredicate::NameInSuburb { name, suburb } => {
                MatchField::Name.key(candidate).as_ref() == Some(name)
                    && MatchField::Suburb.key(candidate).as_ref() == Some(suburb)
            }
            MatchPredicate::Phone { digits } => {
                MatchField::Phone.key(candidate).as_ref() == Some(digits)
            }
            MatchPredicate::Email { email } => {
                MatchField::Email.key(candidate).as_ref() == Some(email)
            }
            MatchPredicate::Website { key } => {
                MatchField::Website.key(candidate).as_ref() == Some(key)
            }
            MatchPredicate::Abn { digits } => MatchField::Abn.key(candidate).as_ref() == Some(digits),
        }
    }
}

/// Bounded lookup for approved listings matching any predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateQuery {
    pub exclude_id: Uuid,
    pub predicates: Vec<MatchPredicate>,
    pub limit: usize,
}

impl DuplicateQuery {
    pub fn for_record(record: &BusinessRecord, limit: usize) -> Self {
        let mut predicates = Vec::new();
        if let (Some(name), Some(suburb)) = (
            MatchField::Name.key(record),
            MatchField::Suburb.key(record),
        ) {
            predicates.push(MatchPredicate::NameInSuburb { name, suburb });
        }
        if let Some(digits) = MatchField::Phone.key(record) {
            predicates.push(MatchPredicate::Phone { digits });
        }
        if let Some(email) = MatchField::Email.key(record) {
            predicates.push(MatchPredicate::Email { email });
        }
        if let Some(key) = MatchField::Website.key(record) {
            predicates.push(MatchPredicate::Website { key });
        }
        if let Some(digits) = MatchField::Abn.key(record) {
            predicates.push(MatchPredicate::Abn { digits });
        }
        Self {
            exclude_id: record.id,
            predicates,
            limit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, candidate: &BusinessRecord) -> bool {
        candidate.id != self.exclude_id
            && candidate.status == ListingStatus::Approved
            && self.predicates.iter().any(|p| p.matches(candidate))
    }
}

/// Anything that can answer a [`DuplicateQuery`] with listing snapshots.
pub trait CandidateSource {
    fn find_candidates(&self, query: &DuplicateQuery) -> Result<Vec<BusinessRecord>, TrustError>;
}

/// Candidate source over an in-process slice of listings.
pub struct InMemoryListings<'a> {
    listings: &'a [BusinessRecord],
}

impl<'a> InMemoryListings<'a> {
    pub fn new(listings: &'a [BusinessRecord]) -> Self {
        Self { listings }
    }
}

impl CandidateSource for InMemoryListings<'_> {
    fn find_candidates(&self, query: &DuplicateQuery) -> Result<Vec<BusinessRecord>, TrustError> {
        Ok(self
            .listings
            .iter()
            .filter(|candidate| query.matches(candidate))
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateTier {
    Investigate,
    MarkDuplicate,
    Merge,
}

impl DuplicateTier {
    /// Lower bounds are inclusive.
    pub fn for_confidence(confidence: u8, weights: &DuplicateMatching) -> Self {
        if u32::from(confidence) >= weights.merge_threshold {
            DuplicateTier::Merge
        } else if u32::from(confidence) >= weights.mark_duplicate_threshold {
            DuplicateTier::MarkDuplicate
        } else {
            DuplicateTier::Investigate
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateCandidate {
    pub candidate_id: Uuid,
    pub name: String,
    pub matching_fields: Vec<MatchField>,
    pub confidence: u8,
    pub tier: DuplicateTier,
}

/// Score one stored listing against the record under evaluation.
pub fn score_candidate(
    record: &BusinessRecord,
    candidate: &BusinessRecord,
    weights: &DuplicateMatching,
) -> DuplicateCandidate {
    let matching_fields: Vec<MatchField> = MatchField::ALL
        .into_iter()
        .filter(|field| match (field.key(record), field.key(candidate)) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        })
        .collect();
    let total: u32 = matching_fields
        .iter()
        .map(|field| field.weight(weights))
        .sum();
    let confidence = total.min(100) as u8;

    DuplicateCandidate {
        candidate_id: candidate.id,
        name: candidate.name.clone(),
        tier: DuplicateTier::for_confidence(confidence, weights),
        matching_fields,
        confidence,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateReport {
    pub total_candidates: usize,
    pub merge_count: usize,
    pub mark_duplicate_count: usize,
    pub investigate_count: usize,
    /// Highest-confidence candidates first, capped at `max_candidates`
    pub candidates: Vec<DuplicateCandidate>,
}

impl DuplicateReport {
    pub fn highest_tier(&self) -> Option<DuplicateTier> {
        if self.merge_count > 0 {
            Some(DuplicateTier::Merge)
        } else if self.mark_duplicate_count > 0 {
            Some(DuplicateTier::MarkDuplicate)
        } else if self.investigate_count > 0 {
            Some(DuplicateTier::Investigate)
        } else {
            None
        }
    }
}

pub fn build_report(
    record: &BusinessRecord,
    candidates: &[BusinessRecord],
    weights: &DuplicateMatching,
) -> DuplicateReport {
    let mut scored: Vec<DuplicateCandidate> = candidates
        .iter()
        .filter(|candidate| candidate.id != record.id)
        .map(|candidate| score_candidate(record, candidate, weights))
        .filter(|candidate| !candidate.matching_fields.is_empty())
        .collect();
    scored.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });

    let count = |tier: DuplicateTier| scored.iter().filter(|c| c.tier == tier).count();
    let report = DuplicateReport {
        total_candidates: scored.len(),
        merge_count: count(DuplicateTier::Merge),
        mark_duplicate_count: count(DuplicateTier::MarkDuplicate),
        investigate_count: count(DuplicateTier::Investigate),
        candidates: Vec::new(),
    };
    scored.truncate(weights.max_candidates);
    DuplicateReport {
        candidates: scored,
        ..report
    }
}

/// Query `source` for candidates and score them.
pub fn find_duplicates(
    record: &BusinessRecord,
    source: &impl CandidateSource,
    weights: &DuplicateMatching,
) -> Result<DuplicateReport, TrustError> {
    let query = DuplicateQuery::for_record(record, weights.max_candidates);
    if query.is_empty() {
        return Ok(DuplicateReport::default());
    }
    let candidates = source.find_candidates(&query)?;
    tracing::debug!(
        business_id = %record.id,
        predicates = query.predicates.len(),
        candidates = candidates.len(),
        "duplicate candidates fetched"
    );
    Ok(build_report(record, &candidates, weights))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::business::fixtures::complete_record;

    fn approved_listing(id: u128) -> BusinessRecord {
        let mut listing = complete_record();
        listing.id = Uuid::from_u128(id);
        listing.name = "Another Business".to_string();
        listing.phone = Some("0298765432".to_string());
        listing.email = Some("info@another.com.au".to_string());
        listing.website = Some("https://another.com.au".to_string());
        listing.suburb = Some("Glebe".to_string());
        listing.abn = Some("83 914 571 673".to_string());
        listing.status = ListingStatus::Approved;
        listing
    }

    #[test]
    fn shared_abn_and_phone_is_mark_duplicate() {
        let record = complete_record();
        let mut other = approved_listing(1);
        other.abn = record.abn.clone();
        other.phone = Some("02 9555 1234".to_string());

        let candidate = score_candidate(&record, &other, &DuplicateMatching::default());
        assert_eq!(candidate.matching_fields, vec![MatchField::Phone, MatchField::Abn]);
        assert_eq!(candidate.confidence, 60);
        assert_eq!(candidate.tier, DuplicateTier::MarkDuplicate);
    }

    #[test]
    fn tier_bounds_are_inclusive() {
        let weights = DuplicateMatching::default();
        assert_eq!(DuplicateTier::for_confidence(80, &weights), DuplicateTier::Merge);
        assert_eq!(DuplicateTier::for_confidence(79, &weights), DuplicateTier::MarkDuplicate);
        assert_eq!(DuplicateTier::for_confidence(60, &weights), DuplicateTier::MarkDuplicate);
        assert_eq!(DuplicateTier::for_confidence(59, &weights), DuplicateTier::Investigate);
    }

    #[test]
    fn confidence_is_capped_at_one_hundred() {
        let record = complete_record();
        let mut twin = record.clone();
        twin.id = Uuid::from_u128(2);
        twin.status = ListingStatus::Approved;

        let candidate = score_candidate(&record, &twin, &DuplicateMatching::default());
        assert_eq!(candidate.matching_fields.len(), 6);
        assert_eq!(candidate.confidence, 100);
        assert_eq!(candidate.tier, DuplicateTier::Merge);
    }

    #[test]
    fn query_only_uses_present_fields() {
        let mut record = complete_record();
        record.phone = None;
        record.suburb = None;
        record.website = Some("  ".to_string());

        let query = DuplicateQuery::for_record(&record, 10);
        assert_eq!(
            query.predicates,
            vec![
                MatchPredicate::Email {
                    email: "hello@brewhousecoffee.com.au".to_string()
                },
                MatchPredicate::Abn {
                    digits: "51824753556".to_string()
                },
            ]
        );
    }

    #[test]
    fn name_predicate_requires_same_suburb() {
        let record = complete_record();
        let mut same_name = approved_listing(3);
        same_name.name = "BREWHOUSE  coffee".to_string();
        let query = DuplicateQuery::for_record(&record, 10);
        assert!(!query.matches(&same_name));

        same_name.suburb = Some("newtown".to_string());
        assert!(query.matches(&same_name));
    }

    #[test]
    fn in_memory_source_skips_self_and_unapproved() {
        let record = complete_record();
        let mut pending = approved_listing(4);
        pending.phone = record.phone.clone();
        pending.status = ListingStatus::Pending;
        let mut approved = approved_listing(5);
        approved.email = Some("HELLO@brewhousecoffee.com.au ".to_string());
        let mut itself = record.clone();
        itself.status = ListingStatus::Approved;
        let listings = vec![pending, approved, itself];

        let report = find_duplicates(
            &record,
            &InMemoryListings::new(&listings),
            &DuplicateMatching::default(),
        )
        .unwrap();
        assert_eq!(report.total_candidates, 1);
        assert_eq!(report.candidates[0].candidate_id, Uuid::from_u128(5));
        // email only; the suburbs differ
        assert_eq!(report.candidates[0].confidence, 25);
        assert_eq!(report.highest_tier(), Some(DuplicateTier::Investigate));
    }

    #[test]
    fn report_caps_candidate_list_but_counts_everything() {
        let record = complete_record();
        let weights = DuplicateMatching {
            max_candidates: 2,
            ..DuplicateMatching::default()
        };
        let listings: Vec<_> = (10..15)
            .map(|id| {
                let mut listing = approved_listing(id);
                listing.phone = record.phone.clone();
                listing
            })
            .collect();

        let report = build_report(&record, &listings, &weights);
        assert_eq!(report.total_candidates, 5);
        assert_eq!(report.investigate_count, 5);
        assert_eq!(report.candidates.len(), 2);
    }
}
