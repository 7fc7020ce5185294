use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::business::{BusinessRecord, present};

use super::{Contribution, SPAM_PHRASES, phrase_hits, settle_score};

pub const SPAM_PHRASE_PENALTY: f64 = 10.0;
pub const SPAM_PENALTY_CAP: f64 = 30.0;
pub const EXCESSIVE_CAPS_PENALTY: f64 = 10.0;
pub const REPEATED_PUNCTUATION_PENALTY: f64 = 5.0;
pub const PROFANITY_PENALTY: f64 = 15.0;
pub const CONTENT_SPAM_PENALTY: f64 = 5.0;

/// Uppercase share of letters above which a bio reads as shouting.
pub const CAPS_RATIO_LIMIT: f64 = 0.30;
const CAPS_MIN_LETTERS: usize = 10;

const CONTENT_SPAM_PHRASES: &[&str] = &[
    "buy now",
    "click here",
    "free money",
    "visit my profile",
    "dm me",
];

const PROFANITY: &[&str] = &["fuck", "shit", "bitch", "bastard", "cunt", "crap", "damn"];

static REPEATED_PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[!?]{2,}").expect("punctuation pattern is valid"));

static PROFANITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = PROFANITY.join("|");
    Regex::new(&format!(r"(?i)\b({alternation})(s|ing|ed)?\b")).expect("profanity pattern is valid")
});

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModerationAnalysis {
    pub score: f64,
    pub spam_indicators: u32,
    pub profanity_detected: bool,
    pub flags: Vec<String>,
    pub contributions: Vec<Contribution>,
    pub recommendation: String,
}

pub fn analyze_content(record: &BusinessRecord) -> ModerationAnalysis {
    let mut contributions = Vec::new();
    let mut flags = Vec::new();
    let mut spam_indicators = 0u32;
    let mut profanity_detected = false;

    if let Some(bio) = present(&record.bio) {
        let hits = phrase_hits(bio, SPAM_PHRASES);
        if !hits.is_empty() {
            spam_indicators += hits.len() as u32;
            let penalty = (hits.len() as f64 * SPAM_PHRASE_PENALTY).min(SPAM_PENALTY_CAP);
            contributions.push(Contribution::new("spam phrases in bio", -penalty));
            flags.push(format!("Spam phrases in description: {}", hits.join(", ")));
        }

        let letters: Vec<char> = bio.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() >= CAPS_MIN_LETTERS {
            let upper = letters.iter().filter(|c| c.is_uppercase()).count();
            if upper as f64 / letters.len() as f64 > CAPS_RATIO_LIMIT {
                contributions.push(Contribution::new(
                    "excessive capitalisation",
                    -EXCESSIVE_CAPS_PENALTY,
                ));
                flags.push("Excessive capitalisation in description".to_string());
            }
        }

        if REPEATED_PUNCTUATION_RE.is_match(bio) {
            contributions.push(Contribution::new(
                "repeated punctuation",
                -REPEATED_PUNCTUATION_PENALTY,
            ));
            flags.push("Repeated exclamation or question marks".to_string());
        }

        let profanity = PROFANITY_RE.find_iter(bio).count();
        if profanity > 0 {
            profanity_detected = true;
            contributions.push(Contribution::new(
                "profanity in bio",
                -(profanity as f64 * PROFANITY_PENALTY),
            ));
            flags.push(format!("Profanity detected ({profanity} occurrence(s))"));
        }
    }

    for item in &record.content_items {
        let hits = phrase_hits(&item.text, CONTENT_SPAM_PHRASES);
        if hits.is_empty() {
            continue;
        }
        spam_indicators += hits.len() as u32;
        contributions.push(Contribution::new(
            format!("spam in {} {}", item.kind, item.id),
            -(hits.len() as f64 * CONTENT_SPAM_PENALTY),
        ));
        flags.push(format!(
            "Spam phrases in public {}: {}",
            item.kind,
            hits.join(", ")
        ));
    }

    let score = settle_score(100.0, &contributions);
    ModerationAnalysis {
        score,
        spam_indicators,
        profanity_detected,
        recommendation: moderation_recommendation(score, profanity_detected),
        flags,
        contributions,
    }
}

fn moderation_recommendation(score: f64, profanity_detected: bool) -> String {
    if profanity_detected {
        "Remove offensive language before publishing.".to_string()
    } else if score >= 90.0 {
        "Content is suitable for publishing.".to_string()
    } else if score >= 60.0 {
        "Content needs light editing before publishing.".to_string()
    } else {
        "Content looks like spam; hold for moderation.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::business::ContentItem;
    use crate::business::fixtures::complete_record;

    #[test]
    fn clean_bio_passes() {
        let analysis = analyze_content(&complete_record());
        assert_eq!(analysis.score, 100.0);
        assert_eq!(analysis.spam_indicators, 0);
        assert!(!analysis.profanity_detected);
    }

    #[test]
    fn spam_penalty_is_capped_but_counter_is_not() {
        let mut record = complete_record();
        record.bio = Some(
            "Buy now at the best price, guaranteed cheapest in town. Act now, call now.".to_string(),
        );
        let analysis = analyze_content(&record);
        assert_eq!(analysis.spam_indicators, 6);
        assert_eq!(analysis.score, 100.0 - SPAM_PENALTY_CAP);
    }

    #[test]
    fn shouting_and_punctuation_deduct() {
        let mut record = complete_record();
        record.bio = Some("BEST COFFEE IN NEWTOWN!!! Come and see us".to_string());
        let analysis = analyze_content(&record);
        assert_eq!(
            analysis.score,
            100.0 - EXCESSIVE_CAPS_PENALTY - REPEATED_PUNCTUATION_PENALTY
        );
        assert_eq!(analysis.flags.len(), 2);
    }

    #[test]
    fn each_profanity_hit_deducts() {
        let mut record = complete_record();
        record.bio = Some("Damn good coffee, none of that crap from the chains".to_string());
        let analysis = analyze_content(&record);
        assert!(analysis.profanity_detected);
        assert_eq!(analysis.score, 100.0 - 2.0 * PROFANITY_PENALTY);
    }

    #[test]
    fn public_content_spam_counts_per_hit() {
        let mut record = complete_record();
        record.content_items.push(ContentItem {
            id: Uuid::nil(),
            kind: "review".to_string(),
            text: "Free money!! DM me or click here".to_string(),
        });
        let analysis = analyze_content(&record);
        assert_eq!(analysis.spam_indicators, 3);
        assert_eq!(analysis.score, 100.0 - 3.0 * CONTENT_SPAM_PENALTY);
    }
}
