use serde::{Deserialize, Serialize};

use super::super::domain::Money;

pub const CURRENT_POLICY_VERSION: u32 = 1;

/// Hard cap on reasons surfaced per vendor, whatever a loaded policy asks for.
pub const MAX_REASONS_CAP: usize = 3;

/// Bonus awarded when a vendor carries a tag (compared case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBonus {
    pub tag: String,
    pub score: u32,
}

impl TagBonus {
    fn new(tag: &str, score: u32) -> Self {
        Self {
            tag: tag.to_string(),
            score,
        }
    }
}

/// Weights and cut-offs for vendor ranking. Bump `version` whenever a
/// weight changes so stored rankings can be traced to the rubric used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub version: u32,
    pub category_match: u32,
    pub keyword_overlap: u32,
    /// Description words must be longer than this many characters to count.
    pub keyword_min_chars: usize,
    pub region_match: u32,
    pub tag_bonuses: Vec<TagBonus>,
    pub experienced_job_count: usize,
    pub experienced_bonus: u32,
    pub some_history_bonus: u32,
    pub urgency_keywords: Vec<String>,
    pub emergency_availability: u32,
    pub affordable_rate_ceiling: Money,
    pub affordable_rate: u32,
    /// Clamped to [`MAX_REASONS_CAP`] when applied.
    pub max_reasons: usize,
    /// Presentation cut-off; never consulted while scoring.
    pub recommendation_threshold: u32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            version: CURRENT_POLICY_VERSION,
            category_match: 40,
            keyword_overlap: 25,
            keyword_min_chars: 3,
            region_match: 25,
            tag_bonuses: vec![
                TagBonus::new("Preferred", 10),
                TagBonus::new("Licensed", 5),
                TagBonus::new("Insured", 5),
            ],
            experienced_job_count: 3,
            experienced_bonus: 10,
            some_history_bonus: 5,
            urgency_keywords: vec![
                "urgent".to_string(),
                "emergency".to_string(),
                "broken".to_string(),
            ],
            emergency_availability: 10,
            affordable_rate_ceiling: Money::from_dollars(60),
            affordable_rate: 5,
            max_reasons: MAX_REASONS_CAP,
            recommendation_threshold: 15,
        }
    }
}
