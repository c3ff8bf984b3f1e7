mod policy;
mod rules;

pub use policy::{MatchPolicy, TagBonus, CURRENT_POLICY_VERSION, MAX_REASONS_CAP};

use serde::{Deserialize, Serialize};

use super::domain::{Vendor, VendorId};

/// Issue description the candidates are ranked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    CategoryMatch,
    KeywordOverlap,
    RegionMatch,
    Tag,
    JobHistory,
    EmergencyAvailability,
    AffordableRate,
}

/// Discrete contribution to a vendor's score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchComponent {
    pub rule: MatchRule,
    pub score: u32,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorMatch {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub score: u32,
    /// Highest-weighted components, capped by the policy.
    pub reasons: Vec<String>,
    pub components: Vec<MatchComponent>,
}

/// Full ranking; below-threshold vendors stay in `ranked` for browsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub policy_version: u32,
    pub threshold: u32,
    pub ranked: Vec<VendorMatch>,
}

impl MatchReport {
    pub fn recommended(&self) -> impl Iterator<Item = &VendorMatch> {
        let threshold = self.threshold;
        self.ranked
            .iter()
            .filter(move |candidate| candidate.score >= threshold)
    }
}

/// Stateless ranker; callers exclude non-active vendors beforehand.
#[derive(Debug, Clone, Default)]
pub struct VendorMatchEngine {
    policy: MatchPolicy,
}

impl VendorMatchEngine {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn score_vendors(&self, candidates: &[Vendor], query: &MatchQuery) -> MatchReport {
        let mut ranked: Vec<VendorMatch> = candidates
            .iter()
            .map(|vendor| self.score_vendor(vendor, query))
            .collect();

        // `sort_by` is stable: equal scores keep candidate order.
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        MatchReport {
            policy_version: self.policy.version,
            threshold: self.policy.recommendation_threshold,
            ranked,
        }
    }

    fn score_vendor(&self, vendor: &Vendor, query: &MatchQuery) -> VendorMatch {
        let components = rules::score_vendor(vendor, query, &self.policy);
        let score = components.iter().map(|component| component.score).sum();

        let mut by_weight: Vec<&MatchComponent> = components.iter().collect();
        by_weight.sort_by(|a, b| b.score.cmp(&a.score));
        let reasons = by_weight
            .into_iter()
            .take(self.policy.max_reasons.min(MAX_REASONS_CAP))
            .map(|component| component.notes.clone())
            .collect();

        VendorMatch {
            vendor_id: vendor.id.clone(),
            vendor_name: vendor.name.clone(),
            score,
            reasons,
            components,
        }
    }
}
