use super::super::domain::Vendor;
use super::policy::MatchPolicy;
use super::{MatchComponent, MatchQuery, MatchRule};

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn overlaps(candidate: &str, requested: &str) -> bool {
    !candidate.is_empty() && (candidate.contains(requested) || requested.contains(candidate))
}

pub(crate) fn score_vendor(
    vendor: &Vendor,
    query: &MatchQuery,
    policy: &MatchPolicy,
) -> Vec<MatchComponent> {
    let mut components = Vec::new();
    let description = normalize(&query.description);

    let requested_category = query
        .category
        .as_deref()
        .map(normalize)
        .filter(|category| !category.is_empty());

    let category_hit = requested_category.as_deref().and_then(|requested| {
        vendor
            .all_categories()
            .find(|category| overlaps(&normalize(category), requested))
    });

    if let Some(category) = category_hit {
        components.push(MatchComponent {
            rule: MatchRule::CategoryMatch,
            score: policy.category_match,
            notes: format!("specializes in {category}"),
        });
    } else if let Some((word, category)) = keyword_overlap(vendor, &description, policy) {
        components.push(MatchComponent {
            rule: MatchRule::KeywordOverlap,
            score: policy.keyword_overlap,
            notes: format!("'{word}' matches {category}"),
        });
    }

    let requested_region = query
        .region
        .as_deref()
        .map(normalize)
        .filter(|region| !region.is_empty());

    if let Some(requested) = requested_region.as_deref() {
        if let Some(region) = vendor
            .regions
            .iter()
            .find(|region| overlaps(&normalize(region), requested))
        {
            components.push(MatchComponent {
                rule: MatchRule::RegionMatch,
                score: policy.region_match,
                notes: format!("serves {region}"),
            });
        }
    }

    for bonus in &policy.tag_bonuses {
        if vendor
            .tags
            .iter()
            .any(|tag| tag.trim().eq_ignore_ascii_case(&bonus.tag))
        {
            components.push(MatchComponent {
                rule: MatchRule::Tag,
                score: bonus.score,
                notes: bonus.tag.clone(),
            });
        }
    }

    let completed = vendor.completed_jobs();
    if completed >= policy.experienced_job_count {
        components.push(MatchComponent {
            rule: MatchRule::JobHistory,
            score: policy.experienced_bonus,
            notes: format!("{completed} completed jobs"),
        });
    } else if completed > 0 {
        components.push(MatchComponent {
            rule: MatchRule::JobHistory,
            score: policy.some_history_bonus,
            notes: format!("{completed} completed job(s)"),
        });
    }

    if vendor.availability_247
        && policy
            .urgency_keywords
            .iter()
            .any(|keyword| description.contains(&normalize(keyword)))
    {
        components.push(MatchComponent {
            rule: MatchRule::EmergencyAvailability,
            score: policy.emergency_availability,
            notes: "available 24/7 for urgent work".to_string(),
        });
    }

    let rate = vendor.default_hourly_rate;
    if rate.cents() > 0 && rate <= policy.affordable_rate_ceiling {
        components.push(MatchComponent {
            rule: MatchRule::AffordableRate,
            score: policy.affordable_rate,
            notes: format!("{rate}/hr"),
        });
    }

    components
}

/// First description word (in order) that appears inside a vendor category.
fn keyword_overlap<'v>(
    vendor: &'v Vendor,
    description: &str,
    policy: &MatchPolicy,
) -> Option<(String, &'v str)> {
    description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > policy.keyword_min_chars)
        .find_map(|word| {
            vendor
                .all_categories()
                .find(|category| normalize(category).contains(word))
                .map(|category| (word.to_string(), category))
        })
}
