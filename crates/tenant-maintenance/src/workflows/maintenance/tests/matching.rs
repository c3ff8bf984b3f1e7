use super::common::*;
use crate::workflows::maintenance::domain::{
    Money, Priority, PropertyId, RfpDraft, Vendor, VendorId, VendorStatus, WorkOrderDraft,
};
use crate::workflows::maintenance::matching::{
    MatchPolicy, MatchQuery, MatchRule, VendorMatchEngine, CURRENT_POLICY_VERSION,
    MAX_REASONS_CAP,
};

fn burst_pipe_query() -> MatchQuery {
    MatchQuery {
        description: "urgent pipe burst".to_string(),
        category: Some("Plumbing".to_string()),
        region: Some("North".to_string()),
    }
}

fn preferred_plumber(rate: Money) -> Vendor {
    Vendor {
        tags: vec!["Preferred".to_string(), "Licensed".to_string()],
        availability_247: true,
        default_hourly_rate: rate,
        ..vendor(PLUMBER, &["Plumbing"], VendorStatus::Active)
    }
}

#[test]
fn preferred_emergency_plumber_scores_ninety() {
    let engine = VendorMatchEngine::default();

    for rate in [Money::ZERO, Money::from_dollars(75)] {
        let report = engine.score_vendors(&[preferred_plumber(rate)], &burst_pipe_query());
        let candidate = &report.ranked[0];
        assert_eq!(candidate.score, 90, "rate {rate} earns no affordability bonus");

        let rules: Vec<MatchRule> = candidate.components.iter().map(|c| c.rule).collect();
        assert_eq!(
            rules,
            vec![
                MatchRule::CategoryMatch,
                MatchRule::RegionMatch,
                MatchRule::Tag,
                MatchRule::Tag,
                MatchRule::EmergencyAvailability,
            ]
        );
    }
}

#[test]
fn affordable_rate_adds_bonus() {
    let engine = VendorMatchEngine::default();
    let report = engine.score_vendors(
        &[preferred_plumber(Money::from_dollars(60))],
        &burst_pipe_query(),
    );
    assert_eq!(report.ranked[0].score, 95);
}

#[test]
fn reasons_are_top_three_components_by_weight() {
    let engine = VendorMatchEngine::default();
    let report = engine.score_vendors(
        &[preferred_plumber(Money::from_dollars(45))],
        &burst_pipe_query(),
    );

    let reasons = &report.ranked[0].reasons;
    assert_eq!(reasons.len(), 3);
    assert_eq!(
        reasons,
        &vec![
            "specializes in Plumbing".to_string(),
            "serves North".to_string(),
            "Preferred".to_string(),
        ]
    );
}

#[test]
fn loaded_policy_cannot_raise_reason_count() {
    let mut raw = serde_json::to_value(MatchPolicy::default()).expect("policy serializes");
    raw["max_reasons"] = serde_json::json!(10);
    let policy: MatchPolicy = serde_json::from_value(raw).expect("policy deserializes");
    assert_eq!(policy.max_reasons, 10);

    let engine = VendorMatchEngine::new(policy);
    let report = engine.score_vendors(
        &[preferred_plumber(Money::from_dollars(45))],
        &burst_pipe_query(),
    );

    let candidate = &report.ranked[0];
    assert!(candidate.components.len() > MAX_REASONS_CAP);
    assert_eq!(candidate.reasons.len(), MAX_REASONS_CAP);
}

#[test]
fn keyword_overlap_applies_without_category_match() {
    let engine = VendorMatchEngine::default();
    let heater = vendor("v-heat", &["Water Heater"], VendorStatus::Active);
    let query = MatchQuery {
        description: "Water heater leaking in closet".to_string(),
        category: None,
        region: None,
    };

    let report = engine.score_vendors(&[heater], &query);
    let candidate = &report.ranked[0];
    assert_eq!(candidate.score, 25);
    assert_eq!(candidate.components[0].rule, MatchRule::KeywordOverlap);
    assert_eq!(candidate.reasons, vec!["'water' matches Water Heater".to_string()]);
}

#[test]
fn category_match_suppresses_keyword_overlap() {
    let engine = VendorMatchEngine::default();
    let plumber = vendor(PLUMBER, &["Plumbing"], VendorStatus::Active);
    let query = MatchQuery {
        description: "plumbing backup in basement".to_string(),
        category: Some("plumbing".to_string()),
        region: None,
    };

    let report = engine.score_vendors(&[plumber], &query);
    let rules: Vec<MatchRule> = report.ranked[0].components.iter().map(|c| c.rule).collect();
    assert_eq!(rules, vec![MatchRule::CategoryMatch]);
}

#[test]
fn job_history_is_tiered() {
    let engine = VendorMatchEngine::default();
    let veteran = Vendor {
        work_orders: completed_jobs(3),
        ..vendor("v-veteran", &["Roofing"], VendorStatus::Active)
    };
    let newcomer = Vendor {
        work_orders: completed_jobs(1),
        ..vendor("v-newcomer", &["Roofing"], VendorStatus::Active)
    };
    let query = MatchQuery {
        description: "Shingles missing".to_string(),
        category: None,
        region: None,
    };

    let report = engine.score_vendors(&[newcomer, veteran], &query);
    assert_eq!(report.ranked[0].vendor_id, VendorId::new("v-veteran"));
    assert_eq!(report.ranked[0].score, 10);
    assert_eq!(report.ranked[1].score, 5);
}

#[test]
fn scoring_is_deterministic_and_ties_keep_input_order() {
    let engine = VendorMatchEngine::default();
    let candidates = vec![
        vendor("v-a", &["Plumbing"], VendorStatus::Active),
        vendor("v-b", &["Plumbing"], VendorStatus::Active),
        preferred_plumber(Money::from_dollars(50)),
        vendor("v-c", &["Painting"], VendorStatus::Active),
    ];

    let first = engine.score_vendors(&candidates, &burst_pipe_query());
    let second = engine.score_vendors(&candidates, &burst_pipe_query());
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).expect("serializes"),
        serde_json::to_vec(&second).expect("serializes")
    );

    let order: Vec<&str> = first
        .ranked
        .iter()
        .map(|candidate| candidate.vendor_id.as_str())
        .collect();
    assert_eq!(order, vec![PLUMBER, "v-a", "v-b", "v-c"]);
}

#[test]
fn below_threshold_vendors_stay_in_ranked_output() {
    let engine = VendorMatchEngine::new(MatchPolicy {
        recommendation_threshold: 30,
        ..MatchPolicy::default()
    });
    let candidates = vec![
        vendor("v-plumb", &["Plumbing"], VendorStatus::Active),
        vendor("v-paint", &["Painting"], VendorStatus::Active),
    ];
    let query = MatchQuery {
        description: "Slow drain".to_string(),
        category: Some("Plumbing".to_string()),
        region: Some("South".to_string()),
    };

    let report = engine.score_vendors(&candidates, &query);
    assert_eq!(report.policy_version, CURRENT_POLICY_VERSION);
    assert_eq!(report.ranked.len(), 2);
    assert_eq!(report.ranked[1].score, 0);
    assert!(report.ranked[1].reasons.is_empty());

    let recommended: Vec<&str> = report
        .recommended()
        .map(|candidate| candidate.vendor_id.as_str())
        .collect();
    assert_eq!(recommended, vec!["v-plumb"]);
}

#[test]
fn threshold_does_not_change_scores() {
    let query = burst_pipe_query();
    let candidates = vec![preferred_plumber(Money::ZERO)];
    let lenient = VendorMatchEngine::new(MatchPolicy {
        recommendation_threshold: 0,
        ..MatchPolicy::default()
    })
    .score_vendors(&candidates, &query);
    let strict = VendorMatchEngine::new(MatchPolicy {
        recommendation_threshold: 100,
        ..MatchPolicy::default()
    })
    .score_vendors(&candidates, &query);

    assert_eq!(lenient.ranked, strict.ranked);
    assert_eq!(strict.recommended().count(), 0);
}

#[test]
fn recommendations_exclude_blacklisted_vendors_and_use_property_region() {
    let harness = harness();
    let work_order = harness
        .service
        .work_orders()
        .create_work_order(
            WorkOrderDraft {
                property_id: PropertyId::new(PROPERTY),
                unit_id: None,
                tenant_id: None,
                description: "Toilet running constantly".to_string(),
                category: Some("Plumbing".to_string()),
                priority: Priority::Low,
                vendor_id: None,
                estimated_cost: Money::ZERO,
                owner_approval_needed: false,
                due_date: None,
                attachments: Vec::new(),
            },
            &pm(),
        )
        .expect("work order created");

    let report = harness
        .service
        .recommend_for_work_order(&work_order.id)
        .expect("recommendations");
    assert!(report
        .ranked
        .iter()
        .all(|candidate| candidate.vendor_id != VendorId::new(BLACKLISTED)));

    let plumber = report
        .ranked
        .iter()
        .find(|candidate| candidate.vendor_id == VendorId::new(PLUMBER))
        .expect("plumber ranked");
    assert_eq!(plumber.score, 65);

    let rfp = harness
        .service
        .rfps()
        .create_rfp(
            RfpDraft {
                property_id: PropertyId::new(PROPERTY),
                unit_id: None,
                tenant_id: None,
                description: "Replace rooftop HVAC condenser".to_string(),
                category: Some("HVAC".to_string()),
                priority: Priority::Medium,
                attachments: Vec::new(),
            },
            &pm(),
        )
        .expect("rfp created");
    let report = harness
        .service
        .recommend_for_rfp(&rfp.id)
        .expect("recommendations");
    assert_eq!(report.ranked[0].vendor_id, VendorId::new(HVAC));
}
