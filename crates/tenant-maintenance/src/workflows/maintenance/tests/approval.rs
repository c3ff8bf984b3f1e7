use std::sync::Arc;

use super::common::*;
use crate::workflows::maintenance::domain::{
    DescendantRef, Money, Priority, PropertyId, RequestStatus, UnitId, VendorId, WorkOrderStatus,
};
use crate::workflows::maintenance::repository::{EntityKind, MaintenanceStore, RepositoryError};
use crate::workflows::maintenance::{
    AuditAction, BiddingPolicy, BusinessRule, Descendant, DirectApproval, MaintenanceError,
    ApprovalRoute,
};

#[test]
fn submit_records_pending_request_with_history() {
    let harness = harness();
    let request = harness.pending_request(Priority::High);

    assert!(request.is_pending());
    assert_eq!(request.version, 1);
    assert_eq!(request.history.len(), 1);
    assert_eq!(
        request.history.last().map(|entry| entry.action),
        Some(AuditAction::RequestSubmitted)
    );
    assert_eq!(
        request
            .history
            .last()
            .and_then(|entry| entry.details.get("priority"))
            .map(String::as_str),
        Some("high")
    );
    assert_eq!(harness.notifications.templates(), vec!["request_submitted"]);
}

#[test]
fn submit_rejects_unknown_unit() {
    let harness = harness();
    let mut payload = submission("Window will not latch", Priority::Low);
    payload.unit_id = Some(UnitId::new("unit-99"));

    match harness.service.approvals().submit_request(payload, &tenant()) {
        Err(MaintenanceError::NotFound {
            entity: EntityKind::Unit,
            ..
        }) => {}
        other => panic!("expected unknown unit, got {other:?}"),
    }
    assert_eq!(harness.store.request_count(), 0);
}

#[test]
fn submit_requires_description() {
    let harness = harness();
    match harness
        .service
        .approvals()
        .submit_request(submission("   ", Priority::Low), &tenant())
    {
        Err(MaintenanceError::NotAcceptable(BusinessRule::MissingField {
            field: "description",
        })) => {}
        other => panic!("expected missing description, got {other:?}"),
    }
}

#[test]
fn emergency_direct_approval_without_vendor_opens_work_order() {
    let harness = harness();
    let request = harness.pending_request(Priority::Emergency);

    let outcome = harness
        .service
        .approvals()
        .approve_request(
            &request.id,
            ApprovalRoute::Direct(DirectApproval::default()),
            &pm(),
        )
        .expect("approval succeeds");

    let work_order = match &outcome.descendant {
        Descendant::WorkOrder(work_order) => work_order,
        other => panic!("expected work order, got {other:?}"),
    };
    assert_eq!(work_order.priority, Priority::Emergency);
    assert_eq!(work_order.status, WorkOrderStatus::Open);
    assert_eq!(work_order.request_id.as_ref(), Some(&request.id));
    assert!(work_order.vendor_id().is_none());

    let location = work_order.location.as_ref().expect("location snapshot");
    assert_eq!(location.property_name, "Maple Court");
    assert_eq!(location.unit_label.as_deref(), Some("2B"));

    let stored = harness.stored_request(&request.id);
    assert_eq!(
        stored.descendant(),
        Some(&DescendantRef::WorkOrder(work_order.id.clone()))
    );
    assert_eq!(harness.stored_work_order(&work_order.id), *work_order);
}

#[test]
fn direct_approval_with_vendor_assigns_and_hands_off() {
    let harness = harness();
    let request = harness.pending_request(Priority::Medium);

    let outcome = harness
        .service
        .approvals()
        .approve_request(
            &request.id,
            ApprovalRoute::Direct(DirectApproval {
                vendor_id: Some(VendorId::new(PLUMBER)),
                estimated_cost: Money::from_dollars(180),
                owner_approval_needed: false,
                due_date: None,
            }),
            &pm(),
        )
        .expect("approval succeeds");

    let Descendant::WorkOrder(work_order) = outcome.descendant else {
        panic!("expected work order");
    };
    assert_eq!(work_order.status, WorkOrderStatus::Assigned);
    assert!(!work_order.vendor_accepted());

    let assignments = harness.registry.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].0, VendorId::new(PLUMBER));
    assert_eq!(assignments[0].1.work_order_id, work_order.id);
}

#[test]
fn bidding_approval_creates_rfp_in_same_commit() {
    let harness = harness();
    let request = harness.pending_request(Priority::Medium);

    let outcome = harness
        .service
        .approvals()
        .approve_request(&request.id, ApprovalRoute::Bidding, &pm())
        .expect("approval succeeds");

    let Descendant::Rfp(rfp) = outcome.descendant else {
        panic!("expected rfp");
    };
    assert!(rfp.is_open());
    assert_eq!(rfp.request_id.as_ref(), Some(&request.id));
    assert_eq!(outcome.request.descendant(), Some(&DescendantRef::Rfp(rfp.id.clone())));
    assert_eq!(harness.stored_rfp(&rfp.id), rfp);
    assert_eq!(harness.store.work_order_count(), 0);
}

#[test]
fn second_decision_on_request_fails_with_invalid_state() {
    let harness = harness();
    let approved = harness.pending_request(Priority::Low);
    harness
        .service
        .approvals()
        .approve_request(&approved.id, ApprovalRoute::Bidding, &pm())
        .expect("first approval succeeds");

    match harness
        .service
        .approvals()
        .approve_request(&approved.id, ApprovalRoute::Bidding, &pm())
    {
        Err(MaintenanceError::InvalidState { actual, .. }) => assert_eq!(actual, "approved"),
        other => panic!("expected invalid state, got {other:?}"),
    }
    match harness
        .service
        .approvals()
        .reject_request(&approved.id, "duplicate", None, &pm())
    {
        Err(MaintenanceError::InvalidState { .. }) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }

    let rejected = harness.pending_request(Priority::Low);
    harness
        .service
        .approvals()
        .reject_request(&rejected.id, "tenant responsibility", None, &pm())
        .expect("first rejection succeeds");
    match harness.service.approvals().approve_request(
        &rejected.id,
        ApprovalRoute::Direct(DirectApproval::default()),
        &pm(),
    ) {
        Err(MaintenanceError::InvalidState { actual, .. }) => assert_eq!(actual, "rejected"),
        other => panic!("expected invalid state, got {other:?}"),
    }

    assert_eq!(harness.store.rfp_count(), 1);
    assert_eq!(harness.store.work_order_count(), 0);
}

#[test]
fn rejection_records_reason_and_notes() {
    let harness = harness();
    let request = harness.pending_request(Priority::Low);

    let rejected = harness
        .service
        .approvals()
        .reject_request(
            &request.id,
            "cosmetic only",
            Some("schedule with next turnover".to_string()),
            &pm(),
        )
        .expect("rejection succeeds");

    assert_eq!(
        rejected.status,
        RequestStatus::Rejected {
            reason: "cosmetic only".to_string(),
            notes: Some("schedule with next turnover".to_string()),
        }
    );
    let entry = rejected.history.last().expect("rejection entry");
    assert_eq!(entry.action, AuditAction::RequestRejected);
    assert_eq!(entry.reason.as_deref(), Some("cosmetic only"));

    let notice = harness
        .notifications
        .sent()
        .into_iter()
        .find(|notice| notice.template == "request_rejected")
        .expect("tenant notified");
    assert_eq!(notice.recipient.as_deref(), Some("ana@example.com"));
}

#[test]
fn rejection_requires_reason() {
    let harness = harness();
    let request = harness.pending_request(Priority::Low);

    match harness
        .service
        .approvals()
        .reject_request(&request.id, "  ", None, &pm())
    {
        Err(MaintenanceError::NotAcceptable(BusinessRule::MissingField { field: "reason" })) => {}
        other => panic!("expected missing reason, got {other:?}"),
    }
    assert!(harness.stored_request(&request.id).is_pending());
}

#[test]
fn approved_request_accepts_notes_only() {
    let harness = harness();
    let request = harness.pending_request(Priority::Medium);
    harness
        .service
        .approvals()
        .approve_request(&request.id, ApprovalRoute::Bidding, &pm())
        .expect("approval succeeds");

    let noted = harness
        .service
        .approvals()
        .add_request_note(&request.id, "tenant home after 5pm", &tenant())
        .expect("notes allowed after approval");

    assert_eq!(noted.history.len(), 3);
    assert_eq!(
        noted.history.last().map(|entry| entry.action),
        Some(AuditAction::NoteAdded)
    );
    assert!(noted.descendant().is_some());
}

#[test]
fn blacklisted_vendor_cannot_be_named_on_direct_approval() {
    let harness = harness();
    let request = harness.pending_request(Priority::Medium);

    match harness.service.approvals().approve_request(
        &request.id,
        ApprovalRoute::Direct(DirectApproval {
            vendor_id: Some(VendorId::new(BLACKLISTED)),
            ..DirectApproval::default()
        }),
        &pm(),
    ) {
        Err(MaintenanceError::NotAcceptable(BusinessRule::VendorBlacklisted { vendor_id })) => {
            assert_eq!(vendor_id, VendorId::new(BLACKLISTED));
        }
        other => panic!("expected blacklisted vendor, got {other:?}"),
    }
    assert!(harness.stored_request(&request.id).is_pending());
    assert_eq!(harness.store.work_order_count(), 0);
}

#[test]
fn failed_descendant_commit_leaves_request_pending() {
    let harness = harness_over(
        Arc::new(WorkOrderCommitFails::default()),
        BiddingPolicy::default(),
    );
    let request = harness.pending_request(Priority::High);

    match harness.service.approvals().approve_request(
        &request.id,
        ApprovalRoute::Direct(DirectApproval::default()),
        &pm(),
    ) {
        Err(MaintenanceError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository failure, got {other:?}"),
    }

    let stored = harness.stored_request(&request.id);
    assert!(stored.is_pending());
    assert_eq!(stored.history.len(), 1);
    assert_eq!(harness.store.inner.work_order_count(), 0);
    assert!(harness.registry.assignments().is_empty());
}

#[test]
fn notification_failures_do_not_fail_transitions() {
    use crate::workflows::maintenance::memory::{
        InMemoryMaintenanceStore, InMemoryVendorRegistry,
    };
    use crate::workflows::maintenance::{MaintenancePorts, MaintenanceService, MatchPolicy};

    let directory = Arc::new(directory());
    let ports = MaintenancePorts::new(
        Arc::new(InMemoryMaintenanceStore::new()),
        Arc::new(InMemoryVendorRegistry::new(roster())),
        directory.clone(),
        directory,
        Arc::new(OfflineNotifications),
    );
    let service = MaintenanceService::new(ports, MatchPolicy::default(), BiddingPolicy::default());

    let request = service
        .approvals()
        .submit_request(submission("No hot water", Priority::Urgent), &tenant())
        .expect("submission survives notification failure");
    service
        .approvals()
        .approve_request(&request.id, ApprovalRoute::Bidding, &pm())
        .expect("approval survives notification failure");
}

#[test]
fn pending_lists_only_undecided_requests() {
    let harness = harness();
    let first = harness.pending_request(Priority::Low);
    let second = harness.pending_request(Priority::High);
    harness
        .service
        .approvals()
        .reject_request(&first.id, "duplicate", None, &pm())
        .expect("rejected");

    let pending = harness.service.approvals().pending(10).expect("pending list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
}

#[test]
fn unknown_property_is_not_found() {
    let harness = harness();
    let mut payload = submission("Gutter clogged", Priority::Low);
    payload.property_id = PropertyId::new("prop-missing");
    payload.unit_id = None;

    match harness.service.approvals().submit_request(payload, &tenant()) {
        Err(MaintenanceError::NotFound {
            entity: EntityKind::Property,
            id,
        }) => assert_eq!(id, "prop-missing"),
        other => panic!("expected missing property, got {other:?}"),
    }
    assert!(harness.store.pending_requests(10).expect("readable").is_empty());
}
