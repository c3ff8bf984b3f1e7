use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::audit::{AuditAction, AuditTrail, HistoryEntry};
use super::domain::{
    Actor, DescendantRef, Money, RequestId, RequestStatus, RequestSubmission, Rfp, ServiceRequest,
    VendorId, WorkOrder,
};
use super::error::{BusinessRule, MaintenanceError};
use super::ports::MaintenancePorts;
use super::repository::{ChangeSet, EntityKind, MaintenanceNotice, MaintenanceStore, VendorRegistry};
use super::rfp::RfpSeed;
use super::work_orders::WorkOrderSeed;

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("sr-{id:06}"))
}

/// Terms for creating a work order straight from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectApproval {
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub estimated_cost: Money,
    /// Decided upstream from the owner agreement's spend threshold.
    #[serde(default)]
    pub owner_approval_needed: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// How an approved request proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum ApprovalRoute {
    Direct(DirectApproval),
    Bidding,
}

/// The single record an approval produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Descendant {
    WorkOrder(WorkOrder),
    Rfp(Rfp),
}

/// Approved request together with its descendant, committed as one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalOutcome {
    pub request: ServiceRequest,
    pub descendant: Descendant,
}

/// Triages pending requests into exactly one descendant or a rejection.
pub struct ApprovalGate<S, V> {
    ports: MaintenancePorts<S, V>,
}

impl<S, V> ApprovalGate<S, V>
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    pub fn new(ports: MaintenancePorts<S, V>) -> Self {
        Self { ports }
    }

    /// Record a tenant-reported issue as a pending request.
    pub fn submit_request(
        &self,
        submission: RequestSubmission,
        actor: &Actor,
    ) -> Result<ServiceRequest, MaintenanceError> {
        if submission.description.trim().is_empty() {
            return Err(BusinessRule::MissingField {
                field: "description",
            }
            .into());
        }

        self.ports
            .location(&submission.property_id, submission.unit_id.as_ref())?;
        self.ports.tenant(&submission.tenant_id)?;

        let now = self.ports.now();
        let mut request = ServiceRequest {
            id: next_request_id(),
            tenant_id: submission.tenant_id,
            property_id: submission.property_id,
            unit_id: submission.unit_id,
            description: submission.description.trim().to_string(),
            category: submission.category,
            priority: submission.priority,
            status: RequestStatus::Pending,
            attachments: submission.attachments,
            history: Default::default(),
            created_at: now,
            version: 0,
        };

        let entry = HistoryEntry::new(AuditAction::RequestSubmitted, actor, now)
            .with_detail("priority", request.priority.label());
        AuditTrail::append(&mut request, entry);

        self.ports.store.commit(ChangeSet::new().request(&mut request))?;

        info!(request = %request.id, priority = request.priority.label(), "service request submitted");
        self.ports.notify(
            MaintenanceNotice::new("request_submitted", &request.id)
                .detail("priority", request.priority.label()),
        );

        Ok(request)
    }

    /// Approve a pending request, creating its work order or RFP in the same commit.
    pub fn approve_request(
        &self,
        request_id: &RequestId,
        route: ApprovalRoute,
        actor: &Actor,
    ) -> Result<ApprovalOutcome, MaintenanceError> {
        let mut request = self.ports.load_request(request_id)?;
        ensure_pending(&request, "approve")?;

        let now = self.ports.now();

        let outcome = match route {
            ApprovalRoute::Direct(direct) => {
                let seed = WorkOrderSeed::from_request(&request, direct);
                let mut work_order = seed.build(&self.ports, actor, now)?;

                request.status = RequestStatus::Approved {
                    descendant: DescendantRef::WorkOrder(work_order.id.clone()),
                };
                AuditTrail::append(
                    &mut request,
                    HistoryEntry::new(AuditAction::RequestApproved, actor, now)
                        .with_detail("route", "direct")
                        .with_detail("work_order_id", work_order.id.as_str()),
                );

                self.ports.store.commit(
                    ChangeSet::new()
                        .request(&mut request)
                        .work_order(&mut work_order),
                )?;

                info!(
                    request = %request.id,
                    work_order = %work_order.id,
                    status = work_order.status.label(),
                    "request approved for direct work order"
                );
                self.ports.hand_off_to_vendor(&work_order);

                ApprovalOutcome {
                    request,
                    descendant: Descendant::WorkOrder(work_order),
                }
            }
            ApprovalRoute::Bidding => {
                let seed = RfpSeed::from_request(&request);
                let mut rfp = seed.build(&self.ports, actor, now)?;

                request.status = RequestStatus::Approved {
                    descendant: DescendantRef::Rfp(rfp.id.clone()),
                };
                AuditTrail::append(
                    &mut request,
                    HistoryEntry::new(AuditAction::RequestApproved, actor, now)
                        .with_detail("route", "bidding")
                        .with_detail("rfp_id", rfp.id.as_str()),
                );

                self.ports
                    .store
                    .commit(ChangeSet::new().request(&mut request).rfp(&mut rfp))?;

                info!(request = %request.id, rfp = %rfp.id, "request approved for competitive bidding");

                ApprovalOutcome {
                    request,
                    descendant: Descendant::Rfp(rfp),
                }
            }
        };

        let recipient = self
            .ports
            .tenant_recipient(Some(&outcome.request.tenant_id));
        self.ports.notify(
            MaintenanceNotice::new("request_approved", &outcome.request.id).recipient(recipient),
        );

        Ok(outcome)
    }

    pub fn reject_request(
        &self,
        request_id: &RequestId,
        reason: &str,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<ServiceRequest, MaintenanceError> {
        if reason.trim().is_empty() {
            return Err(BusinessRule::MissingField { field: "reason" }.into());
        }

        let mut request = self.ports.load_request(request_id)?;
        ensure_pending(&request, "reject")?;

        let now = self.ports.now();
        request.status = RequestStatus::Rejected {
            reason: reason.trim().to_string(),
            notes: notes.clone(),
        };

        let mut entry = HistoryEntry::new(AuditAction::RequestRejected, actor, now).with_reason(reason.trim());
        if let Some(notes) = notes {
            entry = entry.with_detail("notes", notes);
        }
        AuditTrail::append(&mut request, entry);

        self.ports.store.commit(ChangeSet::new().request(&mut request))?;

        info!(request = %request.id, reason = reason.trim(), "service request rejected");
        let recipient = self.ports.tenant_recipient(Some(&request.tenant_id));
        self.ports.notify(
            MaintenanceNotice::new("request_rejected", &request.id)
                .recipient(recipient)
                .detail("reason", reason.trim()),
        );

        Ok(request)
    }

    /// Notes are the only change allowed once a request has left `pending`.
    pub fn add_request_note(
        &self,
        request_id: &RequestId,
        text: &str,
        actor: &Actor,
    ) -> Result<ServiceRequest, MaintenanceError> {
        if text.trim().is_empty() {
            return Err(BusinessRule::MissingField { field: "note" }.into());
        }

        let mut request = self.ports.load_request(request_id)?;
        let now = self.ports.now();
        AuditTrail::append(
            &mut request,
            HistoryEntry::new(AuditAction::NoteAdded, actor, now).with_detail("note", text.trim()),
        );

        self.ports.store.commit(ChangeSet::new().request(&mut request))?;
        Ok(request)
    }

    pub fn get(&self, request_id: &RequestId) -> Result<ServiceRequest, MaintenanceError> {
        self.ports.load_request(request_id)
    }

    pub fn pending(&self, limit: usize) -> Result<Vec<ServiceRequest>, MaintenanceError> {
        Ok(self.ports.store.pending_requests(limit)?)
    }
}

fn ensure_pending(request: &ServiceRequest, operation: &'static str) -> Result<(), MaintenanceError> {
    if request.is_pending() {
        Ok(())
    } else {
        Err(MaintenanceError::invalid_state(
            EntityKind::ServiceRequest,
            &request.id,
            operation,
            "pending",
            request.status.label(),
        ))
    }
}
