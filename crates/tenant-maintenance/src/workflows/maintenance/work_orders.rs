use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::approval::DirectApproval;
use super::audit::{AuditAction, AuditTrail, HistoryEntry};
use super::domain::{
    Actor, ActorRole, Attachment, CompletionReport, Money, OwnerApproval, Priority, PropertyId,
    RequestId, Rfp, RfpId, ServiceRequest, TenantId, UnitId, VendorAssignment, VendorId,
    VendorQuote, WorkOrder, WorkOrderDraft, WorkOrderId, WorkOrderStatus,
};
use super::error::{BusinessRule, MaintenanceError};
use super::ports::MaintenancePorts;
use super::repository::{ChangeSet, EntityKind, MaintenanceNotice, MaintenanceStore, VendorRegistry};
use super::rfp::AwardTerms;

static WORK_ORDER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_work_order_id() -> WorkOrderId {
    let id = WORK_ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    WorkOrderId(format!("wo-{id:06}"))
}

/// Fields copied onto a new work order from its origin.
pub(crate) struct WorkOrderSeed {
    request_id: Option<RequestId>,
    rfp_id: Option<RfpId>,
    tenant_id: Option<TenantId>,
    property_id: PropertyId,
    unit_id: Option<UnitId>,
    category: Option<String>,
    description: String,
    priority: Priority,
    vendor_id: Option<VendorId>,
    estimated_cost: Money,
    owner_approval_needed: bool,
    due_date: Option<NaiveDate>,
    attachments: Vec<Attachment>,
}

impl WorkOrderSeed {
    pub(crate) fn from_request(request: &ServiceRequest, direct: DirectApproval) -> Self {
        Self {
            request_id: Some(request.id.clone()),
            rfp_id: None,
            tenant_id: Some(request.tenant_id.clone()),
            property_id: request.property_id.clone(),
            unit_id: request.unit_id.clone(),
            category: request.category.clone(),
            description: request.description.clone(),
            priority: request.priority,
            vendor_id: direct.vendor_id,
            estimated_cost: direct.estimated_cost,
            owner_approval_needed: direct.owner_approval_needed,
            due_date: direct.due_date,
            attachments: request.attachments.clone(),
        }
    }

    pub(crate) fn from_award(rfp: &Rfp, quote: &VendorQuote, terms: AwardTerms) -> Self {
        Self {
            request_id: rfp.request_id.clone(),
            rfp_id: Some(rfp.id.clone()),
            tenant_id: rfp.tenant_id.clone(),
            property_id: rfp.property_id.clone(),
            unit_id: rfp.unit_id.clone(),
            category: rfp.category.clone(),
            description: rfp.description.clone(),
            priority: rfp.priority,
            vendor_id: Some(quote.vendor_id.clone()),
            estimated_cost: quote.estimated_cost.unwrap_or_default(),
            owner_approval_needed: terms.owner_approval_needed,
            due_date: terms.due_date,
            attachments: rfp.attachments.clone(),
        }
    }

    fn from_draft(draft: WorkOrderDraft) -> Self {
        Self {
            request_id: None,
            rfp_id: None,
            tenant_id: draft.tenant_id,
            property_id: draft.property_id,
            unit_id: draft.unit_id,
            category: draft.category,
            description: draft.description,
            priority: draft.priority,
            vendor_id: draft.vendor_id,
            estimated_cost: draft.estimated_cost,
            owner_approval_needed: draft.owner_approval_needed,
            due_date: draft.due_date,
            attachments: draft.attachments,
        }
    }

    /// Build an uncommitted work order: `assigned` when a vendor is named,
    /// otherwise `open`.
    pub(crate) fn build<S, V>(
        self,
        ports: &MaintenancePorts<S, V>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, MaintenanceError>
    where
        S: MaintenanceStore + 'static,
        V: VendorRegistry + 'static,
    {
        if self.description.trim().is_empty() {
            return Err(BusinessRule::MissingField {
                field: "description",
            }
            .into());
        }

        let location = ports.location(&self.property_id, self.unit_id.as_ref())?;
        let assignment = match &self.vendor_id {
            Some(vendor_id) => {
                let vendor = ports.eligible_vendor(vendor_id)?;
                Some(VendorAssignment {
                    vendor_id: vendor.id,
                    vendor_name: vendor.name,
                    accepted: false,
                    assigned_at: now,
                })
            }
            None => None,
        };

        let status = if assignment.is_some() {
            WorkOrderStatus::Assigned
        } else {
            WorkOrderStatus::Open
        };

        let mut work_order = WorkOrder {
            id: next_work_order_id(),
            request_id: self.request_id,
            rfp_id: self.rfp_id,
            tenant_id: self.tenant_id,
            property_id: self.property_id,
            unit_id: self.unit_id,
            category: self.category,
            description: self.description,
            priority: self.priority,
            status,
            assignment,
            owner_approval: OwnerApproval::required(self.owner_approval_needed),
            tenant_verified: false,
            estimated_cost: self.estimated_cost,
            actual_cost: None,
            completion_photos: Vec::new(),
            completed_at: None,
            due_date: self.due_date,
            attachments: self.attachments,
            location: Some(location),
            history: Default::default(),
            created_at: now,
            version: 0,
        };

        let mut entry = HistoryEntry::new(AuditAction::WorkOrderCreated, actor, now)
            .with_detail("status", status.label())
            .with_detail("estimated_cost", work_order.estimated_cost.to_string());
        if let Some(vendor_id) = work_order.vendor_id() {
            entry = entry.with_detail("vendor_id", vendor_id.as_str());
        }
        AuditTrail::append(&mut work_order, entry);

        Ok(work_order)
    }
}

/// Targets accepted by [`WorkOrderStateMachine::update_wo_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTarget {
    InProgress,
    Completed,
    Cancelled,
}

/// Governs a work order from creation through completion or cancellation.
///
/// ```text
/// open ──assign──▶ assigned ──start──▶ in_progress ──complete──▶ completed
///   ▲                 │                                 ▲
///   └────decline──────┘        assigned ──complete──────┘
///
/// open | assigned | in_progress ──cancel──▶ cancelled
/// ```
pub struct WorkOrderStateMachine<S, V> {
    ports: MaintenancePorts<S, V>,
}

impl<S, V> WorkOrderStateMachine<S, V>
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    pub fn new(ports: MaintenancePorts<S, V>) -> Self {
        Self { ports }
    }

    pub fn get(&self, work_order_id: &WorkOrderId) -> Result<WorkOrder, MaintenanceError> {
        self.ports.load_work_order(work_order_id)
    }

    /// Create a work order without a request or bidding round behind it.
    pub fn create_work_order(
        &self,
        draft: WorkOrderDraft,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let now = self.ports.now();
        let mut work_order = WorkOrderSeed::from_draft(draft).build(&self.ports, actor, now)?;
        self.ports
            .store
            .commit(ChangeSet::new().work_order(&mut work_order))?;

        info!(work_order = %work_order.id, status = work_order.status.label(), "work order created");
        self.ports.hand_off_to_vendor(&work_order);
        Ok(work_order)
    }

    pub fn assign_vendor(
        &self,
        work_order_id: &WorkOrderId,
        vendor_id: &VendorId,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_not_terminal(&work_order, "assign a vendor to")?;

        if let Some(current) = work_order.vendor_id() {
            return Err(BusinessRule::VendorAlreadyAssigned {
                vendor_id: current.clone(),
            }
            .into());
        }

        let vendor = self.ports.eligible_vendor(vendor_id)?;
        let now = self.ports.now();
        work_order.assignment = Some(VendorAssignment {
            vendor_id: vendor.id,
            vendor_name: vendor.name,
            accepted: false,
            assigned_at: now,
        });
        work_order.status = WorkOrderStatus::Assigned;

        AuditTrail::append(
            &mut work_order,
            HistoryEntry::new(AuditAction::VendorAssigned, actor, now)
                .with_detail("vendor_id", vendor_id.as_str()),
        );

        self.commit(&mut work_order)?;

        info!(work_order = %work_order.id, vendor = %vendor_id, "vendor assigned");
        self.ports.hand_off_to_vendor(&work_order);
        Ok(work_order)
    }

    /// Vendor confirms the job; status stays `assigned` until work starts.
    pub fn accept_vendor_wo(
        &self,
        work_order_id: &WorkOrderId,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_status(&work_order, WorkOrderStatus::Assigned, "accept", "assigned")?;
        ensure_assigned_vendor(&work_order, actor)?;

        let now = self.ports.now();
        let vendor_id = match work_order.assignment.as_mut() {
            Some(assignment) if assignment.accepted => {
                return Err(MaintenanceError::invalid_state(
                    EntityKind::WorkOrder,
                    work_order_id,
                    "accept",
                    "an unaccepted assignment",
                    "already accepted",
                ));
            }
            Some(assignment) => {
                assignment.accepted = true;
                assignment.vendor_id.clone()
            }
            None => return Err(BusinessRule::NoVendorAssigned.into()),
        };

        AuditTrail::append(
            &mut work_order,
            HistoryEntry::new(AuditAction::VendorAccepted, actor, now)
                .with_detail("vendor_id", vendor_id.as_str()),
        );

        self.commit(&mut work_order)?;

        info!(work_order = %work_order.id, vendor = %vendor_id, "vendor accepted work order");
        self.ports.notify(
            MaintenanceNotice::new("work_order_accepted", &work_order.id)
                .detail("vendor_id", vendor_id.as_str()),
        );
        Ok(work_order)
    }

    /// Vendor turns the job down; the work order returns to `open` for reassignment.
    pub fn decline_vendor_wo(
        &self,
        work_order_id: &WorkOrderId,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_status(&work_order, WorkOrderStatus::Assigned, "decline", "assigned")?;
        ensure_assigned_vendor(&work_order, actor)?;

        let previous = work_order
            .assignment
            .take()
            .ok_or(BusinessRule::NoVendorAssigned)?;
        work_order.status = WorkOrderStatus::Open;

        let now = self.ports.now();
        AuditTrail::append(
            &mut work_order,
            HistoryEntry::new(AuditAction::VendorDeclined, actor, now)
                .with_detail("vendor_id", previous.vendor_id.as_str()),
        );

        self.commit(&mut work_order)?;

        info!(work_order = %work_order.id, vendor = %previous.vendor_id, "vendor declined work order");
        self.ports.notify(
            MaintenanceNotice::new("work_order_declined", &work_order.id)
                .detail("vendor_id", previous.vendor_id.as_str()),
        );
        Ok(work_order)
    }

    pub fn update_wo_status(
        &self,
        work_order_id: &WorkOrderId,
        target: StatusTarget,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        match target {
            StatusTarget::InProgress => self.start(work_order_id, actor),
            StatusTarget::Completed => {
                self.complete_wo(work_order_id, CompletionReport::default(), actor)
            }
            StatusTarget::Cancelled => self.cancel(work_order_id, actor),
        }
    }

    fn start(&self, work_order_id: &WorkOrderId, actor: &Actor) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_status(&work_order, WorkOrderStatus::Assigned, "start", "assigned")?;
        ensure_vendor_accepted(&work_order)?;
        ensure_assigned_vendor(&work_order, actor)?;

        let now = self.ports.now();
        work_order.status = WorkOrderStatus::InProgress;
        AuditTrail::append(
            &mut work_order,
            HistoryEntry::new(AuditAction::WorkStarted, actor, now),
        );

        self.commit(&mut work_order)?;
        info!(work_order = %work_order.id, "work started");
        Ok(work_order)
    }

    fn cancel(&self, work_order_id: &WorkOrderId, actor: &Actor) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_not_terminal(&work_order, "cancel")?;

        let now = self.ports.now();
        let previous = work_order.status;
        work_order.status = WorkOrderStatus::Cancelled;
        AuditTrail::append(
            &mut work_order,
            HistoryEntry::new(AuditAction::WorkOrderCancelled, actor, now)
                .with_detail("previous_status", previous.label()),
        );

        self.commit(&mut work_order)?;

        info!(work_order = %work_order.id, previous = previous.label(), "work order cancelled");
        if let Some(vendor_id) = work_order.vendor_id() {
            self.ports.notify(
                MaintenanceNotice::new("work_order_cancelled", &work_order.id)
                    .recipient(Some(vendor_id.0.clone())),
            );
        }
        Ok(work_order)
    }

    /// Owner sign-off. Does not advance status; completion re-checks the gate.
    pub fn approve_owner_wo(
        &self,
        work_order_id: &WorkOrderId,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_not_terminal(&work_order, "approve spend for")?;

        if work_order.owner_approval != OwnerApproval::Pending {
            return Err(MaintenanceError::invalid_state(
                EntityKind::WorkOrder,
                work_order_id,
                "approve spend for",
                "owner approval pending",
                format!("owner approval {}", work_order.owner_approval.label()),
            ));
        }

        let now = self.ports.now();
        work_order.owner_approval = OwnerApproval::Approved {
            approved_by: actor.id.clone(),
            approved_at: now,
        };
        let entry = HistoryEntry::new(AuditAction::OwnerApproved, actor, now)
            .with_detail("estimated_cost", work_order.estimated_cost.to_string());
        AuditTrail::append(&mut work_order, entry);

        self.commit(&mut work_order)?;
        info!(work_order = %work_order.id, owner = %actor.id, "owner approved spend");
        Ok(work_order)
    }

    /// The only path to `completed`.
    pub fn complete_wo(
        &self,
        work_order_id: &WorkOrderId,
        report: CompletionReport,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;

        if !work_order.owner_gate_satisfied() {
            return Err(MaintenanceError::ApprovalRequired {
                work_order_id: work_order.id,
            });
        }
        ensure_not_terminal(&work_order, "complete")?;
        if work_order.status == WorkOrderStatus::Open {
            return Err(BusinessRule::NoVendorAssigned.into());
        }
        ensure_vendor_accepted(&work_order)?;
        ensure_assigned_vendor(&work_order, actor)?;

        let now = self.ports.now();
        work_order.status = WorkOrderStatus::Completed;
        work_order.completion_photos = report.photos;
        work_order.actual_cost = report.actual_cost;
        work_order.completed_at = Some(now);

        let mut entry = HistoryEntry::new(AuditAction::WorkCompleted, actor, now)
            .with_detail("photos", work_order.completion_photos.len().to_string());
        if let Some(cost) = work_order.actual_cost {
            entry = entry.with_detail("actual_cost", cost.to_string());
        }
        AuditTrail::append(&mut work_order, entry);

        self.commit(&mut work_order)?;

        info!(work_order = %work_order.id, "work order completed");
        let recipient = self.ports.tenant_recipient(work_order.tenant_id.as_ref());
        self.ports.notify(
            MaintenanceNotice::new("work_order_completed", &work_order.id).recipient(recipient),
        );
        Ok(work_order)
    }

    /// Tenant confirms the fix after completion.
    pub fn verify_tenant_wo(
        &self,
        work_order_id: &WorkOrderId,
        actor: &Actor,
    ) -> Result<WorkOrder, MaintenanceError> {
        let mut work_order = self.ports.load_work_order(work_order_id)?;
        ensure_status(&work_order, WorkOrderStatus::Completed, "verify", "completed")?;

        if work_order.tenant_verified {
            return Err(MaintenanceError::invalid_state(
                EntityKind::WorkOrder,
                work_order_id,
                "verify",
                "unverified",
                "already verified",
            ));
        }

        let now = self.ports.now();
        work_order.tenant_verified = true;
        AuditTrail::append(
            &mut work_order,
            HistoryEntry::new(AuditAction::TenantVerified, actor, now),
        );

        self.commit(&mut work_order)?;
        info!(work_order = %work_order.id, "tenant verified repair");
        Ok(work_order)
    }

    fn commit(&self, work_order: &mut WorkOrder) -> Result<(), MaintenanceError> {
        self.ports
            .store
            .commit(ChangeSet::new().work_order(work_order))?;
        Ok(())
    }
}

fn ensure_status(
    work_order: &WorkOrder,
    required: WorkOrderStatus,
    operation: &'static str,
    required_label: &'static str,
) -> Result<(), MaintenanceError> {
    if work_order.status == required {
        Ok(())
    } else {
        Err(MaintenanceError::invalid_state(
            EntityKind::WorkOrder,
            &work_order.id,
            operation,
            required_label,
            work_order.status,
        ))
    }
}

fn ensure_not_terminal(work_order: &WorkOrder, operation: &'static str) -> Result<(), MaintenanceError> {
    if work_order.status.is_terminal() {
        Err(MaintenanceError::invalid_state(
            EntityKind::WorkOrder,
            &work_order.id,
            operation,
            "open, assigned, or in_progress",
            work_order.status,
        ))
    } else {
        Ok(())
    }
}

fn ensure_vendor_accepted(work_order: &WorkOrder) -> Result<(), MaintenanceError> {
    match &work_order.assignment {
        Some(assignment) if assignment.accepted => Ok(()),
        Some(assignment) => Err(BusinessRule::VendorNotAccepted {
            vendor_id: assignment.vendor_id.clone(),
        }
        .into()),
        None => Err(BusinessRule::NoVendorAssigned.into()),
    }
}

/// Vendors may only act on work orders assigned to them.
fn ensure_assigned_vendor(work_order: &WorkOrder, actor: &Actor) -> Result<(), MaintenanceError> {
    if actor.role != ActorRole::Vendor {
        return Ok(());
    }
    match work_order.vendor_id() {
        Some(vendor_id) if vendor_id.as_str() == actor.id => Ok(()),
        _ => Err(BusinessRule::NotAssignedVendor {
            actor_id: actor.id.clone(),
        }
        .into()),
    }
}
