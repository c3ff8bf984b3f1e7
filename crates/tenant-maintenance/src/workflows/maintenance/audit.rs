//! Append-only history attached to every mutable maintenance entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, ActorRole, Rfp, ServiceRequest, WorkOrder};

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RequestSubmitted,
    RequestApproved,
    RequestRejected,
    NoteAdded,
    RfpCreated,
    VendorsSolicited,
    QuoteSubmitted,
    QuoteDeclined,
    VendorSelected,
    RfpClosed,
    WorkOrderCreated,
    VendorAssigned,
    VendorAccepted,
    VendorDeclined,
    WorkStarted,
    OwnerApproved,
    WorkCompleted,
    TenantVerified,
    WorkOrderCancelled,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::RequestSubmitted => "request_submitted",
            AuditAction::RequestApproved => "request_approved",
            AuditAction::RequestRejected => "request_rejected",
            AuditAction::NoteAdded => "note_added",
            AuditAction::RfpCreated => "rfp_created",
            AuditAction::VendorsSolicited => "vendors_solicited",
            AuditAction::QuoteSubmitted => "quote_submitted",
            AuditAction::QuoteDeclined => "quote_declined",
            AuditAction::VendorSelected => "vendor_selected",
            AuditAction::RfpClosed => "rfp_closed",
            AuditAction::WorkOrderCreated => "work_order_created",
            AuditAction::VendorAssigned => "vendor_assigned",
            AuditAction::VendorAccepted => "vendor_accepted",
            AuditAction::VendorDeclined => "vendor_declined",
            AuditAction::WorkStarted => "work_started",
            AuditAction::OwnerApproved => "owner_approved",
            AuditAction::WorkCompleted => "work_completed",
            AuditAction::TenantVerified => "tenant_verified",
            AuditAction::WorkOrderCancelled => "work_order_cancelled",
        }
    }
}

/// Immutable record of one state-affecting action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl HistoryEntry {
    pub fn new(action: AuditAction, actor: &Actor, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            timestamp,
            reason: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Insertion-ordered entries; existing entries are never exposed mutably.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryEntry>);

impl History {
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    /// Whether `self` is `previous` followed by zero or more new entries.
    pub fn extends(&self, previous: &History) -> bool {
        self.0.len() >= previous.0.len() && self.0[..previous.0.len()] == previous.0[..]
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }
}

/// Entities that own a history.
pub trait Audited {
    fn audit_key(&self) -> String;
    fn history(&self) -> &History;
    fn history_mut(&mut self) -> &mut History;
}

impl Audited for ServiceRequest {
    fn audit_key(&self) -> String {
        self.id.0.clone()
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }
}

impl Audited for Rfp {
    fn audit_key(&self) -> String {
        self.id.0.clone()
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }
}

impl Audited for WorkOrder {
    fn audit_key(&self) -> String {
        self.id.0.clone()
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }
}

/// The only writer of history entries.
pub struct AuditTrail;

impl AuditTrail {
    pub fn append<E: Audited>(entity: &mut E, entry: HistoryEntry) {
        tracing::debug!(
            entity = %entity.audit_key(),
            action = entry.action.label(),
            actor = %entry.actor_id,
            "audit entry appended"
        );
        entity.history_mut().push(entry);
    }
}
