use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::audit::History;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier for a tenant-submitted service request.
    RequestId
);
string_id!(
    /// Identifier for a competitive bidding round.
    RfpId
);
string_id!(
    /// Identifier for an assignable unit of maintenance work.
    WorkOrderId
);
string_id!(VendorId);
string_id!(TenantId);
string_id!(PropertyId);
string_id!(UnitId);

/// Urgency reported by the tenant and carried onto every descendant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    Emergency,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
            Priority::Emergency => "emergency",
        }
    }
}

/// Whole cents, so costs compare and sum exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Role under which an actor performed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Tenant,
    PropertyManager,
    Owner,
    Vendor,
    System,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Tenant => "tenant",
            ActorRole::PropertyManager => "property_manager",
            ActorRole::Owner => "owner",
            ActorRole::Vendor => "vendor",
            ActorRole::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tenant" => Some(Self::Tenant),
            "property_manager" | "pm" | "manager" => Some(Self::PropertyManager),
            "owner" => Some(Self::Owner),
            "vendor" => Some(Self::Vendor),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Whoever is driving a transition; recorded on every history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn tenant(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Tenant)
    }

    pub fn property_manager(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::PropertyManager)
    }

    pub fn owner(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Owner)
    }

    pub fn vendor(id: &VendorId) -> Self {
        Self::new(id.0.clone(), ActorRole::Vendor)
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}

/// Photo or document attached by the tenant and copied onto descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub storage_key: String,
}

/// Display data resolved from the property directory at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub property_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Tenant-provided intake payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmission {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// The record produced by approving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DescendantRef {
    WorkOrder(WorkOrderId),
    Rfp(RfpId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved {
        descendant: DescendantRef,
    },
    Rejected {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl RequestStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved { .. } => "approved",
            RequestStatus::Rejected { .. } => "rejected",
        }
    }
}

/// A tenant-submitted maintenance issue awaiting triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub unit_id: Option<UnitId>,
    pub description: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub status: RequestStatus,
    pub attachments: Vec<Attachment>,
    pub history: History,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl ServiceRequest {
    pub fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    pub fn descendant(&self) -> Option<&DescendantRef> {
        match &self.status {
            RequestStatus::Approved { descendant } => Some(descendant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RfpStatus {
    Open,
    Awarded {
        vendor_id: VendorId,
        work_order_id: WorkOrderId,
    },
    Closed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl RfpStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            RfpStatus::Open => "open",
            RfpStatus::Awarded { .. } => "awarded",
            RfpStatus::Closed { .. } => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Declined,
}

impl QuoteStatus {
    pub const fn label(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One vendor's bid against an RFP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorQuote {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub status: QuoteStatus,
    pub estimated_cost: Option<Money>,
    pub estimated_days: Option<u32>,
    pub notes: Option<String>,
    pub solicited_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Vendor-provided bid details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSubmission {
    #[serde(default)]
    pub estimated_cost: Option<Money>,
    #[serde(default)]
    pub estimated_days: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A multi-vendor bidding round solicited for one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfp {
    pub id: RfpId,
    pub request_id: Option<RequestId>,
    pub tenant_id: Option<TenantId>,
    pub property_id: PropertyId,
    pub unit_id: Option<UnitId>,
    pub description: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub attachments: Vec<Attachment>,
    pub status: RfpStatus,
    pub vendor_quotes: BTreeMap<VendorId, VendorQuote>,
    pub history: History,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Rfp {
    pub fn is_open(&self) -> bool {
        matches!(self.status, RfpStatus::Open)
    }

    pub fn selected_vendor_id(&self) -> Option<&VendorId> {
        match &self.status {
            RfpStatus::Awarded { vendor_id, .. } => Some(vendor_id),
            _ => None,
        }
    }

    pub fn quote(&self, vendor_id: &VendorId) -> Option<&VendorQuote> {
        self.vendor_quotes.get(vendor_id)
    }
}

/// Manual RFP creation without an originating request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfpDraft {
    pub property_id: PropertyId,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub const fn label(self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "open",
            WorkOrderStatus::Assigned => "assigned",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, WorkOrderStatus::Completed | WorkOrderStatus::Cancelled)
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The vendor currently holding a work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAssignment {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub accepted: bool,
    pub assigned_at: DateTime<Utc>,
}

/// Owner sign-off state; the need for it is decided upstream from the owner agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OwnerApproval {
    NotRequired,
    Pending,
    Approved {
        approved_by: String,
        approved_at: DateTime<Utc>,
    },
}

impl OwnerApproval {
    pub fn required(needed: bool) -> Self {
        if needed {
            Self::Pending
        } else {
            Self::NotRequired
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            OwnerApproval::NotRequired => "not_required",
            OwnerApproval::Pending => "pending",
            OwnerApproval::Approved { .. } => "approved",
        }
    }
}

/// The authorized, assignable unit of maintenance work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub request_id: Option<RequestId>,
    pub rfp_id: Option<RfpId>,
    pub tenant_id: Option<TenantId>,
    pub property_id: PropertyId,
    pub unit_id: Option<UnitId>,
    pub category: Option<String>,
    pub description: String,
    pub priority: Priority,
    pub status: WorkOrderStatus,
    pub assignment: Option<VendorAssignment>,
    pub owner_approval: OwnerApproval,
    pub tenant_verified: bool,
    pub estimated_cost: Money,
    pub actual_cost: Option<Money>,
    pub completion_photos: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub attachments: Vec<Attachment>,
    pub location: Option<LocationSnapshot>,
    pub history: History,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl WorkOrder {
    pub fn vendor_id(&self) -> Option<&VendorId> {
        self.assignment.as_ref().map(|assignment| &assignment.vendor_id)
    }

    pub fn vendor_name(&self) -> Option<&str> {
        self.assignment
            .as_ref()
            .map(|assignment| assignment.vendor_name.as_str())
    }

    pub fn vendor_accepted(&self) -> bool {
        self.assignment
            .as_ref()
            .map(|assignment| assignment.accepted)
            .unwrap_or(false)
    }

    pub fn owner_approval_needed(&self) -> bool {
        !matches!(self.owner_approval, OwnerApproval::NotRequired)
    }

    pub fn owner_approved(&self) -> bool {
        matches!(self.owner_approval, OwnerApproval::Approved { .. })
    }

    /// True when completion is not blocked on the owner.
    pub fn owner_gate_satisfied(&self) -> bool {
        !self.owner_approval_needed() || self.owner_approved()
    }
}

/// Manual work order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderDraft {
    pub property_id: PropertyId,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub estimated_cost: Money,
    #[serde(default)]
    pub owner_approval_needed: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Evidence captured when the vendor finishes the job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub actual_cost: Option<Money>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Active,
    Archived,
    Blacklisted,
}

/// Past job as reported by the vendor registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorJob {
    pub work_order_id: WorkOrderId,
    pub status: WorkOrderStatus,
}

/// Vendor profile as exposed by the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub custom_categories: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub default_hourly_rate: Money,
    #[serde(default)]
    pub availability_247: bool,
    pub status: VendorStatus,
    #[serde(default)]
    pub work_orders: Vec<VendorJob>,
}

impl Vendor {
    pub fn is_blacklisted(&self) -> bool {
        self.status == VendorStatus::Blacklisted
    }

    pub fn completed_jobs(&self) -> usize {
        self.work_orders
            .iter()
            .filter(|job| job.status == WorkOrderStatus::Completed)
            .count()
    }

    /// Standard and custom categories in declaration order.
    pub fn all_categories(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .chain(self.custom_categories.iter())
            .map(String::as_str)
    }
}
