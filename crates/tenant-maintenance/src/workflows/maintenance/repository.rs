use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::Audited;
use super::domain::{
    Money, PropertyId, RequestId, Rfp, RfpId, ServiceRequest, TenantId, UnitId, Vendor, VendorId,
    WorkOrder, WorkOrderId,
};

/// Kinds of records the maintenance core reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ServiceRequest,
    Rfp,
    VendorQuote,
    WorkOrder,
    Vendor,
    Property,
    Unit,
    Tenant,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::ServiceRequest => "service request",
            EntityKind::Rfp => "rfp",
            EntityKind::VendorQuote => "vendor quote",
            EntityKind::WorkOrder => "work order",
            EntityKind::Vendor => "vendor",
            EntityKind::Property => "property",
            EntityKind::Unit => "unit",
            EntityKind::Tenant => "tenant",
        };
        f.write_str(label)
    }
}

/// Error enumeration for entity store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} '{id}' already exists")]
    Conflict { entity: EntityKind, id: String },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("{entity} '{id}' was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        entity: EntityKind,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("{entity} '{id}' history may only be appended to")]
    HistoryRewritten { entity: EntityKind, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Records held by the entity store under optimistic versioning.
///
/// Version 0 marks a record that has never been stored. The store bumps the
/// version on every successful commit.
pub trait StoredEntity: Audited + Clone {
    type Id: Ord + Clone + fmt::Display;
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl StoredEntity for ServiceRequest {
    type Id = RequestId;
    const KIND: EntityKind = EntityKind::ServiceRequest;

    fn id(&self) -> &RequestId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl StoredEntity for Rfp {
    type Id = RfpId;
    const KIND: EntityKind = EntityKind::Rfp;

    fn id(&self) -> &RfpId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl StoredEntity for WorkOrder {
    type Id = WorkOrderId;
    const KIND: EntityKind = EntityKind::WorkOrder;

    fn id(&self) -> &WorkOrderId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Records committed together: either every record is stored or none is.
///
/// Records are borrowed mutably so the store can hand back the new versions.
#[derive(Debug, Default)]
pub struct ChangeSet<'a> {
    pub requests: Vec<&'a mut ServiceRequest>,
    pub rfps: Vec<&'a mut Rfp>,
    pub work_orders: Vec<&'a mut WorkOrder>,
}

impl<'a> ChangeSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, request: &'a mut ServiceRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn rfp(mut self, rfp: &'a mut Rfp) -> Self {
        self.rfps.push(rfp);
        self
    }

    pub fn work_order(mut self, work_order: &'a mut WorkOrder) -> Self {
        self.work_orders.push(work_order);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.rfps.is_empty() && self.work_orders.is_empty()
    }
}

/// Opaque keyed entity store with atomic, version-checked commits.
pub trait MaintenanceStore: Send + Sync {
    fn request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError>;
    fn rfp(&self, id: &RfpId) -> Result<Option<Rfp>, RepositoryError>;
    fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError>;
    fn work_orders_for_rfp(&self, id: &RfpId) -> Result<Vec<WorkOrder>, RepositoryError>;
    fn pending_requests(&self, limit: usize) -> Result<Vec<ServiceRequest>, RepositoryError>;

    /// Store every record in `changes` or none of them. On success each
    /// borrowed record carries its new version.
    fn commit(&self, changes: ChangeSet<'_>) -> Result<(), RepositoryError>;
}

/// Failure reaching an external directory or registry.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Narrowing applied by the registry before vendors reach the match engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorFilter {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl VendorFilter {
    /// Every active vendor.
    pub fn active() -> Self {
        Self::default()
    }
}

/// Payload handed to the registry whenever a work order names a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorWorkOrderNotice {
    pub work_order_id: WorkOrderId,
    pub property_id: PropertyId,
    pub description: String,
    pub estimated_cost: Money,
}

/// External vendor registry.
pub trait VendorRegistry: Send + Sync {
    fn vendor(&self, id: &VendorId) -> Result<Option<Vendor>, DirectoryError>;
    /// Active vendors only, narrowed by the filter.
    fn active_vendors(&self, filter: &VendorFilter) -> Result<Vec<Vendor>, DirectoryError>;
    fn assign_work_order(
        &self,
        vendor_id: &VendorId,
        notice: VendorWorkOrderNotice,
    ) -> Result<(), DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub property_id: PropertyId,
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub units: BTreeMap<UnitId, String>,
}

/// Read-only property and unit lookup.
pub trait PropertyDirectory: Send + Sync {
    fn property(&self, id: &PropertyId) -> Result<Option<PropertySummary>, DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContact {
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Read-only tenant lookup.
pub trait TenantDirectory: Send + Sync {
    fn tenant(&self, id: &TenantId) -> Result<Option<TenantContact>, DirectoryError>;
}

/// Best-effort notice for the messaging layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceNotice {
    pub template: String,
    pub entity_id: String,
    #[serde(default)]
    pub recipient: Option<String>,
    pub details: BTreeMap<String, String>,
}

impl MaintenanceNotice {
    pub fn new(template: &str, entity_id: impl fmt::Display) -> Self {
        Self {
            template: template.to_string(),
            entity_id: entity_id.to_string(),
            recipient: None,
            details: BTreeMap::new(),
        }
    }

    pub fn recipient(mut self, recipient: Option<String>) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound messaging hook; never awaited as part of a transition.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: MaintenanceNotice) -> Result<(), NotificationError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
