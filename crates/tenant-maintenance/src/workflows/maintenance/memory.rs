//! In-process adapters for the maintenance ports. Used by the API service
//! for local runs and by tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::audit::Audited;
use super::domain::{
    PropertyId, RequestId, Rfp, RfpId, ServiceRequest, TenantId, Vendor, VendorId, VendorStatus,
    WorkOrder, WorkOrderId,
};
use super::repository::{
    ChangeSet, Clock, DirectoryError, MaintenanceNotice, MaintenanceStore, NotificationError,
    NotificationPublisher, PropertyDirectory, PropertySummary, RepositoryError, StoredEntity,
    TenantContact, TenantDirectory, VendorFilter, VendorRegistry, VendorWorkOrderNotice,
};

fn poisoned(_: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable("maintenance store lock poisoned".to_string())
}

#[derive(Default)]
struct Tables {
    requests: BTreeMap<RequestId, ServiceRequest>,
    rfps: BTreeMap<RfpId, Rfp>,
    work_orders: BTreeMap<WorkOrderId, WorkOrder>,
}

/// Versioned store guarded by a single lock so a change set lands whole.
#[derive(Default)]
pub struct InMemoryMaintenanceStore {
    tables: Mutex<Tables>,
}

impl InMemoryMaintenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.requests.len())
            .unwrap_or_default()
    }

    pub fn rfp_count(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.rfps.len())
            .unwrap_or_default()
    }

    pub fn work_order_count(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.work_orders.len())
            .unwrap_or_default()
    }
}

/// Reject a write that does not build on the stored copy.
fn check<E: StoredEntity>(
    stored: &BTreeMap<E::Id, E>,
    incoming: &E,
) -> Result<(), RepositoryError> {
    match stored.get(incoming.id()) {
        None if incoming.version() == 0 => Ok(()),
        None => Err(RepositoryError::NotFound {
            entity: E::KIND,
            id: incoming.id().to_string(),
        }),
        Some(_) if incoming.version() == 0 => Err(RepositoryError::Conflict {
            entity: E::KIND,
            id: incoming.id().to_string(),
        }),
        Some(current) if current.version() != incoming.version() => {
            Err(RepositoryError::VersionConflict {
                entity: E::KIND,
                id: incoming.id().to_string(),
                expected: incoming.version(),
                found: current.version(),
            })
        }
        Some(current) if !incoming.history().extends(current.history()) => {
            Err(RepositoryError::HistoryRewritten {
                entity: E::KIND,
                id: incoming.id().to_string(),
            })
        }
        Some(_) => Ok(()),
    }
}

fn write<E: StoredEntity>(stored: &mut BTreeMap<E::Id, E>, incoming: &mut E) {
    incoming.set_version(incoming.version() + 1);
    stored.insert(incoming.id().clone(), incoming.clone());
}

impl MaintenanceStore for InMemoryMaintenanceStore {
    fn request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.requests.get(id).cloned())
    }

    fn rfp(&self, id: &RfpId) -> Result<Option<Rfp>, RepositoryError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.rfps.get(id).cloned())
    }

    fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.work_orders.get(id).cloned())
    }

    fn work_orders_for_rfp(&self, id: &RfpId) -> Result<Vec<WorkOrder>, RepositoryError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables
            .work_orders
            .values()
            .filter(|work_order| work_order.rfp_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }

    fn pending_requests(&self, limit: usize) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        let mut pending: Vec<ServiceRequest> = tables
            .requests
            .values()
            .filter(|request| request.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit);
        Ok(pending)
    }

    fn commit(&self, changes: ChangeSet<'_>) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().map_err(poisoned)?;

        for request in &changes.requests {
            check(&tables.requests, &**request)?;
        }
        for rfp in &changes.rfps {
            check(&tables.rfps, &**rfp)?;
        }
        for work_order in &changes.work_orders {
            check(&tables.work_orders, &**work_order)?;
        }

        for request in changes.requests {
            write(&mut tables.requests, request);
        }
        for rfp in changes.rfps {
            write(&mut tables.rfps, rfp);
        }
        for work_order in changes.work_orders {
            tracing::trace!(entity = %work_order.audit_key(), "work order stored");
            write(&mut tables.work_orders, work_order);
        }

        Ok(())
    }
}

/// Vendor registry backed by a fixed roster. Records every hand-off.
#[derive(Default)]
pub struct InMemoryVendorRegistry {
    vendors: Mutex<BTreeMap<VendorId, Vendor>>,
    assignments: Mutex<Vec<(VendorId, VendorWorkOrderNotice)>>,
}

impl InMemoryVendorRegistry {
    pub fn new(vendors: impl IntoIterator<Item = Vendor>) -> Self {
        Self {
            vendors: Mutex::new(
                vendors
                    .into_iter()
                    .map(|vendor| (vendor.id.clone(), vendor))
                    .collect(),
            ),
            assignments: Mutex::new(Vec::new()),
        }
    }

    pub fn upsert(&self, vendor: Vendor) {
        if let Ok(mut vendors) = self.vendors.lock() {
            vendors.insert(vendor.id.clone(), vendor);
        }
    }

    pub fn assignments(&self) -> Vec<(VendorId, VendorWorkOrderNotice)> {
        self.assignments
            .lock()
            .map(|assignments| assignments.clone())
            .unwrap_or_default()
    }
}

fn unavailable(_: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::Unavailable("vendor registry lock poisoned".to_string())
}

fn contains_ignore_case(values: impl IntoIterator<Item = impl AsRef<str>>, wanted: &str) -> bool {
    let wanted = wanted.trim().to_lowercase();
    values
        .into_iter()
        .any(|value| value.as_ref().trim().to_lowercase() == wanted)
}

impl VendorRegistry for InMemoryVendorRegistry {
    fn vendor(&self, id: &VendorId) -> Result<Option<Vendor>, DirectoryError> {
        let vendors = self.vendors.lock().map_err(unavailable)?;
        Ok(vendors.get(id).cloned())
    }

    fn active_vendors(&self, filter: &VendorFilter) -> Result<Vec<Vendor>, DirectoryError> {
        let vendors = self.vendors.lock().map_err(unavailable)?;
        Ok(vendors
            .values()
            .filter(|vendor| vendor.status == VendorStatus::Active)
            .filter(|vendor| match &filter.region {
                Some(region) => contains_ignore_case(&vendor.regions, region),
                None => true,
            })
            .filter(|vendor| match &filter.category {
                Some(category) => contains_ignore_case(vendor.all_categories(), category),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn assign_work_order(
        &self,
        vendor_id: &VendorId,
        notice: VendorWorkOrderNotice,
    ) -> Result<(), DirectoryError> {
        let mut assignments = self.assignments.lock().map_err(unavailable)?;
        assignments.push((vendor_id.clone(), notice));
        Ok(())
    }
}

/// Property and tenant lookups over fixed fixtures.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    properties: BTreeMap<PropertyId, PropertySummary>,
    tenants: BTreeMap<TenantId, TenantContact>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, property: PropertySummary) -> Self {
        self.properties.insert(property.property_id.clone(), property);
        self
    }

    pub fn with_tenant(mut self, tenant: TenantContact) -> Self {
        self.tenants.insert(tenant.tenant_id.clone(), tenant);
        self
    }
}

impl PropertyDirectory for InMemoryDirectory {
    fn property(&self, id: &PropertyId) -> Result<Option<PropertySummary>, DirectoryError> {
        Ok(self.properties.get(id).cloned())
    }
}

impl TenantDirectory for InMemoryDirectory {
    fn tenant(&self, id: &TenantId) -> Result<Option<TenantContact>, DirectoryError> {
        Ok(self.tenants.get(id).cloned())
    }
}

/// Keeps every published notice for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifications {
    sent: Mutex<Vec<MaintenanceNotice>>,
}

impl RecordingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MaintenanceNotice> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn templates(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|notice| notice.template)
            .collect()
    }
}

impl NotificationPublisher for RecordingNotifications {
    fn publish(&self, notice: MaintenanceNotice) -> Result<(), NotificationError> {
        tracing::debug!(template = %notice.template, entity = %notice.entity_id, "notice recorded");
        self.sent
            .lock()
            .map_err(|_| NotificationError::Transport("notification log poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|_| Utc::now())
    }
}
