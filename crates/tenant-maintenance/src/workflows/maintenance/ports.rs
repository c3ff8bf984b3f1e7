use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{
    LocationSnapshot, PropertyId, RequestId, Rfp, RfpId, ServiceRequest, TenantId, UnitId, Vendor,
    VendorId, WorkOrder, WorkOrderId,
};
use super::error::{BusinessRule, MaintenanceError};
use super::repository::{
    Clock, EntityKind, MaintenanceNotice, MaintenanceStore, NotificationPublisher,
    PropertyDirectory, SystemClock, TenantContact, TenantDirectory, VendorRegistry,
    VendorWorkOrderNotice,
};

/// Collaborators injected into every maintenance component.
pub struct MaintenancePorts<S, V> {
    pub store: Arc<S>,
    pub vendors: Arc<V>,
    pub properties: Arc<dyn PropertyDirectory>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub notifications: Arc<dyn NotificationPublisher>,
    pub clock: Arc<dyn Clock>,
}

impl<S, V> Clone for MaintenancePorts<S, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            vendors: Arc::clone(&self.vendors),
            properties: Arc::clone(&self.properties),
            tenants: Arc::clone(&self.tenants),
            notifications: Arc::clone(&self.notifications),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, V> MaintenancePorts<S, V>
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    pub fn new(
        store: Arc<S>,
        vendors: Arc<V>,
        properties: Arc<dyn PropertyDirectory>,
        tenants: Arc<dyn TenantDirectory>,
        notifications: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            store,
            vendors,
            properties,
            tenants,
            notifications,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn load_request(&self, id: &RequestId) -> Result<ServiceRequest, MaintenanceError> {
        self.store
            .request(id)?
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::ServiceRequest, id))
    }

    pub(crate) fn load_rfp(&self, id: &RfpId) -> Result<Rfp, MaintenanceError> {
        self.store
            .rfp(id)?
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::Rfp, id))
    }

    pub(crate) fn load_work_order(&self, id: &WorkOrderId) -> Result<WorkOrder, MaintenanceError> {
        self.store
            .work_order(id)?
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::WorkOrder, id))
    }

    /// Resolve a vendor that may be named on new work or solicited for a bid.
    pub(crate) fn eligible_vendor(&self, id: &VendorId) -> Result<Vendor, MaintenanceError> {
        let vendor = self
            .vendors
            .vendor(id)?
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::Vendor, id))?;

        if vendor.is_blacklisted() {
            return Err(BusinessRule::VendorBlacklisted {
                vendor_id: vendor.id,
            }
            .into());
        }

        Ok(vendor)
    }

    pub(crate) fn location(
        &self,
        property_id: &PropertyId,
        unit_id: Option<&UnitId>,
    ) -> Result<LocationSnapshot, MaintenanceError> {
        let property = self
            .properties
            .property(property_id)?
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::Property, property_id))?;

        let unit_label = match unit_id {
            Some(unit_id) => Some(
                property
                    .units
                    .get(unit_id)
                    .cloned()
                    .ok_or_else(|| MaintenanceError::not_found(EntityKind::Unit, unit_id))?,
            ),
            None => None,
        };

        Ok(LocationSnapshot {
            property_name: property.name,
            unit_label,
            region: property.region,
        })
    }

    pub(crate) fn tenant(&self, id: &TenantId) -> Result<TenantContact, MaintenanceError> {
        self.tenants
            .tenant(id)?
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::Tenant, id))
    }

    /// Contact address for a tenant, for post-commit messaging only.
    pub(crate) fn tenant_recipient(&self, id: Option<&TenantId>) -> Option<String> {
        let id = id?;
        match self.tenants.tenant(id) {
            Ok(Some(contact)) => contact.email.or(contact.phone),
            Ok(None) => None,
            Err(err) => {
                warn!(tenant = %id, error = %err, "tenant lookup failed; notice sent without recipient");
                None
            }
        }
    }

    /// Fire-and-forget; delivery failures never undo a committed transition.
    pub(crate) fn notify(&self, notice: MaintenanceNotice) {
        let template = notice.template.clone();
        let entity = notice.entity_id.clone();
        if let Err(err) = self.notifications.publish(notice) {
            warn!(%template, %entity, error = %err, "maintenance notice not delivered");
        }
    }

    /// Tell the registry a committed work order now names one of its vendors.
    pub(crate) fn hand_off_to_vendor(&self, work_order: &WorkOrder) {
        let Some(vendor_id) = work_order.vendor_id() else {
            return;
        };

        let notice = VendorWorkOrderNotice {
            work_order_id: work_order.id.clone(),
            property_id: work_order.property_id.clone(),
            description: work_order.description.clone(),
            estimated_cost: work_order.estimated_cost,
        };

        if let Err(err) = self.vendors.assign_work_order(vendor_id, notice) {
            warn!(
                work_order = %work_order.id,
                vendor = %vendor_id,
                error = %err,
                "vendor registry hand-off failed"
            );
        }
    }
}
