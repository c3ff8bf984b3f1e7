use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::maintenance::audit::{AuditAction, AuditTrail, HistoryEntry};
use crate::workflows::maintenance::domain::{
    Actor, Money, Priority, PropertyId, QuoteStatus, RequestId, RequestSubmission, Rfp, RfpId,
    ServiceRequest, TenantId, UnitId, Vendor, VendorId, VendorJob, VendorStatus, WorkOrder,
    WorkOrderId, WorkOrderStatus,
};
use crate::workflows::maintenance::memory::{
    InMemoryDirectory, InMemoryMaintenanceStore, InMemoryVendorRegistry, ManualClock,
    RecordingNotifications,
};
use crate::workflows::maintenance::repository::{
    ChangeSet, MaintenanceNotice, MaintenanceStore, NotificationError, NotificationPublisher,
    PropertySummary, RepositoryError, TenantContact,
};
use crate::workflows::maintenance::{
    BiddingPolicy, MaintenancePorts, MaintenanceService, MatchPolicy,
};

pub(super) const PROPERTY: &str = "prop-maple";
pub(super) const UNIT: &str = "unit-2b";
pub(super) const TENANT: &str = "tenant-ana";
pub(super) const PLUMBER: &str = "v-plumb";
pub(super) const SECOND_PLUMBER: &str = "v-pipes";
pub(super) const HVAC: &str = "v-hvac";
pub(super) const BLACKLISTED: &str = "v-shady";

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn pm() -> Actor {
    Actor::property_manager("pm-jordan")
}

pub(super) fn tenant() -> Actor {
    Actor::tenant(TENANT)
}

pub(super) fn owner() -> Actor {
    Actor::owner("owner-lee")
}

pub(super) fn vendor_actor(id: &str) -> Actor {
    Actor::vendor(&VendorId::new(id))
}

pub(super) fn directory() -> InMemoryDirectory {
    let mut units = BTreeMap::new();
    units.insert(UnitId::new(UNIT), "2B".to_string());

    InMemoryDirectory::new()
        .with_property(PropertySummary {
            property_id: PropertyId::new(PROPERTY),
            name: "Maple Court".to_string(),
            region: Some("North".to_string()),
            units,
        })
        .with_tenant(TenantContact {
            tenant_id: TenantId::new(TENANT),
            name: "Ana Ruiz".to_string(),
            email: Some("ana@example.com".to_string()),
            phone: None,
        })
}

pub(super) fn vendor(id: &str, categories: &[&str], status: VendorStatus) -> Vendor {
    Vendor {
        id: VendorId::new(id),
        name: format!("{id} services"),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        custom_categories: Vec::new(),
        regions: vec!["North".to_string()],
        tags: Vec::new(),
        default_hourly_rate: Money::ZERO,
        availability_247: false,
        status,
        work_orders: Vec::new(),
    }
}

pub(super) fn completed_jobs(count: usize) -> Vec<VendorJob> {
    (0..count)
        .map(|n| VendorJob {
            work_order_id: WorkOrderId(format!("past-{n}")),
            status: WorkOrderStatus::Completed,
        })
        .collect()
}

pub(super) fn roster() -> Vec<Vendor> {
    vec![
        vendor(PLUMBER, &["Plumbing"], VendorStatus::Active),
        vendor(SECOND_PLUMBER, &["Plumbing"], VendorStatus::Active),
        vendor(HVAC, &["HVAC"], VendorStatus::Active),
        vendor(BLACKLISTED, &["Plumbing"], VendorStatus::Blacklisted),
    ]
}

pub(super) fn submission(description: &str, priority: Priority) -> RequestSubmission {
    RequestSubmission {
        tenant_id: TenantId::new(TENANT),
        property_id: PropertyId::new(PROPERTY),
        unit_id: Some(UnitId::new(UNIT)),
        description: description.to_string(),
        category: Some("Plumbing".to_string()),
        priority,
        attachments: Vec::new(),
    }
}

/// Service wired to in-memory adapters, with handles for inspection.
pub(super) struct Harness<S = InMemoryMaintenanceStore> {
    pub(super) store: Arc<S>,
    pub(super) registry: Arc<InMemoryVendorRegistry>,
    pub(super) notifications: Arc<RecordingNotifications>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) service: Arc<MaintenanceService<S, InMemoryVendorRegistry>>,
}

pub(super) fn harness() -> Harness {
    harness_with(BiddingPolicy::default())
}

pub(super) fn harness_with(bidding: BiddingPolicy) -> Harness {
    harness_over(Arc::new(InMemoryMaintenanceStore::new()), bidding)
}

pub(super) fn harness_over<S>(store: Arc<S>, bidding: BiddingPolicy) -> Harness<S>
where
    S: MaintenanceStore + 'static,
{
    let registry = Arc::new(InMemoryVendorRegistry::new(roster()));
    let notifications = Arc::new(RecordingNotifications::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let directory = Arc::new(directory());

    let ports = MaintenancePorts::new(
        store.clone(),
        registry.clone(),
        directory.clone(),
        directory,
        notifications.clone(),
    )
    .with_clock(clock.clone());

    Harness {
        store,
        registry,
        notifications,
        clock,
        service: Arc::new(MaintenanceService::new(
            ports,
            MatchPolicy::default(),
            bidding,
        )),
    }
}

impl<S> Harness<S>
where
    S: MaintenanceStore + 'static,
{
    pub(super) fn pending_request(&self, priority: Priority) -> ServiceRequest {
        self.service
            .approvals()
            .submit_request(submission("Kitchen sink pipe is leaking", priority), &tenant())
            .expect("request submitted")
    }

    pub(super) fn stored_request(&self, id: &RequestId) -> ServiceRequest {
        self.store
            .request(id)
            .expect("store readable")
            .expect("request stored")
    }

    pub(super) fn stored_rfp(&self, id: &RfpId) -> Rfp {
        self.store
            .rfp(id)
            .expect("store readable")
            .expect("rfp stored")
    }

    pub(super) fn stored_work_order(&self, id: &WorkOrderId) -> WorkOrder {
        self.store
            .work_order(id)
            .expect("store readable")
            .expect("work order stored")
    }
}

/// Store whose commits fail whenever a work order is part of the change set.
#[derive(Default)]
pub(super) struct WorkOrderCommitFails {
    pub(super) inner: InMemoryMaintenanceStore,
}

impl MaintenanceStore for WorkOrderCommitFails {
    fn request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        self.inner.request(id)
    }

    fn rfp(&self, id: &RfpId) -> Result<Option<Rfp>, RepositoryError> {
        self.inner.rfp(id)
    }

    fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError> {
        self.inner.work_order(id)
    }

    fn work_orders_for_rfp(&self, id: &RfpId) -> Result<Vec<WorkOrder>, RepositoryError> {
        self.inner.work_orders_for_rfp(id)
    }

    fn pending_requests(&self, limit: usize) -> Result<Vec<ServiceRequest>, RepositoryError> {
        self.inner.pending_requests(limit)
    }

    fn commit(&self, changes: ChangeSet<'_>) -> Result<(), RepositoryError> {
        if !changes.work_orders.is_empty() {
            return Err(RepositoryError::Unavailable("work order table offline".to_string()));
        }
        self.inner.commit(changes)
    }
}

#[derive(Default)]
pub(super) struct OfflineNotifications;

impl NotificationPublisher for OfflineNotifications {
    fn publish(&self, _notice: MaintenanceNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store that lands a competing quote just before each of the next
/// `interference` RFP commits, as a concurrent vendor would.
pub(super) struct InterferingStore {
    pub(super) inner: InMemoryMaintenanceStore,
    competitor: VendorId,
    interference: Mutex<u32>,
}

impl InterferingStore {
    pub(super) fn new(competitor: &str, interference: u32) -> Self {
        Self {
            inner: InMemoryMaintenanceStore::new(),
            competitor: VendorId::new(competitor),
            interference: Mutex::new(interference),
        }
    }

    pub(super) fn arm(&self, interference: u32) {
        *self.interference.lock().expect("interference lock") = interference;
    }

    fn land_competing_quote(&self, rfp_id: &RfpId) -> Result<(), RepositoryError> {
        let Some(mut rfp) = self.inner.rfp(rfp_id)? else {
            return Ok(());
        };
        let at = start_time();
        if let Some(quote) = rfp.vendor_quotes.get_mut(&self.competitor) {
            quote.status = QuoteStatus::Accepted;
            quote.estimated_cost = Some(Money::from_dollars(510));
            quote.submitted_at = Some(at);
        }
        let actor = Actor::vendor(&self.competitor);
        AuditTrail::append(
            &mut rfp,
            HistoryEntry::new(AuditAction::QuoteSubmitted, &actor, at)
                .with_detail("vendor_id", self.competitor.as_str()),
        );
        self.inner.commit(ChangeSet::new().rfp(&mut rfp))
    }
}

impl MaintenanceStore for InterferingStore {
    fn request(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        self.inner.request(id)
    }

    fn rfp(&self, id: &RfpId) -> Result<Option<Rfp>, RepositoryError> {
        self.inner.rfp(id)
    }

    fn work_order(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError> {
        self.inner.work_order(id)
    }

    fn work_orders_for_rfp(&self, id: &RfpId) -> Result<Vec<WorkOrder>, RepositoryError> {
        self.inner.work_orders_for_rfp(id)
    }

    fn pending_requests(&self, limit: usize) -> Result<Vec<ServiceRequest>, RepositoryError> {
        self.inner.pending_requests(limit)
    }

    fn commit(&self, changes: ChangeSet<'_>) -> Result<(), RepositoryError> {
        let stored_rfp = changes
            .rfps
            .first()
            .filter(|rfp| rfp.version > 0)
            .map(|rfp| rfp.id.clone());
        if let Some(rfp_id) = stored_rfp {
            let interfere = {
                let mut remaining = self.interference.lock().expect("interference lock");
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            };
            if interfere {
                self.land_competing_quote(&rfp_id)?;
            }
        }
        self.inner.commit(changes)
    }
}
