use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tenant_maintenance::config::MaintenanceConfig;
use tenant_maintenance::workflows::maintenance::{
    InMemoryDirectory, InMemoryMaintenanceStore, InMemoryVendorRegistry, MaintenancePorts,
    MaintenanceService, Money, PropertyId, PropertySummary, RecordingNotifications, TenantContact,
    TenantId, UnitId, Vendor, VendorId, VendorStatus,
};

pub(crate) type LocalMaintenanceService =
    MaintenanceService<InMemoryMaintenanceStore, InMemoryVendorRegistry>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_PROPERTY: &str = "prop-harbor";
pub(crate) const DEMO_UNIT: &str = "unit-3c";
pub(crate) const DEMO_TENANT: &str = "tenant-maya";

/// Property and tenant fixtures for local runs.
pub(crate) fn seed_directory() -> InMemoryDirectory {
    let mut units = BTreeMap::new();
    units.insert(UnitId::new(DEMO_UNIT), "3C".to_string());
    units.insert(UnitId::new("unit-1a"), "1A".to_string());

    InMemoryDirectory::new()
        .with_property(PropertySummary {
            property_id: PropertyId::new(DEMO_PROPERTY),
            name: "Harbor View Apartments".to_string(),
            region: Some("Downtown".to_string()),
            units,
        })
        .with_tenant(TenantContact {
            tenant_id: TenantId::new(DEMO_TENANT),
            name: "Maya Patel".to_string(),
            email: Some("maya.patel@example.com".to_string()),
            phone: Some("555-0142".to_string()),
        })
}

fn seed_vendor(
    id: &str,
    name: &str,
    categories: &[&str],
    tags: &[&str],
    hourly_rate: Money,
    availability_247: bool,
    status: VendorStatus,
) -> Vendor {
    Vendor {
        id: VendorId::new(id),
        name: name.to_string(),
        categories: categories.iter().map(|value| value.to_string()).collect(),
        custom_categories: Vec::new(),
        regions: vec!["Downtown".to_string()],
        tags: tags.iter().map(|value| value.to_string()).collect(),
        default_hourly_rate: hourly_rate,
        availability_247,
        status,
        work_orders: Vec::new(),
    }
}

pub(crate) fn seed_vendors() -> Vec<Vendor> {
    vec![
        seed_vendor(
            "v-rapid-rooter",
            "Rapid Rooter Plumbing",
            &["Plumbing"],
            &["Preferred", "Licensed"],
            Money::from_dollars(85),
            true,
            VendorStatus::Active,
        ),
        seed_vendor(
            "v-budget-pipes",
            "Budget Pipes",
            &["Plumbing", "Water Heater"],
            &["Insured"],
            Money::from_dollars(55),
            false,
            VendorStatus::Active,
        ),
        seed_vendor(
            "v-northwind",
            "Northwind Heating & Air",
            &["HVAC"],
            &["Licensed"],
            Money::from_dollars(95),
            true,
            VendorStatus::Active,
        ),
        seed_vendor(
            "v-spark",
            "Spark Electric",
            &["Electrical"],
            &[],
            Money::from_dollars(70),
            false,
            VendorStatus::Archived,
        ),
        seed_vendor(
            "v-fly-by-night",
            "Fly By Night Repairs",
            &["Plumbing", "Electrical"],
            &[],
            Money::from_dollars(40),
            true,
            VendorStatus::Blacklisted,
        ),
    ]
}

/// Handles onto the in-process adapters behind a locally wired service.
pub(crate) struct LocalMaintenance {
    pub(crate) store: Arc<InMemoryMaintenanceStore>,
    pub(crate) registry: Arc<InMemoryVendorRegistry>,
    pub(crate) notifications: Arc<RecordingNotifications>,
    pub(crate) service: Arc<LocalMaintenanceService>,
}

pub(crate) fn local_maintenance(config: &MaintenanceConfig, vendors: Vec<Vendor>) -> LocalMaintenance {
    let store = Arc::new(InMemoryMaintenanceStore::new());
    let registry = Arc::new(InMemoryVendorRegistry::new(vendors));
    let notifications = Arc::new(RecordingNotifications::new());
    let directory = Arc::new(seed_directory());

    let ports = MaintenancePorts::new(
        store.clone(),
        registry.clone(),
        directory.clone(),
        directory,
        notifications.clone(),
    );
    let service = Arc::new(MaintenanceService::new(
        ports,
        config.match_policy(),
        config.bidding_policy(),
    ));

    LocalMaintenance {
        store,
        registry,
        notifications,
        service,
    }
}
