//! Work order lifecycle and vendor matching.
//!
//! A tenant [`ServiceRequest`] is triaged by the [`ApprovalGate`] into either
//! a direct [`WorkOrder`] or a competitive [`Rfp`]. The [`RfpCoordinator`]
//! collects vendor quotes and awards one, producing a work order that the
//! [`WorkOrderStateMachine`] carries through completion. Every mutation is
//! recorded through the [`AuditTrail`] in the same commit as the state change.

pub mod approval;
pub mod audit;
pub mod domain;
pub mod error;
pub mod matching;
pub mod memory;
pub mod ports;
pub mod repository;
pub mod rfp;
pub mod roster;
pub mod router;
pub mod service;
pub mod work_orders;

#[cfg(test)]
mod tests;

pub use approval::{ApprovalGate, ApprovalOutcome, ApprovalRoute, Descendant, DirectApproval};
pub use audit::{AuditAction, AuditTrail, History, HistoryEntry};
pub use domain::*;
pub use error::{BusinessRule, MaintenanceError};
pub use matching::{
    MatchComponent, MatchPolicy, MatchQuery, MatchReport, MatchRule, VendorMatch,
    VendorMatchEngine,
};
pub use memory::{
    InMemoryDirectory, InMemoryMaintenanceStore, InMemoryVendorRegistry, ManualClock,
    RecordingNotifications,
};
pub use ports::MaintenancePorts;
pub use repository::{
    ChangeSet, Clock, DirectoryError, EntityKind, MaintenanceNotice, MaintenanceStore,
    NotificationError, NotificationPublisher, PropertyDirectory, PropertySummary,
    RepositoryError, SystemClock, TenantContact, TenantDirectory, VendorFilter, VendorRegistry,
    VendorWorkOrderNotice,
};
pub use rfp::{
    AwardOutcome, AwardTerms, BiddingPolicy, QuoteComparison, QuoteComparisonEntry,
    RfpCoordinator,
};
pub use roster::{VendorRosterError, VendorRosterImporter};
pub use router::maintenance_router;
pub use service::MaintenanceService;
pub use work_orders::{StatusTarget, WorkOrderStateMachine};
