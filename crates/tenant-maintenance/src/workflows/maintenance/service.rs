use tracing::debug;

use super::approval::ApprovalGate;
use super::domain::{PropertyId, RfpId, Vendor, WorkOrderId};
use super::error::MaintenanceError;
use super::matching::{MatchPolicy, MatchQuery, MatchReport, VendorMatchEngine};
use super::ports::MaintenancePorts;
use super::repository::{MaintenanceStore, VendorFilter, VendorRegistry};
use super::rfp::{BiddingPolicy, RfpCoordinator};
use super::work_orders::WorkOrderStateMachine;

/// Service composing the approval gate, bidding coordinator, work order
/// state machine, and vendor match engine over one set of ports.
pub struct MaintenanceService<S, V> {
    ports: MaintenancePorts<S, V>,
    approvals: ApprovalGate<S, V>,
    rfps: RfpCoordinator<S, V>,
    work_orders: WorkOrderStateMachine<S, V>,
    matching: VendorMatchEngine,
}

impl<S, V> MaintenanceService<S, V>
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    pub fn new(
        ports: MaintenancePorts<S, V>,
        match_policy: MatchPolicy,
        bidding_policy: BiddingPolicy,
    ) -> Self {
        Self {
            approvals: ApprovalGate::new(ports.clone()),
            rfps: RfpCoordinator::new(ports.clone(), bidding_policy),
            work_orders: WorkOrderStateMachine::new(ports.clone()),
            matching: VendorMatchEngine::new(match_policy),
            ports,
        }
    }

    pub fn approvals(&self) -> &ApprovalGate<S, V> {
        &self.approvals
    }

    pub fn rfps(&self) -> &RfpCoordinator<S, V> {
        &self.rfps
    }

    pub fn work_orders(&self) -> &WorkOrderStateMachine<S, V> {
        &self.work_orders
    }

    pub fn matching(&self) -> &VendorMatchEngine {
        &self.matching
    }

    /// Rank active vendors for direct assignment of a work order.
    pub fn recommend_for_work_order(
        &self,
        work_order_id: &WorkOrderId,
    ) -> Result<MatchReport, MaintenanceError> {
        let work_order = self.ports.load_work_order(work_order_id)?;
        let region = match &work_order.location {
            Some(location) => location.region.clone(),
            None => self.region_of(&work_order.property_id)?,
        };
        let query = MatchQuery {
            description: work_order.description,
            category: work_order.category,
            region,
        };
        self.rank_active(&query)
    }

    /// Rank active vendors for solicitation on an RFP.
    pub fn recommend_for_rfp(&self, rfp_id: &RfpId) -> Result<MatchReport, MaintenanceError> {
        let rfp = self.ports.load_rfp(rfp_id)?;
        let query = MatchQuery {
            region: self.region_of(&rfp.property_id)?,
            description: rfp.description,
            category: rfp.category,
        };
        self.rank_active(&query)
    }

    /// Rank active vendors for an ad-hoc query.
    pub fn recommend(&self, query: &MatchQuery) -> Result<MatchReport, MaintenanceError> {
        self.rank_active(query)
    }

    fn rank_active(&self, query: &MatchQuery) -> Result<MatchReport, MaintenanceError> {
        let candidates: Vec<Vendor> = self.ports.vendors.active_vendors(&VendorFilter::active())?;
        let report = self.matching.score_vendors(&candidates, query);
        debug!(
            candidates = candidates.len(),
            recommended = report.recommended().count(),
            "vendors ranked"
        );
        Ok(report)
    }

    fn region_of(&self, property_id: &PropertyId) -> Result<Option<String>, MaintenanceError> {
        Ok(self
            .ports
            .properties
            .property(property_id)?
            .and_then(|property| property.region))
    }
}
