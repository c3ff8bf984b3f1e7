use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::audit::{AuditAction, AuditTrail, HistoryEntry};
use super::domain::{
    Actor, Attachment, Money, PropertyId, Priority, QuoteStatus, QuoteSubmission, RequestId, Rfp,
    RfpDraft, RfpId, RfpStatus, ServiceRequest, TenantId, UnitId, VendorId, VendorQuote,
    WorkOrder,
};
use super::error::{BusinessRule, MaintenanceError};
use super::ports::MaintenancePorts;
use super::repository::{
    ChangeSet, EntityKind, MaintenanceNotice, MaintenanceStore, RepositoryError, VendorRegistry,
};
use super::work_orders::WorkOrderSeed;

static RFP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rfp_id() -> RfpId {
    let id = RFP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RfpId(format!("rfp-{id:06}"))
}

/// Bidding-round dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiddingPolicy {
    /// Quotes are refused once an RFP is older than this.
    pub bidding_window: Option<Duration>,
    pub quote_conflict_retries: u8,
}

impl Default for BiddingPolicy {
    fn default() -> Self {
        Self {
            bidding_window: None,
            quote_conflict_retries: 3,
        }
    }
}

/// Fields copied onto a new RFP from its origin.
pub(crate) struct RfpSeed {
    request_id: Option<RequestId>,
    tenant_id: Option<TenantId>,
    property_id: PropertyId,
    unit_id: Option<UnitId>,
    description: String,
    category: Option<String>,
    priority: Priority,
    attachments: Vec<Attachment>,
}

impl RfpSeed {
    pub(crate) fn from_request(request: &ServiceRequest) -> Self {
        Self {
            request_id: Some(request.id.clone()),
            tenant_id: Some(request.tenant_id.clone()),
            property_id: request.property_id.clone(),
            unit_id: request.unit_id.clone(),
            description: request.description.clone(),
            category: request.category.clone(),
            priority: request.priority,
            attachments: request.attachments.clone(),
        }
    }

    fn from_draft(draft: RfpDraft) -> Self {
        Self {
            request_id: None,
            tenant_id: draft.tenant_id,
            property_id: draft.property_id,
            unit_id: draft.unit_id,
            description: draft.description,
            category: draft.category,
            priority: draft.priority,
            attachments: draft.attachments,
        }
    }

    /// Build an uncommitted open RFP carrying its creation entry.
    pub(crate) fn build<S, V>(
        self,
        ports: &MaintenancePorts<S, V>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Rfp, MaintenanceError>
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
        ports.location(&self.property_id, self.unit_id.as_ref())?;

        let mut rfp = Rfp {
            id: next_rfp_id(),
            request_id: self.request_id,
            tenant_id: self.tenant_id,
            property_id: self.property_id,
            unit_id: self.unit_id,
            description: self.description,
            category: self.category,
            priority: self.priority,
            attachments: self.attachments,
            status: RfpStatus::Open,
            vendor_quotes: BTreeMap::new(),
            history: Default::default(),
            created_at: now,
            version: 0,
        };

        let mut entry = HistoryEntry::new(AuditAction::RfpCreated, actor, now)
            .with_detail("priority", rfp.priority.label());
        if let Some(request_id) = &rfp.request_id {
            entry = entry.with_detail("request_id", request_id.as_str());
        }
        AuditTrail::append(&mut rfp, entry);

        Ok(rfp)
    }
}

/// Award parameters decided by the property manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardTerms {
    #[serde(default)]
    pub owner_approval_needed: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Awarded RFP and the work order created for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardOutcome {
    pub rfp: Rfp,
    pub work_order: WorkOrder,
}

/// Display row for side-by-side quote review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteComparisonEntry {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub status: QuoteStatus,
    pub estimated_cost: Option<Money>,
    pub estimated_days: Option<u32>,
    pub lowest: bool,
    pub fastest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteComparison {
    pub rfp_id: RfpId,
    pub entries: Vec<QuoteComparisonEntry>,
}

impl QuoteComparison {
    /// Annotate accepted quotes with the cheapest and quickest bids. Ties are
    /// all annotated; nothing here selects a vendor.
    pub fn for_rfp(rfp: &Rfp) -> Self {
        let accepted = || {
            rfp.vendor_quotes
                .values()
                .filter(|quote| quote.status == QuoteStatus::Accepted)
        };
        let min_cost = accepted().filter_map(|quote| quote.estimated_cost).min();
        let min_days = accepted().filter_map(|quote| quote.estimated_days).min();

        let entries = rfp
            .vendor_quotes
            .values()
            .map(|quote| {
                let is_accepted = quote.status == QuoteStatus::Accepted;
                QuoteComparisonEntry {
                    vendor_id: quote.vendor_id.clone(),
                    vendor_name: quote.vendor_name.clone(),
                    status: quote.status,
                    estimated_cost: quote.estimated_cost,
                    estimated_days: quote.estimated_days,
                    lowest: is_accepted && min_cost.is_some() && quote.estimated_cost == min_cost,
                    fastest: is_accepted && min_days.is_some() && quote.estimated_days == min_days,
                }
            })
            .collect();

        Self {
            rfp_id: rfp.id.clone(),
            entries,
        }
    }

    pub fn lowest(&self) -> impl Iterator<Item = &QuoteComparisonEntry> {
        self.entries.iter().filter(|entry| entry.lowest)
    }

    pub fn fastest(&self) -> impl Iterator<Item = &QuoteComparisonEntry> {
        self.entries.iter().filter(|entry| entry.fastest)
    }
}

/// Runs competitive bidding rounds: solicitation, quote intake, and award.
pub struct RfpCoordinator<S, V> {
    ports: MaintenancePorts<S, V>,
    policy: BiddingPolicy,
}

impl<S, V> RfpCoordinator<S, V>
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    pub fn new(ports: MaintenancePorts<S, V>, policy: BiddingPolicy) -> Self {
        Self { ports, policy }
    }

    pub fn policy(&self) -> &BiddingPolicy {
        &self.policy
    }

    pub fn get(&self, rfp_id: &RfpId) -> Result<Rfp, MaintenanceError> {
        self.ports.load_rfp(rfp_id)
    }

    /// Open a bidding round that did not come from a tenant request.
    pub fn create_rfp(&self, draft: RfpDraft, actor: &Actor) -> Result<Rfp, MaintenanceError> {
        let now = self.ports.now();
        let mut rfp = RfpSeed::from_draft(draft).build(&self.ports, actor, now)?;
        self.ports.store.commit(ChangeSet::new().rfp(&mut rfp))?;

        info!(rfp = %rfp.id, "rfp created");
        Ok(rfp)
    }

    /// Seed a pending quote per vendor; vendors already on the RFP are skipped.
    pub fn send_rfp_to_vendors(
        &self,
        rfp_id: &RfpId,
        vendor_ids: &[VendorId],
        actor: &Actor,
    ) -> Result<Rfp, MaintenanceError> {
        let mut rfp = self.ports.load_rfp(rfp_id)?;
        ensure_open(&rfp, "solicit vendors for")?;

        let now = self.ports.now();
        let mut solicited = Vec::new();
        for vendor_id in vendor_ids {
            if rfp.vendor_quotes.contains_key(vendor_id)
                || solicited.iter().any(|quote: &VendorQuote| &quote.vendor_id == vendor_id)
            {
                continue;
            }
            let vendor = self.ports.eligible_vendor(vendor_id)?;
            solicited.push(VendorQuote {
                vendor_id: vendor.id,
                vendor_name: vendor.name,
                status: QuoteStatus::Pending,
                estimated_cost: None,
                estimated_days: None,
                notes: None,
                solicited_at: now,
                submitted_at: None,
            });
        }

        if solicited.is_empty() {
            debug!(rfp = %rfp.id, "no new vendors to solicit");
            return Ok(rfp);
        }

        let names: Vec<&str> = solicited.iter().map(|quote| quote.vendor_id.as_str()).collect();
        let entry = HistoryEntry::new(AuditAction::VendorsSolicited, actor, now)
            .with_detail("vendor_ids", names.join(","));
        AuditTrail::append(&mut rfp, entry);

        let new_vendors: Vec<VendorId> = solicited.iter().map(|quote| quote.vendor_id.clone()).collect();
        for quote in solicited {
            rfp.vendor_quotes.insert(quote.vendor_id.clone(), quote);
        }

        self.ports.store.commit(ChangeSet::new().rfp(&mut rfp))?;

        info!(rfp = %rfp.id, solicited = new_vendors.len(), "rfp sent to vendors");
        for vendor_id in new_vendors {
            self.ports.notify(
                MaintenanceNotice::new("rfp_invitation", &rfp.id)
                    .recipient(Some(vendor_id.0.clone()))
                    .detail("priority", rfp.priority.label()),
            );
        }

        Ok(rfp)
    }

    /// Record a vendor's bid. A concurrent update to the same RFP (for
    /// example another vendor's bid) is re-based rather than overwritten.
    pub fn submit_vendor_quote(
        &self,
        rfp_id: &RfpId,
        vendor_id: &VendorId,
        submission: QuoteSubmission,
        actor: &Actor,
    ) -> Result<Rfp, MaintenanceError> {
        let mut attempt: u8 = 0;
        loop {
            let mut rfp = self.ports.load_rfp(rfp_id)?;
            let now = self.ports.now();
            self.apply_quote(&mut rfp, vendor_id, &submission, actor, now)?;

            match self.ports.store.commit(ChangeSet::new().rfp(&mut rfp)) {
                Ok(()) => {
                    info!(rfp = %rfp.id, vendor = %vendor_id, "vendor quote submitted");
                    self.ports.notify(
                        MaintenanceNotice::new("quote_received", &rfp.id)
                            .detail("vendor_id", vendor_id.as_str()),
                    );
                    return Ok(rfp);
                }
                Err(RepositoryError::VersionConflict { .. })
                    if attempt < self.policy.quote_conflict_retries =>
                {
                    attempt += 1;
                    debug!(rfp = %rfp_id, vendor = %vendor_id, attempt, "re-basing quote after concurrent rfp update");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn apply_quote(
        &self,
        rfp: &mut Rfp,
        vendor_id: &VendorId,
        submission: &QuoteSubmission,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), MaintenanceError> {
        ensure_open(rfp, "submit a quote for")?;

        // A window too large to represent never closes.
        if let Some(closed_at) = self
            .policy
            .bidding_window
            .and_then(|window| rfp.created_at.checked_add_signed(window))
        {
            if now > closed_at {
                return Err(BusinessRule::BiddingWindowExpired { closed_at }.into());
            }
        }

        let quote_key = format!("{}/{}", rfp.id, vendor_id);
        let quote = rfp
            .vendor_quotes
            .get_mut(vendor_id)
            .filter(|quote| quote.status == QuoteStatus::Pending)
            .ok_or_else(|| {
                MaintenanceError::not_found(EntityKind::VendorQuote, format!("{quote_key} (pending)"))
            })?;

        quote.status = QuoteStatus::Accepted;
        quote.estimated_cost = submission.estimated_cost;
        quote.estimated_days = submission.estimated_days;
        quote.notes = submission.notes.clone();
        quote.submitted_at = Some(now);

        let mut entry = HistoryEntry::new(AuditAction::QuoteSubmitted, actor, now)
            .with_detail("vendor_id", vendor_id.as_str());
        if let Some(cost) = submission.estimated_cost {
            entry = entry.with_detail("estimated_cost", cost.to_string());
        }
        if let Some(days) = submission.estimated_days {
            entry = entry.with_detail("estimated_days", days.to_string());
        }
        AuditTrail::append(rfp, entry);

        Ok(())
    }

    pub fn decline_rfp_quote(
        &self,
        rfp_id: &RfpId,
        vendor_id: &VendorId,
        actor: &Actor,
    ) -> Result<Rfp, MaintenanceError> {
        let mut rfp = self.ports.load_rfp(rfp_id)?;
        ensure_open(&rfp, "decline a quote on")?;

        let quote_key = format!("{}/{}", rfp.id, vendor_id);
        let quote = rfp
            .vendor_quotes
            .get_mut(vendor_id)
            .ok_or_else(|| MaintenanceError::not_found(EntityKind::VendorQuote, &quote_key))?;

        if quote.status == QuoteStatus::Declined {
            return Err(MaintenanceError::invalid_state(
                EntityKind::VendorQuote,
                quote_key,
                "decline",
                "pending or accepted",
                quote.status,
            ));
        }
        quote.status = QuoteStatus::Declined;

        let now = self.ports.now();
        AuditTrail::append(
            &mut rfp,
            HistoryEntry::new(AuditAction::QuoteDeclined, actor, now)
                .with_detail("vendor_id", vendor_id.as_str()),
        );

        self.ports.store.commit(ChangeSet::new().rfp(&mut rfp))?;
        info!(rfp = %rfp.id, vendor = %vendor_id, "vendor quote declined");

        Ok(rfp)
    }

    /// Award the RFP to an accepted quote and create its work order atomically.
    pub fn select_rfp_vendor(
        &self,
        rfp_id: &RfpId,
        vendor_id: &VendorId,
        terms: AwardTerms,
        actor: &Actor,
    ) -> Result<AwardOutcome, MaintenanceError> {
        let mut rfp = self.ports.load_rfp(rfp_id)?;
        ensure_open(&rfp, "award")?;

        let quote = rfp.quote(vendor_id).ok_or_else(|| {
            MaintenanceError::not_found(EntityKind::VendorQuote, format!("{}/{}", rfp.id, vendor_id))
        })?;
        if quote.status != QuoteStatus::Accepted {
            return Err(BusinessRule::QuoteNotAccepted {
                vendor_id: vendor_id.clone(),
                status: quote.status,
            }
            .into());
        }

        let now = self.ports.now();
        let seed = WorkOrderSeed::from_award(&rfp, quote, terms);
        let mut work_order = seed.build(&self.ports, actor, now)?;

        rfp.status = RfpStatus::Awarded {
            vendor_id: vendor_id.clone(),
            work_order_id: work_order.id.clone(),
        };
        AuditTrail::append(
            &mut rfp,
            HistoryEntry::new(AuditAction::VendorSelected, actor, now)
                .with_detail("vendor_id", vendor_id.as_str())
                .with_detail("work_order_id", work_order.id.as_str())
                .with_detail("estimated_cost", work_order.estimated_cost.to_string()),
        );

        self.ports
            .store
            .commit(ChangeSet::new().rfp(&mut rfp).work_order(&mut work_order))?;

        info!(
            rfp = %rfp.id,
            vendor = %vendor_id,
            work_order = %work_order.id,
            "rfp awarded"
        );
        self.ports.hand_off_to_vendor(&work_order);
        self.ports.notify(
            MaintenanceNotice::new("rfp_awarded", &rfp.id)
                .recipient(Some(vendor_id.0.clone()))
                .detail("work_order_id", work_order.id.as_str()),
        );

        Ok(AwardOutcome { rfp, work_order })
    }

    /// End a bidding round without an award.
    pub fn close_rfp(
        &self,
        rfp_id: &RfpId,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<Rfp, MaintenanceError> {
        let mut rfp = self.ports.load_rfp(rfp_id)?;
        ensure_open(&rfp, "close")?;

        let now = self.ports.now();
        let mut entry = HistoryEntry::new(AuditAction::RfpClosed, actor, now);
        if let Some(reason) = &reason {
            entry = entry.with_reason(reason.clone());
        }
        rfp.status = RfpStatus::Closed { reason };
        AuditTrail::append(&mut rfp, entry);

        self.ports.store.commit(ChangeSet::new().rfp(&mut rfp))?;
        info!(rfp = %rfp.id, "rfp closed without award");

        Ok(rfp)
    }

    pub fn compare_quotes(&self, rfp_id: &RfpId) -> Result<QuoteComparison, MaintenanceError> {
        let rfp = self.ports.load_rfp(rfp_id)?;
        Ok(QuoteComparison::for_rfp(&rfp))
    }
}

fn ensure_open(rfp: &Rfp, operation: &'static str) -> Result<(), MaintenanceError> {
    if rfp.is_open() {
        Ok(())
    } else {
        Err(MaintenanceError::invalid_state(
            EntityKind::Rfp,
            &rfp.id,
            operation,
            "open",
            rfp.status.label(),
        ))
    }
}
