use crate::infra::{
    local_maintenance, seed_vendors, LocalMaintenanceService, DEMO_PROPERTY, DEMO_TENANT,
    DEMO_UNIT,
};
use clap::Args;
use std::path::PathBuf;
use tenant_maintenance::config::MaintenanceConfig;
use tenant_maintenance::error::AppError;
use tenant_maintenance::workflows::maintenance::{
    Actor, ApprovalRoute, AwardTerms, CompletionReport, Descendant, DirectApproval, MatchPolicy,
    MatchQuery, MatchReport, Money, Priority, PropertyId, QuoteComparison, QuoteSubmission,
    RequestId, RequestSubmission, StatusTarget, TenantId, UnitId, Vendor, VendorId,
    VendorMatchEngine, VendorRosterImporter, VendorStatus, WorkOrder,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Vendor roster CSV to use instead of the built-in fixtures
    #[arg(long)]
    pub(crate) vendors_csv: Option<PathBuf>,
    /// Assign the top recommended vendor directly instead of collecting bids
    #[arg(long)]
    pub(crate) direct: bool,
    /// Require owner sign-off before the job can be completed
    #[arg(long)]
    pub(crate) owner_approval: bool,
}

#[derive(Args, Debug)]
pub(crate) struct VendorMatchArgs {
    /// Vendor roster CSV export
    #[arg(long)]
    pub(crate) vendors_csv: PathBuf,
    /// Issue description to match against
    #[arg(long)]
    pub(crate) description: String,
    /// Issue category (e.g. Plumbing)
    #[arg(long)]
    pub(crate) category: Option<String>,
    /// Property region
    #[arg(long)]
    pub(crate) region: Option<String>,
    /// Minimum score for a vendor to be flagged as recommended
    #[arg(long)]
    pub(crate) threshold: Option<u32>,
    /// Number of ranked vendors to print
    #[arg(long, default_value_t = 5)]
    pub(crate) limit: usize,
    /// Emit the full match report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_vendor_match(args: VendorMatchArgs) -> Result<(), AppError> {
    let VendorMatchArgs {
        vendors_csv,
        description,
        category,
        region,
        threshold,
        limit,
        json,
    } = args;

    let roster = VendorRosterImporter::from_path(&vendors_csv)?;
    let active: Vec<Vendor> = roster
        .into_iter()
        .filter(|vendor| vendor.status == VendorStatus::Active)
        .collect();

    let mut policy = MatchPolicy::default();
    if let Some(threshold) = threshold {
        policy.recommendation_threshold = threshold;
    }
    let engine = VendorMatchEngine::new(policy);
    let report = engine.score_vendors(
        &active,
        &MatchQuery {
            description,
            category,
            region,
        },
    );

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Match report unavailable: {err}"),
        }
        return Ok(());
    }

    println!(
        "Vendor match ({} active vendors from {})",
        active.len(),
        vendors_csv.display()
    );
    render_match_report(&report, limit);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        vendors_csv,
        direct,
        owner_approval,
    } = args;

    let vendors = match vendors_csv {
        Some(path) => VendorRosterImporter::from_path(path)?,
        None => seed_vendors(),
    };
    let local = local_maintenance(&MaintenanceConfig::default(), vendors);
    let service = &local.service;

    let tenant = Actor::tenant(DEMO_TENANT);
    let manager = Actor::property_manager("pm-demo");
    let owner = Actor::owner("owner-demo");

    println!("Maintenance lifecycle demo");
    let request = service.approvals().submit_request(
        RequestSubmission {
            tenant_id: TenantId::new(DEMO_TENANT),
            property_id: PropertyId::new(DEMO_PROPERTY),
            unit_id: Some(UnitId::new(DEMO_UNIT)),
            description: "Burst pipe under kitchen sink, water spreading across floor"
                .to_string(),
            category: Some("Plumbing".to_string()),
            priority: Priority::Emergency,
            attachments: Vec::new(),
        },
        &tenant,
    )?;
    println!(
        "- Request {} submitted ({} priority)",
        request.id,
        request.priority.label()
    );

    let report = service.recommend(&MatchQuery {
        description: request.description.clone(),
        category: request.category.clone(),
        region: Some("Downtown".to_string()),
    })?;
    println!("\nVendor recommendations");
    render_match_report(&report, 3);

    let shortlist: Vec<VendorId> = report
        .recommended()
        .take(2)
        .map(|candidate| candidate.vendor_id.clone())
        .collect();
    let Some(top_vendor) = shortlist.first().cloned() else {
        println!("\nNo vendor cleared the recommendation threshold; stopping here.");
        return Ok(());
    };

    let work_order = if direct {
        let outcome = service.approvals().approve_request(
            &request.id,
            ApprovalRoute::Direct(DirectApproval {
                vendor_id: Some(top_vendor),
                estimated_cost: Money::from_dollars(450),
                owner_approval_needed: owner_approval,
                due_date: None,
            }),
            &manager,
        )?;
        match outcome.descendant {
            Descendant::WorkOrder(work_order) => work_order,
            Descendant::Rfp(rfp) => {
                println!("  Unexpected bidding round {}", rfp.id);
                return Ok(());
            }
        }
    } else {
        match run_bidding_round(service, &request.id, &shortlist, &manager, owner_approval)? {
            Some(work_order) => work_order,
            None => return Ok(()),
        }
    };
    println!(
        "\n- Work order {} {} for {}",
        work_order.id,
        work_order.status,
        work_order.vendor_name().unwrap_or("no vendor")
    );

    let Some(vendor_id) = work_order.vendor_id().cloned() else {
        return Ok(());
    };
    let crew = Actor::vendor(&vendor_id);
    service.work_orders().accept_vendor_wo(&work_order.id, &crew)?;
    service
        .work_orders()
        .update_wo_status(&work_order.id, StatusTarget::InProgress, &crew)?;
    println!("- Vendor accepted and started work");

    if work_order.owner_approval_needed() {
        service.work_orders().approve_owner_wo(&work_order.id, &owner)?;
        println!("- Owner signed off on {}", work_order.estimated_cost);
    }

    service.work_orders().complete_wo(
        &work_order.id,
        CompletionReport {
            photos: vec!["sink-after.jpg".to_string()],
            actual_cost: Some(work_order.estimated_cost),
        },
        &crew,
    )?;
    let verified = service.work_orders().verify_tenant_wo(&work_order.id, &tenant)?;
    println!(
        "- Completed and verified by tenant (status {})",
        verified.status
    );

    render_history(&verified);

    let notices = local.notifications.sent();
    println!("\nNotices dispatched: {}", notices.len());
    for notice in notices {
        println!(
            "  - {} -> {}",
            notice.template,
            notice.recipient.as_deref().unwrap_or("management")
        );
    }
    println!(
        "Vendor hand-offs: {} | stored work orders: {}",
        local.registry.assignments().len(),
        local.store.work_order_count()
    );

    Ok(())
}

fn run_bidding_round(
    service: &LocalMaintenanceService,
    request_id: &RequestId,
    shortlist: &[VendorId],
    manager: &Actor,
    owner_approval: bool,
) -> Result<Option<WorkOrder>, AppError> {
    let outcome = service
        .approvals()
        .approve_request(request_id, ApprovalRoute::Bidding, manager)?;
    let rfp = match outcome.descendant {
        Descendant::Rfp(rfp) => rfp,
        Descendant::WorkOrder(work_order) => return Ok(Some(work_order)),
    };
    println!("\n- Bidding round {} opened", rfp.id);

    service
        .rfps()
        .send_rfp_to_vendors(&rfp.id, shortlist, manager)?;

    for (position, vendor_id) in shortlist.iter().enumerate() {
        let bid = Money::from_dollars(380 + 60 * position as u64);
        service.rfps().submit_vendor_quote(
            &rfp.id,
            vendor_id,
            QuoteSubmission {
                estimated_cost: Some(bid),
                estimated_days: Some(1 + position as u32),
                notes: None,
            },
            &Actor::vendor(vendor_id),
        )?;
    }

    let comparison = service.rfps().compare_quotes(&rfp.id)?;
    render_comparison(&comparison);

    let Some(winner) = comparison.lowest().next().map(|entry| entry.vendor_id.clone()) else {
        println!("  No accepted quotes to award");
        return Ok(None);
    };
    let award = service.rfps().select_rfp_vendor(
        &rfp.id,
        &winner,
        AwardTerms {
            owner_approval_needed: owner_approval,
            due_date: None,
        },
        manager,
    )?;
    println!("- Awarded to {winner}");
    Ok(Some(award.work_order))
}

fn render_match_report(report: &MatchReport, limit: usize) {
    println!(
        "Policy v{} | recommendation threshold {}",
        report.policy_version, report.threshold
    );
    for candidate in report.ranked.iter().take(limit) {
        let marker = if candidate.score >= report.threshold {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:>3}  {} ({})",
            marker, candidate.score, candidate.vendor_name, candidate.vendor_id
        );
        if !candidate.reasons.is_empty() {
            println!("        {}", candidate.reasons.join("; "));
        }
    }
}

fn render_comparison(comparison: &QuoteComparison) {
    println!("  Quotes:");
    for entry in &comparison.entries {
        let cost = entry
            .estimated_cost
            .map(|cost| cost.to_string())
            .unwrap_or_else(|| "-".to_string());
        let days = entry
            .estimated_days
            .map(|days| format!("{days}d"))
            .unwrap_or_else(|| "-".to_string());
        let mut flags = Vec::new();
        if entry.lowest {
            flags.push("lowest");
        }
        if entry.fastest {
            flags.push("fastest");
        }
        println!(
            "    - {} [{}] {} / {} {}",
            entry.vendor_name,
            entry.status,
            cost,
            days,
            flags.join(",")
        );
    }
}

fn render_history(work_order: &WorkOrder) {
    println!("\nAudit trail for {}", work_order.id);
    for entry in work_order.history.entries() {
        println!(
            "  {} {:<20} by {} ({})",
            entry.timestamp.format("%H:%M:%S"),
            entry.action.label(),
            entry.actor_id,
            entry.actor_role.label()
        );
    }
}
