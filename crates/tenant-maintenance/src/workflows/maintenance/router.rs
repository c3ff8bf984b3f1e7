use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::approval::ApprovalRoute;
use super::domain::{
    Actor, ActorRole, CompletionReport, QuoteSubmission, RequestId, RequestSubmission, RfpDraft,
    RfpId, VendorId, WorkOrderDraft, WorkOrderId,
};
use super::error::MaintenanceError;
use super::matching::MatchQuery;
use super::repository::{MaintenanceStore, RepositoryError, VendorRegistry};
use super::rfp::AwardTerms;
use super::service::MaintenanceService;
use super::work_orders::StatusTarget;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type Shared<S, V> = State<Arc<MaintenanceService<S, V>>>;

/// Router builder exposing the request, bidding, and work order endpoints.
///
/// Mutating endpoints identify the caller through the `x-actor-id` and
/// `x-actor-role` headers.
pub fn maintenance_router<S, V>(service: Arc<MaintenanceService<S, V>>) -> Router
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    Router::new()
        .route("/api/v1/maintenance/requests", post(submit_request::<S, V>))
        .route(
            "/api/v1/maintenance/requests/pending",
            get(pending_requests::<S, V>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id",
            get(get_request::<S, V>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/approve",
            post(approve_request::<S, V>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/reject",
            post(reject_request::<S, V>),
        )
        .route(
            "/api/v1/maintenance/requests/:request_id/notes",
            post(add_request_note::<S, V>),
        )
        .route("/api/v1/maintenance/rfps", post(create_rfp::<S, V>))
        .route("/api/v1/maintenance/rfps/:rfp_id", get(get_rfp::<S, V>))
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/vendors",
            post(send_rfp_to_vendors::<S, V>),
        )
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/quotes",
            get(compare_quotes::<S, V>),
        )
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/quotes/:vendor_id",
            post(submit_quote::<S, V>),
        )
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/quotes/:vendor_id/decline",
            post(decline_quote::<S, V>),
        )
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/award",
            post(award_rfp::<S, V>),
        )
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/close",
            post(close_rfp::<S, V>),
        )
        .route(
            "/api/v1/maintenance/rfps/:rfp_id/recommendations",
            get(recommend_for_rfp::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders",
            post(create_work_order::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id",
            get(get_work_order::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/assign",
            post(assign_vendor::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/accept",
            post(accept_work_order::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/decline",
            post(decline_work_order::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/status",
            post(update_status::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/owner-approval",
            post(approve_owner::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/complete",
            post(complete_work_order::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/verify",
            post(verify_work_order::<S, V>),
        )
        .route(
            "/api/v1/maintenance/work-orders/:work_order_id/recommendations",
            get(recommend_for_work_order::<S, V>),
        )
        .route("/api/v1/maintenance/vendors/match", post(match_vendors::<S, V>))
        .with_state(service)
}

impl MaintenanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MaintenanceError::NotFound { .. } => StatusCode::NOT_FOUND,
            MaintenanceError::InvalidState { .. } => StatusCode::CONFLICT,
            MaintenanceError::NotAcceptable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MaintenanceError::ApprovalRequired { .. } => StatusCode::PRECONDITION_REQUIRED,
            MaintenanceError::Repository(RepositoryError::VersionConflict { .. })
            | MaintenanceError::Repository(RepositoryError::Conflict { .. }) => {
                StatusCode::CONFLICT
            }
            MaintenanceError::Repository(RepositoryError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            MaintenanceError::Repository(_) | MaintenanceError::Directory(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            MaintenanceError::NotFound { .. } => "not_found",
            MaintenanceError::InvalidState { .. } => "invalid_state",
            MaintenanceError::NotAcceptable(_) => "not_acceptable",
            MaintenanceError::ApprovalRequired { .. } => "approval_required",
            MaintenanceError::Repository(RepositoryError::VersionConflict { .. }) => {
                "version_conflict"
            }
            MaintenanceError::Repository(_) => "repository",
            MaintenanceError::Directory(_) => "directory",
        }
    }
}

impl IntoResponse for MaintenanceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "maintenance request failed");
        }
        let payload = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, Json(payload)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

/// Read the acting user from the actor headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let id = header(ACTOR_ID_HEADER)
        .ok_or_else(|| bad_request(format!("missing {ACTOR_ID_HEADER} header")))?;
    let raw_role = header(ACTOR_ROLE_HEADER)
        .ok_or_else(|| bad_request(format!("missing {ACTOR_ROLE_HEADER} header")))?;
    let role = ActorRole::parse(raw_role)
        .ok_or_else(|| bad_request(format!("unknown actor role '{raw_role}'")))?;

    Ok(Actor::new(id, role))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, MaintenanceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

macro_rules! actor_or_return {
    ($headers:expr) => {
        match actor_from_headers(&$headers) {
            Ok(actor) => actor,
            Err(response) => return response,
        }
    };
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    #[serde(default = "default_pending_limit")]
    pub limit: usize,
}

fn default_pending_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SolicitBody {
    pub vendor_ids: Vec<VendorId>,
}

#[derive(Debug, Deserialize)]
pub struct AwardBody {
    pub vendor_id: VendorId,
    #[serde(flatten)]
    pub terms: AwardTerms,
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub vendor_id: VendorId,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: StatusTarget,
}

async fn submit_request<S, V>(
    State(service): Shared<S, V>,
    headers: HeaderMap,
    Json(submission): Json<RequestSubmission>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::CREATED,
        service.approvals().submit_request(submission, &actor),
    )
}

async fn pending_requests<S, V>(
    State(service): Shared<S, V>,
    Query(query): Query<PendingQuery>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(StatusCode::OK, service.approvals().pending(query.limit))
}

async fn get_request<S, V>(
    State(service): Shared<S, V>,
    Path(request_id): Path<String>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(
        StatusCode::OK,
        service.approvals().get(&RequestId(request_id)),
    )
}

async fn approve_request<S, V>(
    State(service): Shared<S, V>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    Json(route): Json<ApprovalRoute>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::CREATED,
        service
            .approvals()
            .approve_request(&RequestId(request_id), route, &actor),
    )
}

async fn reject_request<S, V>(
    State(service): Shared<S, V>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RejectBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.approvals().reject_request(
            &RequestId(request_id),
            &body.reason,
            body.notes,
            &actor,
        ),
    )
}

async fn add_request_note<S, V>(
    State(service): Shared<S, V>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<NoteBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .approvals()
            .add_request_note(&RequestId(request_id), &body.text, &actor),
    )
}

async fn create_rfp<S, V>(
    State(service): Shared<S, V>,
    headers: HeaderMap,
    Json(draft): Json<RfpDraft>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::CREATED, service.rfps().create_rfp(draft, &actor))
}

async fn get_rfp<S, V>(State(service): Shared<S, V>, Path(rfp_id): Path<String>) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(StatusCode::OK, service.rfps().get(&RfpId(rfp_id)))
}

async fn send_rfp_to_vendors<S, V>(
    State(service): Shared<S, V>,
    Path(rfp_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SolicitBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .rfps()
            .send_rfp_to_vendors(&RfpId(rfp_id), &body.vendor_ids, &actor),
    )
}

async fn compare_quotes<S, V>(
    State(service): Shared<S, V>,
    Path(rfp_id): Path<String>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(StatusCode::OK, service.rfps().compare_quotes(&RfpId(rfp_id)))
}

async fn submit_quote<S, V>(
    State(service): Shared<S, V>,
    Path((rfp_id, vendor_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(submission): Json<QuoteSubmission>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.rfps().submit_vendor_quote(
            &RfpId(rfp_id),
            &VendorId(vendor_id),
            submission,
            &actor,
        ),
    )
}

async fn decline_quote<S, V>(
    State(service): Shared<S, V>,
    Path((rfp_id, vendor_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .rfps()
            .decline_rfp_quote(&RfpId(rfp_id), &VendorId(vendor_id), &actor),
    )
}

async fn award_rfp<S, V>(
    State(service): Shared<S, V>,
    Path(rfp_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AwardBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::CREATED,
        service
            .rfps()
            .select_rfp_vendor(&RfpId(rfp_id), &body.vendor_id, body.terms, &actor),
    )
}

async fn close_rfp<S, V>(
    State(service): Shared<S, V>,
    Path(rfp_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CloseBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.rfps().close_rfp(&RfpId(rfp_id), body.reason, &actor),
    )
}

async fn recommend_for_rfp<S, V>(
    State(service): Shared<S, V>,
    Path(rfp_id): Path<String>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(StatusCode::OK, service.recommend_for_rfp(&RfpId(rfp_id)))
}

async fn create_work_order<S, V>(
    State(service): Shared<S, V>,
    headers: HeaderMap,
    Json(draft): Json<WorkOrderDraft>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::CREATED,
        service.work_orders().create_work_order(draft, &actor),
    )
}

async fn get_work_order<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(
        StatusCode::OK,
        service.work_orders().get(&WorkOrderId(work_order_id)),
    )
}

async fn assign_vendor<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AssignBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .assign_vendor(&WorkOrderId(work_order_id), &body.vendor_id, &actor),
    )
}

async fn accept_work_order<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .accept_vendor_wo(&WorkOrderId(work_order_id), &actor),
    )
}

async fn decline_work_order<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .decline_vendor_wo(&WorkOrderId(work_order_id), &actor),
    )
}

async fn update_status<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<StatusBody>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .update_wo_status(&WorkOrderId(work_order_id), body.status, &actor),
    )
}

async fn approve_owner<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .approve_owner_wo(&WorkOrderId(work_order_id), &actor),
    )
}

async fn complete_work_order<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
    Json(report): Json<CompletionReport>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .complete_wo(&WorkOrderId(work_order_id), report, &actor),
    )
}

async fn verify_work_order<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service
            .work_orders()
            .verify_tenant_wo(&WorkOrderId(work_order_id), &actor),
    )
}

async fn recommend_for_work_order<S, V>(
    State(service): Shared<S, V>,
    Path(work_order_id): Path<String>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(
        StatusCode::OK,
        service.recommend_for_work_order(&WorkOrderId(work_order_id)),
    )
}

async fn match_vendors<S, V>(
    State(service): Shared<S, V>,
    Json(query): Json<MatchQuery>,
) -> Response
where
    S: MaintenanceStore + 'static,
    V: VendorRegistry + 'static,
{
    respond(StatusCode::OK, service.recommend(&query))
}
