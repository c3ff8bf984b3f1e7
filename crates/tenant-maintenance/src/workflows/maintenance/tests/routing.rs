use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::maintenance::domain::{Actor, Priority};
use crate::workflows::maintenance::router::{
    actor_from_headers, maintenance_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER,
};
use crate::workflows::maintenance::BiddingPolicy;

fn router(harness: &Harness) -> Router {
    maintenance_router(harness.service.clone())
}

async fn send(router: Router, method: Method, uri: &str, actor: Option<&Actor>, body: Value) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(actor) = actor {
        builder = builder
            .header(ACTOR_ID_HEADER, actor.id.as_str())
            .header(ACTOR_ROLE_HEADER, actor.role.label());
    }
    let request = builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds");

    router.oneshot(request).await.expect("route executes")
}

async fn get(router: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds");
    router.oneshot(request).await.expect("route executes")
}

fn submission_body() -> Value {
    json!({
        "tenant_id": TENANT,
        "property_id": PROPERTY,
        "unit_id": UNIT,
        "description": "Bathroom ceiling dripping",
        "category": "Plumbing",
        "priority": "high",
    })
}

#[tokio::test]
async fn submit_route_creates_pending_request() {
    let harness = harness();

    let response = send(
        router(&harness),
        Method::POST,
        "/api/v1/maintenance/requests",
        Some(&tenant()),
        submission_body(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"]["status"], "pending");
    assert_eq!(payload["priority"], "high");
    assert_eq!(payload["history"][0]["action"], "request_submitted");
    assert_eq!(harness.store.request_count(), 1);
}

#[tokio::test]
async fn mutations_without_actor_headers_are_bad_requests() {
    let harness = harness();

    let response = send(
        router(&harness),
        Method::POST,
        "/api/v1/maintenance/requests",
        None,
        submission_body(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.store.request_count(), 0);
}

#[test]
fn unknown_actor_role_is_rejected() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(ACTOR_ID_HEADER, "someone".parse().expect("header value"));
    headers.insert(ACTOR_ROLE_HEADER, "landlord".parse().expect("header value"));
    match actor_from_headers(&headers) {
        Err(response) => assert_eq!(response.status(), StatusCode::BAD_REQUEST),
        Ok(actor) => panic!("expected rejection, got {actor:?}"),
    }

    headers.insert(ACTOR_ROLE_HEADER, "pm".parse().expect("header value"));
    let actor = actor_from_headers(&headers).expect("pm alias accepted");
    assert_eq!(actor.id, "someone");
}

#[tokio::test]
async fn unknown_work_order_is_not_found() {
    let harness = harness();

    let response = get(router(&harness), "/api/v1/maintenance/work-orders/wo-missing").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], "not_found");
}

#[tokio::test]
async fn second_approval_is_a_conflict() {
    let harness = harness();
    let request = harness.pending_request(Priority::Medium);
    let uri = format!("/api/v1/maintenance/requests/{}/approve", request.id);

    let first = send(
        router(&harness),
        Method::POST,
        &uri,
        Some(&pm()),
        json!({ "route": "direct", "vendor_id": PLUMBER }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let payload = read_json_body(first).await;
    assert_eq!(payload["descendant"]["kind"], "work_order");
    assert_eq!(payload["descendant"]["record"]["status"], "assigned");

    let second = send(
        router(&harness),
        Method::POST,
        &uri,
        Some(&pm()),
        json!({ "route": "bidding" }),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = read_json_body(second).await;
    assert_eq!(payload["code"], "invalid_state");
    assert_eq!(harness.store.rfp_count(), 0);
}

#[tokio::test]
async fn blacklisted_assignment_is_unprocessable() {
    let harness = harness();
    let created = send(
        router(&harness),
        Method::POST,
        "/api/v1/maintenance/work-orders",
        Some(&pm()),
        json!({
            "property_id": PROPERTY,
            "description": "Replace gutter downspout",
            "priority": "low",
        }),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let work_order = read_json_body(created).await;
    let id = work_order["id"].as_str().expect("work order id");

    let response = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/work-orders/{id}/assign"),
        Some(&pm()),
        json!({ "vendor_id": BLACKLISTED }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], "not_acceptable");
}

#[tokio::test]
async fn owner_gate_blocks_completion_with_precondition_required() {
    let harness = harness();
    let created = send(
        router(&harness),
        Method::POST,
        "/api/v1/maintenance/work-orders",
        Some(&pm()),
        json!({
            "property_id": PROPERTY,
            "description": "Replace water heater",
            "priority": "high",
            "vendor_id": PLUMBER,
            "estimated_cost": 180000,
            "owner_approval_needed": true,
        }),
    )
    .await;
    let work_order = read_json_body(created).await;
    let id = work_order["id"].as_str().expect("work order id").to_string();
    assert_eq!(work_order["owner_approval"]["state"], "pending");

    let accepted = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/work-orders/{id}/accept"),
        Some(&vendor_actor(PLUMBER)),
        json!({}),
    )
    .await;
    assert_eq!(accepted.status(), StatusCode::OK);

    let blocked = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/work-orders/{id}/complete"),
        Some(&vendor_actor(PLUMBER)),
        json!({ "photos": ["after.jpg"] }),
    )
    .await;
    assert_eq!(blocked.status(), StatusCode::PRECONDITION_REQUIRED);
    let payload = read_json_body(blocked).await;
    assert_eq!(payload["code"], "approval_required");

    let approved = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/work-orders/{id}/owner-approval"),
        Some(&owner()),
        json!({}),
    )
    .await;
    assert_eq!(approved.status(), StatusCode::OK);

    let completed = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/work-orders/{id}/complete"),
        Some(&vendor_actor(PLUMBER)),
        json!({ "photos": ["after.jpg"], "actual_cost": 175000 }),
    )
    .await;
    assert_eq!(completed.status(), StatusCode::OK);
    let payload = read_json_body(completed).await;
    assert_eq!(payload["status"], "completed");
    assert_eq!(payload["actual_cost"], 175000);
}

#[tokio::test]
async fn bidding_round_runs_over_http() {
    let harness = harness_with(BiddingPolicy::default());
    let request = harness.pending_request(Priority::Medium);

    let approved = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/requests/{}/approve", request.id),
        Some(&pm()),
        json!({ "route": "bidding" }),
    )
    .await;
    assert_eq!(approved.status(), StatusCode::CREATED);
    let payload = read_json_body(approved).await;
    assert_eq!(payload["descendant"]["kind"], "rfp");
    let rfp_id = payload["descendant"]["record"]["id"]
        .as_str()
        .expect("rfp id")
        .to_string();

    let solicited = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/rfps/{rfp_id}/vendors"),
        Some(&pm()),
        json!({ "vendor_ids": [PLUMBER, SECOND_PLUMBER] }),
    )
    .await;
    assert_eq!(solicited.status(), StatusCode::OK);

    for (vendor_id, cost, days) in [(PLUMBER, 42000, 3), (SECOND_PLUMBER, 39000, 5)] {
        let quoted = send(
            router(&harness),
            Method::POST,
            &format!("/api/v1/maintenance/rfps/{rfp_id}/quotes/{vendor_id}"),
            Some(&vendor_actor(vendor_id)),
            json!({ "estimated_cost": cost, "estimated_days": days }),
        )
        .await;
        assert_eq!(quoted.status(), StatusCode::OK);
    }

    let comparison = read_json_body(
        get(
            router(&harness),
            &format!("/api/v1/maintenance/rfps/{rfp_id}/quotes"),
        )
        .await,
    )
    .await;
    let entries = comparison["entries"].as_array().expect("entries");
    let lowest: Vec<&str> = entries
        .iter()
        .filter(|entry| entry["lowest"] == true)
        .filter_map(|entry| entry["vendor_id"].as_str())
        .collect();
    let fastest: Vec<&str> = entries
        .iter()
        .filter(|entry| entry["fastest"] == true)
        .filter_map(|entry| entry["vendor_id"].as_str())
        .collect();
    assert_eq!(lowest, vec![SECOND_PLUMBER]);
    assert_eq!(fastest, vec![PLUMBER]);

    let awarded = send(
        router(&harness),
        Method::POST,
        &format!("/api/v1/maintenance/rfps/{rfp_id}/award"),
        Some(&pm()),
        json!({ "vendor_id": PLUMBER, "owner_approval_needed": false }),
    )
    .await;
    assert_eq!(awarded.status(), StatusCode::CREATED);
    let payload = read_json_body(awarded).await;
    assert_eq!(payload["rfp"]["status"]["status"], "awarded");
    assert_eq!(payload["work_order"]["estimated_cost"], 42000);
    assert_eq!(harness.store.work_order_count(), 1);
}

#[tokio::test]
async fn pending_listing_honours_limit() {
    let harness = harness();
    harness.pending_request(Priority::Low);
    harness.pending_request(Priority::High);

    let response = get(router(&harness), "/api/v1/maintenance/requests/pending?limit=1").await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn match_route_ranks_active_vendors() {
    let harness = harness();

    let response = send(
        router(&harness),
        Method::POST,
        "/api/v1/maintenance/vendors/match",
        Some(&pm()),
        json!({
            "description": "Furnace making a rattling noise",
            "category": "HVAC",
            "region": "North",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["ranked"][0]["vendor_id"], HVAC);
    assert_eq!(payload["ranked"][0]["score"], 65);
    let ranked = payload["ranked"].as_array().expect("ranked");
    assert!(ranked
        .iter()
        .all(|candidate| candidate["vendor_id"] != BLACKLISTED));
}

#[tokio::test]
async fn store_outage_maps_to_internal_error() {
    let harness = harness_over(
        Arc::new(WorkOrderCommitFails::default()),
        BiddingPolicy::default(),
    );
    let request = harness.pending_request(Priority::Medium);

    let response = send(
        maintenance_router(harness.service.clone()),
        Method::POST,
        &format!("/api/v1/maintenance/requests/{}/approve", request.id),
        Some(&pm()),
        json!({ "route": "direct" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], "repository");
    assert!(harness.stored_request(&request.id).is_pending());
}
