//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::RedemptionConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::FeedProcessor;
use serde_json::{Value, json};
use ticket_store::InMemoryTicketStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_processor().0
}

fn setup_with_processor() -> (axum::Router, Arc<FeedProcessor<InMemoryTicketStore>>) {
    let store = InMemoryTicketStore::new();
    let (state, processor, _changes) =
        api::create_default_state(store, RedemptionConfig::default());
    (api::create_app(state, get_metrics_handle()), processor)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn issue(app: &axum::Router, name: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/tickets",
        Some(json!({ "name": name, "description": "Row E" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "ok");
}

#[tokio::test]
async fn test_issue_ticket() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/tickets",
        Some(json!({ "name": "Concert", "description": "Front row" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "generated");
    assert_eq!(json["revision"], 0);
    assert_eq!(json["name"], "Concert");
    assert!(json["used_at"].is_null());
}

#[tokio::test]
async fn test_issue_with_blank_name_is_bad_request() {
    let app = setup();

    let (status, json) = send(&app, "POST", "/tickets", Some(json!({ "name": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_input");
}

#[tokio::test]
async fn test_get_ticket_and_not_found() {
    let app = setup();
    let id = issue(&app, "Concert").await;

    let (status, json) = send(&app, "GET", &format!("/tickets/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id.as_str());

    let (status, json) = send(&app, "GET", "/tickets/no-such-ticket", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn test_activate_then_redeem() {
    let app = setup();
    let id = issue(&app, "Concert").await;

    let (status, json) = send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/tickets/{id}/redeem"),
        Some(json!({ "operator": "gate-3" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "used");
    assert_eq!(json["used_by"], "gate-3");
    assert_eq!(json["revision"], 2);
}

#[tokio::test]
async fn test_redeem_twice_is_conflict() {
    let app = setup();
    let id = issue(&app, "Concert").await;
    send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;
    send(&app, "POST", &format!("/tickets/{id}/redeem"), Some(json!({}))).await;

    let (status, json) = send(&app, "POST", &format!("/tickets/{id}/redeem"), Some(json!({}))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "already_redeemed");
}

#[tokio::test]
async fn test_redeem_without_operator_records_unknown() {
    let app = setup();
    let id = issue(&app, "Concert").await;
    send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;

    let (status, json) = send(&app, "POST", &format!("/tickets/{id}/redeem"), Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["used_by"], "unknown");
}

#[tokio::test]
async fn test_redeem_without_body_records_unknown() {
    let app = setup();
    let id = issue(&app, "Concert").await;
    send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;

    let (status, json) = send(&app, "POST", &format!("/tickets/{id}/redeem"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "used");
    assert_eq!(json["used_by"], "unknown");
}

#[tokio::test]
async fn test_list_with_offset_past_the_end_is_empty() {
    let app = setup();
    issue(&app, "A").await;

    let (status, json) = send(
        &app,
        "GET",
        &format!("/tickets?offset={}", usize::MAX),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_redeem_generated_ticket_is_conflict() {
    let app = setup();
    let id = issue(&app, "Concert").await;

    let (status, json) = send(&app, "POST", &format!("/tickets/{id}/redeem"), Some(json!({}))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "not_active");

    let (_, ticket) = send(&app, "GET", &format!("/tickets/{id}"), None).await;
    assert_eq!(ticket["status"], "generated");
    assert_eq!(ticket["revision"], 0);
}

#[tokio::test]
async fn test_activate_twice_is_invalid_transition() {
    let app = setup();
    let id = issue(&app, "Concert").await;
    send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;

    let (status, json) = send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "invalid_transition");
}

#[tokio::test]
async fn test_list_with_filters() {
    let app = setup();
    let first = issue(&app, "A").await;
    issue(&app, "B").await;
    issue(&app, "C").await;
    send(&app, "POST", &format!("/tickets/{first}/activate"), None).await;

    let (status, json) = send(&app, "GET", "/tickets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 3);

    let (_, json) = send(&app, "GET", "/tickets?status=active", None).await;
    let active = json.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], first.as_str());

    let (_, json) = send(&app, "GET", "/tickets?limit=2&offset=2", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/tickets?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_from_projection() {
    let (app, processor) = setup_with_processor();
    let a = issue(&app, "A").await;
    issue(&app, "B").await;
    send(&app, "POST", &format!("/tickets/{a}/activate"), None).await;
    send(
        &app,
        "POST",
        &format!("/tickets/{a}/redeem"),
        Some(json!({ "operator": "gate-9" })),
    )
    .await;

    processor.catch_up().await.unwrap();

    let (status, json) = send(&app, "GET", "/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["total"], 2);
    assert_eq!(json["summary"]["used"], 1);
    assert_eq!(json["summary"]["generated"], 1);
    assert_eq!(json["tickets"].as_array().unwrap().len(), 2);
    assert_eq!(json["recent_redemptions"][0]["used_by"], "gate-9");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let id = issue(&app, "Concert").await;
    send(&app, "POST", &format!("/tickets/{id}/activate"), None).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("redemptions_total"));
}
