//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use origination::{InMemoryOriginationApi, Operation, ResourceError, ResourceKind};
use saga::{RetryPolicy, SagaSettings};
use serde_json::{Value, json};
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

fn setup() -> (axum::Router, Arc<InMemoryOriginationApi>) {
    let settings = SagaSettings::default()
        .with_step_retry(RetryPolicy::new(2, Duration::from_millis(1)))
        .with_compensation_retry(RetryPolicy::new(2, Duration::from_millis(1)));
    let (state, api) = api::create_default_state(settings).unwrap();
    (api::create_app(state, get_metrics_handle()), api)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn submission() -> Value {
    json!({
        "application": {
            "product_code": "PERSONAL",
            "requested_amount_cents": 1_200_000,
            "currency": "EUR",
            "term_months": 36
        },
        "parties": [
            { "party_id": "6d3c0f6e-8a55-4a3c-9d0b-1c2e3f4a5b6c", "role": "borrower" },
            { "party_id": "0b1f2e3d-4c5b-6a79-8877-665544332211", "role": "co_borrower" }
        ],
        "documents": [
            { "document_type": "payslip", "document_uri": "s3://docs/payslip.pdf" }
        ],
        "offers": [
            { "offered_amount_cents": 1_200_000, "term_months": 36, "annual_rate_bps": 575 }
        ]
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_submit_application_and_read_it_back() {
    let (app, api) = setup();

    let (status, json) = send(&app, post_json("/applications", submission())).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let app_id = json["loan_application_id"].as_str().unwrap().to_string();
    assert!(json["saga_id"].as_str().is_some());
    assert_eq!(api.record_count().await, 5);

    let (status, json) = send(&app, get(&format!("/applications/{app_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["product_code"], "PERSONAL");
    assert_eq!(json["requested_amount_cents"], 1_200_000);
}

#[tokio::test]
async fn test_saga_record_and_events_are_exposed() {
    let (app, _) = setup();

    let (_, json) = send(&app, post_json("/applications", submission())).await;
    let saga_id = json["saga_id"].as_str().unwrap().to_string();

    let (status, record) = send(&app, get(&format!("/sagas/{saga_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["state"], "Completed");

    let (status, events) = send(&app, get(&format!("/sagas/{saga_id}/events"))).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.first().unwrap()["event"]["type"], "SagaStarted");
    assert_eq!(events.last().unwrap()["event"]["type"], "SagaCompleted");
}

#[tokio::test]
async fn test_transient_failure_is_compensated_and_reported_as_unavailable() {
    let (app, api) = setup();
    api.fail(
        Operation::Create(ResourceKind::Offer),
        ResourceError::Unavailable("offer service down".into()),
    )
    .await;

    let (status, json) = send(&app, post_json("/applications", submission())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["kind"], "transient");
    assert_eq!(json["failed_step"], "register-offer-1");
    assert_eq!(json["state"], "Compensated");
    assert_eq!(json["compensation"]["compensated"].as_array().unwrap().len(), 4);
    assert_eq!(api.record_count().await, 0);

    let saga_id = json["saga_id"].as_str().unwrap().to_string();
    let (_, record) = send(&app, get(&format!("/sagas/{saga_id}"))).await;
    assert_eq!(record["state"], "Compensated");
}

#[tokio::test]
async fn test_failed_compensation_is_a_server_error() {
    let (app, api) = setup();
    api.fail(
        Operation::Create(ResourceKind::Document),
        ResourceError::Invalid("unsupported document".into()),
    )
    .await;
    api.fail(
        Operation::Delete(ResourceKind::Application),
        ResourceError::Unavailable("application service down".into()),
    )
    .await;

    let (status, json) = send(&app, post_json("/applications", submission())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "compensation_failure");
    assert_eq!(json["state"], "Failed");
    assert_eq!(json["compensation"]["failed"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let (app, api) = setup();
    let mut body = submission();
    body["application"]["requested_amount_cents"] = json!(0);

    let (status, _) = send(&app, post_json("/applications", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(api.record_count().await, 0);
}

#[tokio::test]
async fn test_register_document_for_existing_application() {
    let (app, api) = setup();
    let (_, json) = send(&app, post_json("/applications", submission())).await;
    let app_id = json["loan_application_id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        post_json(
            &format!("/applications/{app_id}/documents"),
            json!({ "document_type": "bank-statement", "document_uri": "s3://docs/bs.pdf" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["loan_application_id"], app_id.as_str());
    assert_eq!(api.count(ResourceKind::Document).await, 2);
}

#[tokio::test]
async fn test_register_document_for_unknown_application_is_not_found() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        post_json(
            "/applications/2f1e0d9c-8b7a-4655-9443-322110fedcba/documents",
            json!({ "document_type": "bank-statement", "document_uri": "s3://docs/bs.pdf" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn test_unknown_application_is_not_found() {
    let (app, _) = setup();

    let (status, _) = send(
        &app,
        get("/applications/2f1e0d9c-8b7a-4655-9443-322110fedcba"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/applications/not-a-uuid")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("application ID"));
}

#[tokio::test]
async fn test_status_lookup_by_code_and_id() {
    let (app, _) = setup();

    let (status, by_code) = send(&app, get("/application-statuses?code=APPROVED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_code["code"], "APPROVED");

    let id = by_code["application_status_id"].as_str().unwrap();
    let (status, by_id) = send(
        &app,
        get(&format!("/application-statuses?id={id}&code=PENDING")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["code"], "APPROVED");
}

#[tokio::test]
async fn test_status_lookup_without_criteria_is_bad_request() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/application-statuses")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");
}

#[tokio::test]
async fn test_unknown_saga_is_not_found() {
    let (app, _) = setup();

    let (status, _) = send(
        &app,
        get("/sagas/2f1e0d9c-8b7a-4655-9443-322110fedcba/events"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    send(&app, post_json("/applications", submission())).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("saga_executions_total"));
}
