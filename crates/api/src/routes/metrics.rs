//! Prometheus scrape endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use metrics_exporter_prometheus::PrometheusHandle;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics: bus and saga engine counters in the Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> Response {
    ([(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], handle.render()).into_response()
}
