//! HTTP API server for loan application submission.
//!
//! Provides REST endpoints for submitting loan applications through the
//! register-application saga, attaching documents, reading applications
//! and statuses, and inspecting saga runs, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use cqrs::{BusError, CommandBus};
use metrics_exporter_prometheus::PrometheusHandle;
use origination::InMemoryOriginationApi;
use saga::{FanoutEmitter, InMemoryAuditSink, LoanApplicationSagas, SagaSettings, TracingEmitter};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    /// Routes queries issued directly by the read endpoints.
    pub bus: CommandBus,
    pub sagas: LoanApplicationSagas,
    /// Saga events of recent runs.
    pub audit: InMemoryAuditSink,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/applications", post(routes::applications::submit))
        .route("/applications/{id}", get(routes::applications::get))
        .route(
            "/applications/{id}/documents",
            post(routes::applications::register_document),
        )
        .route("/application-statuses", get(routes::statuses::get))
        .route("/sagas/{id}", get(routes::sagas::get))
        .route("/sagas/{id}/events", get(routes::sagas::events))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over the in-memory resource API.
///
/// Saga events go to the log and to the audit sink. Fails if a request
/// type the service needs is left without a handler.
pub fn create_default_state(
    settings: SagaSettings,
) -> Result<(Arc<AppState>, Arc<InMemoryOriginationApi>), BusError> {
    let api = Arc::new(InMemoryOriginationApi::new());
    let bus = origination::build_bus(Arc::clone(&api))?;

    let audit = InMemoryAuditSink::with_retained_runs(settings.retained_runs);
    let emitter = FanoutEmitter::new()
        .with(Arc::new(TracingEmitter))
        .with(Arc::new(audit.clone()));
    let sagas = LoanApplicationSagas::with_bus(bus.clone(), Arc::new(emitter), settings);

    let state = Arc::new(AppState { bus, sagas, audit });
    Ok((state, api))
}
