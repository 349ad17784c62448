//! Saga run inspection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::SagaId;
use saga::{SagaEventEnvelope, SagaExecutionRecord};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

/// GET /sagas/{id}: the latest state of a saga run.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaExecutionRecord>, ApiError> {
    let saga_id: SagaId = parse_id("saga ID", &id)?;
    state
        .sagas
        .records()
        .get(saga_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))
}

/// GET /sagas/{id}/events: the audit trail of a saga run.
#[tracing::instrument(skip(state))]
pub async fn events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SagaEventEnvelope>>, ApiError> {
    let saga_id: SagaId = parse_id("saga ID", &id)?;
    let events = state.audit.events_for(saga_id).await;
    if events.is_empty() {
        return Err(ApiError::NotFound(format!("Saga {id} not found")));
    }
    Ok(Json(events))
}
