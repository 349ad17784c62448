//! Application status catalogue endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use common::ResourceId;
use origination::{ApplicationStatus, GetApplicationStatus};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Debug, Default, Deserialize)]
pub struct StatusParams {
    pub id: Option<String>,
    pub code: Option<String>,
}

/// GET /application-statuses?id=&code=: look up a status by ID or code.
///
/// The ID wins when both are given.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<ApplicationStatus>, ApiError> {
    let application_status_id = params
        .id
        .as_deref()
        .map(|raw| parse_id::<ResourceId>("status ID", raw))
        .transpose()?;

    let status = state
        .bus
        .query(GetApplicationStatus {
            application_status_id,
            application_status_code: params.code,
        })
        .await?;
    Ok(Json(status))
}
