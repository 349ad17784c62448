//! Loan application submission and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ResourceId, SagaId};
use origination::{GetLoanApplication, LoanApplication, RegisterDocument, SubmitApplication};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Serialize)]
pub struct ApplicationSubmittedResponse {
    pub loan_application_id: ResourceId,
    pub saga_id: SagaId,
}

#[derive(Serialize)]
pub struct DocumentRegisteredResponse {
    pub loan_application_id: ResourceId,
    pub application_document_id: ResourceId,
    pub saga_id: SagaId,
}

/// POST /applications: register an application and its sub-resources.
#[tracing::instrument(skip_all)]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<SubmitApplication>,
) -> Result<(StatusCode, Json<ApplicationSubmittedResponse>), ApiError> {
    if submission.application.requested_amount_cents <= 0 {
        return Err(ApiError::BadRequest(
            "requested_amount_cents must be positive".to_string(),
        ));
    }

    let saga_id = SagaId::new();
    let loan_application_id = state.sagas.submit_as(saga_id, submission).await?;
    tracing::info!(%saga_id, %loan_application_id, "application submitted");

    Ok((
        StatusCode::CREATED,
        Json(ApplicationSubmittedResponse {
            loan_application_id,
            saga_id,
        }),
    ))
}

/// GET /applications/{id}: load a loan application.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LoanApplication>, ApiError> {
    let loan_application_id: ResourceId = parse_id("application ID", &id)?;
    let application = state
        .bus
        .query(GetLoanApplication::new(loan_application_id))
        .await?;
    Ok(Json(application))
}

/// POST /applications/{id}/documents: attach a document to an existing
/// application.
#[tracing::instrument(skip(state, document))]
pub async fn register_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(document): Json<RegisterDocument>,
) -> Result<(StatusCode, Json<DocumentRegisteredResponse>), ApiError> {
    let loan_application_id: ResourceId = parse_id("application ID", &id)?;
    if document
        .loan_application_id
        .is_some_and(|body_id| body_id != loan_application_id)
    {
        return Err(ApiError::BadRequest(
            "loan_application_id in body does not match path".to_string(),
        ));
    }

    let saga_id = SagaId::new();
    let application_document_id = state
        .sagas
        .register_document_as(saga_id, loan_application_id, document)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DocumentRegisteredResponse {
            loan_application_id,
            application_document_id,
            saga_id,
        }),
    ))
}
