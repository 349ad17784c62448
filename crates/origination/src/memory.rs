//! In-memory loan origination resource API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, ResourceId};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::api::OriginationApi;
use crate::commands::{
    RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer, RegisterParty,
    RegisterScore, RegisterStatusHistory,
};
use crate::error::ResourceError;
use crate::queries::{ApplicationStatus, LoanApplication};
use crate::resource::ResourceKind;

/// A resource API operation, used to target injected faults and to read
/// the call journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create(ResourceKind),
    Delete(ResourceKind),
}

/// One call received by the in-memory API, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub operation: Operation,
    /// The owning application (for an application creation, the created ID).
    pub loan_application_id: Option<ResourceId>,
    /// The created or deleted record.
    pub resource_id: Option<ResourceId>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub outcome: Result<(), ResourceError>,
}

impl ApiCall {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone)]
struct Fault {
    error: ResourceError,
    /// Calls left before the fault clears; `None` fails forever.
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    kind: ResourceKind,
    parent: Option<ResourceId>,
    payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct InMemoryApiState {
    records: HashMap<ResourceId, StoredRecord>,
    applications: HashMap<ResourceId, LoanApplication>,
    idempotency: HashMap<(ResourceKind, IdempotencyKey), ResourceId>,
    statuses: Vec<ApplicationStatus>,
    faults: HashMap<Operation, Fault>,
    latencies: HashMap<Operation, Duration>,
    journal: Vec<ApiCall>,
}

impl InMemoryApiState {
    fn take_fault(&mut self, operation: Operation) -> Option<ResourceError> {
        let fault = self.faults.get_mut(&operation)?;
        let error = fault.error.clone();
        let exhausted = match fault.remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            self.faults.remove(&operation);
        }
        Some(error)
    }

    fn try_create(
        &mut self,
        kind: ResourceKind,
        parent: Option<ResourceId>,
        payload: serde_json::Value,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        if let Some(error) = self.take_fault(Operation::Create(kind)) {
            return Err(error);
        }

        if let Some(existing) = self.idempotency.get(&(kind, key.clone())) {
            tracing::debug!(%kind, %key, id = %existing, "idempotent replay");
            return Ok(*existing);
        }

        if let Some(parent) = parent {
            let parent_exists = self
                .records
                .get(&parent)
                .is_some_and(|r| r.kind == ResourceKind::Application);
            if !parent_exists {
                return Err(ResourceError::not_found(ResourceKind::Application, parent));
            }
        }

        let id = ResourceId::new();
        self.records.insert(
            id,
            StoredRecord {
                kind,
                parent,
                payload,
            },
        );
        self.idempotency.insert((kind, key.clone()), id);
        Ok(id)
    }

    fn try_delete(
        &mut self,
        kind: ResourceKind,
        parent: Option<ResourceId>,
        id: ResourceId,
    ) -> Result<(), ResourceError> {
        if let Some(error) = self.take_fault(Operation::Delete(kind)) {
            return Err(error);
        }

        match self.records.get(&id) {
            Some(record) if record.kind == kind && record.parent == parent => {
                self.records.remove(&id);
                self.applications.remove(&id);
                Ok(())
            }
            _ => Err(ResourceError::not_found(kind, id)),
        }
    }
}

/// In-memory resource API for tests and local runs.
///
/// Honours idempotency keys, checks that sub-resources reference an
/// existing application, journals every call, and supports fault and
/// latency injection per operation.
#[derive(Debug, Clone)]
pub struct InMemoryOriginationApi {
    state: Arc<RwLock<InMemoryApiState>>,
}

impl InMemoryOriginationApi {
    /// Creates an empty API with the default status catalogue.
    pub fn new() -> Self {
        let statuses = [
            ("PENDING", "Application received, awaiting review"),
            ("UNDER_REVIEW", "Application under underwriting review"),
            ("APPROVED", "Application approved"),
            ("REJECTED", "Application rejected"),
        ]
        .into_iter()
        .map(|(code, description)| ApplicationStatus {
            application_status_id: ResourceId::new(),
            code: code.to_string(),
            description: description.to_string(),
        })
        .collect();

        Self {
            state: Arc::new(RwLock::new(InMemoryApiState {
                statuses,
                ..Default::default()
            })),
        }
    }

    /// Makes every call to `operation` fail with `error`.
    pub async fn fail(&self, operation: Operation, error: ResourceError) {
        self.state.write().await.faults.insert(
            operation,
            Fault {
                error,
                remaining: None,
            },
        );
    }

    /// Makes the next `times` calls to `operation` fail with `error`.
    pub async fn fail_times(&self, operation: Operation, error: ResourceError, times: u32) {
        if times == 0 {
            return;
        }
        self.state.write().await.faults.insert(
            operation,
            Fault {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Removes all injected faults.
    pub async fn clear_faults(&self) {
        self.state.write().await.faults.clear();
    }

    /// Delays every call to `operation` by `latency`.
    pub async fn set_latency(&self, operation: Operation, latency: Duration) {
        self.state
            .write()
            .await
            .latencies
            .insert(operation, latency);
    }

    /// Returns the number of live records of `kind`.
    pub async fn count(&self, kind: ResourceKind) -> usize {
        self.state
            .read()
            .await
            .records
            .values()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Returns the total number of live records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Returns true if a live record exists with the given ID.
    pub async fn contains(&self, id: ResourceId) -> bool {
        self.state.read().await.records.contains_key(&id)
    }

    /// Returns the application a sub-resource belongs to.
    pub async fn parent_of(&self, id: ResourceId) -> Option<ResourceId> {
        self.state
            .read()
            .await
            .records
            .get(&id)
            .and_then(|r| r.parent)
    }

    /// Returns the request payload a live record was created from.
    pub async fn payload(&self, id: ResourceId) -> Option<serde_json::Value> {
        self.state
            .read()
            .await
            .records
            .get(&id)
            .map(|r| r.payload.clone())
    }

    /// Returns every call received so far, in arrival order.
    pub async fn journal(&self) -> Vec<ApiCall> {
        self.state.read().await.journal.clone()
    }

    /// Returns the calls made to one operation, in arrival order.
    pub async fn calls(&self, operation: Operation) -> Vec<ApiCall> {
        self.state
            .read()
            .await
            .journal
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Returns the status catalogue.
    pub async fn statuses(&self) -> Vec<ApplicationStatus> {
        self.state.read().await.statuses.clone()
    }

    async fn simulate_latency(&self, operation: Operation) {
        let latency = self.state.read().await.latencies.get(&operation).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn create<T: Serialize>(
        &self,
        kind: ResourceKind,
        parent: Option<ResourceId>,
        request: &T,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        let operation = Operation::Create(kind);
        self.simulate_latency(operation).await;
        let payload =
            serde_json::to_value(request).map_err(|e| ResourceError::Invalid(e.to_string()))?;

        let mut state = self.state.write().await;
        let outcome = state.try_create(kind, parent, payload, key);
        let created = outcome.as_ref().ok().copied();
        state.journal.push(ApiCall {
            operation,
            loan_application_id: parent.or(created),
            resource_id: created,
            idempotency_key: Some(key.clone()),
            outcome: outcome.as_ref().map(|_| ()).map_err(Clone::clone),
        });
        outcome
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        parent: Option<ResourceId>,
        id: ResourceId,
    ) -> Result<(), ResourceError> {
        let operation = Operation::Delete(kind);
        self.simulate_latency(operation).await;

        let mut state = self.state.write().await;
        let outcome = state.try_delete(kind, parent, id);
        state.journal.push(ApiCall {
            operation,
            loan_application_id: parent.or(Some(id)),
            resource_id: Some(id),
            idempotency_key: None,
            outcome: outcome.clone(),
        });
        outcome
    }
}

impl Default for InMemoryOriginationApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OriginationApi for InMemoryOriginationApi {
    async fn create_application(
        &self,
        request: &RegisterApplication,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        let id = self
            .create(ResourceKind::Application, None, request, key)
            .await?;

        self.state
            .write()
            .await
            .applications
            .entry(id)
            .or_insert_with(|| LoanApplication {
                loan_application_id: id,
                product_code: request.product_code.clone(),
                requested_amount_cents: request.requested_amount_cents,
                currency: request.currency.clone(),
                term_months: request.term_months,
                channel: request.channel.clone(),
                created_at: now(),
            });
        Ok(id)
    }

    async fn delete_application(
        &self,
        loan_application_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(ResourceKind::Application, None, loan_application_id)
            .await
    }

    async fn create_party(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterParty,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        self.create(ResourceKind::Party, Some(loan_application_id), request, key)
            .await
    }

    async fn delete_party(
        &self,
        loan_application_id: ResourceId,
        application_party_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(
            ResourceKind::Party,
            Some(loan_application_id),
            application_party_id,
        )
        .await
    }

    async fn create_document(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterDocument,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        self.create(
            ResourceKind::Document,
            Some(loan_application_id),
            request,
            key,
        )
        .await
    }

    async fn delete_document(
        &self,
        loan_application_id: ResourceId,
        application_document_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(
            ResourceKind::Document,
            Some(loan_application_id),
            application_document_id,
        )
        .await
    }

    async fn create_offer(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterOffer,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        self.create(ResourceKind::Offer, Some(loan_application_id), request, key)
            .await
    }

    async fn delete_offer(
        &self,
        loan_application_id: ResourceId,
        proposed_offer_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(
            ResourceKind::Offer,
            Some(loan_application_id),
            proposed_offer_id,
        )
        .await
    }

    async fn create_status_history(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterStatusHistory,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        self.create(
            ResourceKind::StatusHistory,
            Some(loan_application_id),
            request,
            key,
        )
        .await
    }

    async fn delete_status_history(
        &self,
        loan_application_id: ResourceId,
        status_history_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(
            ResourceKind::StatusHistory,
            Some(loan_application_id),
            status_history_id,
        )
        .await
    }

    async fn create_score(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterScore,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        self.create(ResourceKind::Score, Some(loan_application_id), request, key)
            .await
    }

    async fn delete_score(
        &self,
        loan_application_id: ResourceId,
        underwriting_score_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(
            ResourceKind::Score,
            Some(loan_application_id),
            underwriting_score_id,
        )
        .await
    }

    async fn create_decision(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterDecision,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError> {
        self.create(
            ResourceKind::Decision,
            Some(loan_application_id),
            request,
            key,
        )
        .await
    }

    async fn delete_decision(
        &self,
        loan_application_id: ResourceId,
        underwriting_decision_id: ResourceId,
    ) -> Result<(), ResourceError> {
        self.delete(
            ResourceKind::Decision,
            Some(loan_application_id),
            underwriting_decision_id,
        )
        .await
    }

    async fn get_loan_application(
        &self,
        loan_application_id: ResourceId,
    ) -> Result<LoanApplication, ResourceError> {
        self.state
            .read()
            .await
            .applications
            .get(&loan_application_id)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(ResourceKind::Application, loan_application_id))
    }

    async fn get_application_status(
        &self,
        application_status_id: ResourceId,
    ) -> Result<ApplicationStatus, ResourceError> {
        self.state
            .read()
            .await
            .statuses
            .iter()
            .find(|s| s.application_status_id == application_status_id)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                kind: ResourceKind::StatusHistory,
                id: format!("status {application_status_id}"),
            })
    }

    async fn get_application_status_by_code(
        &self,
        code: &str,
    ) -> Result<ApplicationStatus, ResourceError> {
        self.state
            .read()
            .await
            .statuses
            .iter()
            .find(|s| s.code == code)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                kind: ResourceKind::StatusHistory,
                id: format!("status code {code}"),
            })
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
