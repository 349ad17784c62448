//! Loan origination resource API client trait.

use async_trait::async_trait;
use common::{IdempotencyKey, ResourceId};

use crate::commands::{
    RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer, RegisterParty,
    RegisterScore, RegisterStatusHistory,
};
use crate::error::ResourceError;
use crate::queries::{ApplicationStatus, LoanApplication};

/// Client for the loan origination resource APIs.
///
/// Each sub-resource has one creation and one deletion operation. Creation
/// operations take an idempotency key: a retried call with the same key
/// returns the identifier of the record created by the first call.
/// The APIs are not transactional with one another.
#[async_trait]
pub trait OriginationApi: Send + Sync + 'static {
    async fn create_application(
        &self,
        request: &RegisterApplication,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_application(&self, loan_application_id: ResourceId)
    -> Result<(), ResourceError>;

    async fn create_party(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterParty,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_party(
        &self,
        loan_application_id: ResourceId,
        application_party_id: ResourceId,
    ) -> Result<(), ResourceError>;

    async fn create_document(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterDocument,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_document(
        &self,
        loan_application_id: ResourceId,
        application_document_id: ResourceId,
    ) -> Result<(), ResourceError>;

    async fn create_offer(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterOffer,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_offer(
        &self,
        loan_application_id: ResourceId,
        proposed_offer_id: ResourceId,
    ) -> Result<(), ResourceError>;

    async fn create_status_history(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterStatusHistory,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_status_history(
        &self,
        loan_application_id: ResourceId,
        status_history_id: ResourceId,
    ) -> Result<(), ResourceError>;

    async fn create_score(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterScore,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_score(
        &self,
        loan_application_id: ResourceId,
        underwriting_score_id: ResourceId,
    ) -> Result<(), ResourceError>;

    async fn create_decision(
        &self,
        loan_application_id: ResourceId,
        request: &RegisterDecision,
        key: &IdempotencyKey,
    ) -> Result<ResourceId, ResourceError>;

    async fn delete_decision(
        &self,
        loan_application_id: ResourceId,
        underwriting_decision_id: ResourceId,
    ) -> Result<(), ResourceError>;

    async fn get_loan_application(
        &self,
        loan_application_id: ResourceId,
    ) -> Result<LoanApplication, ResourceError>;

    async fn get_application_status(
        &self,
        application_status_id: ResourceId,
    ) -> Result<ApplicationStatus, ResourceError>;

    async fn get_application_status_by_code(
        &self,
        code: &str,
    ) -> Result<ApplicationStatus, ResourceError>;
}
