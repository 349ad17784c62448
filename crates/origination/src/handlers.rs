//! One handler per loan origination request type.
//!
//! Each handler forwards its request to the matching `OriginationApi`
//! operation and maps `ResourceError` into the bus failure taxonomy.

use std::sync::Arc;

use async_trait::async_trait;
use common::ResourceId;
use cqrs::{Handler, HandlerError};

use crate::api::OriginationApi;
use crate::commands::{
    RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer, RegisterParty,
    RegisterScore, RegisterStatusHistory, RemoveApplication, RemoveDecision, RemoveDocument,
    RemoveOffer, RemoveParty, RemoveScore, RemoveStatusHistory,
};
use crate::queries::{ApplicationStatus, GetApplicationStatus, GetLoanApplication, LoanApplication};

macro_rules! api_handler {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<A> {
            api: Arc<A>,
        }

        impl<A: OriginationApi> $name<A> {
            pub fn new(api: Arc<A>) -> Self {
                Self { api }
            }
        }

        impl<A> Clone for $name<A> {
            fn clone(&self) -> Self {
                Self {
                    api: Arc::clone(&self.api),
                }
            }
        }
    };
}

/// Sub-resource commands must name their application by the time they
/// reach a handler.
fn require_application(
    loan_application_id: Option<ResourceId>,
    request: &str,
) -> Result<ResourceId, HandlerError> {
    loan_application_id
        .ok_or_else(|| HandlerError::Validation(format!("{request} requires a loan_application_id")))
}

api_handler!(
    /// Creates the loan application record.
    RegisterApplicationHandler
);
api_handler!(RemoveApplicationHandler);
api_handler!(
    /// Attaches a party to an application.
    RegisterPartyHandler
);
api_handler!(RemovePartyHandler);
api_handler!(RegisterDocumentHandler);
api_handler!(RemoveDocumentHandler);
api_handler!(RegisterOfferHandler);
api_handler!(RemoveOfferHandler);
api_handler!(RegisterStatusHistoryHandler);
api_handler!(RemoveStatusHistoryHandler);
api_handler!(
    /// Records the underwriting score.
    RegisterScoreHandler
);
api_handler!(RemoveScoreHandler);
api_handler!(
    /// Records the underwriting decision, optionally tied to a score.
    RegisterDecisionHandler
);
api_handler!(RemoveDecisionHandler);
api_handler!(GetLoanApplicationHandler);
api_handler!(
    /// Resolves a status by ID, falling back to its code.
    GetApplicationStatusHandler
);

#[async_trait]
impl<A: OriginationApi> Handler<RegisterApplication> for RegisterApplicationHandler<A> {
    #[tracing::instrument(skip(self, request), fields(product = %request.product_code))]
    async fn handle(&self, request: RegisterApplication) -> Result<ResourceId, HandlerError> {
        if request.requested_amount_cents <= 0 {
            return Err(HandlerError::Validation(
                "requested amount must be positive".into(),
            ));
        }
        let id = self
            .api
            .create_application(&request, &request.idempotency_key)
            .await?;
        tracing::info!(loan_application_id = %id, "loan application registered");
        Ok(id)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveApplication> for RemoveApplicationHandler<A> {
    #[tracing::instrument(skip(self), fields(loan_application_id = %request.loan_application_id))]
    async fn handle(&self, request: RemoveApplication) -> Result<(), HandlerError> {
        self.api
            .delete_application(request.loan_application_id)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RegisterParty> for RegisterPartyHandler<A> {
    #[tracing::instrument(skip(self, request), fields(party_id = %request.party_id))]
    async fn handle(&self, request: RegisterParty) -> Result<ResourceId, HandlerError> {
        let application = require_application(request.loan_application_id, "RegisterParty")?;
        Ok(self
            .api
            .create_party(application, &request, &request.idempotency_key)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveParty> for RemovePartyHandler<A> {
    async fn handle(&self, request: RemoveParty) -> Result<(), HandlerError> {
        Ok(self
            .api
            .delete_party(request.loan_application_id, request.application_party_id)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RegisterDocument> for RegisterDocumentHandler<A> {
    #[tracing::instrument(skip(self, request), fields(document_type = %request.document_type))]
    async fn handle(&self, request: RegisterDocument) -> Result<ResourceId, HandlerError> {
        let application = require_application(request.loan_application_id, "RegisterDocument")?;
        Ok(self
            .api
            .create_document(application, &request, &request.idempotency_key)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveDocument> for RemoveDocumentHandler<A> {
    async fn handle(&self, request: RemoveDocument) -> Result<(), HandlerError> {
        Ok(self
            .api
            .delete_document(request.loan_application_id, request.application_document_id)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RegisterOffer> for RegisterOfferHandler<A> {
    async fn handle(&self, request: RegisterOffer) -> Result<ResourceId, HandlerError> {
        let application = require_application(request.loan_application_id, "RegisterOffer")?;
        Ok(self
            .api
            .create_offer(application, &request, &request.idempotency_key)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveOffer> for RemoveOfferHandler<A> {
    async fn handle(&self, request: RemoveOffer) -> Result<(), HandlerError> {
        Ok(self
            .api
            .delete_offer(request.loan_application_id, request.proposed_offer_id)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RegisterStatusHistory> for RegisterStatusHistoryHandler<A> {
    async fn handle(&self, request: RegisterStatusHistory) -> Result<ResourceId, HandlerError> {
        let application =
            require_application(request.loan_application_id, "RegisterStatusHistory")?;
        Ok(self
            .api
            .create_status_history(application, &request, &request.idempotency_key)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveStatusHistory> for RemoveStatusHistoryHandler<A> {
    async fn handle(&self, request: RemoveStatusHistory) -> Result<(), HandlerError> {
        Ok(self
            .api
            .delete_status_history(request.loan_application_id, request.status_history_id)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RegisterScore> for RegisterScoreHandler<A> {
    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn handle(&self, request: RegisterScore) -> Result<ResourceId, HandlerError> {
        let application = require_application(request.loan_application_id, "RegisterScore")?;
        Ok(self
            .api
            .create_score(application, &request, &request.idempotency_key)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveScore> for RemoveScoreHandler<A> {
    async fn handle(&self, request: RemoveScore) -> Result<(), HandlerError> {
        Ok(self
            .api
            .delete_score(request.loan_application_id, request.underwriting_score_id)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RegisterDecision> for RegisterDecisionHandler<A> {
    #[tracing::instrument(skip(self, request), fields(decision = %request.decision_code))]
    async fn handle(&self, request: RegisterDecision) -> Result<ResourceId, HandlerError> {
        let application = require_application(request.loan_application_id, "RegisterDecision")?;
        Ok(self
            .api
            .create_decision(application, &request, &request.idempotency_key)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<RemoveDecision> for RemoveDecisionHandler<A> {
    async fn handle(&self, request: RemoveDecision) -> Result<(), HandlerError> {
        Ok(self
            .api
            .delete_decision(
                request.loan_application_id,
                request.underwriting_decision_id,
            )
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<GetLoanApplication> for GetLoanApplicationHandler<A> {
    async fn handle(&self, request: GetLoanApplication) -> Result<LoanApplication, HandlerError> {
        Ok(self
            .api
            .get_loan_application(request.loan_application_id)
            .await?)
    }
}

#[async_trait]
impl<A: OriginationApi> Handler<GetApplicationStatus> for GetApplicationStatusHandler<A> {
    async fn handle(
        &self,
        request: GetApplicationStatus,
    ) -> Result<ApplicationStatus, HandlerError> {
        match (request.application_status_id, request.application_status_code) {
            (Some(id), _) => Ok(self.api.get_application_status(id).await?),
            (None, Some(code)) => Ok(self.api.get_application_status_by_code(&code).await?),
            (None, None) => Err(HandlerError::Validation(
                "an application status id or code is required".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PartyRole;
    use crate::error::ResourceError;
    use crate::memory::{InMemoryOriginationApi, Operation};
    use crate::resource::ResourceKind;

    async fn registered_application(api: &Arc<InMemoryOriginationApi>) -> ResourceId {
        RegisterApplicationHandler::new(Arc::clone(api))
            .handle(RegisterApplication::new("PERSONAL", 500_000, "EUR", 24))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_party_without_application_is_validation_error() {
        let api = Arc::new(InMemoryOriginationApi::new());
        let handler = RegisterPartyHandler::new(Arc::clone(&api));

        let err = handler
            .handle(RegisterParty::new(ResourceId::new(), PartyRole::Borrower))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Validation(_)));
        assert!(api.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let api = Arc::new(InMemoryOriginationApi::new());
        let err = RegisterApplicationHandler::new(api)
            .handle(RegisterApplication::new("PERSONAL", 0, "EUR", 24))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_and_remove_document() {
        let api = Arc::new(InMemoryOriginationApi::new());
        let app = registered_application(&api).await;

        let doc = RegisterDocumentHandler::new(Arc::clone(&api))
            .handle(RegisterDocument::new("payslip", "s3://docs/7").for_application(app))
            .await
            .unwrap();
        assert_eq!(api.parent_of(doc).await, Some(app));

        RemoveDocumentHandler::new(Arc::clone(&api))
            .handle(RemoveDocument {
                loan_application_id: app,
                application_document_id: doc,
            })
            .await
            .unwrap();
        assert_eq!(api.count(ResourceKind::Document).await, 0);
    }

    #[tokio::test]
    async fn test_unavailable_api_maps_to_transient() {
        let api = Arc::new(InMemoryOriginationApi::new());
        let app = registered_application(&api).await;
        api.fail(
            Operation::Create(ResourceKind::Offer),
            ResourceError::Unavailable("gateway timeout".into()),
        )
        .await;

        let mut offer = RegisterOffer::new(500_000, 24, 390);
        offer.loan_application_id = Some(app);
        let err = RegisterOfferHandler::new(api).handle(offer).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_status_id_takes_precedence_over_code() {
        let api = Arc::new(InMemoryOriginationApi::new());
        let approved = api.get_application_status_by_code("APPROVED").await.unwrap();
        let handler = GetApplicationStatusHandler::new(Arc::clone(&api));

        let status = handler
            .handle(GetApplicationStatus::by_code("PENDING").with_id(approved.application_status_id))
            .await
            .unwrap();
        assert_eq!(status.code, "APPROVED");

        let err = handler
            .handle(GetApplicationStatus::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }
}
