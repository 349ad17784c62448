//! Context bindings and undo commands for the origination commands.

use common::ResourceId;
use origination::{
    RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer, RegisterParty,
    RegisterScore, RegisterStatusHistory, RemoveApplication, RemoveDecision, RemoveDocument,
    RemoveOffer, RemoveParty, RemoveScore, RemoveStatusHistory,
};

use crate::context::SagaContext;
use crate::error::ContextError;
use crate::step::SagaCommand;

/// Context key holding the created loan application's ID.
pub const LOAN_APPLICATION_ID: &str = "loanApplicationId";

/// Context key holding the created underwriting score's ID.
pub const UNDERWRITING_SCORE_ID: &str = "underwritingScoreId";

impl SagaCommand for RegisterApplication {
    type Undo = RemoveApplication;

    fn bind(&mut self, _ctx: &SagaContext) -> Result<(), ContextError> {
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveApplication> {
        Some(RemoveApplication {
            loan_application_id: created,
        })
    }
}

impl SagaCommand for RegisterParty {
    type Undo = RemoveParty;

    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError> {
        self.loan_application_id = Some(ctx.get_id(LOAN_APPLICATION_ID)?);
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveParty> {
        self.loan_application_id.map(|loan_application_id| RemoveParty {
            loan_application_id,
            application_party_id: created,
        })
    }
}

impl SagaCommand for RegisterDocument {
    type Undo = RemoveDocument;

    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError> {
        self.loan_application_id = Some(ctx.get_id(LOAN_APPLICATION_ID)?);
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveDocument> {
        self.loan_application_id
            .map(|loan_application_id| RemoveDocument {
                loan_application_id,
                application_document_id: created,
            })
    }
}

impl SagaCommand for RegisterOffer {
    type Undo = RemoveOffer;

    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError> {
        self.loan_application_id = Some(ctx.get_id(LOAN_APPLICATION_ID)?);
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveOffer> {
        self.loan_application_id.map(|loan_application_id| RemoveOffer {
            loan_application_id,
            proposed_offer_id: created,
        })
    }
}

impl SagaCommand for RegisterStatusHistory {
    type Undo = RemoveStatusHistory;

    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError> {
        self.loan_application_id = Some(ctx.get_id(LOAN_APPLICATION_ID)?);
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveStatusHistory> {
        self.loan_application_id
            .map(|loan_application_id| RemoveStatusHistory {
                loan_application_id,
                status_history_id: created,
            })
    }
}

impl SagaCommand for RegisterScore {
    type Undo = RemoveScore;

    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError> {
        self.loan_application_id = Some(ctx.get_id(LOAN_APPLICATION_ID)?);
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveScore> {
        self.loan_application_id.map(|loan_application_id| RemoveScore {
            loan_application_id,
            underwriting_score_id: created,
        })
    }
}

impl SagaCommand for RegisterDecision {
    type Undo = RemoveDecision;

    /// Binds the application and, when one was registered in the same
    /// run, the underwriting score.
    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError> {
        self.loan_application_id = Some(ctx.get_id(LOAN_APPLICATION_ID)?);
        if let Some(score) = ctx.find_id(UNDERWRITING_SCORE_ID)? {
            self.underwriting_score_id = Some(score);
        }
        Ok(())
    }

    fn undo(&self, created: ResourceId) -> Option<RemoveDecision> {
        self.loan_application_id
            .map(|loan_application_id| RemoveDecision {
                loan_application_id,
                underwriting_decision_id: created,
            })
    }
}
