//! The register-application saga.
//!
//! Step graph for a submission with two parties, a score and a decision:
//!
//! ```text
//!                        ┌──► register-party-1
//!                        ├──► register-party-2
//! register-application ──┼──► register-document-N / offer-N / status-history-N
//!                        └──► register-score ──► register-decision
//! ```
//!
//! The application step is the only writer of the application ID; every
//! other step reads it. Sub-resource steps are independent of one another.
//! The decision waits for the score only when the submission has one.

use origination::SubmitApplication;

use crate::bindings::{LOAN_APPLICATION_ID, UNDERWRITING_SCORE_ID};
use crate::definition::{SagaDefinition, StepDefinition};
use crate::error::Result;
use crate::step::{CommandStep, SagaCommand};

pub const SAGA_NAME: &str = "register-application";

pub const STEP_REGISTER_APPLICATION: &str = "register-application";
pub const STEP_REGISTER_SCORE: &str = "register-score";
pub const STEP_REGISTER_DECISION: &str = "register-decision";

/// Step IDs of repeated sub-resources, numbered from 1 in submission order.
pub fn party_step(n: usize) -> String {
    format!("register-party-{n}")
}

pub fn document_step(n: usize) -> String {
    format!("register-document-{n}")
}

pub fn offer_step(n: usize) -> String {
    format!("register-offer-{n}")
}

pub fn status_history_step(n: usize) -> String {
    format!("register-status-history-{n}")
}

fn sub_resource<C: SagaCommand>(id: impl Into<String>, command: C) -> StepDefinition {
    StepDefinition::new(id, CommandStep::new(command))
        .depends_on(STEP_REGISTER_APPLICATION)
        .reads(LOAN_APPLICATION_ID)
}

/// Builds the step graph for one submission.
///
/// Commands are moved into the steps as they are, so the idempotency keys
/// minted when the submission was built are reused by every retry.
pub fn definition(submission: SubmitApplication) -> Result<SagaDefinition> {
    let SubmitApplication {
        application,
        parties,
        documents,
        offers,
        status_histories,
        score,
        decision,
    } = submission;

    let mut builder = SagaDefinition::builder(SAGA_NAME).step(
        StepDefinition::new(STEP_REGISTER_APPLICATION, CommandStep::new(application))
            .writes(LOAN_APPLICATION_ID),
    );

    for (i, party) in parties.into_iter().enumerate() {
        builder = builder.step(sub_resource(party_step(i + 1), party));
    }
    for (i, document) in documents.into_iter().enumerate() {
        builder = builder.step(sub_resource(document_step(i + 1), document));
    }
    for (i, offer) in offers.into_iter().enumerate() {
        builder = builder.step(sub_resource(offer_step(i + 1), offer));
    }
    for (i, entry) in status_histories.into_iter().enumerate() {
        builder = builder.step(sub_resource(status_history_step(i + 1), entry));
    }

    let has_score = score.is_some();
    if let Some(score) = score {
        builder = builder.step(
            sub_resource(STEP_REGISTER_SCORE, score).writes(UNDERWRITING_SCORE_ID),
        );
    }
    if let Some(decision) = decision {
        let mut step = sub_resource(STEP_REGISTER_DECISION, decision);
        if has_score {
            step = step
                .depends_on(STEP_REGISTER_SCORE)
                .reads(UNDERWRITING_SCORE_ID);
        }
        builder = builder.step(step);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use common::ResourceId;
    use origination::{
        PartyRole, RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer,
        RegisterParty, RegisterScore,
    };

    use super::*;

    fn submission() -> SubmitApplication {
        SubmitApplication::new(RegisterApplication::new("PERSONAL", 2_000_000, "EUR", 48))
            .with_party(RegisterParty::new(ResourceId::new(), PartyRole::Borrower))
            .with_party(RegisterParty::new(ResourceId::new(), PartyRole::CoBorrower))
            .with_document(RegisterDocument::new("payslip", "s3://docs/1"))
            .with_offer(RegisterOffer::new(2_000_000, 48, 525))
    }

    #[test]
    fn test_every_sub_resource_follows_application() {
        let definition = definition(submission()).unwrap();
        let ids: Vec<&str> = definition.steps().iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            vec![
                "register-application",
                "register-party-1",
                "register-party-2",
                "register-document-1",
                "register-offer-1",
            ]
        );

        for step in &definition.steps()[1..] {
            assert_eq!(step.dependencies(), &[STEP_REGISTER_APPLICATION.to_string()]);
            assert_eq!(step.read_keys(), &[LOAN_APPLICATION_ID.to_string()]);
        }
        assert_eq!(
            definition.steps()[0].output_key(),
            Some(LOAN_APPLICATION_ID)
        );
    }

    #[test]
    fn test_decision_waits_for_score_when_present() {
        let definition = definition(
            submission()
                .with_score(RegisterScore::new(700, "bureau-v3"))
                .with_decision(RegisterDecision::new("APPROVED")),
        )
        .unwrap();

        let decision = definition.step(STEP_REGISTER_DECISION).unwrap();
        assert!(decision.dependencies().contains(&STEP_REGISTER_SCORE.to_string()));
        assert!(decision.read_keys().contains(&UNDERWRITING_SCORE_ID.to_string()));
    }

    #[test]
    fn test_decision_without_score_only_needs_application() {
        let definition = definition(
            SubmitApplication::new(RegisterApplication::new("AUTO", 900_000, "EUR", 60))
                .with_decision(RegisterDecision::new("REFERRED")),
        )
        .unwrap();

        let decision = definition.step(STEP_REGISTER_DECISION).unwrap();
        assert_eq!(
            decision.dependencies(),
            &[STEP_REGISTER_APPLICATION.to_string()]
        );
        assert!(definition.step(STEP_REGISTER_SCORE).is_none());
    }
}
