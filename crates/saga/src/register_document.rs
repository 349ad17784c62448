//! The register-application-document saga: attaches one document to an
//! existing application.

use common::ResourceId;
use origination::RegisterDocument;

use crate::bindings::LOAN_APPLICATION_ID;
use crate::context::SagaContext;
use crate::definition::{SagaDefinition, StepDefinition};
use crate::error::Result;
use crate::step::CommandStep;

pub const SAGA_NAME: &str = "register-application-document";

pub const STEP_REGISTER_DOCUMENT: &str = "register-document";

/// Builds the single-step graph. The application ID is not written by any
/// step; it must be seeded with [`context`].
pub fn definition(document: RegisterDocument) -> Result<SagaDefinition> {
    SagaDefinition::builder(SAGA_NAME)
        .step(
            StepDefinition::new(STEP_REGISTER_DOCUMENT, CommandStep::new(document))
                .reads(LOAN_APPLICATION_ID),
        )
        .build()
}

/// Creates the run context for `loan_application_id`.
pub fn context(loan_application_id: ResourceId) -> SagaContext {
    SagaContext::with_id(LOAN_APPLICATION_ID, loan_application_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step_reading_seeded_application() {
        let definition = definition(RegisterDocument::new("identity", "s3://docs/id")).unwrap();
        assert_eq!(definition.name(), SAGA_NAME);
        assert_eq!(definition.len(), 1);
        assert!(definition.steps()[0].dependencies().is_empty());

        let app = ResourceId::new();
        assert_eq!(context(app).get_id(LOAN_APPLICATION_ID).unwrap(), app);
    }
}
