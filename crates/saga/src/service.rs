//! Entry points for running the loan application sagas.

use std::sync::Arc;

use common::{ResourceId, SagaId};
use cqrs::CommandBus;
use origination::{RegisterDocument, SubmitApplication};
use tokio::sync::watch;

use crate::context::SagaContext;
use crate::definition::SagaDefinition;
use crate::emitter::EventEmitter;
use crate::error::{Result, SagaError};
use crate::executor::StepExecutor;
use crate::orchestrator::SagaOrchestrator;
use crate::record::{SagaExecutionRecord, SagaRecordStore};
use crate::register_application::{self, STEP_REGISTER_APPLICATION};
use crate::register_document::{self, STEP_REGISTER_DOCUMENT};
use crate::settings::SagaSettings;

/// Cancels a run when the caller stops waiting for it.
///
/// The run itself is spawned, so dropping the caller's future does not drop
/// the run: the in-flight steps settle and completed steps are compensated.
struct CancelOnDrop {
    sender: watch::Sender<bool>,
    armed: bool,
}

impl CancelOnDrop {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                sender,
                armed: true,
            },
            receiver,
        )
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.sender.send(true);
        }
    }
}

/// Submits loan applications and application documents through sagas.
#[derive(Debug, Clone)]
pub struct LoanApplicationSagas {
    orchestrator: Arc<SagaOrchestrator>,
}

impl LoanApplicationSagas {
    pub fn new(orchestrator: SagaOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Wires an orchestrator with a fresh record store.
    pub fn with_bus(bus: CommandBus, emitter: Arc<dyn EventEmitter>, settings: SagaSettings) -> Self {
        Self::new(SagaOrchestrator::new(
            StepExecutor::new(bus, emitter, settings),
            SagaRecordStore::with_retained_runs(settings.retained_runs),
        ))
    }

    pub fn orchestrator(&self) -> &SagaOrchestrator {
        &self.orchestrator
    }

    pub fn records(&self) -> &SagaRecordStore {
        self.orchestrator.records()
    }

    /// Registers an application with all of its sub-resources and returns
    /// the ID of the new application.
    pub async fn submit(&self, submission: SubmitApplication) -> Result<ResourceId> {
        self.submit_as(SagaId::new(), submission).await
    }

    /// Same as [`submit`](Self::submit) with a caller-chosen saga ID, so the
    /// run can be looked up while it is still in progress.
    #[tracing::instrument(skip_all, fields(%saga_id))]
    pub async fn submit_as(
        &self,
        saga_id: SagaId,
        submission: SubmitApplication,
    ) -> Result<ResourceId> {
        let definition = register_application::definition(submission)?;
        let record = self.drive(saga_id, definition, SagaContext::new()).await?;
        record
            .result_of(STEP_REGISTER_APPLICATION)
            .ok_or_else(|| SagaError::MissingResult(STEP_REGISTER_APPLICATION.to_string()))
    }

    /// Attaches a document to an existing application and returns the ID of
    /// the new document.
    pub async fn register_document(
        &self,
        loan_application_id: ResourceId,
        document: RegisterDocument,
    ) -> Result<ResourceId> {
        self.register_document_as(SagaId::new(), loan_application_id, document)
            .await
    }

    #[tracing::instrument(skip_all, fields(%saga_id, %loan_application_id))]
    pub async fn register_document_as(
        &self,
        saga_id: SagaId,
        loan_application_id: ResourceId,
        document: RegisterDocument,
    ) -> Result<ResourceId> {
        let definition = register_document::definition(document)?;
        let ctx = register_document::context(loan_application_id);
        let record = self.drive(saga_id, definition, ctx).await?;
        record
            .result_of(STEP_REGISTER_DOCUMENT)
            .ok_or_else(|| SagaError::MissingResult(STEP_REGISTER_DOCUMENT.to_string()))
    }

    async fn drive(
        &self,
        saga_id: SagaId,
        definition: SagaDefinition,
        ctx: SagaContext,
    ) -> Result<SagaExecutionRecord> {
        let (mut guard, cancel) = CancelOnDrop::new();
        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move {
            orchestrator.run(saga_id, &definition, &ctx, cancel).await
        });

        let joined = handle.await;
        guard.disarm();
        let outcome = joined.map_err(|e| SagaError::Aborted(e.to_string()))?;
        Ok(outcome?)
    }
}
