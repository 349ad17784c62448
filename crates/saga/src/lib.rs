//! Saga orchestration for loan application submission.
//!
//! A saga is a graph of steps, each sending one command through the
//! `CommandBus`. Steps whose dependencies have completed run concurrently;
//! values produced by one step (such as the new application ID) reach later
//! steps through a per-run `SagaContext`.
//!
//! If any step fails, nothing new is dispatched, in-flight steps are allowed
//! to settle, and every completed step is compensated in reverse completion
//! order. Each run is recorded as a stream of `SagaEvent`s.
//!
//! Two sagas are provided:
//! 1. `register-application`: the application with its parties, documents,
//!    offers, status history, underwriting score and decision
//! 2. `register-application-document`: one document for an existing
//!    application

pub mod bindings;
pub mod context;
pub mod definition;
pub mod emitter;
pub mod error;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod record;
pub mod register_application;
pub mod register_document;
pub mod retry;
pub mod service;
pub mod settings;
pub mod state;
pub mod step;

pub use context::SagaContext;
pub use definition::{SagaDefinition, SagaDefinitionBuilder, StepDefinition};
pub use emitter::{
    EmitError, EventEmitter, EventPublisher, FanoutEmitter, InMemoryAuditSink, TracingEmitter,
};
pub use error::{
    CompensationError, CompensationOutcome, ContextError, SagaError, SagaFailure, StepError,
    StepFailure,
};
pub use events::{SagaEvent, SagaEventEnvelope};
pub use executor::{RunScope, StepCompletion, StepExecutor};
pub use orchestrator::SagaOrchestrator;
pub use record::{CompletedStep, SagaExecutionRecord, SagaRecordStore};
pub use retry::RetryPolicy;
pub use service::LoanApplicationSagas;
pub use settings::SagaSettings;
pub use state::SagaState;
pub use step::{CommandStep, CompensatingCommand, Compensation, SagaCommand, StepAction, StepOutput};
