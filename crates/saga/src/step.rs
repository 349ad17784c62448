//! Step actions and their compensations.

use std::fmt::Debug;

use async_trait::async_trait;
use common::ResourceId;
use cqrs::{Command, CommandBus, RequestType};

use crate::context::SagaContext;
use crate::error::{ContextError, StepError};

/// The unit of work of one saga step.
#[async_trait]
pub trait StepAction: Send + Sync + 'static {
    /// Runs one attempt of the step.
    ///
    /// Called again on retry, so an implementation must produce the same
    /// idempotency key on every attempt.
    async fn execute(&self, bus: &CommandBus, ctx: &SagaContext) -> Result<StepOutput, StepError>;
}

/// Undoes the effect of one completed step.
#[async_trait]
pub trait Compensation: Send + Sync + 'static {
    async fn compensate(&self, bus: &CommandBus) -> Result<(), StepError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// What a successful step attempt produced.
pub struct StepOutput {
    /// Identifier of the created record.
    pub result: ResourceId,

    /// How to undo the step, bound to the created record.
    pub compensation: Option<Box<dyn Compensation>>,
}

impl Debug for StepOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepOutput")
            .field("result", &self.result)
            .field(
                "compensation",
                &self.compensation.as_ref().map(|c| c.describe()),
            )
            .finish()
    }
}

/// A creation command that can run as a saga step.
pub trait SagaCommand: Command<Response = ResourceId> + Clone + Sync + Debug {
    /// The command that deletes what this one created.
    type Undo: Command<Response = ()> + Clone + Sync + Debug;

    /// Fills the fields produced by earlier steps.
    fn bind(&mut self, ctx: &SagaContext) -> Result<(), ContextError>;

    /// Returns the command undoing this one, given the created record.
    fn undo(&self, created: ResourceId) -> Option<Self::Undo>;
}

/// Step dispatching one creation command through the bus.
///
/// The command is cloned per attempt, so its idempotency key is the same
/// on every retry.
#[derive(Debug, Clone)]
pub struct CommandStep<C> {
    command: C,
}

impl<C: SagaCommand> CommandStep<C> {
    pub fn new(command: C) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &C {
        &self.command
    }
}

#[async_trait]
impl<C: SagaCommand> StepAction for CommandStep<C> {
    async fn execute(&self, bus: &CommandBus, ctx: &SagaContext) -> Result<StepOutput, StepError> {
        let mut command = self.command.clone();
        command.bind(ctx)?;

        let created = bus.send(command.clone()).await?;
        let compensation = command
            .undo(created)
            .map(|undo| Box::new(CompensatingCommand::new(undo)) as Box<dyn Compensation>);

        Ok(StepOutput {
            result: created,
            compensation,
        })
    }
}

/// Compensation dispatching one deletion command through the bus.
#[derive(Debug, Clone)]
pub struct CompensatingCommand<C> {
    command: C,
}

impl<C> CompensatingCommand<C>
where
    C: Command<Response = ()> + Clone + Sync + Debug,
{
    pub fn new(command: C) -> Self {
        Self { command }
    }
}

#[async_trait]
impl<C> Compensation for CompensatingCommand<C>
where
    C: Command<Response = ()> + Clone + Sync + Debug,
{
    async fn compensate(&self, bus: &CommandBus) -> Result<(), StepError> {
        bus.send(self.command.clone()).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} {:?}", RequestType::of::<C>().name(), self.command)
    }
}
