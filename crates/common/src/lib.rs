//! Shared identifier types for the loan origination workspace.

mod types;

pub use types::{IdempotencyKey, ResourceId, SagaId};
