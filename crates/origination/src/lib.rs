//! Loan origination domain layer.
//!
//! This crate provides:
//! - Command contracts for registering and removing every sub-resource of a
//!   loan application (application, parties, documents, offers, status
//!   history entries, underwriting score and decision)
//! - Query contracts for loan applications and application statuses
//! - The `OriginationApi` resource client trait and an in-memory
//!   implementation honouring idempotency keys
//! - One handler per request type, and the startup wiring that builds a
//!   validated `CommandBus`

pub mod api;
pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod queries;
pub mod resource;

pub use api::OriginationApi;
pub use bootstrap::{build_bus, register_handlers, required_requests};
pub use commands::{
    PartyRole, RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer,
    RegisterParty, RegisterScore, RegisterStatusHistory, RemoveApplication, RemoveDecision,
    RemoveDocument, RemoveOffer, RemoveParty, RemoveScore, RemoveStatusHistory, SubmitApplication,
};
pub use error::ResourceError;
pub use memory::{ApiCall, InMemoryOriginationApi, Operation};
pub use queries::{ApplicationStatus, GetApplicationStatus, GetLoanApplication, LoanApplication};
pub use resource::ResourceKind;
