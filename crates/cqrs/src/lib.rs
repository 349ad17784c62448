//! Command/query routing for the loan origination services.
//!
//! This crate provides:
//! - `Request`, `Command` and `Query` marker traits keyed by concrete type
//! - `Handler` trait processing exactly one request type
//! - `HandlerRegistry`, an explicit registry that rejects duplicate and
//!   missing registrations before any traffic is served
//! - `CommandBus`, which routes requests to their single handler and
//!   memoises cacheable queries

pub mod bus;
pub mod error;
pub mod handler;
pub mod registry;
pub mod request;

pub use bus::CommandBus;
pub use error::{BusError, HandlerError};
pub use handler::Handler;
pub use registry::HandlerRegistry;
pub use request::{Command, Query, Request, RequestType};
