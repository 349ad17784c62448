//! Handler trait.

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::request::Request;

/// Processes exactly one request type.
///
/// Handlers hold their collaborators (resource API clients) and are
/// registered once, at startup, in a `HandlerRegistry`.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync + 'static {
    /// Handles the request, returning its response or a classified failure.
    async fn handle(&self, request: R) -> Result<R::Response, HandlerError>;
}
