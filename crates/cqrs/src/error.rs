//! Bus and handler error types.

use thiserror::Error;

/// Failure reported by a handler while processing a request.
///
/// The variants classify the failure so callers can decide whether a
/// retry makes sense: only `Transient` failures are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Malformed input; never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate record or idempotency violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network failure or timeout; eligible for a bounded number of retries.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Unclassified failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Returns true if the failure may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }

    /// Returns the classification as a string, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Validation(_) => "validation",
            HandlerError::NotFound(_) => "not_found",
            HandlerError::Conflict(_) => "conflict",
            HandlerError::Transient(_) => "transient",
            HandlerError::Internal(_) => "internal",
        }
    }
}

/// Errors raised while registering handlers or routing a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// No handler is registered for the request type.
    #[error("No handler registered for {request_type}")]
    NoHandlerRegistered { request_type: &'static str },

    /// A handler is already registered for the request type.
    #[error("Duplicate handler registered for {request_type}")]
    DuplicateHandler { request_type: &'static str },

    /// Startup validation found request types without a handler.
    #[error("Missing handlers for: {}", .request_types.join(", "))]
    MissingHandlers { request_types: Vec<&'static str> },

    /// The erased handler received or produced a value of the wrong type.
    #[error("Type mismatch while dispatching {request_type}")]
    TypeMismatch { request_type: &'static str },

    /// The handler itself failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl BusError {
    /// Returns the handler failure, if the handler was reached.
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            BusError::Handler(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the failure may succeed when retried.
    pub fn is_transient(&self) -> bool {
        self.handler_error().is_some_and(HandlerError::is_transient)
    }

    /// Returns true if the handler reported a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BusError::Handler(HandlerError::NotFound(_)))
    }

    /// Returns the classification as a string, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::Handler(e) => e.kind(),
            _ => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(HandlerError::Transient("timeout".into()).is_transient());
        assert!(!HandlerError::Validation("bad".into()).is_transient());
        assert!(!HandlerError::NotFound("gone".into()).is_transient());
        assert!(!HandlerError::Conflict("dup".into()).is_transient());
        assert!(!HandlerError::Internal("boom".into()).is_transient());
    }

    #[test]
    fn test_bus_error_classification() {
        let err = BusError::from(HandlerError::Transient("reset".into()));
        assert!(err.is_transient());
        assert_eq!(err.kind(), "transient");

        let err = BusError::from(HandlerError::NotFound("party".into()));
        assert!(err.is_not_found());
        assert!(!err.is_transient());

        let err = BusError::NoHandlerRegistered {
            request_type: "RegisterParty",
        };
        assert!(err.handler_error().is_none());
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_missing_handlers_message_lists_types() {
        let err = BusError::MissingHandlers {
            request_types: vec!["RegisterParty", "RemoveParty"],
        };
        assert_eq!(
            err.to_string(),
            "Missing handlers for: RegisterParty, RemoveParty"
        );
    }
}
