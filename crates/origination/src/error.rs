//! Resource API error types.

use cqrs::HandlerError;
use thiserror::Error;

use crate::resource::ResourceKind;

/// Errors returned by the loan origination resource APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The addressed record does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    /// The request conflicts with an existing record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request was rejected as malformed.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// The API could not be reached or timed out.
    #[error("Resource API unavailable: {0}")]
    Unavailable(String),
}

impl ResourceError {
    pub fn not_found(kind: ResourceKind, id: impl ToString) -> Self {
        ResourceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<ResourceError> for HandlerError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound { .. } => HandlerError::NotFound(err.to_string()),
            ResourceError::Conflict(msg) => HandlerError::Conflict(msg),
            ResourceError::Invalid(msg) => HandlerError::Validation(msg),
            ResourceError::Unavailable(msg) => HandlerError::Transient(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_handler_taxonomy() {
        let not_found = HandlerError::from(ResourceError::not_found(ResourceKind::Party, "p-1"));
        assert_eq!(
            not_found,
            HandlerError::NotFound("application_party p-1 not found".into())
        );

        assert!(HandlerError::from(ResourceError::Unavailable("reset".into())).is_transient());
        assert_eq!(
            HandlerError::from(ResourceError::Invalid("amount".into())),
            HandlerError::Validation("amount".into())
        );
        assert_eq!(
            HandlerError::from(ResourceError::Conflict("dup".into())),
            HandlerError::Conflict("dup".into())
        );
    }
}
