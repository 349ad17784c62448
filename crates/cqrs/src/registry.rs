//! Handler registry keyed by request type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;
use crate::handler::Handler;
use crate::request::{Request, RequestType};

/// Object-safe view of a typed handler.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    async fn handle_erased(
        &self,
        request: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, BusError>;
}

struct TypedHandler<R, H> {
    handler: H,
    request_type: &'static str,
    _request: PhantomData<fn(R)>,
}

#[async_trait]
impl<R, H> ErasedHandler for TypedHandler<R, H>
where
    R: Request,
    H: Handler<R>,
{
    async fn handle_erased(
        &self,
        request: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, BusError> {
        let request = request
            .downcast::<R>()
            .map_err(|_| BusError::TypeMismatch {
                request_type: self.request_type,
            })?;
        let response = self.handler.handle(*request).await?;
        Ok(Box::new(response))
    }
}

#[derive(Clone)]
struct Registration {
    request_type: RequestType,
    handler: Arc<dyn ErasedHandler>,
}

/// Maps each request type to its single handler.
///
/// The registry is assembled explicitly at process start. Registering a
/// second handler for a type fails instead of overwriting the first one,
/// and `ensure_registered` verifies that every served request type has a
/// handler before the bus is handed out.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TypeId, Registration>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for request type `R`.
    ///
    /// Fails with `DuplicateHandler` if `R` already has a handler.
    pub fn register<R, H>(&mut self, handler: H) -> Result<(), BusError>
    where
        R: Request,
        H: Handler<R>,
    {
        let request_type = RequestType::of::<R>();
        if self.handlers.contains_key(&request_type.id()) {
            tracing::error!(request = %request_type, "duplicate handler registration");
            return Err(BusError::DuplicateHandler {
                request_type: request_type.name(),
            });
        }

        let handler = TypedHandler::<R, H> {
            handler,
            request_type: request_type.name(),
            _request: PhantomData,
        };
        self.handlers.insert(
            request_type.id(),
            Registration {
                request_type,
                handler: Arc::new(handler),
            },
        );
        tracing::debug!(request = %request_type, "handler registered");
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<R, H>(mut self, handler: H) -> Result<Self, BusError>
    where
        R: Request,
        H: Handler<R>,
    {
        self.register::<R, H>(handler)?;
        Ok(self)
    }

    /// Returns true if a handler is registered for `R`.
    pub fn contains<R: Request>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the registered request types.
    pub fn request_types(&self) -> Vec<RequestType> {
        self.handlers.values().map(|r| r.request_type).collect()
    }

    /// Verifies that every request type in `required` has a handler.
    pub fn ensure_registered(&self, required: &[RequestType]) -> Result<(), BusError> {
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|r| !self.handlers.contains_key(&r.id()))
            .map(|r| r.name())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BusError::MissingHandlers {
                request_types: missing,
            })
        }
    }

    /// Resolves the handler for a request type.
    pub(crate) fn resolve(
        &self,
        request_type: RequestType,
    ) -> Result<Arc<dyn ErasedHandler>, BusError> {
        self.handlers
            .get(&request_type.id())
            .map(|r| r.handler.clone())
            .ok_or(BusError::NoHandlerRegistered {
                request_type: request_type.name(),
            })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.values().map(|r| r.request_type.name()).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;

    struct Echo(String);

    impl Request for Echo {
        type Response = String;
    }

    struct Count;

    impl Request for Count {
        type Response = usize;
    }

    struct EchoHandler;

    #[async_trait]
    impl Handler<Echo> for EchoHandler {
        async fn handle(&self, request: Echo) -> Result<String, HandlerError> {
            Ok(request.0)
        }
    }

    struct LoudEchoHandler;

    #[async_trait]
    impl Handler<Echo> for LoudEchoHandler {
        async fn handle(&self, request: Echo) -> Result<String, HandlerError> {
            Ok(request.0.to_uppercase())
        }
    }

    #[test]
    fn test_register_and_contains() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        registry.register::<Echo, _>(EchoHandler).unwrap();
        assert!(registry.contains::<Echo>());
        assert!(!registry.contains::<Count>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Echo, _>(EchoHandler).unwrap();

        let err = registry.register::<Echo, _>(LoudEchoHandler).unwrap_err();
        assert_eq!(
            err,
            BusError::DuplicateHandler {
                request_type: "Echo"
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ensure_registered_reports_missing() {
        let registry = HandlerRegistry::new().with::<Echo, _>(EchoHandler).unwrap();

        assert!(registry.ensure_registered(&[RequestType::of::<Echo>()]).is_ok());

        let err = registry
            .ensure_registered(&[RequestType::of::<Echo>(), RequestType::of::<Count>()])
            .unwrap_err();
        assert_eq!(
            err,
            BusError::MissingHandlers {
                request_types: vec!["Count"]
            }
        );
    }

    #[test]
    fn test_resolve_missing_handler() {
        let registry = HandlerRegistry::new();
        let err = registry.resolve(RequestType::of::<Count>()).err().unwrap();
        assert_eq!(
            err,
            BusError::NoHandlerRegistered {
                request_type: "Count"
            }
        );
    }

    #[tokio::test]
    async fn test_erased_handler_round_trip() {
        let registry = HandlerRegistry::new().with::<Echo, _>(EchoHandler).unwrap();
        let handler = registry.resolve(RequestType::of::<Echo>()).unwrap();

        let response = handler
            .handle_erased(Box::new(Echo("hello".into())))
            .await
            .unwrap();
        assert_eq!(*response.downcast::<String>().unwrap(), "hello");

        let err = handler.handle_erased(Box::new(Count)).await.err().unwrap();
        assert!(matches!(err, BusError::TypeMismatch { .. }));
    }
}
