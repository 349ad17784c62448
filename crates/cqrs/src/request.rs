//! Request traits.

use std::any::TypeId;

/// A value routed through the bus to exactly one handler.
///
/// A request's identity is its concrete type: the registry keys handlers
/// by `TypeId`, so two request types never share a handler slot.
pub trait Request: Send + 'static {
    /// The value produced by the handler.
    type Response: Send + 'static;
}

/// A request describing a single write intent.
pub trait Command: Request {}

/// A request describing a single read intent.
pub trait Query: Request {
    /// Returns the cache key for this query, or `None` when the query is not
    /// cacheable. Queries are not cacheable unless they opt in.
    fn cache_key(&self) -> Option<String> {
        None
    }
}

/// Type identity of a request, used when validating a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestType {
    id: TypeId,
    name: &'static str,
}

impl RequestType {
    /// Returns the identity of request type `R`.
    pub fn of<R: Request>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: short_type_name::<R>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the unqualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Returns the last path segment of a type name.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    impl Request for Ping {
        type Response = ();
    }

    struct Pong;

    impl Request for Pong {
        type Response = ();
    }

    #[test]
    fn test_request_type_identity() {
        assert_eq!(RequestType::of::<Ping>(), RequestType::of::<Ping>());
        assert_ne!(RequestType::of::<Ping>(), RequestType::of::<Pong>());
    }

    #[test]
    fn test_request_type_name_is_unqualified() {
        assert_eq!(RequestType::of::<Ping>().name(), "Ping");
        assert_eq!(RequestType::of::<Pong>().to_string(), "Pong");
    }
}
