//! Command/query bus.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::BusError;
use crate::registry::HandlerRegistry;
use crate::request::{Command, Query, Request, RequestType};

#[derive(Default)]
struct QueryCache {
    entries: HashMap<(TypeId, String), Box<dyn Any + Send + Sync>>,
    /// Bumped on every invalidation. A query result is only cached if no
    /// invalidation happened while its handler ran.
    generation: u64,
}

/// Routes requests to the single handler registered for their type.
///
/// The bus never retries: retry policy belongs to the caller. Results of
/// cacheable queries are memoised until the next command is dispatched.
#[derive(Clone)]
pub struct CommandBus {
    registry: Arc<HandlerRegistry>,
    cache: Arc<RwLock<QueryCache>>,
}

impl CommandBus {
    /// Creates a bus over a fully assembled registry.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            cache: Arc::new(RwLock::new(QueryCache::default())),
        }
    }

    /// Returns the registry backing this bus.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Dispatches a request to its handler without touching the query cache.
    #[tracing::instrument(skip_all, fields(request = RequestType::of::<R>().name()))]
    pub async fn dispatch<R: Request>(&self, request: R) -> Result<R::Response, BusError> {
        let request_type = RequestType::of::<R>();
        metrics::counter!("bus_dispatch_total", "request" => request_type.name()).increment(1);

        let handler = self.registry.resolve(request_type)?;
        let response = handler.handle_erased(Box::new(request)).await;

        match response {
            Ok(response) => response
                .downcast::<R::Response>()
                .map(|r| *r)
                .map_err(|_| BusError::TypeMismatch {
                    request_type: request_type.name(),
                }),
            Err(e) => {
                tracing::debug!(error = %e, kind = e.kind(), "handler failed");
                metrics::counter!("bus_dispatch_failures_total", "request" => request_type.name())
                    .increment(1);
                Err(e)
            }
        }
    }

    /// Sends a command. Cached query results are dropped afterwards, since
    /// the command may have changed what they describe.
    pub async fn send<C: Command>(&self, command: C) -> Result<C::Response, BusError> {
        let result = self.dispatch(command).await;
        self.invalidate_queries().await;
        result
    }

    /// Runs a query, serving it from the cache when it is cacheable.
    pub async fn query<Q>(&self, query: Q) -> Result<Q::Response, BusError>
    where
        Q: Query,
        Q::Response: Clone + Sync,
    {
        let Some(key) = query.cache_key() else {
            return self.dispatch(query).await;
        };
        let slot = (TypeId::of::<Q>(), key);

        let generation = {
            let cache = self.cache.read().await;
            if let Some(hit) = cache
                .entries
                .get(&slot)
                .and_then(|v| v.downcast_ref::<Q::Response>())
            {
                metrics::counter!("bus_query_cache_hits_total").increment(1);
                return Ok(hit.clone());
            }
            cache.generation
        };

        let response = self.dispatch(query).await?;
        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.entries.insert(slot, Box::new(response.clone()));
        }
        Ok(response)
    }

    /// Drops every cached query result.
    pub async fn invalidate_queries(&self) {
        let mut cache = self.cache.write().await;
        cache.entries.clear();
        cache.generation = cache.generation.wrapping_add(1);
    }
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBus")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::HandlerError;
    use crate::handler::Handler;

    struct Deposit(u32);

    impl Request for Deposit {
        type Response = u32;
    }

    impl Command for Deposit {}

    struct Balance {
        cacheable: bool,
    }

    impl Request for Balance {
        type Response = u32;
    }

    impl Query for Balance {
        fn cache_key(&self) -> Option<String> {
            self.cacheable.then(|| "balance".to_string())
        }
    }

    struct Unhandled;

    impl Request for Unhandled {
        type Response = ();
    }

    impl Command for Unhandled {}

    #[derive(Clone, Default)]
    struct Account {
        balance: Arc<AtomicUsize>,
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler<Deposit> for Account {
        async fn handle(&self, request: Deposit) -> Result<u32, HandlerError> {
            if request.0 == 0 {
                return Err(HandlerError::Validation("amount must be positive".into()));
            }
            let total = self.balance.fetch_add(request.0 as usize, Ordering::SeqCst) as u32;
            Ok(total + request.0)
        }
    }

    #[async_trait]
    impl Handler<Balance> for Account {
        async fn handle(&self, _request: Balance) -> Result<u32, HandlerError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.balance.load(Ordering::SeqCst) as u32)
        }
    }

    fn setup() -> (CommandBus, Account) {
        let account = Account::default();
        let registry = HandlerRegistry::new()
            .with::<Deposit, _>(account.clone())
            .unwrap()
            .with::<Balance, _>(account.clone())
            .unwrap();
        (CommandBus::new(registry), account)
    }

    #[tokio::test]
    async fn test_send_routes_to_handler() {
        let (bus, _) = setup();
        assert_eq!(bus.send(Deposit(5)).await.unwrap(), 5);
        assert_eq!(bus.send(Deposit(7)).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_handler_failure_is_propagated() {
        let (bus, _) = setup();
        let err = bus.send(Deposit(0)).await.unwrap_err();
        assert!(matches!(
            err,
            BusError::Handler(HandlerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_without_handler_fails() {
        let (bus, _) = setup();
        let err = bus.send(Unhandled).await.unwrap_err();
        assert_eq!(
            err,
            BusError::NoHandlerRegistered {
                request_type: "Unhandled"
            }
        );
    }

    #[tokio::test]
    async fn test_cacheable_query_is_memoised_until_next_command() {
        let (bus, account) = setup();
        bus.send(Deposit(3)).await.unwrap();

        assert_eq!(bus.query(Balance { cacheable: true }).await.unwrap(), 3);
        assert_eq!(bus.query(Balance { cacheable: true }).await.unwrap(), 3);
        assert_eq!(account.reads.load(Ordering::SeqCst), 1);

        bus.send(Deposit(4)).await.unwrap();
        assert_eq!(bus.query(Balance { cacheable: true }).await.unwrap(), 7);
        assert_eq!(account.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_cacheable_query_always_reaches_handler() {
        let (bus, account) = setup();
        bus.query(Balance { cacheable: false }).await.unwrap();
        bus.query(Balance { cacheable: false }).await.unwrap();
        assert_eq!(account.reads.load(Ordering::SeqCst), 2);
    }

    struct Overwrite(usize);

    impl Request for Overwrite {
        type Response = ();
    }

    impl Command for Overwrite {}

    struct Current;

    impl Request for Current {
        type Response = usize;
    }

    impl Query for Current {
        fn cache_key(&self) -> Option<String> {
            Some("current".to_string())
        }
    }

    /// A value whose first read pauses until released.
    #[derive(Clone, Default)]
    struct SlowCell {
        value: Arc<AtomicUsize>,
        pause_next_read: Arc<AtomicBool>,
        reading: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Handler<Overwrite> for SlowCell {
        async fn handle(&self, request: Overwrite) -> Result<(), HandlerError> {
            self.value.store(request.0, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Handler<Current> for SlowCell {
        async fn handle(&self, _request: Current) -> Result<usize, HandlerError> {
            let value = self.value.load(Ordering::SeqCst);
            if self.pause_next_read.swap(false, Ordering::SeqCst) {
                self.reading.notify_one();
                self.release.notified().await;
            }
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_result_read_before_a_command_is_not_cached() {
        let cell = SlowCell::default();
        cell.value.store(1, Ordering::SeqCst);
        cell.pause_next_read.store(true, Ordering::SeqCst);
        let registry = HandlerRegistry::new()
            .with::<Overwrite, _>(cell.clone())
            .unwrap()
            .with::<Current, _>(cell.clone())
            .unwrap();
        let bus = CommandBus::new(registry);

        let reader = tokio::spawn({
            let bus = bus.clone();
            async move { bus.query(Current).await }
        });
        cell.reading.notified().await;
        bus.send(Overwrite(2)).await.unwrap();
        cell.release.notify_one();

        assert_eq!(reader.await.unwrap().unwrap(), 1);
        assert_eq!(bus.query(Current).await.unwrap(), 2);
    }
}
