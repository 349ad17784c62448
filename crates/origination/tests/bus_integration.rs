//! Integration tests for the origination handlers behind the command bus.

use std::sync::Arc;

use common::ResourceId;
use cqrs::{BusError, CommandBus, HandlerError};
use origination::{
    GetApplicationStatus, GetLoanApplication, InMemoryOriginationApi, Operation, OriginationApi,
    PartyRole, RegisterApplication, RegisterParty, RemoveApplication, RemoveParty, ResourceKind, build_bus,
};

struct TestHarness {
    api: Arc<InMemoryOriginationApi>,
    bus: CommandBus,
}

impl TestHarness {
    fn new() -> Self {
        let api = Arc::new(InMemoryOriginationApi::new());
        let bus = build_bus(Arc::clone(&api)).unwrap();
        Self { api, bus }
    }

    async fn application(&self) -> ResourceId {
        self.bus
            .send(RegisterApplication::new("MORTGAGE", 25_000_000, "EUR", 300))
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_register_party_through_bus() {
    let harness = TestHarness::new();
    let app = harness.application().await;

    let mut party = RegisterParty::new(ResourceId::new(), PartyRole::CoBorrower);
    party.loan_application_id = Some(app);
    let party_id = harness.bus.send(party).await.unwrap();

    assert_eq!(harness.api.parent_of(party_id).await, Some(app));
    assert_eq!(harness.api.count(ResourceKind::Party).await, 1);
}

#[tokio::test]
async fn test_resending_same_command_is_deduplicated() {
    let harness = TestHarness::new();
    let command = RegisterApplication::new("AUTO", 1_200_000, "EUR", 48);

    let first = harness.bus.send(command.clone()).await.unwrap();
    let second = harness.bus.send(command).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.api.count(ResourceKind::Application).await, 1);
}

#[tokio::test]
async fn test_remove_missing_party_is_not_found() {
    let harness = TestHarness::new();
    let app = harness.application().await;

    let err = harness
        .bus
        .send(RemoveParty {
            loan_application_id: app,
            application_party_id: ResourceId::new(),
        })
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_loan_application_query_is_cached_until_next_command() {
    let harness = TestHarness::new();
    let app = harness.application().await;

    let loaded = harness.bus.query(GetLoanApplication::new(app)).await.unwrap();
    assert_eq!(loaded.product_code, "MORTGAGE");

    // The handler is bypassed while the entry is cached.
    harness.api.delete_application(app).await.unwrap();
    assert!(harness.bus.query(GetLoanApplication::new(app)).await.is_ok());

    harness
        .bus
        .send(RemoveApplication {
            loan_application_id: ResourceId::new(),
        })
        .await
        .unwrap_err();

    let err = harness
        .bus
        .query(GetLoanApplication::new(app))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_status_query_is_never_cached() {
    let harness = TestHarness::new();

    let status = harness
        .bus
        .query(GetApplicationStatus::by_code("PENDING"))
        .await
        .unwrap();
    assert_eq!(status.code, "PENDING");

    let err = harness
        .bus
        .query(GetApplicationStatus::by_code("WITHDRAWN"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_transient_api_failure_surfaces_as_handler_error() {
    let harness = TestHarness::new();
    harness
        .api
        .fail_times(
            Operation::Create(ResourceKind::Application),
            origination::ResourceError::Unavailable("connection refused".into()),
            1,
        )
        .await;

    let err = harness
        .bus
        .send(RegisterApplication::new("AUTO", 1_000, "EUR", 12))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BusError::Handler(HandlerError::Transient("connection refused".into()))
    );
    assert!(err.is_transient());
}
