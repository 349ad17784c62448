//! Startup wiring for the loan origination handlers.

use std::sync::Arc;

use cqrs::{BusError, CommandBus, HandlerRegistry, RequestType};

use crate::api::OriginationApi;
use crate::commands::{
    RegisterApplication, RegisterDecision, RegisterDocument, RegisterOffer, RegisterParty,
    RegisterScore, RegisterStatusHistory, RemoveApplication, RemoveDecision, RemoveDocument,
    RemoveOffer, RemoveParty, RemoveScore, RemoveStatusHistory,
};
use crate::handlers::*;
use crate::queries::{GetApplicationStatus, GetLoanApplication};

/// Every request type the loan origination sagas and routes dispatch.
pub fn required_requests() -> Vec<RequestType> {
    vec![
        RequestType::of::<RegisterApplication>(),
        RequestType::of::<RemoveApplication>(),
        RequestType::of::<RegisterParty>(),
        RequestType::of::<RemoveParty>(),
        RequestType::of::<RegisterDocument>(),
        RequestType::of::<RemoveDocument>(),
        RequestType::of::<RegisterOffer>(),
        RequestType::of::<RemoveOffer>(),
        RequestType::of::<RegisterStatusHistory>(),
        RequestType::of::<RemoveStatusHistory>(),
        RequestType::of::<RegisterScore>(),
        RequestType::of::<RemoveScore>(),
        RequestType::of::<RegisterDecision>(),
        RequestType::of::<RemoveDecision>(),
        RequestType::of::<GetLoanApplication>(),
        RequestType::of::<GetApplicationStatus>(),
    ]
}

/// Registers one handler per origination request type, all sharing `api`.
pub fn register_handlers<A: OriginationApi>(
    registry: &mut HandlerRegistry,
    api: Arc<A>,
) -> Result<(), BusError> {
    registry.register::<RegisterApplication, _>(RegisterApplicationHandler::new(Arc::clone(&api)))?;
    registry.register::<RemoveApplication, _>(RemoveApplicationHandler::new(Arc::clone(&api)))?;
    registry.register::<RegisterParty, _>(RegisterPartyHandler::new(Arc::clone(&api)))?;
    registry.register::<RemoveParty, _>(RemovePartyHandler::new(Arc::clone(&api)))?;
    registry.register::<RegisterDocument, _>(RegisterDocumentHandler::new(Arc::clone(&api)))?;
    registry.register::<RemoveDocument, _>(RemoveDocumentHandler::new(Arc::clone(&api)))?;
    registry.register::<RegisterOffer, _>(RegisterOfferHandler::new(Arc::clone(&api)))?;
    registry.register::<RemoveOffer, _>(RemoveOfferHandler::new(Arc::clone(&api)))?;
    registry.register::<RegisterStatusHistory, _>(RegisterStatusHistoryHandler::new(Arc::clone(
        &api,
    )))?;
    registry.register::<RemoveStatusHistory, _>(RemoveStatusHistoryHandler::new(Arc::clone(
        &api,
    )))?;
    registry.register::<RegisterScore, _>(RegisterScoreHandler::new(Arc::clone(&api)))?;
    registry.register::<RemoveScore, _>(RemoveScoreHandler::new(Arc::clone(&api)))?;
    registry.register::<RegisterDecision, _>(RegisterDecisionHandler::new(Arc::clone(&api)))?;
    registry.register::<RemoveDecision, _>(RemoveDecisionHandler::new(Arc::clone(&api)))?;
    registry.register::<GetLoanApplication, _>(GetLoanApplicationHandler::new(Arc::clone(&api)))?;
    registry.register::<GetApplicationStatus, _>(GetApplicationStatusHandler::new(api))?;
    Ok(())
}

/// Builds a bus with every origination handler registered.
///
/// Fails at startup, rather than on first dispatch, if any required
/// request type is left without a handler.
pub fn build_bus<A: OriginationApi>(api: Arc<A>) -> Result<CommandBus, BusError> {
    let mut registry = HandlerRegistry::new();
    register_handlers(&mut registry, api)?;
    registry.ensure_registered(&required_requests())?;
    tracing::info!(handlers = registry.len(), "command bus ready");
    Ok(CommandBus::new(registry))
}
