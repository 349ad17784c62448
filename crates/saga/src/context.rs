//! Saga context: values threaded between the steps of one run.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use common::ResourceId;
use serde_json::Value;

use crate::error::ContextError;

/// Key/value store scoped to one saga run.
///
/// Cloning shares the underlying map, so every step of the run sees the
/// same values. A fresh context must be created per run. Which step may
/// write a key is decided by the saga definition, not here.
#[derive(Debug, Clone, Default)]
pub struct SagaContext {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl SagaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with one pre-seeded identifier.
    pub fn with_id(key: impl Into<String>, id: ResourceId) -> Self {
        let ctx = Self::new();
        ctx.set_id(key, id);
        ctx
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &str) -> Result<Value, ContextError> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ContextError::KeyNotFound(key.to_string()))
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Returns the identifier under `key`.
    pub fn get_id(&self, key: &str) -> Result<ResourceId, ContextError> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|e| ContextError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Returns the identifier under `key`, or `None` if nothing was written.
    pub fn find_id(&self, key: &str) -> Result<Option<ResourceId>, ContextError> {
        match self.get_id(key) {
            Ok(id) => Ok(Some(id)),
            Err(ContextError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_id(&self, key: impl Into<String>, id: ResourceId) {
        self.set(key, Value::String(id.to_string()));
    }

    /// Returns a copy of every value currently held.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_not_found() {
        let ctx = SagaContext::new();
        assert_eq!(
            ctx.get("loanApplicationId"),
            Err(ContextError::KeyNotFound("loanApplicationId".into()))
        );
        assert_eq!(ctx.find_id("loanApplicationId"), Ok(None));
    }

    #[test]
    fn test_ids_round_trip() {
        let id = ResourceId::new();
        let ctx = SagaContext::with_id("loanApplicationId", id);
        assert_eq!(ctx.get_id("loanApplicationId").unwrap(), id);
        assert!(ctx.contains("loanApplicationId"));
    }

    #[test]
    fn test_malformed_id_is_invalid_value() {
        let ctx = SagaContext::new();
        ctx.set("loanApplicationId", Value::from(42));
        assert!(matches!(
            ctx.get_id("loanApplicationId"),
            Err(ContextError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_clones_share_values() {
        let ctx = SagaContext::new();
        let view = ctx.clone();
        ctx.set("k", Value::from("v"));
        assert_eq!(view.get("k").unwrap(), Value::from("v"));
        assert_eq!(view.snapshot().len(), 1);
    }
}
