//! Step action bindings: adapt one step's typed payload and domain call to
//! the engine's uniform submit contract.
//!
//! Bindings validate and submit; they never move the wizard. Only
//! [`WizardEngine`](super::engine::WizardEngine) changes position.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RegistryError, StepError};

use super::progress::CompletedData;
use super::registry::StepRegistry;
use super::store::ProgressStore;

/// A typed payload for one step.
pub trait StepPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier of the step this payload submits.
    const STEP: &'static str;

    /// Reject payloads the backend would refuse, before any network call.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Populate derived display values. Must be a pure function of `self`.
    fn record(&self, _cache: &mut CompletedData) {}
}

/// Object-safe binding used by the engine.
#[async_trait]
pub trait StepBinding: Send + Sync {
    fn step(&self) -> &str;

    /// Check the payload shape and return the normalized JSON to submit.
    fn prepare(&self, payload: serde_json::Value) -> Result<serde_json::Value, StepError>;

    /// Run the domain call.
    async fn submit(
        &self,
        store: &dyn ProgressStore,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        store.submit_step_payload(self.step(), payload).await
    }

    /// Record derived values after a successful submission.
    fn record(&self, payload: &serde_json::Value, cache: &mut CompletedData);
}

/// Binding for any [`StepPayload`] type.
pub struct TypedBinding<P> {
    _payload: PhantomData<fn() -> P>,
}

impl<P: StepPayload> TypedBinding<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }

    fn decode(&self, payload: serde_json::Value) -> Result<P, StepError> {
        serde_json::from_value(payload).map_err(|e| StepError::InvalidPayload {
            step: P::STEP.to_string(),
            reason: e.to_string(),
        })
    }
}

impl<P: StepPayload> Default for TypedBinding<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P: StepPayload> StepBinding for TypedBinding<P> {
    fn step(&self) -> &str {
        P::STEP
    }

    fn prepare(&self, payload: serde_json::Value) -> Result<serde_json::Value, StepError> {
        let typed = self.decode(payload)?;
        typed.validate().map_err(|reason| StepError::InvalidPayload {
            step: P::STEP.to_string(),
            reason,
        })?;
        serde_json::to_value(&typed).map_err(|e| StepError::InvalidPayload {
            step: P::STEP.to_string(),
            reason: e.to_string(),
        })
    }

    fn record(&self, payload: &serde_json::Value, cache: &mut CompletedData) {
        match serde_json::from_value::<P>(payload.clone()) {
            Ok(typed) => typed.record(cache),
            Err(e) => tracing::warn!(step = P::STEP, error = %e, "Skipping cache update"),
        }
    }
}

/// Step id → binding, checked against a registry.
#[derive(Clone)]
pub struct BindingSet {
    registry: Arc<StepRegistry>,
    bindings: HashMap<String, Arc<dyn StepBinding>>,
}

impl BindingSet {
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        Self {
            registry,
            bindings: HashMap::new(),
        }
    }

    pub fn register(&mut self, binding: Arc<dyn StepBinding>) -> Result<(), RegistryError> {
        let step = binding.step().to_string();
        if !self.registry.is_valid(&step) {
            return Err(RegistryError::UnknownBindingStep(step));
        }
        if self.bindings.contains_key(&step) {
            return Err(RegistryError::DuplicateBinding(step));
        }
        self.bindings.insert(step, binding);
        Ok(())
    }

    /// Builder form of [`register`](Self::register) for a typed payload.
    pub fn with<P: StepPayload>(mut self) -> Result<Self, RegistryError> {
        self.register(Arc::new(TypedBinding::<P>::new()))?;
        Ok(self)
    }

    pub fn get(&self, step: &str) -> Option<Arc<dyn StepBinding>> {
        self.bindings.get(step).cloned()
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
