//! `ProgressStore` trait: the only channel through which the wizard loads or
//! persists progress.

use async_trait::async_trait;

use crate::error::{StepError, StoreError};

use super::progress::{CompletionHandoff, ProgressRecord};

/// Backend-agnostic durable progress store.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Read the progress record. Idempotent and side-effect free; polled.
    async fn fetch_progress(&self) -> Result<ProgressRecord, StoreError>;

    /// Record the step the user should resume on. Concurrent writes resolve
    /// last-write-wins on the backend.
    async fn persist_current_step(&self, step: &str) -> Result<(), StoreError>;

    /// Submit one step's domain payload. The result shape is step-specific.
    async fn submit_step_payload(
        &self,
        step: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, StepError>;

    /// Finish onboarding. Only called from the terminal step.
    async fn complete_onboarding(&self) -> Result<CompletionHandoff, StepError>;
}
