//! In-memory progress store.
//!
//! Backs the dev server and doubles as a test fake. Writes apply in receipt
//! order, so the latest `persist_current_step` wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{StepError, StoreError};

use super::progress::{CompletionHandoff, ProgressRecord};
use super::registry::StepRegistry;
use super::store::ProgressStore;

/// Default destination once onboarding completes.
pub const DEFAULT_COMPLETION_REDIRECT: &str = "/cleaner/dashboard";

pub struct MemoryProgressStore {
    registry: Arc<StepRegistry>,
    record: RwLock<ProgressRecord>,
    submissions: RwLock<Vec<(String, serde_json::Value)>>,
    persisted: RwLock<Vec<String>>,
    rejections: RwLock<HashMap<String, String>>,
    persistence_down: AtomicBool,
    redirect_to: String,
}

impl MemoryProgressStore {
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        let record = ProgressRecord::starting_at(&registry);
        Self::with_record(registry, record)
    }

    /// Start from an existing record, e.g. to simulate a resumed session.
    pub fn with_record(registry: Arc<StepRegistry>, record: ProgressRecord) -> Self {
        Self {
            registry,
            record: RwLock::new(record),
            submissions: RwLock::new(Vec::new()),
            persisted: RwLock::new(Vec::new()),
            rejections: RwLock::new(HashMap::new()),
            persistence_down: AtomicBool::new(false),
            redirect_to: DEFAULT_COMPLETION_REDIRECT.to_string(),
        }
    }

    pub fn with_redirect(mut self, redirect_to: impl Into<String>) -> Self {
        self.redirect_to = redirect_to.into();
        self
    }

    /// Reject every submission for `step` with `message` (HTTP 422 semantics)
    /// until [`clear_rejection`](Self::clear_rejection) is called.
    pub async fn reject_step(&self, step: &str, message: &str) {
        self.rejections
            .write()
            .await
            .insert(step.to_string(), message.to_string());
    }

    pub async fn clear_rejection(&self, step: &str) {
        self.rejections.write().await.remove(step);
    }

    /// Make `persist_current_step` fail while `down` is true.
    pub fn set_persistence_down(&self, down: bool) {
        self.persistence_down.store(down, Ordering::SeqCst);
    }

    pub async fn record(&self) -> ProgressRecord {
        self.record.read().await.clone()
    }

    /// Every accepted `persist_current_step` call, in receipt order.
    pub async fn persisted_steps(&self) -> Vec<String> {
        self.persisted.read().await.clone()
    }

    /// Every accepted submission, in receipt order.
    pub async fn submissions(&self) -> Vec<(String, serde_json::Value)> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn fetch_progress(&self) -> Result<ProgressRecord, StoreError> {
        Ok(self.record.read().await.clone())
    }

    async fn persist_current_step(&self, step: &str) -> Result<(), StoreError> {
        if self.persistence_down.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("progress store unavailable".to_string()));
        }
        if !self.registry.is_valid(step) {
            return Err(StoreError::Status {
                status: 400,
                message: format!("Unknown onboarding step: {step}"),
            });
        }

        let mut record = self.record.write().await;
        record.current_step = Some(step.to_string());
        record.updated_at = Some(Utc::now());
        self.persisted.write().await.push(step.to_string());
        debug!(step = step, "Current step persisted");
        Ok(())
    }

    async fn submit_step_payload(
        &self,
        step: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        if !self.registry.is_valid(step) {
            return Err(StepError::Rejected {
                status: 404,
                message: format!("Unknown onboarding step: {step}"),
            });
        }
        if let Some(message) = self.rejections.read().await.get(step) {
            return Err(StepError::Rejected {
                status: 422,
                message: message.clone(),
            });
        }

        {
            let mut record = self.record.write().await;
            record.steps.insert(step.to_string(), true);
            record.updated_at = Some(Utc::now());
        }
        self.submissions
            .write()
            .await
            .push((step.to_string(), payload));

        info!(step = step, "Step submission accepted");
        Ok(serde_json::json!({ "step": step, "completed": true }))
    }

    async fn complete_onboarding(&self) -> Result<CompletionHandoff, StepError> {
        let mut record = self.record.write().await;
        let terminal = &self.registry.last().id;

        let missing: Vec<&str> = self
            .registry
            .steps()
            .iter()
            .filter(|s| &s.id != terminal && !record.is_step_completed(&s.id))
            .map(|s| s.id.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(StepError::Rejected {
                status: 409,
                message: format!("Onboarding incomplete: {}", missing.join(", ")),
            });
        }

        record.steps.insert(terminal.clone(), true);
        record.current_step = Some(terminal.clone());
        record.updated_at = Some(Utc::now());

        info!("Onboarding completed");
        Ok(CompletionHandoff {
            redirect_to: self.redirect_to.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryProgressStore {
        let registry =
            StepRegistry::new(["terms", "basic-info", "phone-verification", "review"]).unwrap();
        MemoryProgressStore::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn first_read_points_at_first_step() {
        let store = store();
        let record = store.fetch_progress().await.unwrap();
        assert_eq!(record.current_step.as_deref(), Some("terms"));
        assert!(record.steps.is_empty());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = store();
        store.persist_current_step("phone-verification").await.unwrap();
        store.persist_current_step("basic-info").await.unwrap();

        let record = store.fetch_progress().await.unwrap();
        assert_eq!(record.current_step.as_deref(), Some("basic-info"));
        assert_eq!(
            store.persisted_steps().await,
            vec!["phone-verification", "basic-info"]
        );
    }

    #[tokio::test]
    async fn persist_rejects_unknown_step_and_honors_outage() {
        let store = store();
        assert!(matches!(
            store.persist_current_step("bogus").await,
            Err(StoreError::Status { status: 400, .. })
        ));

        store.set_persistence_down(true);
        assert!(matches!(
            store.persist_current_step("terms").await,
            Err(StoreError::Transport(_))
        ));
        store.set_persistence_down(false);
        assert!(store.persist_current_step("terms").await.is_ok());
    }

    #[tokio::test]
    async fn rejection_keeps_message_and_leaves_record_untouched() {
        let store = store();
        store.reject_step("phone-verification", "OTP incorrect").await;

        let err = store
            .submit_step_payload("phone-verification", serde_json::json!({"otp": "000000"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StepError::Rejected {
                status: 422,
                message: "OTP incorrect".to_string()
            }
        );
        assert!(!store.record().await.is_step_completed("phone-verification"));
        assert!(store.submissions().await.is_empty());

        store.clear_rejection("phone-verification").await;
        assert!(
            store
                .submit_step_payload("phone-verification", serde_json::json!({"otp": "123456"}))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn complete_requires_all_prior_steps() {
        let store = store();
        store
            .submit_step_payload("terms", serde_json::json!({}))
            .await
            .unwrap();

        let err = store.complete_onboarding().await.unwrap_err();
        assert!(err.to_string().contains("basic-info"));
        assert!(err.to_string().contains("phone-verification"));

        for step in ["basic-info", "phone-verification"] {
            store
                .submit_step_payload(step, serde_json::json!({}))
                .await
                .unwrap();
        }
        let handoff = store.complete_onboarding().await.unwrap();
        assert_eq!(handoff.redirect_to, DEFAULT_COMPLETION_REDIRECT);
        assert!(store.record().await.is_step_completed("review"));
    }
}
