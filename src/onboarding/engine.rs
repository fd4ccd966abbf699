//! Wizard engine: resolves the resume step once, then owns navigation.
//!
//! Local navigation is authoritative as soon as it is established: position
//! changes apply immediately and persistence is dispatched on a background
//! task without being awaited. Background refreshes only replace the
//! read-only progress snapshot.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RegistryError, StoreError, WizardError};

use super::binding::{BindingSet, StepPayload};
use super::cleaner::{cleaner_bindings, cleaner_registry};
use super::progress::{CompletedData, CompletionHandoff, ProgressRecord, ProgressSummary};
use super::registry::{Step, StepRegistry};
use super::store::ProgressStore;

/// Default broadcast channel capacity.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Events emitted to observers of one wizard session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    StepChanged { step: String, index: usize },
    ProgressRefreshed { summary: ProgressSummary },
    Completed { redirect_to: String },
}

#[derive(Debug, Default)]
struct Session {
    /// `None` while loading.
    position: Option<usize>,
    completed: bool,
    /// Set while `complete_onboarding` is in flight; freezes navigation.
    completing: bool,
}

impl Session {
    fn is_frozen(&self) -> bool {
        self.completed || self.completing
    }
}

/// In-memory state machine for one onboarding session.
pub struct WizardEngine {
    session_id: Uuid,
    registry: Arc<StepRegistry>,
    bindings: BindingSet,
    store: Arc<dyn ProgressStore>,
    session: RwLock<Session>,
    snapshot: RwLock<Option<ProgressRecord>>,
    completed_data: RwLock<CompletedData>,
    persistence: Mutex<Vec<JoinHandle<()>>>,
    tx: broadcast::Sender<WizardEvent>,
}

impl WizardEngine {
    /// Create an engine over `bindings`' registry. Starts in the loading
    /// state; call [`initialize`](Self::initialize) or let the poller resolve
    /// the starting step.
    pub fn new(store: Arc<dyn ProgressStore>, bindings: BindingSet) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            session_id: Uuid::new_v4(),
            registry: Arc::clone(bindings.registry()),
            bindings,
            store,
            session: RwLock::new(Session::default()),
            snapshot: RwLock::new(None),
            completed_data: RwLock::new(CompletedData::default()),
            persistence: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Engine for the cleaner onboarding flow.
    pub fn cleaner(store: Arc<dyn ProgressStore>) -> Result<Self, RegistryError> {
        let bindings = cleaner_bindings(cleaner_registry())?;
        Ok(Self::new(store, bindings))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.tx.subscribe()
    }

    // ── Resolution ──────────────────────────────────────────────────

    /// Load progress and resolve the starting step.
    ///
    /// On a fetch failure the engine stays loading and the error is
    /// returned; calling again (or the poller's next tick) retries.
    pub async fn initialize(&self) -> Result<Step, StoreError> {
        let record = self.store.fetch_progress().await?;
        self.apply_snapshot(record).await;
        self.current_step().await.ok_or_else(|| {
            StoreError::InvalidResponse("starting step unresolved after load".to_string())
        })
    }

    /// Re-read progress into the snapshot. Resolves the starting step only
    /// if it was never resolved; an established position is never moved.
    pub async fn refresh(&self) -> Result<ProgressSummary, StoreError> {
        let record = self.store.fetch_progress().await?;
        Ok(self.apply_snapshot(record).await)
    }

    async fn apply_snapshot(&self, record: ProgressRecord) -> ProgressSummary {
        let summary = record.summarize(&self.registry);

        let resolved = {
            let mut session = self.session.write().await;
            if session.position.is_none() {
                let step = self.registry.resolve(record.current_step.as_deref());
                if let Some(raw) = record.current_step.as_deref() {
                    if raw != step.id {
                        warn!(
                            session_id = %self.session_id,
                            reported = raw,
                            fallback = %step.id,
                            "Backend reported unknown current step, starting at first step"
                        );
                    }
                }
                session.position = Some(step.index);
                Some(step.clone())
            } else {
                None
            }
        };

        *self.snapshot.write().await = Some(record);

        if let Some(step) = resolved {
            info!(session_id = %self.session_id, step = %step.id, "Resolved starting step");
            let _ = self.tx.send(WizardEvent::StepChanged {
                step: step.id,
                index: step.index,
            });
        }
        let _ = self.tx.send(WizardEvent::ProgressRefreshed { summary });
        summary
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Move forward one step. Returns `None` while loading or frozen by
    /// completion, and at the last step.
    pub async fn go_to_next(&self) -> Option<Step> {
        let step = {
            let mut session = self.session.write().await;
            if session.is_frozen() {
                return None;
            }
            let next = self.registry.next_after(session.position?)?.clone();
            session.position = Some(next.index);
            next
        };
        self.after_move(&step).await;
        Some(step)
    }

    /// Move back one step. Returns `None` while loading or frozen by
    /// completion, and at the first step.
    pub async fn go_to_previous(&self) -> Option<Step> {
        let step = {
            let mut session = self.session.write().await;
            if session.is_frozen() {
                return None;
            }
            let previous = self.registry.previous_before(session.position?)?.clone();
            session.position = Some(previous.index);
            previous
        };
        self.after_move(&step).await;
        Some(step)
    }

    /// Advance only if the session is still on `index`.
    async fn advance_from(&self, index: usize) -> Option<Step> {
        let step = {
            let mut session = self.session.write().await;
            if session.is_frozen() || session.position != Some(index) {
                return None;
            }
            let next = self.registry.next_after(index)?.clone();
            session.position = Some(next.index);
            next
        };
        self.after_move(&step).await;
        Some(step)
    }

    async fn after_move(&self, step: &Step) {
        debug!(session_id = %self.session_id, step = %step.id, "Navigated");
        let _ = self.tx.send(WizardEvent::StepChanged {
            step: step.id.clone(),
            index: step.index,
        });
        self.dispatch_persist(step.id.clone()).await;
    }

    /// Fire-and-forget write of the resume pointer. Failures are logged only.
    async fn dispatch_persist(&self, step: String) {
        let store = Arc::clone(&self.store);
        let session_id = self.session_id;
        let handle = tokio::spawn(async move {
            if let Err(e) = store.persist_current_step(&step).await {
                warn!(
                    session_id = %session_id,
                    step = %step,
                    error = %e,
                    "Failed to persist current step"
                );
            }
        });

        let mut tasks = self.persistence.lock().await;
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Wait for every in-flight persistence write to settle.
    pub async fn flush_persistence(&self) {
        let tasks = std::mem::take(&mut *self.persistence.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(session_id = %self.session_id, error = %e, "Persistence task aborted");
            }
        }
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Submit `payload` for `step`, which must be the current step.
    ///
    /// On success the snapshot is refreshed, derived values are cached and
    /// the wizard advances one step. On failure nothing changes and the
    /// submission error is returned unmodified.
    pub async fn submit_step(
        &self,
        step: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, WizardError> {
        let index = self
            .registry
            .index_of(step)
            .ok_or_else(|| WizardError::UnknownStep(step.to_string()))?;

        {
            let session = self.session.read().await;
            if session.completed {
                return Err(WizardError::AlreadyCompleted);
            }
            if session.completing {
                return Err(WizardError::CompletionPending);
            }
            let current = session.position.ok_or(WizardError::NotReady)?;
            if current != index {
                return Err(WizardError::NotCurrentStep {
                    requested: step.to_string(),
                    current: self.registry.steps()[current].id.clone(),
                });
            }
        }

        let binding = self
            .bindings
            .get(step)
            .ok_or_else(|| WizardError::NoBinding(step.to_string()))?;
        let prepared = binding.prepare(payload)?;

        let result = match binding.submit(self.store.as_ref(), prepared.clone()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    step = step,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Step submission failed"
                );
                return Err(e.into());
            }
        };
        info!(session_id = %self.session_id, step = step, "Step submitted");

        if let Err(e) = self.refresh().await {
            warn!(session_id = %self.session_id, error = %e, "Progress refresh after submission failed");
        }
        binding.record(&prepared, &mut *self.completed_data.write().await);

        if self.advance_from(index).await.is_none() {
            debug!(
                session_id = %self.session_id,
                step = step,
                "Not advancing: already at last step or moved during submission"
            );
        }
        Ok(result)
    }

    /// Typed form of [`submit_step`](Self::submit_step).
    pub async fn submit<P: StepPayload>(
        &self,
        payload: &P,
    ) -> Result<serde_json::Value, WizardError> {
        let value = serde_json::to_value(payload).map_err(|e| {
            crate::error::StepError::InvalidPayload {
                step: P::STEP.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.submit_step(P::STEP, value).await
    }

    /// Finish onboarding from the terminal step and return the handoff
    /// destination.
    pub async fn complete_wizard(&self) -> Result<CompletionHandoff, WizardError> {
        {
            let mut session = self.session.write().await;
            if session.completed {
                return Err(WizardError::AlreadyCompleted);
            }
            if session.completing {
                return Err(WizardError::CompletionPending);
            }
            let current = session.position.ok_or(WizardError::NotReady)?;
            let terminal = self.registry.last();
            if current != terminal.index {
                return Err(WizardError::NotAtTerminalStep {
                    terminal: terminal.id.clone(),
                    current: self.registry.steps()[current].id.clone(),
                });
            }
            session.completing = true;
        }

        let outcome = self.store.complete_onboarding().await;
        let handoff = {
            let mut session = self.session.write().await;
            session.completing = false;
            match outcome {
                Ok(handoff) => {
                    session.completed = true;
                    handoff
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Completing onboarding failed");
                    return Err(e.into());
                }
            }
        };

        info!(
            session_id = %self.session_id,
            redirect_to = %handoff.redirect_to,
            "Onboarding completed"
        );
        let _ = self.tx.send(WizardEvent::Completed {
            redirect_to: handoff.redirect_to.clone(),
        });
        Ok(handoff)
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Current step, or `None` while loading.
    pub async fn current_step(&self) -> Option<Step> {
        let position = self.session.read().await.position?;
        self.registry.step_at(position).cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.session.read().await.position.is_none()
    }

    pub async fn is_completed(&self) -> bool {
        self.session.read().await.completed
    }

    /// Last progress record read from the store.
    pub async fn snapshot(&self) -> Option<ProgressRecord> {
        self.snapshot.read().await.clone()
    }

    pub async fn progress_summary(&self) -> Option<ProgressSummary> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .map(|r| r.summarize(&self.registry))
    }

    pub async fn completed_data(&self) -> CompletedData {
        self.completed_data.read().await.clone()
    }
}

/// Spawn a background task that refreshes progress every `every`.
///
/// The first tick fires immediately, so the poller also resolves the starting
/// step of a fresh engine. Stops once the wizard completes.
pub fn spawn_progress_poller(engine: Arc<WizardEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if engine.is_completed().await {
                debug!(session_id = %engine.session_id(), "Wizard completed, poller stopping");
                break;
            }
            if let Err(e) = engine.refresh().await {
                warn!(session_id = %engine.session_id(), error = %e, "Progress refresh failed");
            }
        }
    })
}
