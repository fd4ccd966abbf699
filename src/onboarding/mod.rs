//! Onboarding wizard: a linear step sequence with server-persisted
//! progress and resumption.
//!
//! A [`StepRegistry`] fixes the order, a [`ProgressStore`] holds the durable
//! record, [`StepBinding`]s adapt each step's submission, and the
//! [`WizardEngine`] owns navigation for one session. The cleaner flow in
//! [`cleaner`] instantiates all of it.

pub mod binding;
pub mod cleaner;
pub mod engine;
pub mod http;
pub mod memory;
pub mod progress;
pub mod registry;
pub mod routes;
pub mod store;

pub use binding::{BindingSet, StepBinding, StepPayload, TypedBinding};
pub use engine::{WizardEngine, WizardEvent, spawn_progress_poller};
pub use http::HttpProgressStore;
pub use memory::MemoryProgressStore;
pub use progress::{CompletedData, CompletionHandoff, ProgressRecord, ProgressSummary};
pub use registry::{Step, StepRegistry};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use store::ProgressStore;
