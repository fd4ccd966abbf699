//! Progress record and the values derived from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::StepRegistry;

/// Durable, backend-held record of one user's onboarding advancement.
///
/// `current_step` is whatever the backend sent and may be missing or stale;
/// resolve it through [`StepRegistry::resolve`] before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub current_step: Option<String>,
    /// Per-step completion flags.
    #[serde(default)]
    pub steps: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// A fresh record pointing at the registry's first step.
    pub fn starting_at(registry: &StepRegistry) -> Self {
        Self {
            current_step: Some(registry.first().id.clone()),
            steps: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn is_step_completed(&self, step: &str) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    /// Summarize completion against `registry`. Flags for unknown steps are
    /// ignored.
    pub fn summarize(&self, registry: &StepRegistry) -> ProgressSummary {
        let total = registry.len();
        let completed = registry
            .steps()
            .iter()
            .filter(|s| self.is_step_completed(&s.id))
            .count();
        ProgressSummary {
            completed,
            total,
            percent_complete: (completed * 100 / total) as u8,
        }
    }
}

/// Display-only completion figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    /// Rounded down, 0–100.
    pub percent_complete: u8,
}

/// Values computed from successful submission payloads, shown on the review
/// step. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletedData {
    values: BTreeMap<String, serde_json::Value>,
}

impl CompletedData {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn count(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where to send the user once onboarding is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionHandoff {
    pub redirect_to: String,
}
