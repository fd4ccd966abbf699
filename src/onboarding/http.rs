//! REST-backed progress store.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, StepError, StoreError};

use super::progress::{CompletionHandoff, ProgressRecord};
use super::store::ProgressStore;

/// Route prefix shared with [`super::routes`].
pub const ONBOARDING_PREFIX: &str = "/api/cleaner/onboarding";

/// Progress store that talks to the onboarding REST API.
pub struct HttpProgressStore {
    base_url: String,
    token: Option<SecretString>,
    timeout: std::time::Duration,
    client: reqwest::Client,
}

impl HttpProgressStore {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            timeout: config.request_timeout,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{ONBOARDING_PREFIX}{path}", self.base_url)
    }

    /// Submission URL with `step` percent-encoded as a single path segment.
    fn step_url(&self, step: &str) -> Result<reqwest::Url, StepError> {
        let mut url = reqwest::Url::parse(&self.url("/steps"))
            .map_err(|e| StepError::Transport(format!("invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StepError::Transport("API URL cannot take a path".to_string()))?
            .push(step);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    fn store_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Transport(e.to_string())
        }
    }

    /// POST a JSON body and decode the JSON response, mapping failures to
    /// `StepError` with the backend message intact.
    async fn post_step(
        &self,
        url: impl reqwest::IntoUrl,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        let response = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StepError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| StepError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn fetch_progress(&self) -> Result<ProgressRecord, StoreError> {
        let response = self
            .authorize(self.client.get(self.url("/progress")))
            .send()
            .await
            .map_err(|e| self.store_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        response
            .json::<ProgressRecord>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    async fn persist_current_step(&self, step: &str) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "step": step,
            "client_ts": Utc::now(),
        });
        let response = self
            .authorize(self.client.patch(self.url("/current-step")).json(&body))
            .send()
            .await
            .map_err(|e| self.store_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }
        debug!(step = step, "Current step persisted over HTTP");
        Ok(())
    }

    async fn submit_step_payload(
        &self,
        step: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, StepError> {
        self.post_step(self.step_url(step)?, &payload).await
    }

    async fn complete_onboarding(&self) -> Result<CompletionHandoff, StepError> {
        let value = self
            .post_step(self.url("/complete"), &serde_json::json!({}))
            .await?;
        serde_json::from_value(value).map_err(|e| StepError::InvalidResponse(e.to_string()))
    }
}

/// Pull a human-readable message out of an error body.
///
/// Prefers `{"error": ...}`, then `{"message": ...}`, then the raw text, then
/// the status reason.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
