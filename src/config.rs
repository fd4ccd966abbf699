//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default interval between background progress refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Client-side configuration for talking to the onboarding backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub api_base_url: String,
    /// Bearer credential attached to every request, if any.
    pub api_token: Option<SecretString>,
    /// How often the wizard re-reads the progress record.
    pub poll_interval: Duration,
    /// Transport timeout for each request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            api_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build config from environment variables.
    ///
    /// `PURETASK_API_URL` is required; `PURETASK_API_TOKEN`,
    /// `PURETASK_POLL_INTERVAL_SECS` and `PURETASK_REQUEST_TIMEOUT_SECS` are
    /// optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("PURETASK_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("PURETASK_API_URL".to_string()))?;
        let api_token = std::env::var("PURETASK_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let defaults = Self::default();
        Ok(Self {
            api_base_url: normalize_base_url(&api_base_url)?,
            api_token,
            poll_interval: env_secs("PURETASK_POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.poll_interval),
            request_timeout: env_secs("PURETASK_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout),
        })
    }
}

/// Configuration for the dev backend server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub completion_redirect: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            completion_redirect: "/cleaner/dashboard".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = match std::env::var("PURETASK_DEV_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PURETASK_DEV_PORT".to_string(),
                message: format!("not a port number: {raw}"),
            })?,
            Err(_) => defaults.port,
        };
        let completion_redirect = std::env::var("PURETASK_COMPLETION_REDIRECT")
            .unwrap_or(defaults.completion_redirect);
        Ok(Self {
            port,
            completion_redirect,
        })
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: "PURETASK_API_URL".to_string(),
            message: format!("expected an http(s) URL, got {raw:?}"),
        });
    }
    Ok(trimmed.to_string())
}

fn env_secs(key: &str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("not a whole number of seconds: {raw}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}
