//! Error types for PureTask onboarding.

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Progress store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors raised while building a step registry or binding set.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A step registry needs at least one step")]
    Empty,

    #[error("Duplicate step identifier: {0}")]
    DuplicateStep(String),

    #[error("Blank step identifier at position {0}")]
    BlankStep(usize),

    #[error("Binding targets unknown step: {0}")]
    UnknownBindingStep(String),

    #[error("Duplicate binding for step: {0}")]
    DuplicateBinding(String),
}

/// Failures reading or writing the durable progress record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Progress store request failed: {0}")]
    Transport(String),

    #[error("Progress store returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid progress payload: {0}")]
    InvalidResponse(String),

    #[error("Progress store timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures from a step submission or the completion call.
///
/// Backend rejections keep their original message so callers can show
/// field-level feedback.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StepError {
    #[error("Invalid payload for step {step}: {reason}")]
    InvalidPayload { step: String, reason: String },

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl StepError {
    /// Whether the same payload may be resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::InvalidResponse(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidPayload { .. } => false,
        }
    }
}

/// Errors raised by the wizard engine's public operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("Wizard has not resolved its starting step yet")]
    NotReady,

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Step {requested} is not the current step ({current})")]
    NotCurrentStep { requested: String, current: String },

    #[error("No submission is bound to step {0}")]
    NoBinding(String),

    #[error("Wizard can only be completed from {terminal}, currently at {current}")]
    NotAtTerminalStep { terminal: String, current: String },

    #[error("Wizard is already completed")]
    AlreadyCompleted,

    #[error("Wizard completion is already in progress")]
    CompletionPending,

    #[error(transparent)]
    Step(#[from] StepError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
