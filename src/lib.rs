//! PureTask onboarding: resumable cleaner onboarding wizard.

pub mod config;
pub mod error;
pub mod onboarding;
