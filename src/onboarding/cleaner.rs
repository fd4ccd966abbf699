//! Cleaner onboarding flow: the ten-step registry and its typed bindings.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

use super::binding::{BindingSet, StepPayload};
use super::progress::CompletedData;
use super::registry::StepRegistry;

/// Step identifiers, in order.
pub mod steps {
    pub const TERMS: &str = "terms";
    pub const BASIC_INFO: &str = "basic-info";
    pub const PHONE_VERIFICATION: &str = "phone-verification";
    pub const FACE_VERIFICATION: &str = "face-verification";
    pub const ID_VERIFICATION: &str = "id-verification";
    pub const BACKGROUND_CONSENT: &str = "background-consent";
    pub const SERVICE_AREAS: &str = "service-areas";
    pub const AVAILABILITY: &str = "availability";
    pub const RATES: &str = "rates";
    pub const REVIEW: &str = "review";

    pub const ALL: [&str; 10] = [
        TERMS,
        BASIC_INFO,
        PHONE_VERIFICATION,
        FACE_VERIFICATION,
        ID_VERIFICATION,
        BACKGROUND_CONSENT,
        SERVICE_AREAS,
        AVAILABILITY,
        RATES,
        REVIEW,
    ];
}

/// Keys written into [`CompletedData`] by the cleaner bindings.
pub mod cache_keys {
    pub const SERVICE_AREAS: &str = "service_areas";
    pub const AVAILABILITY_BLOCKS: &str = "availability_blocks";
    pub const HOURLY_RATE_CREDITS: &str = "hourly_rate_credits";
}

const MAX_BIO_CHARS: usize = 1000;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{9,14}$").expect("valid phone regex"));
static OTP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6}$").expect("valid otp regex"));
static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}$").expect("valid zip regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

pub fn cleaner_registry() -> Arc<StepRegistry> {
    // The step list is a compile-time constant with unique, non-blank ids.
    Arc::new(StepRegistry::new(steps::ALL).expect("cleaner step list is valid"))
}

/// Bindings for every cleaner step except the terminal review step.
pub fn cleaner_bindings(registry: Arc<StepRegistry>) -> Result<BindingSet, RegistryError> {
    BindingSet::new(registry)
        .with::<TermsAgreement>()?
        .with::<BasicInfo>()?
        .with::<PhoneVerification>()?
        .with::<FaceVerification>()?
        .with::<IdVerification>()?
        .with::<BackgroundConsent>()?
        .with::<ServiceAreas>()?
        .with::<Availability>()?
        .with::<Rates>()
}

fn require(condition: bool, reason: &str) -> Result<(), String> {
    if condition { Ok(()) } else { Err(reason.to_string()) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsAgreement {
    pub agreed_to_terms: bool,
    pub agreed_to_contractor_agreement: bool,
}

impl StepPayload for TermsAgreement {
    const STEP: &'static str = steps::TERMS;

    fn validate(&self) -> Result<(), String> {
        require(self.agreed_to_terms, "Terms of service must be accepted")?;
        require(
            self.agreed_to_contractor_agreement,
            "Independent contractor agreement must be accepted",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicInfo {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_headline: Option<String>,
}

impl StepPayload for BasicInfo {
    const STEP: &'static str = steps::BASIC_INFO;

    fn validate(&self) -> Result<(), String> {
        require(!self.first_name.trim().is_empty(), "First name is required")?;
        require(!self.last_name.trim().is_empty(), "Last name is required")?;
        if let Some(bio) = &self.bio {
            require(
                bio.chars().count() <= MAX_BIO_CHARS,
                "Bio must be 1000 characters or fewer",
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneVerification {
    pub phone_number: String,
    pub otp: String,
}

impl StepPayload for PhoneVerification {
    const STEP: &'static str = steps::PHONE_VERIFICATION;

    fn validate(&self) -> Result<(), String> {
        let phone: String = self
            .phone_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();
        require(PHONE_RE.is_match(&phone), "Enter a valid phone number")?;
        require(OTP_RE.is_match(self.otp.trim()), "Verification code must be 6 digits")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceVerification {
    pub photo_url: String,
}

impl StepPayload for FaceVerification {
    const STEP: &'static str = steps::FACE_VERIFICATION;

    fn validate(&self) -> Result<(), String> {
        require(!self.photo_url.trim().is_empty(), "A profile photo is required")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DriversLicense,
    Passport,
    StateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdVerification {
    pub document_type: DocumentType,
    pub document_url: String,
}

impl StepPayload for IdVerification {
    const STEP: &'static str = steps::ID_VERIFICATION;

    fn validate(&self) -> Result<(), String> {
        require(
            !self.document_url.trim().is_empty(),
            "An identity document upload is required",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConsent {
    pub consent_background_check: bool,
    pub consent_fcra: bool,
}

impl StepPayload for BackgroundConsent {
    const STEP: &'static str = steps::BACKGROUND_CONSENT;

    fn validate(&self) -> Result<(), String> {
        require(
            self.consent_background_check,
            "Consent to a background check is required",
        )?;
        require(self.consent_fcra, "FCRA disclosure must be acknowledged")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAreas {
    pub zip_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_radius_km: Option<u32>,
}

impl StepPayload for ServiceAreas {
    const STEP: &'static str = steps::SERVICE_AREAS;

    fn validate(&self) -> Result<(), String> {
        require(!self.zip_codes.is_empty(), "Select at least one service area")?;
        if let Some(bad) = self.zip_codes.iter().find(|z| !ZIP_RE.is_match(z)) {
            return Err(format!("Invalid ZIP code: {bad}"));
        }
        Ok(())
    }

    fn record(&self, cache: &mut CompletedData) {
        cache.insert(cache_keys::SERVICE_AREAS, self.zip_codes.len() as u64);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityBlock {
    /// 0 = Sunday.
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub blocks: Vec<AvailabilityBlock>,
}

impl StepPayload for Availability {
    const STEP: &'static str = steps::AVAILABILITY;

    fn validate(&self) -> Result<(), String> {
        require(!self.blocks.is_empty(), "Add at least one availability block")?;
        for block in &self.blocks {
            if block.day_of_week > 6 {
                return Err(format!("Invalid day of week: {}", block.day_of_week));
            }
            for time in [&block.start_time, &block.end_time] {
                if !TIME_RE.is_match(time) {
                    return Err(format!("Invalid time: {time}"));
                }
            }
            // Zero-padded HH:MM compares correctly as text.
            if block.start_time >= block.end_time {
                return Err(format!(
                    "Block must end after it starts ({}–{})",
                    block.start_time, block.end_time
                ));
            }
        }
        Ok(())
    }

    fn record(&self, cache: &mut CompletedData) {
        cache.insert(cache_keys::AVAILABILITY_BLOCKS, self.blocks.len() as u64);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rates {
    pub hourly_rate_credits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_radius_km: Option<u32>,
}

impl StepPayload for Rates {
    const STEP: &'static str = steps::RATES;

    fn validate(&self) -> Result<(), String> {
        require(self.hourly_rate_credits > 0, "Hourly rate must be greater than zero")
    }

    fn record(&self, cache: &mut CompletedData) {
        cache.insert(cache_keys::HOURLY_RATE_CREDITS, self.hourly_rate_credits);
    }
}
