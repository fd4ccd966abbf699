//! Integration tests for the REST progress store against the dev backend.
//!
//! Each test spins up the Axum dev backend on a random port and drives the
//! real HTTP contract through `HttpProgressStore`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::time::timeout;

use puretask_onboarding::config::ClientConfig;
use puretask_onboarding::error::{StepError, StoreError, WizardError};
use puretask_onboarding::onboarding::cleaner::{
    Availability, AvailabilityBlock, BackgroundConsent, BasicInfo, DocumentType, FaceVerification,
    IdVerification, PhoneVerification, Rates, ServiceAreas, TermsAgreement, cache_keys,
    cleaner_registry, steps,
};
use puretask_onboarding::onboarding::{
    HttpProgressStore, MemoryProgressStore, OnboardingRouteState, ProgressStore, WizardEngine,
    onboarding_routes,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the dev backend on a random port, return (base_url, backing store).
async fn start_server() -> (String, Arc<MemoryProgressStore>) {
    let store = Arc::new(MemoryProgressStore::new(cleaner_registry()));
    let app = onboarding_routes(OnboardingRouteState {
        store: Arc::clone(&store),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), store)
}

fn http_store(base_url: &str) -> Arc<HttpProgressStore> {
    let config = ClientConfig {
        api_base_url: base_url.to_string(),
        api_token: Some(SecretString::from("test-token")),
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    Arc::new(HttpProgressStore::new(&config).unwrap())
}

#[tokio::test]
async fn fetch_and_persist_round_trip_over_http() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        let store = http_store(&base_url);

        let record = store.fetch_progress().await.unwrap();
        assert_eq!(record.current_step.as_deref(), Some(steps::TERMS));

        store.persist_current_step(steps::RATES).await.unwrap();
        store.persist_current_step(steps::BASIC_INFO).await.unwrap();
        assert_eq!(
            backend.record().await.current_step.as_deref(),
            Some(steps::BASIC_INFO)
        );

        let err = store.persist_current_step("bogus").await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 400, .. }));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn backend_rejection_message_reaches_caller() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        backend.persist_current_step(steps::PHONE_VERIFICATION).await.unwrap();
        backend
            .reject_step(steps::PHONE_VERIFICATION, "OTP incorrect")
            .await;

        let engine = WizardEngine::cleaner(http_store(&base_url)).unwrap();
        assert_eq!(
            engine.initialize().await.unwrap().id,
            steps::PHONE_VERIFICATION
        );

        let err = engine
            .submit(&PhoneVerification {
                phone_number: "+14155550100".to_string(),
                otp: "000000".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WizardError::Step(StepError::Rejected {
                status: 422,
                message: "OTP incorrect".to_string()
            })
        );
        assert_eq!(
            engine.current_step().await.unwrap().id,
            steps::PHONE_VERIFICATION
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_backend_surfaces_transport_error() {
    timeout(TEST_TIMEOUT, async {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let engine =
            WizardEngine::cleaner(http_store(&format!("http://127.0.0.1:{port}"))).unwrap();
        assert!(engine.initialize().await.is_err());
        assert!(engine.is_loading().await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn full_cleaner_flow_completes() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        let engine = WizardEngine::cleaner(http_store(&base_url)).unwrap();
        engine.initialize().await.unwrap();

        engine
            .submit(&TermsAgreement {
                agreed_to_terms: true,
                agreed_to_contractor_agreement: true,
            })
            .await
            .unwrap();
        engine
            .submit(&BasicInfo {
                first_name: "Dana".to_string(),
                last_name: "Reyes".to_string(),
                bio: Some("Eight years of residential cleaning.".to_string()),
                professional_headline: None,
            })
            .await
            .unwrap();
        engine
            .submit(&PhoneVerification {
                phone_number: "+14155550100".to_string(),
                otp: "123456".to_string(),
            })
            .await
            .unwrap();
        engine
            .submit(&FaceVerification {
                photo_url: "https://files.test/face.jpg".to_string(),
            })
            .await
            .unwrap();
        engine
            .submit(&IdVerification {
                document_type: DocumentType::DriversLicense,
                document_url: "https://files.test/id.jpg".to_string(),
            })
            .await
            .unwrap();
        engine
            .submit(&BackgroundConsent {
                consent_background_check: true,
                consent_fcra: true,
            })
            .await
            .unwrap();
        engine
            .submit(&ServiceAreas {
                zip_codes: vec!["94110".to_string(), "94103".to_string()],
                travel_radius_km: Some(10),
            })
            .await
            .unwrap();
        engine
            .submit(&Availability {
                blocks: vec![AvailabilityBlock {
                    day_of_week: 1,
                    start_time: "09:00".to_string(),
                    end_time: "17:00".to_string(),
                }],
            })
            .await
            .unwrap();
        engine
            .submit(&Rates {
                hourly_rate_credits: 40,
                travel_radius_km: None,
            })
            .await
            .unwrap();

        assert_eq!(engine.current_step().await.unwrap().id, steps::REVIEW);

        let cache = engine.completed_data().await;
        assert_eq!(cache.count(cache_keys::SERVICE_AREAS), Some(2));
        assert_eq!(cache.count(cache_keys::AVAILABILITY_BLOCKS), Some(1));
        assert_eq!(cache.count(cache_keys::HOURLY_RATE_CREDITS), Some(40));

        let summary = engine.progress_summary().await.unwrap();
        assert_eq!(summary.completed, 9);
        assert_eq!(summary.percent_complete, 90);

        let handoff = engine.complete_wizard().await.unwrap();
        assert_eq!(handoff.redirect_to, "/cleaner/dashboard");
        assert!(engine.is_completed().await);

        engine.flush_persistence().await;
        let record = backend.record().await;
        assert!(record.is_step_completed(steps::REVIEW));
        assert_eq!(backend.submissions().await.len(), 9);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn completing_early_is_refused_by_backend() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        backend.persist_current_step(steps::REVIEW).await.unwrap();

        let engine = WizardEngine::cleaner(http_store(&base_url)).unwrap();
        engine.initialize().await.unwrap();

        match engine.complete_wizard().await {
            Err(WizardError::Step(StepError::Rejected { status, message })) => {
                assert_eq!(status, 409);
                assert!(message.starts_with("Onboarding incomplete"));
            }
            other => panic!("expected 409 rejection, got {other:?}"),
        }
        assert!(!engine.is_completed().await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_body_gets_json_error() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        let client = reqwest::Client::new();

        let response = client
            .patch(format!("{base_url}/api/cleaner/onboarding/current-step"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());

        let response = client
            .post(format!("{base_url}/api/cleaner/onboarding/steps/terms"))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());

        assert!(backend.submissions().await.is_empty());
        assert!(backend.persisted_steps().await.is_empty());
    })
    .await
    .expect("test timed out");
}
