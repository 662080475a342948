//! Failure and recovery scenarios
//!
//! Every failed mint must leave the session on Review with the collected
//! fields intact, a user-facing `last_error`, and the wallet's guard key
//! released.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use solana_sdk::signature::Signature;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

use super::test_helpers::{form, services};
use crate::{
    confirmation::{ConfirmationPoller, ConfirmationStatus},
    endpoints::{router, EndpointState},
    launch_flow::{FlowStep, LaunchSession},
    ledger::LedgerError,
    signing::{cancellation, CancelSignal},
    submission_guard::launch_key,
    test_utils::{MockBondingCurve, MockLedger, MockWallet},
    tx_builder::{LaunchError, MintConfig},
    types::LaunchMode,
    upload::UploadPayload,
    wallet::ExternalWallet,
};

async fn session_at_review(
    ledger: Arc<MockLedger>,
    wallet: Arc<MockWallet>,
    bonding: Option<Arc<MockBondingCurve>>,
    mode: LaunchMode,
) -> LaunchSession {
    let mut session = LaunchSession::new(services(ledger, bonding), wallet);
    session.submit_form(form(mode, MintConfig::default())).unwrap();
    session
        .upload_image(UploadPayload::new(vec![1, 2, 3, 4], "image/png", "logo.png"))
        .await
        .unwrap();
    session.upload_metadata().await.unwrap();
    assert_eq!(session.step(), FlowStep::Review);
    session
}

fn assert_recovered(session: &LaunchSession) {
    assert_eq!(session.step(), FlowStep::Review);
    let payload = &session.state().payload;
    assert!(payload.last_error.is_some());
    assert!(payload.receipt.is_none());
    assert!(payload.image_uri.is_some());
    assert!(payload.metadata_uri.is_some());
}

#[tokio::test]
async fn test_scenario_c_unknown_signature_not_found_yet() {
    let poller = ConfirmationPoller::new(Arc::new(MockLedger::new()));
    let result = poller.check(&Signature::new_unique()).await.unwrap();
    assert_eq!(result.status, ConfirmationStatus::NotFoundYet);
    assert_eq!(result.slot, None);
    assert_eq!(result.timestamp, None);
    assert_eq!(result.status.http_status(), 202);
}

#[tokio::test]
async fn test_scenario_c_over_http_then_confirmed_after_launch() {
    let ledger = Arc::new(MockLedger::new());
    let app = router(EndpointState {
        poller: Arc::new(ConfirmationPoller::new(ledger.clone())),
    });

    let unknown = Signature::new_unique().to_string();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/confirm/{unknown}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let mut session = session_at_review(ledger.clone(), Arc::new(MockWallet::new()), None, LaunchMode::Direct).await;
    let receipt = session.mint(&CancelSignal::never()).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/confirm/{}", receipt.primary_signature))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["confirmationStatus"], "confirmed");
}

#[tokio::test]
async fn test_scenario_e_cancel_during_wallet_prompt() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new().with_delay(Duration::from_secs(30)));
    let services = services(ledger.clone(), None);
    let guard = services.guard.clone();
    let mut session = LaunchSession::new(services, wallet.clone());
    session.submit_form(form(LaunchMode::Direct, MintConfig::default())).unwrap();
    session.skip_image().unwrap();
    session.upload_metadata().await.unwrap();

    let (handle, signal) = cancellation();
    let (result, ()) = tokio::join!(session.mint(&signal), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    assert!(matches!(result, Err(LaunchError::Cancelled)));
    assert_eq!(wallet.prompts(), 1);
    assert_eq!(ledger.submission_attempts(), 0);
    assert!(!guard.is_processing(&launch_key(&wallet.pubkey())));
    assert_eq!(session.step(), FlowStep::Review);
    assert!(session.state().payload.last_error.is_some());
}

#[tokio::test]
async fn test_cancel_before_mint_never_prompts() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new());
    let mut session = session_at_review(ledger.clone(), wallet.clone(), None, LaunchMode::Direct).await;

    let (handle, signal) = cancellation();
    handle.cancel();
    let err = session.mint(&signal).await.unwrap_err();

    assert!(matches!(err, LaunchError::Cancelled));
    assert_eq!(wallet.prompts(), 0);
    assert_eq!(ledger.submission_attempts(), 0);
    assert_recovered(&session);
}

#[tokio::test]
async fn test_duplicate_submission_rejected_without_prompt() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new());
    let services = services(ledger.clone(), None);
    let guard = services.guard.clone();
    let mut session = LaunchSession::new(services, wallet.clone());
    session.submit_form(form(LaunchMode::Direct, MintConfig::default())).unwrap();
    session.skip_image().unwrap();
    session.upload_metadata().await.unwrap();

    let key = launch_key(&wallet.pubkey());
    assert!(guard.mark_processing(&key));

    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, LaunchError::DuplicateSubmission(_)));
    assert_eq!(wallet.prompts(), 0);
    assert_eq!(session.step(), FlowStep::Review);
    // The other launch still owns the key
    assert!(guard.is_processing(&key));

    guard.mark_complete(&key);
    session.mint(&CancelSignal::never()).await.unwrap();
    assert_eq!(session.step(), FlowStep::Success);
}

#[tokio::test]
async fn test_wallet_rejection_returns_to_review() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::rejecting().without_message_signing());
    let mut session = session_at_review(ledger.clone(), wallet.clone(), None, LaunchMode::Direct).await;

    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, LaunchError::SigningRejected(_)));
    assert!(err.nothing_submitted());
    assert_eq!(ledger.submission_attempts(), 0);
    assert_recovered(&session);
    assert_eq!(session.state().payload.last_error.as_deref(), Some(err.user_message().as_str()));
}

#[tokio::test]
async fn test_retry_after_transient_failure_succeeds() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_submission_at(0, LedgerError::Transient("blockhash expired".into()));
    let mut session = session_at_review(ledger.clone(), Arc::new(MockWallet::new()), None, LaunchMode::Direct).await;

    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_recovered(&session);

    let receipt = session.mint(&CancelSignal::never()).await.unwrap();
    assert_eq!(session.step(), FlowStep::Success);
    assert_eq!(ledger.submitted().len(), 1);
    assert_eq!(ledger.submitted()[0].signatures[0].to_string(), receipt.primary_signature);
    // A fresh blockhash per attempt
    assert_eq!(ledger.blockhash_requests(), 2);
}

#[tokio::test]
async fn test_ledger_rejection_is_execution_error() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_submission_at(
        0,
        LedgerError::Rejected {
            raw: "insufficient funds for rent".into(),
        },
    );
    let mut session = session_at_review(ledger.clone(), Arc::new(MockWallet::new()), None, LaunchMode::Direct).await;

    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    match &err {
        LaunchError::LedgerExecution { raw, .. } => assert!(raw.contains("insufficient funds")),
        other => panic!("unexpected error: {other:?}"),
    }
    // Nothing was created, so the user may try again
    assert!(err.is_retryable());
    assert!(err.nothing_submitted());
    assert_recovered(&session);
}

#[tokio::test]
async fn test_unreadable_status_still_succeeds_without_confirmation() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_status_queries();
    let mut session = session_at_review(ledger.clone(), Arc::new(MockWallet::new()), None, LaunchMode::Direct).await;

    let receipt = session.mint(&CancelSignal::never()).await.unwrap();
    assert_eq!(session.step(), FlowStep::Success);
    assert!(receipt.confirmation.is_none());
}

#[tokio::test]
async fn test_pool_launch_without_service_is_configuration_error() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new());
    let mut session = session_at_review(ledger.clone(), wallet.clone(), None, LaunchMode::BondingCurve).await;

    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, LaunchError::Configuration(_)));
    assert_eq!(wallet.prompts(), 0);
    assert_recovered(&session);
}

#[tokio::test]
async fn test_bonding_service_failure_is_collaborator_error() {
    let ledger = Arc::new(MockLedger::new());
    let wallet = Arc::new(MockWallet::new());
    let service = Arc::new(MockBondingCurve::failing());
    let mut session = session_at_review(ledger.clone(), wallet.clone(), Some(service), LaunchMode::BondingCurve).await;

    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, LaunchError::Collaborator { .. }));
    assert_eq!(wallet.prompts(), 0);
    assert_eq!(ledger.submission_attempts(), 0);
    assert_recovered(&session);
}

#[tokio::test]
async fn test_mint_outside_review_is_rejected() {
    let mut session = LaunchSession::new(services(Arc::new(MockLedger::new()), None), Arc::new(MockWallet::new()));
    let err = session.mint(&CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, LaunchError::Internal(_)));
    assert_eq!(session.step(), FlowStep::Form);
}
