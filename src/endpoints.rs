//! HTTP surface: launch confirmation, health and metrics
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/confirm/:signature` | POST | Classify a submitted launch signature |
//! | `/health` | GET | Liveness |
//! | `/metrics` | GET | Prometheus text exposition |
//!
//! Confirmation answers 200 when confirmed or finalized, 202 while not found
//! or pending, 400 when the transaction failed or the signature is malformed,
//! and 500 on unexpected faults.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

use crate::{
    confirmation::{ConfirmationPoller, ConfirmationResult, ConfirmationStatus},
    metrics::try_metrics,
    security::{redact_sensitive, validator::validate_signature},
};

/// Shared state for the handlers
#[derive(Clone)]
pub struct EndpointState {
    pub poller: Arc<ConfirmationPoller>,
}

pub fn router(state: EndpointState) -> Router {
    Router::new()
        .route("/confirm/:signature", post(confirm))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Bind `addr` and serve until the listener fails
pub async fn serve(addr: SocketAddr, state: EndpointState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Confirmation endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmedBody {
    success: bool,
    confirmed: bool,
    confirmation_status: ConfirmationStatus,
    slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_time: Option<i64>,
}

fn confirmation_response(result: ConfirmationResult) -> Response {
    let code = StatusCode::from_u16(result.status.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match result.status {
        ConfirmationStatus::Confirmed | ConfirmationStatus::Finalized => (
            code,
            Json(ConfirmedBody {
                success: true,
                confirmed: true,
                confirmation_status: result.status,
                slot: result.slot,
                block_time: result.timestamp.map(|t| t.timestamp()),
            }),
        )
            .into_response(),
        ConfirmationStatus::NotFoundYet | ConfirmationStatus::Pending => (
            code,
            Json(json!({
                "success": false,
                "confirmed": false,
                "confirmationStatus": result.status,
                "slot": result.slot,
                "message": "Transaction not yet confirmed; check again shortly",
            })),
        )
            .into_response(),
        ConfirmationStatus::Failed => (
            code,
            Json(json!({
                "success": false,
                "confirmed": false,
                "confirmationStatus": result.status,
                "slot": result.slot,
                "error": "Transaction failed",
                "details": result.raw_error,
            })),
        )
            .into_response(),
    }
}

async fn confirm(State(state): State<EndpointState>, Path(signature): Path<String>) -> Response {
    let signature = match validate_signature(&signature) {
        Ok(signature) => signature,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response();
        }
    };

    match state.poller.check(&signature).await {
        Ok(result) => confirmation_response(result),
        Err(err) => {
            tracing::error!(%signature, error = %err, "Confirmation check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": redact_sensitive(&err.to_string()),
                })),
            )
                .into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn prometheus_metrics() -> Response {
    match try_metrics().and_then(|metrics| metrics.gather_text()) {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use solana_sdk::signature::Signature;
    use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
    use tower::ServiceExt;

    fn app(ledger: Arc<MockLedger>) -> Router {
        router(EndpointState {
            poller: Arc::new(ConfirmationPoller::new(ledger)),
        })
    }

    async fn post_confirm(app: Router, signature: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/confirm/{signature}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_confirmed_returns_200() {
        let ledger = Arc::new(MockLedger::new());
        let signature = Signature::new_unique();
        ledger.set_status(
            signature,
            TransactionStatus {
                slot: 99,
                confirmations: Some(5),
                status: Ok(()),
                err: None,
                confirmation_status: Some(TransactionConfirmationStatus::Confirmed),
            },
        );
        ledger.set_block_time(1_700_000_123);

        let (status, body) = post_confirm(app(ledger), &signature.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["confirmed"], true);
        assert_eq!(body["confirmationStatus"], "confirmed");
        assert_eq!(body["slot"], 99);
        assert_eq!(body["blockTime"], 1_700_000_123);
    }

    #[tokio::test]
    async fn test_unknown_signature_returns_202() {
        let (status, body) = post_confirm(app(Arc::new(MockLedger::new())), &Signature::new_unique().to_string()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["confirmed"], false);
    }

    #[tokio::test]
    async fn test_malformed_signature_returns_400() {
        let (status, body) = post_confirm(app(Arc::new(MockLedger::new())), "not-a-signature").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_ledger_fault_returns_500() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_status_queries();
        let (status, _) = post_confirm(app(ledger), &Signature::new_unique().to_string()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = app(Arc::new(MockLedger::new()));
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
