//! JSON-RPC ledger client against a scripted node
//!
//! The node is a mockito server answering by JSON-RPC method name.

use launchpad::{
    confirmation::{ConfirmationPoller, ConfirmationStatus},
    ledger::{LedgerClient, LedgerError, RentOracle, RpcLedgerClient},
    tx_builder::SpaceRentEstimator,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use solana_sdk::signature::Signature;
use std::{sync::Arc, time::Duration};

async fn mock_method(server: &mut ServerGuard, method: &str, result: serde_json::Value) -> mockito::Mock {
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "method": method })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "jsonrpc": "2.0", "result": result, "id": 1 }).to_string())
        .create_async()
        .await
}

fn client(server: &ServerGuard) -> Arc<RpcLedgerClient> {
    Arc::new(RpcLedgerClient::new(server.url(), Duration::from_secs(5)))
}

#[tokio::test]
async fn test_unknown_signature_is_not_found_yet() {
    let mut server = Server::new_async().await;
    let statuses = mock_method(
        &mut server,
        "getSignatureStatuses",
        json!({ "context": { "slot": 500 }, "value": [null] }),
    )
    .await;

    let poller = ConfirmationPoller::new(client(&server));
    let result = poller.check(&Signature::new_unique()).await.unwrap();

    assert_eq!(result.status, ConfirmationStatus::NotFoundYet);
    assert_eq!(result.slot, None);
    statuses.assert_async().await;
}

#[tokio::test]
async fn test_finalized_signature_with_block_time() {
    let mut server = Server::new_async().await;
    mock_method(
        &mut server,
        "getSignatureStatuses",
        json!({
            "context": { "slot": 500 },
            "value": [{
                "slot": 480,
                "confirmations": null,
                "err": null,
                "status": { "Ok": null },
                "confirmationStatus": "finalized"
            }]
        }),
    )
    .await;
    let block_time = mock_method(&mut server, "getBlockTime", json!(1_700_000_000)).await;

    let result = ConfirmationPoller::new(client(&server))
        .check(&Signature::new_unique())
        .await
        .unwrap();

    assert_eq!(result.status, ConfirmationStatus::Finalized);
    assert_eq!(result.slot, Some(480));
    assert_eq!(result.timestamp.map(|t| t.timestamp()), Some(1_700_000_000));
    block_time.assert_async().await;
}

#[tokio::test]
async fn test_failed_signature_carries_raw_error() {
    let mut server = Server::new_async().await;
    mock_method(
        &mut server,
        "getSignatureStatuses",
        json!({
            "context": { "slot": 500 },
            "value": [{
                "slot": 481,
                "confirmations": 3,
                "err": { "InstructionError": [2, { "Custom": 1 }] },
                "status": { "Err": { "InstructionError": [2, { "Custom": 1 }] } },
                "confirmationStatus": "confirmed"
            }]
        }),
    )
    .await;
    // Block time is only looked up for successful transactions
    let block_time = mock_method(&mut server, "getBlockTime", json!(1_700_000_000)).await;

    let result = ConfirmationPoller::new(client(&server))
        .check(&Signature::new_unique())
        .await
        .unwrap();

    assert_eq!(result.status, ConfirmationStatus::Failed);
    assert_eq!(result.status.http_status(), 400);
    assert!(result.raw_error.is_some());
    assert!(!block_time.matched_async().await);
}

#[tokio::test]
async fn test_rent_lookup_prices_full_space() {
    let mut server = Server::new_async().await;
    mock_method(&mut server, "getMinimumBalanceForRentExemption", json!(3_500_000)).await;

    let rpc = client(&server);
    assert_eq!(rpc.minimum_balance_for_rent_exemption(400).await.unwrap(), 3_500_000);

    let space = SpaceRentEstimator::new(rpc)
        .estimate("Integration Token", "INTG", "ipfs://meta")
        .await
        .unwrap();
    assert_eq!(space.rent_lamports, 3_500_000);
    assert!(space.full_space > space.initial_space);
}

#[tokio::test]
async fn test_unreachable_node_is_an_error() {
    let rpc = RpcLedgerClient::new("http://127.0.0.1:9", Duration::from_millis(200));
    assert!(rpc.latest_blockhash().await.is_err());
}

#[tokio::test]
async fn test_acceptance_of_landed_but_failed_transaction_is_rejected() {
    let mut server = Server::new_async().await;
    mock_method(
        &mut server,
        "getSignatureStatuses",
        json!({
            "context": { "slot": 500 },
            "value": [{
                "slot": 490,
                "confirmations": 3,
                "err": { "InstructionError": [2, { "Custom": 1 }] },
                "status": { "Err": { "InstructionError": [2, { "Custom": 1 }] } },
                "confirmationStatus": "confirmed"
            }]
        }),
    )
    .await;

    let err = client(&server)
        .await_acceptance(&Signature::new_unique())
        .await
        .unwrap_err();
    match err {
        LedgerError::Rejected { raw } => assert!(raw.contains("Custom(1)")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_acceptance_of_successful_transaction() {
    let mut server = Server::new_async().await;
    mock_method(
        &mut server,
        "getSignatureStatuses",
        json!({
            "context": { "slot": 500 },
            "value": [{
                "slot": 490,
                "confirmations": 3,
                "err": null,
                "status": { "Ok": null },
                "confirmationStatus": "confirmed"
            }]
        }),
    )
    .await;

    client(&server).await_acceptance(&Signature::new_unique()).await.unwrap();
}
