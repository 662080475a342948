//! Ledger and rent collaborators
//!
//! The launch core talks to the chain through two narrow traits so that the
//! sequencer, coordinator and poller can be exercised without a network:
//! - [`RentOracle`]: minimum balance for an account of a given size
//! - [`LedgerClient`]: blockhash, submission, acceptance, status lookups
//!
//! [`RpcLedgerClient`] implements both over the nonblocking `RpcClient`.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::{
    client_error::{Error as ClientError, ErrorKind as ClientErrorKind},
    request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    clock::{Slot, UnixTimestamp},
    commitment_config::CommitmentConfig,
    hash::Hash,
    signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};
use solana_transaction_status::TransactionStatus;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::tx_builder::LaunchError;

/// Errors surfaced by ledger collaborators
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// Expired blockhash, timeout, rate limiting, transport failure
    #[error("transient ledger error: {0}")]
    Transient(String),

    /// The ledger refused the transaction (preflight or execution)
    #[error("transaction rejected: {raw}")]
    Rejected { raw: String },

    /// Any other RPC failure
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<LedgerError> for LaunchError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Transient(reason) | LedgerError::Rpc(reason) => LaunchError::NetworkTransient {
                reason,
                signature: None,
            },
            LedgerError::Rejected { raw } => LaunchError::LedgerExecution {
                raw,
                signature: None,
            },
        }
    }
}

const TRANSIENT_MARKERS: [&str; 6] = [
    "blockhash not found",
    "timed out",
    "timeout",
    "too many requests",
    "connection",
    "node is behind",
];

fn looks_transient(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn classify_transaction_error(err: &TransactionError) -> LedgerError {
    match err {
        TransactionError::BlockhashNotFound => LedgerError::Transient(err.to_string()),
        TransactionError::AlreadyProcessed => LedgerError::Transient(err.to_string()),
        _ => LedgerError::Rejected {
            raw: err.to_string(),
        },
    }
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
                LedgerError::Transient(err.to_string())
            }
            ClientErrorKind::TransactionError(tx_err) => classify_transaction_error(tx_err),
            ClientErrorKind::RpcError(RpcError::RpcResponseError {
                message,
                data: RpcResponseErrorData::SendTransactionPreflightFailure(result),
                ..
            }) => {
                let raw = match &result.err {
                    Some(tx_err) => format!("{tx_err:?}"),
                    None => message.clone(),
                };
                if looks_transient(&raw) || raw.contains("BlockhashNotFound") {
                    LedgerError::Transient(raw)
                } else {
                    LedgerError::Rejected { raw }
                }
            }
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. })
                if *code == 429 || looks_transient(message) =>
            {
                LedgerError::Transient(message.clone())
            }
            _ => {
                let message = err.to_string();
                if looks_transient(&message) {
                    LedgerError::Transient(message)
                } else {
                    LedgerError::Rpc(message)
                }
            }
        }
    }
}

/// Minimum balance lookup for account persistence
#[async_trait]
pub trait RentOracle: Send + Sync {
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError>;
}

/// Chain access needed by the launch pipeline
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Blockhash every bundle of one launch is compiled against
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Send a fully signed transaction (with preflight)
    async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError>;

    /// Wait until a submitted transaction reaches confirmed commitment
    ///
    /// A transaction that landed with an execution error is
    /// [`LedgerError::Rejected`]. Bounded by the client's own polling
    /// window; no retries here.
    async fn await_acceptance(&self, signature: &Signature) -> Result<(), LedgerError>;

    /// Signature status, searching transaction history
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, LedgerError>;

    /// Block production time for a slot, if the node still has it
    async fn block_time(&self, slot: Slot) -> Result<Option<UnixTimestamp>, LedgerError>;
}

/// [`LedgerClient`] and [`RentOracle`] over JSON-RPC
pub struct RpcLedgerClient {
    client: RpcClient,
    acceptance_commitment: CommitmentConfig,
}

impl RpcLedgerClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                url.into(),
                timeout,
                CommitmentConfig::confirmed(),
            ),
            acceptance_commitment: CommitmentConfig::confirmed(),
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl RentOracle for RpcLedgerClient {
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        let lamports = self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?;
        debug!(data_len, lamports, "Rent-exempt minimum fetched");
        Ok(lamports)
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError> {
        Ok(self.client.send_transaction(tx).await?)
    }

    async fn await_acceptance(&self, signature: &Signature) -> Result<(), LedgerError> {
        self.client
            .poll_for_signature_with_commitment(signature, self.acceptance_commitment)
            .await?;

        // Polling stops at any status, including one that failed on chain
        match self
            .client
            .get_signature_status_with_commitment(signature, self.acceptance_commitment)
            .await?
        {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => {
                warn!(%signature, error = %err, "Transaction landed but failed");
                Err(LedgerError::Rejected {
                    raw: format!("{err:?}"),
                })
            }
            None => Err(LedgerError::Transient(format!(
                "{signature} not visible at {:?} commitment",
                self.acceptance_commitment.commitment
            ))),
        }
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, LedgerError> {
        let response = self
            .client
            .get_signature_statuses_with_history(&[*signature])
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }

    async fn block_time(&self, slot: Slot) -> Result<Option<UnixTimestamp>, LedgerError> {
        match self.client.get_block_time(slot).await {
            Ok(timestamp) => Ok(Some(timestamp)),
            Err(err) => {
                warn!(slot, error = %err, "Block time unavailable");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blockhash_not_found_is_transient() {
        let err = classify_transaction_error(&TransactionError::BlockhashNotFound);
        assert!(err.is_transient());
    }

    #[test]
    fn test_execution_failure_is_rejected() {
        let err = classify_transaction_error(&TransactionError::InsufficientFundsForFee);
        assert!(matches!(err, LedgerError::Rejected { .. }));
    }

    #[test]
    fn test_transient_markers() {
        assert!(looks_transient("HTTP status client error (429 Too Many Requests)"));
        assert!(looks_transient("operation timed out"));
        assert!(!looks_transient("custom program error: 0x1"));
    }

    #[test]
    fn test_conversion_into_launch_error() {
        let err: LaunchError = LedgerError::Rejected {
            raw: "InsufficientFundsForRent".into(),
        }
        .into();
        assert!(matches!(err, LaunchError::LedgerExecution { .. }));

        let err: LaunchError = LedgerError::Transient("timeout".into()).into();
        assert!(matches!(err, LaunchError::NetworkTransient { .. }));
    }
}
