//! Server-side confirmation of a submitted launch
//!
//! One status query per call, with history search, classified into a
//! [`ConfirmationStatus`]. Callers re-invoke to poll; there is no loop here.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    ledger::LedgerClient,
    metrics::metrics,
    tx_builder::LaunchError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmationStatus {
    /// The ledger has no record of the signature yet
    NotFoundYet,
    /// Processed but not yet confirmed
    Pending,
    Confirmed,
    Finalized,
    /// Executed and failed
    Failed,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFoundYet => "not_found",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Finalized)
    }

    /// HTTP status the confirmation endpoint answers with
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Confirmed | Self::Finalized => 200,
            Self::NotFoundYet | Self::Pending => 202,
            Self::Failed => 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResult {
    pub signature: String,
    pub status: ConfirmationStatus,
    pub slot: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Ledger error payload when `status` is `Failed`
    pub raw_error: Option<serde_json::Value>,
}

impl ConfirmationResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Map a raw status record onto a [`ConfirmationStatus`]
///
/// A record without a commitment level is treated as rooted.
pub fn classify_status(status: Option<&TransactionStatus>) -> ConfirmationStatus {
    let Some(status) = status else {
        return ConfirmationStatus::NotFoundYet;
    };
    if status.err.is_some() {
        return ConfirmationStatus::Failed;
    }
    match &status.confirmation_status {
        Some(TransactionConfirmationStatus::Processed) => ConfirmationStatus::Pending,
        Some(TransactionConfirmationStatus::Confirmed) => ConfirmationStatus::Confirmed,
        Some(TransactionConfirmationStatus::Finalized) => ConfirmationStatus::Finalized,
        None if status.confirmations.is_none() => ConfirmationStatus::Finalized,
        None => ConfirmationStatus::Confirmed,
    }
}

pub struct ConfirmationPoller {
    ledger: Arc<dyn LedgerClient>,
}

impl ConfirmationPoller {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Query and classify `signature` once
    ///
    /// Block time is looked up only on success and its failure never changes
    /// the outcome.
    pub async fn check(&self, signature: &Signature) -> Result<ConfirmationResult, LaunchError> {
        let record = self.ledger.signature_status(signature).await?;
        let status = classify_status(record.as_ref());

        let slot = record.as_ref().map(|r| r.slot);
        let raw_error = record
            .as_ref()
            .and_then(|r| r.err.as_ref())
            .map(|err| serde_json::to_value(err).unwrap_or_else(|_| serde_json::Value::String(format!("{err:?}"))));

        let timestamp = match (status.is_success(), slot) {
            (true, Some(slot)) => match self.ledger.block_time(slot).await {
                Ok(Some(seconds)) => Utc.timestamp_opt(seconds, 0).single(),
                Ok(None) => None,
                Err(err) => {
                    warn!(%signature, slot, error = %err, "Block time lookup failed");
                    None
                }
            },
            _ => None,
        };

        metrics()
            .confirmation_outcomes
            .with_label_values(&[status.as_str()])
            .inc();
        debug!(%signature, status = status.as_str(), ?slot, "Signature classified");

        Ok(ConfirmationResult {
            signature: signature.to_string(),
            status,
            slot,
            timestamp,
            raw_error,
        })
    }
}
