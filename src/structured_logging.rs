//! Structured launch lifecycle events

use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::{
    confirmation::ConfirmationStatus,
    tx_builder::{BundleRole, FeeBreakdown, LaunchError},
    types::LaunchMode,
};

/// Emits launch events tagged with a session context id
#[derive(Debug, Clone)]
pub struct LaunchLogger {
    context_id: String,
}

impl LaunchLogger {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_launch_started(&self, mode: LaunchMode, requester: &Pubkey, mint: &Pubkey) {
        tracing::info!(
            context_id = %self.context_id,
            mode = %mode,
            requester = %requester,
            mint = %mint,
            "Launch started"
        );
    }

    pub fn log_fees(&self, fees: &FeeBreakdown) {
        tracing::debug!(
            context_id = %self.context_id,
            total = fees.total,
            referrer_share = fees.referrer_share,
            platform_share = fees.platform_share,
            "Launch fees computed"
        );
    }

    pub fn log_wallet_prompt(&self, transaction_count: usize) {
        tracing::info!(
            context_id = %self.context_id,
            transaction_count,
            "Waiting for wallet signature"
        );
    }

    pub fn log_submission(&self, role: BundleRole, signature: &Signature) {
        tracing::info!(
            context_id = %self.context_id,
            role = ?role,
            signature = %signature,
            "Bundle submitted"
        );
    }

    pub fn log_partial_success(&self, pool: &Pubkey, reason: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            pool = %pool,
            reason = %reason,
            "Pool live, first purchase skipped"
        );
    }

    pub fn log_confirmation(&self, signature: &Signature, status: ConfirmationStatus) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            status = ?status,
            "Confirmation checked"
        );
    }

    pub fn log_launch_failed(&self, error: &LaunchError) {
        tracing::warn!(
            context_id = %self.context_id,
            category = error.category(),
            retryable = error.is_retryable(),
            nothing_submitted = error.nothing_submitted(),
            error = %error,
            "Launch failed"
        );
    }

    pub fn log_duplicate_rejected(&self, key: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            key = %key,
            "Launch already in flight"
        );
    }
}
