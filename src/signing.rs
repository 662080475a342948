//! Multi-party signing and submission
//!
//! A launch is authorized by two keys: the requester's wallet and an
//! ephemeral mint keypair generated for this launch only.
//!
//! - Direct: the mint key signs first, the wallet second, then one submit.
//! - Pool: both bundles go to the wallet in a single request; the mint key
//!   co-signs bundle (a) only after the wallet returns. Bundle (a) is
//!   submitted and its acceptance awaited before bundle (b) is sent.
//!
//! Cancellation is honoured while the wallet prompt is open and right before
//! the first submission. Past that point the launch runs to completion.

use serde::Serialize;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    ledger::{LedgerClient, LedgerError},
    metrics::{metrics, Timer},
    structured_logging::LaunchLogger,
    tx_builder::{BundleRole, FeeBreakdown, LaunchBundles, LaunchError, PreparedLaunch, TransactionBundle},
    wallet::ExternalWallet,
};

/// Owner side of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` is called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Handle dropped without cancelling
            std::future::pending::<()>().await;
        }
    }
}

pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Single-use mint keypair
///
/// Signing consumes the key, so it can attach to exactly one bundle.
pub struct EphemeralMint {
    keypair: Keypair,
}

impl EphemeralMint {
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Add the mint signature to `bundle` and drop the key
    pub fn co_sign(self, bundle: &mut TransactionBundle) -> Result<(), LaunchError> {
        if !bundle.requires_signer(&self.keypair.pubkey()) {
            return Err(LaunchError::internal(format!(
                "{:?} bundle does not take the mint key",
                bundle.role()
            )));
        }
        bundle.partial_sign(&self.keypair)
    }
}

impl std::fmt::Debug for EphemeralMint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralMint")
            .field("pubkey", &self.keypair.pubkey())
            .finish()
    }
}

/// What happened to the optional first purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FirstBuyOutcome {
    NotRequested,
    Submitted { signature: String },
    /// The pool is live but the purchase was not made
    Skipped { reason: String },
}

/// Result of a submitted launch
#[derive(Debug, Clone)]
pub struct LaunchSubmission {
    pub mint: Pubkey,
    pub primary_signature: Signature,
    pub pool_address: Option<Pubkey>,
    pub first_buy: FirstBuyOutcome,
    pub fees: FeeBreakdown,
}

impl LaunchSubmission {
    /// Pool created but the first purchase was skipped
    pub fn is_partial_success(&self) -> bool {
        matches!(self.first_buy, FirstBuyOutcome::Skipped { .. })
    }
}

pub struct SigningCoordinator {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn ExternalWallet>,
}

impl SigningCoordinator {
    pub fn new(ledger: Arc<dyn LedgerClient>, wallet: Arc<dyn ExternalWallet>) -> Self {
        Self { ledger, wallet }
    }

    pub fn wallet(&self) -> &Arc<dyn ExternalWallet> {
        &self.wallet
    }

    /// Sign and submit every bundle of a prepared launch
    ///
    /// # Errors
    ///
    /// - `SigningRejected` / `Cancelled` / `Authentication`: nothing submitted
    /// - `NetworkTransient` / `LedgerExecution`: classified submission failure;
    ///   the primary signature is attached when bundle (a) had been sent
    pub async fn sign_and_submit(
        &self,
        prepared: PreparedLaunch,
        mint_key: EphemeralMint,
        cancel: &CancelSignal,
        logger: &LaunchLogger,
    ) -> Result<LaunchSubmission, LaunchError> {
        if mint_key.pubkey() != prepared.mint {
            return Err(LaunchError::internal("mint key does not match the prepared launch"));
        }
        if self.wallet.pubkey() != prepared.requester {
            return Err(LaunchError::Authentication(
                "connected wallet is not the requester".to_string(),
            ));
        }
        if !self.wallet.capabilities().sign_transactions {
            return Err(LaunchError::Authentication(
                "wallet cannot sign transactions".to_string(),
            ));
        }

        match prepared.bundles {
            LaunchBundles::Direct(bundle) => {
                self.submit_direct(prepared.mint, prepared.fees, bundle, mint_key, cancel, logger)
                    .await
            }
            LaunchBundles::Pool {
                pool_address,
                pool_creation,
                first_buy,
                ..
            } => {
                self.submit_pool(
                    prepared.mint,
                    prepared.fees,
                    pool_address,
                    pool_creation,
                    first_buy,
                    mint_key,
                    cancel,
                    logger,
                )
                .await
            }
        }
    }

    async fn submit_direct(
        &self,
        mint: Pubkey,
        fees: FeeBreakdown,
        mut bundle: TransactionBundle,
        mint_key: EphemeralMint,
        cancel: &CancelSignal,
        logger: &LaunchLogger,
    ) -> Result<LaunchSubmission, LaunchError> {
        mint_key.co_sign(&mut bundle)?;

        let signed = self
            .request_signatures(vec![bundle.transaction().clone()], cancel, logger)
            .await?;
        for tx in signed {
            bundle.merge_signed(tx)?;
        }
        ensure_fully_signed(&bundle)?;

        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        let signature = self.submit(&bundle, logger).await?;
        Ok(LaunchSubmission {
            mint,
            primary_signature: signature,
            pool_address: None,
            first_buy: FirstBuyOutcome::NotRequested,
            fees,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_pool(
        &self,
        mint: Pubkey,
        fees: FeeBreakdown,
        pool_address: Pubkey,
        mut pool_creation: TransactionBundle,
        mut first_buy: Option<TransactionBundle>,
        mint_key: EphemeralMint,
        cancel: &CancelSignal,
        logger: &LaunchLogger,
    ) -> Result<LaunchSubmission, LaunchError> {
        if first_buy.is_some() && !self.wallet.capabilities().sign_all_transactions {
            return Err(LaunchError::Authentication(
                "wallet cannot sign both launch transactions in one request".to_string(),
            ));
        }

        let mut unsigned = vec![pool_creation.transaction().clone()];
        if let Some(bundle) = &first_buy {
            unsigned.push(bundle.transaction().clone());
        }

        let mut signed = self.request_signatures(unsigned, cancel, logger).await?.into_iter();
        if let Some(tx) = signed.next() {
            pool_creation.merge_signed(tx)?;
        }
        if let (Some(bundle), Some(tx)) = (first_buy.as_mut(), signed.next()) {
            bundle.merge_signed(tx)?;
        }

        // Mint key goes on bundle (a) only, after the wallet has signed
        mint_key.co_sign(&mut pool_creation)?;
        ensure_fully_signed(&pool_creation)?;
        if let Some(bundle) = &first_buy {
            ensure_fully_signed(bundle)?;
        }

        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        let pool_signature = self.submit(&pool_creation, logger).await?;

        let first_buy = match first_buy {
            None => FirstBuyOutcome::NotRequested,
            Some(bundle) => match self.ledger.await_acceptance(&pool_signature).await {
                Err(LedgerError::Rejected { raw }) => {
                    return Err(LaunchError::LedgerExecution {
                        raw,
                        signature: Some(pool_signature.to_string()),
                    });
                }
                Err(err) => FirstBuyOutcome::Skipped {
                    reason: format!("pool creation not yet accepted: {err}"),
                },
                Ok(()) => match self.submit(&bundle, logger).await {
                    Ok(signature) => FirstBuyOutcome::Submitted {
                        signature: signature.to_string(),
                    },
                    Err(err) => FirstBuyOutcome::Skipped {
                        reason: err.user_message(),
                    },
                },
            },
        };

        if let FirstBuyOutcome::Skipped { reason } = &first_buy {
            metrics().partial_successes.inc();
            logger.log_partial_success(&pool_address, reason);
        }

        Ok(LaunchSubmission {
            mint,
            primary_signature: pool_signature,
            pool_address: Some(pool_address),
            first_buy,
            fees,
        })
    }

    /// One wallet prompt for all `transactions`, abandoned on cancellation
    async fn request_signatures(
        &self,
        transactions: Vec<VersionedTransaction>,
        cancel: &CancelSignal,
        logger: &LaunchLogger,
    ) -> Result<Vec<VersionedTransaction>, LaunchError> {
        let expected = transactions.len();
        logger.log_wallet_prompt(expected);
        let timer = Timer::start();

        let signed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Launch cancelled while waiting on the wallet");
                return Err(LaunchError::Cancelled);
            }
            result = self.wallet.sign_all_transactions(transactions) => result?,
        };
        timer.observe(&metrics().signing_latency);

        if signed.len() != expected {
            return Err(LaunchError::Authentication(format!(
                "wallet returned {} of {expected} transactions",
                signed.len()
            )));
        }
        Ok(signed)
    }

    async fn submit(&self, bundle: &TransactionBundle, logger: &LaunchLogger) -> Result<Signature, LaunchError> {
        let expected = bundle.primary_signature();
        let timer = Timer::start();
        let result = self.ledger.submit(bundle.transaction()).await;
        timer.observe(&metrics().submission_latency);

        match result {
            Ok(signature) => {
                if signature != expected {
                    warn!(%signature, %expected, "Ledger returned an unexpected signature");
                }
                logger.log_submission(bundle.role(), &signature);
                Ok(signature)
            }
            Err(LedgerError::Rejected { raw }) => Err(LaunchError::LedgerExecution { raw, signature: None }),
            Err(err) => Err(LaunchError::NetworkTransient {
                reason: err.to_string(),
                // The bundle may still land after a timeout
                signature: (bundle.role() != BundleRole::FirstBuy).then(|| expected.to_string()),
            }),
        }
    }
}

fn ensure_fully_signed(bundle: &TransactionBundle) -> Result<(), LaunchError> {
    let missing = bundle.missing_signers();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LaunchError::Authentication(format!(
            "{:?} bundle is missing {} signature(s)",
            bundle.role(),
            missing.len()
        )))
    }
}
