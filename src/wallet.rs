//! External wallet collaborator
//!
//! The requester's wallet is the only party that can authorize fee payment
//! and mint authority. It is reached through [`ExternalWallet`]; the launch
//! core never sees its secret. [`KeypairWallet`] is a local file-backed
//! implementation for the CLI and for tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use thiserror::Error;

use crate::tx_builder::{sign_in_place, LaunchError};

#[derive(Error, Debug, Clone)]
pub enum WalletError {
    /// The user declined the prompt
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("wallet cannot {0}")]
    Unsupported(&'static str),

    #[error("{0} is not a signer of this transaction")]
    NotASigner(Pubkey),

    #[error("wallet failure: {0}")]
    Failed(String),
}

impl From<WalletError> for LaunchError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(reason) => LaunchError::SigningRejected(reason),
            WalletError::Unsupported(what) => LaunchError::Authentication(format!("wallet cannot {what}")),
            WalletError::NotASigner(key) => {
                LaunchError::Authentication(format!("connected wallet {key} cannot sign this launch"))
            }
            WalletError::Failed(reason) => LaunchError::collaborator("wallet", reason),
        }
    }
}

/// What a connected wallet can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletCapabilities {
    pub sign_transactions: bool,
    /// Several transactions behind one user prompt
    pub sign_all_transactions: bool,
    pub sign_message: bool,
}

impl WalletCapabilities {
    pub const FULL: Self = Self {
        sign_transactions: true,
        sign_all_transactions: true,
        sign_message: true,
    };
}

#[async_trait]
pub trait ExternalWallet: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn capabilities(&self) -> WalletCapabilities;

    /// Sign every transaction in one request, returning them in order
    async fn sign_all_transactions(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, WalletError>;

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;
}

/// Wallet backed by a local keypair
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    /// Load a keypair file (64 raw bytes or the JSON byte-array format)
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes =
            std::fs::read(path).with_context(|| format!("Failed to read keypair file: {}", path))?;

        let bytes = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else {
            serde_json::from_slice::<Vec<u8>>(&keypair_bytes).context("Failed to parse keypair JSON")?
        };

        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")?;

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("pubkey", &self.keypair.pubkey())
            .finish()
    }
}

#[async_trait]
impl ExternalWallet for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn capabilities(&self) -> WalletCapabilities {
        WalletCapabilities::FULL
    }

    async fn sign_all_transactions(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, WalletError> {
        transactions
            .into_iter()
            .map(|mut tx| {
                sign_in_place(&mut tx, self.keypair.as_ref())
                    .map_err(|_| WalletError::NotASigner(self.keypair.pubkey()))?;
                Ok(tx)
            })
            .collect()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        Ok(self.keypair.sign_message(message))
    }
}
