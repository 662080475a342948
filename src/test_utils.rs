//! Test Utilities Module
//!
//! In-memory stand-ins for the launch collaborators: ledger, rent oracle,
//! wallet, bonding curve service and upload backend. All are deterministic
//! and record what they were asked to do so tests can assert on it.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{
    clock::{Slot, UnixTimestamp},
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::{TransactionError, VersionedTransaction},
};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use crate::{
    ledger::{LedgerClient, LedgerError, RentOracle},
    tx_builder::{
        sign_in_place, BondingCurveService, LaunchError, MintOwnership, PoolLaunchInstructions,
        PoolLaunchRequest,
    },
    upload::{FreshnessProof, TokenMetadataJson, UploadError, UploadPayload, UploadService},
    wallet::{ExternalWallet, WalletCapabilities, WalletError},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct LedgerState {
    statuses: HashMap<Signature, TransactionStatus>,
    block_time: Option<UnixTimestamp>,
    fail_block_time: bool,
    fail_status_queries: bool,
    submission_failures: HashMap<usize, LedgerError>,
    acceptance_failure: Option<LedgerError>,
    landed_failures: HashMap<usize, TransactionError>,
    submitted: Vec<VersionedTransaction>,
    attempts: usize,
    blockhash_requests: usize,
    manual_confirmation: bool,
}

/// In-memory ledger
///
/// Successful submissions are recorded and, unless
/// [`MockLedger::manual_confirmation`] is set, immediately reported as
/// confirmed by `signature_status`.
pub struct MockLedger {
    blockhash: Hash,
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn blockhash_requests(&self) -> usize {
        lock(&self.state).blockhash_requests
    }

    /// Transactions accepted by `submit`, in order
    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        lock(&self.state).submitted.clone()
    }

    /// Submission attempts, failed ones included
    pub fn submission_attempts(&self) -> usize {
        lock(&self.state).attempts
    }

    /// Fail the `index`-th submission attempt (zero-based)
    pub fn fail_submission_at(&self, index: usize, error: LedgerError) {
        lock(&self.state).submission_failures.insert(index, error);
    }

    /// Let the `index`-th submission through, then fail it on chain
    pub fn land_failed_at(&self, index: usize, error: TransactionError) {
        lock(&self.state).landed_failures.insert(index, error);
    }

    pub fn fail_acceptance(&self, error: LedgerError) {
        lock(&self.state).acceptance_failure = Some(error);
    }

    pub fn set_status(&self, signature: Signature, status: TransactionStatus) {
        lock(&self.state).statuses.insert(signature, status);
    }

    pub fn set_block_time(&self, timestamp: UnixTimestamp) {
        lock(&self.state).block_time = Some(timestamp);
    }

    pub fn fail_block_time(&self) {
        lock(&self.state).fail_block_time = true;
    }

    pub fn fail_status_queries(&self) {
        lock(&self.state).fail_status_queries = true;
    }

    /// Stop auto-confirming submitted transactions
    pub fn manual_confirmation(&self) {
        lock(&self.state).manual_confirmation = true;
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        lock(&self.state).blockhash_requests += 1;
        Ok(self.blockhash)
    }

    async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError> {
        let mut state = lock(&self.state);
        let attempt = state.attempts;
        state.attempts += 1;
        if let Some(err) = state.submission_failures.remove(&attempt) {
            return Err(err);
        }

        let signature = tx.signatures.first().copied().unwrap_or_default();
        state.submitted.push(tx.clone());
        if let Some(err) = state.landed_failures.remove(&attempt) {
            state.statuses.insert(
                signature,
                TransactionStatus {
                    slot: 1_000 + attempt as Slot,
                    confirmations: Some(1),
                    status: Err(err.clone()),
                    err: Some(err),
                    confirmation_status: Some(TransactionConfirmationStatus::Confirmed),
                },
            );
        } else if !state.manual_confirmation {
            state.statuses.insert(
                signature,
                TransactionStatus {
                    slot: 1_000 + attempt as Slot,
                    confirmations: Some(1),
                    status: Ok(()),
                    err: None,
                    confirmation_status: Some(TransactionConfirmationStatus::Confirmed),
                },
            );
        }
        Ok(signature)
    }

    async fn await_acceptance(&self, signature: &Signature) -> Result<(), LedgerError> {
        let state = lock(&self.state);
        if let Some(err) = state.acceptance_failure.clone() {
            return Err(err);
        }
        match state.statuses.get(signature).and_then(|status| status.err.clone()) {
            Some(err) => Err(LedgerError::Rejected {
                raw: format!("{err:?}"),
            }),
            None => Ok(()),
        }
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<TransactionStatus>, LedgerError> {
        let state = lock(&self.state);
        if state.fail_status_queries {
            return Err(LedgerError::Rpc("status query failed".into()));
        }
        Ok(state.statuses.get(signature).cloned())
    }

    async fn block_time(&self, _slot: Slot) -> Result<Option<UnixTimestamp>, LedgerError> {
        let state = lock(&self.state);
        if state.fail_block_time {
            return Err(LedgerError::Rpc("block not available".into()));
        }
        Ok(state.block_time)
    }
}

/// Rent oracle with the mainnet shape: `(128 + len) × 6960`
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRentOracle;

#[async_trait]
impl RentOracle for MockRentOracle {
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok((128 + data_len as u64) * 6_960)
    }
}

/// Scriptable wallet backed by a fresh keypair
pub struct MockWallet {
    keypair: Keypair,
    rejects: bool,
    delay: Option<Duration>,
    capabilities: WalletCapabilities,
    seen: Mutex<Vec<Vec<VersionedTransaction>>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::new(),
            rejects: false,
            delay: None,
            capabilities: WalletCapabilities::FULL,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Wallet whose user declines every prompt
    pub fn rejecting() -> Self {
        Self {
            rejects: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn single_transaction_only(mut self) -> Self {
        self.capabilities.sign_all_transactions = false;
        self
    }

    pub fn without_message_signing(mut self) -> Self {
        self.capabilities.sign_message = false;
        self
    }

    /// Number of signing prompts shown
    pub fn prompts(&self) -> usize {
        lock(&self.seen).len()
    }

    /// Transactions exactly as they were presented, per prompt
    pub fn seen_batches(&self) -> Vec<Vec<VersionedTransaction>> {
        lock(&self.seen).clone()
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalWallet for MockWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn capabilities(&self) -> WalletCapabilities {
        self.capabilities
    }

    async fn sign_all_transactions(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, WalletError> {
        lock(&self.seen).push(transactions.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.rejects {
            return Err(WalletError::Rejected("User rejected the request".into()));
        }

        transactions
            .into_iter()
            .map(|mut tx| {
                sign_in_place(&mut tx, &self.keypair).map_err(|_| WalletError::NotASigner(self.keypair.pubkey()))?;
                Ok(tx)
            })
            .collect()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        if !self.capabilities.sign_message {
            return Err(WalletError::Unsupported("sign messages"));
        }
        if self.rejects {
            return Err(WalletError::Rejected("User rejected the request".into()));
        }
        Ok(self.keypair.sign_message(message))
    }
}

/// Bonding curve service emitting opaque instructions for a fake program
pub struct MockBondingCurve {
    program_id: Pubkey,
    ownership: MintOwnership,
    fails: bool,
    calls: AtomicUsize,
}

impl MockBondingCurve {
    fn with_ownership(ownership: MintOwnership) -> Self {
        Self {
            program_id: Pubkey::new_unique(),
            ownership,
            fails: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Pool creation also creates and initializes the mint
    pub fn service_creates_mint() -> Self {
        Self::with_ownership(MintOwnership::ServiceCreatesMint)
    }

    /// The launchpad must create the mint itself
    pub fn local_mint() -> Self {
        Self::with_ownership(MintOwnership::LocalMint)
    }

    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::service_creates_mint()
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BondingCurveService for MockBondingCurve {
    fn derive_pool_address(&self, pool_config: &Pubkey, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"pool", pool_config.as_ref(), mint.as_ref()], &self.program_id).0
    }

    async fn build_pool_launch(&self, request: &PoolLaunchRequest) -> Result<PoolLaunchInstructions, LaunchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(LaunchError::collaborator("bonding curve service", "pool config not found"));
        }

        let pool = self.derive_pool_address(&request.pool_config, &request.mint);
        let mint_signs = self.ownership == MintOwnership::ServiceCreatesMint;
        let mint_meta = if mint_signs {
            AccountMeta::new(request.mint, true)
        } else {
            AccountMeta::new(request.mint, false)
        };

        let mut create_data = vec![0u8, request.decimals];
        create_data.extend_from_slice(request.symbol.as_bytes());
        let create_pool = Instruction::new_with_bytes(
            self.program_id,
            &create_data,
            vec![
                AccountMeta::new(request.creator, true),
                mint_meta,
                AccountMeta::new(pool, false),
                AccountMeta::new_readonly(request.pool_config, false),
            ],
        );

        let first_buy = request.first_buy_lamports.filter(|lamports| *lamports > 0).map(|lamports| {
            let mut data = vec![1u8];
            data.extend_from_slice(&lamports.to_le_bytes());
            vec![Instruction::new_with_bytes(
                self.program_id,
                &data,
                vec![
                    AccountMeta::new(request.creator, true),
                    AccountMeta::new(pool, false),
                    AccountMeta::new_readonly(request.mint, false),
                ],
            )]
        });

        Ok(PoolLaunchInstructions {
            pool_address: pool,
            mint_ownership: self.ownership,
            pool_creation: vec![create_pool],
            first_buy,
        })
    }
}

/// Upload backend returning digest-derived URIs
pub struct MockUploader {
    failures_left: AtomicUsize,
    image_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl MockUploader {
    pub fn new() -> Self {
        Self {
            failures_left: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
        }
    }

    /// Answer the first `count` calls with a transport error
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), UploadError> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            Err(UploadError::Transport("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadService for MockUploader {
    async fn upload_image(&self, payload: &UploadPayload, _proof: Option<&FreshnessProof>) -> Result<String, UploadError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        Ok(format!("ipfs://{}", payload.digest()))
    }

    async fn upload_metadata(
        &self,
        metadata: &TokenMetadataJson,
        _proof: Option<&FreshnessProof>,
    ) -> Result<String, UploadError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let encoded = serde_json::to_vec(metadata).map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        Ok(format!("ipfs://{}", crate::upload::content_digest(&encoded)))
    }
}
