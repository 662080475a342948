//! Launch bundle assembly
//!
//! [`LaunchBuilder`] turns a validated [`MintRequest`] into unsigned
//! [`TransactionBundle`]s: it prices the launch, sizes the mint, fetches one
//! blockhash, runs the matching sequencer and compiles the result. Nothing
//! here signs or submits.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use super::{
    bonding::{plan_pool_launch, BondingCurveService, MintOwnership, PoolLaunchRequest},
    bundle::{BundleRole, TransactionBundle},
    errors::LaunchError,
    fees::{compute_fee_breakdown, FeeBreakdown, FeeSchedule},
    instructions::{plan_direct_launch, DirectLaunchParams, FeeTransfers, MintCreation},
    space::{MintSpace, SpaceRentEstimator},
};
use crate::{
    ledger::{LedgerClient, RentOracle},
    metrics::{metrics, Timer},
    security::validator::validate_mint_request,
    types::{LaunchMode, MintRequest},
};

/// Fee and pool settings applied to every launch
#[derive(Debug, Clone, Default)]
pub struct LaunchSettings {
    pub fees: FeeSchedule,
    /// Platform fee recipient; the platform transfer is skipped when unset
    pub platform_wallet: Option<Pubkey>,
    /// Pool configuration id handed to the bonding curve service
    pub pool_config: Option<Pubkey>,
}

/// Unsigned bundles for one launch
#[derive(Debug, Clone)]
pub enum LaunchBundles {
    Direct(TransactionBundle),
    Pool {
        pool_address: Pubkey,
        mint_ownership: MintOwnership,
        pool_creation: TransactionBundle,
        first_buy: Option<TransactionBundle>,
    },
}

impl LaunchBundles {
    /// Bundle whose signature identifies the launch
    pub fn primary(&self) -> &TransactionBundle {
        match self {
            Self::Direct(bundle) => bundle,
            Self::Pool { pool_creation, .. } => pool_creation,
        }
    }

    pub fn bundle_count(&self) -> usize {
        match self {
            Self::Direct(_) => 1,
            Self::Pool { first_buy, .. } => 1 + usize::from(first_buy.is_some()),
        }
    }
}

/// Everything the signing step needs
#[derive(Debug, Clone)]
pub struct PreparedLaunch {
    pub requester: Pubkey,
    pub mint: Pubkey,
    pub mode: LaunchMode,
    pub fees: FeeBreakdown,
    /// Present whenever the launchpad itself creates the mint
    pub space: Option<MintSpace>,
    pub bundles: LaunchBundles,
}

pub struct LaunchBuilder {
    ledger: Arc<dyn LedgerClient>,
    estimator: SpaceRentEstimator,
    bonding_curve: Option<Arc<dyn BondingCurveService>>,
    settings: LaunchSettings,
}

impl LaunchBuilder {
    pub fn new(ledger: Arc<dyn LedgerClient>, rent: Arc<dyn RentOracle>, settings: LaunchSettings) -> Self {
        Self {
            ledger,
            estimator: SpaceRentEstimator::new(rent),
            bonding_curve: None,
            settings,
        }
    }

    pub fn with_bonding_curve(mut self, service: Arc<dyn BondingCurveService>) -> Self {
        self.bonding_curve = Some(service);
        self
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Fees the requester would pay, without touching the network
    pub fn quote(&self, request: &MintRequest, requester: &Pubkey) -> FeeBreakdown {
        let referrer = request.effective_referrer(requester);
        compute_fee_breakdown(&self.settings.fees, &request.effective_config(), referrer.is_some())
    }

    /// Build unsigned bundles for `request`, minting at `mint`
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad request or a bundle exceeding packet size
    /// - `Configuration` when a pool launch has no service or pool config
    /// - `Collaborator` / `NetworkTransient` from the rent oracle, service
    ///   or blockhash fetch
    pub async fn prepare(
        &self,
        request: &MintRequest,
        requester: &Pubkey,
        mint: &Pubkey,
    ) -> Result<PreparedLaunch, LaunchError> {
        validate_mint_request(request)?;
        let timer = Timer::start();

        let referrer = request.effective_referrer(requester);
        let fees = self.quote(request, requester);
        let transfers = FeeTransfers {
            payer: *requester,
            fees,
            platform_wallet: self.settings.platform_wallet,
            referrer,
        };

        let prepared = match request.launch_mode {
            LaunchMode::Direct => self.prepare_direct(request, requester, mint, transfers).await?,
            LaunchMode::BondingCurve => self.prepare_pool(request, requester, mint, transfers).await?,
        };

        timer.observe(&metrics().build_latency);
        info!(
            mint = %prepared.mint,
            mode = %prepared.mode,
            bundles = prepared.bundles.bundle_count(),
            fee_total = prepared.fees.total,
            referrer_share = prepared.fees.referrer_share,
            "Launch bundles prepared"
        );
        Ok(prepared)
    }

    async fn mint_creation(
        &self,
        request: &MintRequest,
        requester: &Pubkey,
        mint: &Pubkey,
    ) -> Result<MintCreation, LaunchError> {
        let uri = request.metadata_uri();
        let space = self.estimator.estimate(&request.name, &request.symbol, uri).await?;
        Ok(MintCreation {
            mint: *mint,
            authority: *requester,
            decimals: request.decimals,
            name: request.name.clone(),
            symbol: request.symbol.clone(),
            uri: uri.to_string(),
            space,
        })
    }

    async fn prepare_direct(
        &self,
        request: &MintRequest,
        requester: &Pubkey,
        mint: &Pubkey,
        transfers: FeeTransfers,
    ) -> Result<PreparedLaunch, LaunchError> {
        let creation = self.mint_creation(request, requester, mint).await?;
        let space = creation.space;
        let plan = plan_direct_launch(&DirectLaunchParams {
            fee_transfers: transfers,
            mint: creation,
            raw_supply: request.raw_supply()?,
            config: request.effective_config(),
        })?;
        debug!(steps = ?plan.steps, "Direct launch planned");

        let blockhash = self.ledger.latest_blockhash().await?;
        let bundle = TransactionBundle::from_instructions(
            BundleRole::DirectMint,
            &plan.instructions,
            requester,
            blockhash,
        );
        ensure_signers(&bundle, requester, Some(mint))?;
        ensure_packet_size(&bundle)?;

        Ok(PreparedLaunch {
            requester: *requester,
            mint: *mint,
            mode: LaunchMode::Direct,
            fees: transfers.fees,
            space: Some(space),
            bundles: LaunchBundles::Direct(bundle),
        })
    }

    async fn prepare_pool(
        &self,
        request: &MintRequest,
        requester: &Pubkey,
        mint: &Pubkey,
        transfers: FeeTransfers,
    ) -> Result<PreparedLaunch, LaunchError> {
        let service = self.bonding_curve.as_ref().ok_or_else(|| {
            LaunchError::Configuration("bonding curve service not configured".to_string())
        })?;
        let pool_config = self.settings.pool_config.ok_or_else(|| {
            LaunchError::Configuration("bonding curve pool config not set".to_string())
        })?;

        let pool_request = PoolLaunchRequest {
            pool_config,
            creator: *requester,
            mint: *mint,
            decimals: request.decimals,
            name: request.name.clone(),
            symbol: request.symbol.clone(),
            uri: request.metadata_uri().to_string(),
            first_buy_lamports: request.first_buy_lamports,
        };
        let output = service.build_pool_launch(&pool_request).await?;

        let local_mint = match output.mint_ownership {
            MintOwnership::LocalMint => Some(self.mint_creation(request, requester, mint).await?),
            MintOwnership::ServiceCreatesMint => None,
        };
        let space = local_mint.as_ref().map(|creation| creation.space);

        let plan = plan_pool_launch(&pool_request, &transfers, local_mint.as_ref(), output)?;
        debug!(
            steps = ?plan.pool_creation.steps,
            pool = %plan.pool_address,
            ownership = ?plan.mint_ownership,
            "Pool launch planned"
        );

        // One blockhash for both bundles
        let blockhash = self.ledger.latest_blockhash().await?;
        let pool_creation = TransactionBundle::from_instructions(
            BundleRole::PoolCreation,
            &plan.pool_creation.instructions,
            requester,
            blockhash,
        );
        ensure_signers(&pool_creation, requester, Some(mint))?;
        ensure_packet_size(&pool_creation)?;

        let first_buy = match plan.first_buy {
            Some(instructions) => {
                let bundle = TransactionBundle::from_instructions(
                    BundleRole::FirstBuy,
                    &instructions,
                    requester,
                    blockhash,
                );
                ensure_signers(&bundle, requester, None)?;
                ensure_packet_size(&bundle)?;
                Some(bundle)
            }
            None => None,
        };

        Ok(PreparedLaunch {
            requester: *requester,
            mint: *mint,
            mode: LaunchMode::BondingCurve,
            fees: transfers.fees,
            space,
            bundles: LaunchBundles::Pool {
                pool_address: plan.pool_address,
                mint_ownership: plan.mint_ownership,
                pool_creation,
                first_buy,
            },
        })
    }
}

/// Required signers are exactly the wallet plus, where expected, the mint
fn ensure_signers(
    bundle: &TransactionBundle,
    requester: &Pubkey,
    mint: Option<&Pubkey>,
) -> Result<(), LaunchError> {
    let expected = 1 + usize::from(mint.is_some());
    let signers = bundle.required_signers();
    let mint_ok = mint.map_or(true, |m| bundle.requires_signer(m));

    if signers.first() != Some(requester) || !mint_ok || signers.len() != expected {
        return Err(LaunchError::collaborator(
            "bundle assembly",
            format!(
                "{:?} bundle requires {} signers, expected {expected}",
                bundle.role(),
                signers.len()
            ),
        ));
    }
    Ok(())
}

fn ensure_packet_size(bundle: &TransactionBundle) -> Result<(), LaunchError> {
    if !bundle.fits_in_packet()? {
        return Err(LaunchError::validation(format!(
            "{:?} bundle is {} bytes, too large for one transaction; shorten the token details",
            bundle.role(),
            bundle.wire_size()?
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockBondingCurve, MockLedger, MockRentOracle};
    use crate::tx_builder::{classify_instruction, InstructionKind, MintConfig};

    fn request(mode: LaunchMode) -> MintRequest {
        MintRequest {
            name: "Launch Token".into(),
            symbol: "LNCH".into(),
            decimals: 6,
            initial_supply: 1_000_000,
            image_uri: None,
            metadata_uri: Some("ipfs://bafkreimeta".into()),
            config: match mode {
                LaunchMode::Direct => MintConfig {
                    revoke_mint: true,
                    revoke_freeze: true,
                },
                LaunchMode::BondingCurve => MintConfig::default(),
            },
            launch_mode: mode,
            referrer: None,
            first_buy_lamports: None,
        }
    }

    fn builder() -> LaunchBuilder {
        LaunchBuilder::new(
            Arc::new(MockLedger::new()),
            Arc::new(MockRentOracle),
            LaunchSettings {
                fees: FeeSchedule::default(),
                platform_wallet: Some(Pubkey::new_unique()),
                pool_config: Some(Pubkey::new_unique()),
            },
        )
    }

    #[tokio::test]
    async fn test_direct_bundle_is_funded_for_full_space() {
        let requester = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let prepared = builder()
            .prepare(&request(LaunchMode::Direct), &requester, &mint)
            .await
            .unwrap();

        let space = prepared.space.unwrap();
        let LaunchBundles::Direct(bundle) = &prepared.bundles else {
            panic!("expected a direct bundle");
        };
        assert_eq!(bundle.required_signers(), &[requester, mint]);

        let message = &bundle.transaction().message;
        let keys = message.static_account_keys();
        let create = message
            .instructions()
            .iter()
            .map(|ci| {
                solana_sdk::instruction::Instruction::new_with_bytes(
                    keys[ci.program_id_index as usize],
                    &ci.data,
                    vec![],
                )
            })
            .map(|ix| classify_instruction(&ix))
            .find(|kind| matches!(kind, InstructionKind::CreateAccount { .. }))
            .unwrap();
        assert_eq!(
            create,
            InstructionKind::CreateAccount {
                lamports: space.rent_lamports,
                space: space.initial_space as u64,
                owner: spl_token_2022::id(),
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_request_builds_nothing() {
        let ledger = Arc::new(MockLedger::new());
        let builder = LaunchBuilder::new(ledger.clone(), Arc::new(MockRentOracle), LaunchSettings::default());
        let mut req = request(LaunchMode::Direct);
        req.symbol = "NOT VALID".into();

        let err = builder
            .prepare(&req, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Validation(_)));
        assert_eq!(ledger.blockhash_requests(), 0);
    }

    #[tokio::test]
    async fn test_pool_launch_with_revoke_flags_builds_nothing() {
        let ledger = Arc::new(MockLedger::new());
        let service = Arc::new(MockBondingCurve::service_creates_mint());
        let builder = LaunchBuilder::new(ledger.clone(), Arc::new(MockRentOracle), LaunchSettings::default())
            .with_bonding_curve(service.clone());
        let mut req = request(LaunchMode::BondingCurve);
        req.config.revoke_mint = true;

        let err = builder
            .prepare(&req, &Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Validation(_)));
        assert_eq!(service.calls(), 0);
        assert_eq!(ledger.blockhash_requests(), 0);
    }

    #[tokio::test]
    async fn test_pool_launch_without_service_is_configuration_error() {
        let err = builder()
            .prepare(&request(LaunchMode::BondingCurve), &Pubkey::new_unique(), &Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_pool_bundles_share_blockhash_and_split_signers() {
        let requester = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let builder = builder().with_bonding_curve(Arc::new(MockBondingCurve::service_creates_mint()));
        let mut req = request(LaunchMode::BondingCurve);
        req.first_buy_lamports = Some(500_000_000);

        let prepared = builder.prepare(&req, &requester, &mint).await.unwrap();
        assert_eq!(prepared.fees.total, FeeSchedule::default().base_lamports);

        let LaunchBundles::Pool {
            pool_creation,
            first_buy: Some(first_buy),
            ..
        } = &prepared.bundles
        else {
            panic!("expected pool bundles with a first buy");
        };
        assert!(pool_creation.requires_signer(&mint));
        assert!(!first_buy.requires_signer(&mint));
        assert_eq!(
            pool_creation.transaction().message.recent_blockhash(),
            first_buy.transaction().message.recent_blockhash()
        );
        assert_eq!(prepared.bundles.bundle_count(), 2);
    }

    #[test]
    fn test_quote_treats_self_referral_as_absent() {
        let requester = Pubkey::new_unique();
        let mut req = request(LaunchMode::Direct);
        req.referrer = Some(requester);
        let fees = builder().quote(&req, &requester);
        assert_eq!(fees.referrer_share, 0);
        assert_eq!(fees.total, 280_000_000);
    }
}
