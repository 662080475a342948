//! Bonding curve launch planning
//!
//! Pool construction belongs to an external Bonding Curve Service. It returns
//! opaque instructions for (a) pool creation, which the ephemeral mint key
//! co-signs, and (b) an optional first purchase signed by the wallet alone.
//! This module prepends the service fee transfers to (a), inserts local mint
//! creation when the service does not create the mint itself, and keeps the
//! service instructions verbatim and in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use super::{
    errors::LaunchError,
    instructions::{
        push_fee_transfers, push_mint_creation, sanity_check_launch_order, FeeTransfers,
        LaunchPlan, LaunchStep, MintCreation,
    },
};

const SERVICE: &str = "bonding curve service";

/// Who creates the mint account in a pool launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintOwnership {
    /// Pool-creation instructions already create and initialize the mint
    ServiceCreatesMint,
    /// The launchpad must create the mint ahead of the pool instructions
    LocalMint,
}

/// Parameters handed to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolLaunchRequest {
    pub pool_config: Pubkey,
    pub creator: Pubkey,
    pub mint: Pubkey,
    pub decimals: u8,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub first_buy_lamports: Option<u64>,
}

impl PoolLaunchRequest {
    pub fn wants_first_buy(&self) -> bool {
        self.first_buy_lamports.is_some_and(|lamports| lamports > 0)
    }
}

/// Instructions returned by the service
#[derive(Debug, Clone)]
pub struct PoolLaunchInstructions {
    pub pool_address: Pubkey,
    pub mint_ownership: MintOwnership,
    pub pool_creation: Vec<Instruction>,
    pub first_buy: Option<Vec<Instruction>>,
}

#[async_trait]
pub trait BondingCurveService: Send + Sync {
    /// Pool address for a (config, mint) pair, computable before any call
    fn derive_pool_address(&self, pool_config: &Pubkey, mint: &Pubkey) -> Pubkey;

    async fn build_pool_launch(
        &self,
        request: &PoolLaunchRequest,
    ) -> Result<PoolLaunchInstructions, LaunchError>;
}

/// Planned instructions for both pool bundles
#[derive(Debug, Clone)]
pub struct PoolLaunchPlan {
    pub pool_address: Pubkey,
    pub mint_ownership: MintOwnership,
    pub pool_creation: LaunchPlan,
    pub first_buy: Option<Vec<Instruction>>,
}

fn signs_as(instructions: &[Instruction], key: &Pubkey) -> bool {
    instructions
        .iter()
        .flat_map(|ix| ix.accounts.iter())
        .any(|meta| meta.pubkey == *key && meta.is_signer)
}

/// Merge fee transfers, optional local mint creation and service output
///
/// `local_mint` is only consulted when the service reports
/// [`MintOwnership::LocalMint`].
///
/// # Errors
///
/// `LaunchError::Collaborator` when the service output is unusable: empty
/// pool creation, a first buy that was not asked for (or is missing), or the
/// mint key required as a signer in the wrong bundle.
pub fn plan_pool_launch(
    request: &PoolLaunchRequest,
    fee_transfers: &FeeTransfers,
    local_mint: Option<&MintCreation>,
    service_output: PoolLaunchInstructions,
) -> Result<PoolLaunchPlan, LaunchError> {
    let PoolLaunchInstructions {
        pool_address,
        mint_ownership,
        pool_creation,
        first_buy,
    } = service_output;

    if pool_creation.is_empty() {
        return Err(LaunchError::collaborator(SERVICE, "no pool-creation instructions returned"));
    }

    let first_buy = first_buy.filter(|ixs| !ixs.is_empty());
    match (request.wants_first_buy(), first_buy.is_some()) {
        (true, false) => {
            return Err(LaunchError::collaborator(SERVICE, "first purchase requested but not returned"))
        }
        (false, true) => {
            return Err(LaunchError::collaborator(SERVICE, "unrequested first purchase returned"))
        }
        _ => {}
    }

    if let Some(ixs) = &first_buy {
        if signs_as(ixs, &request.mint) {
            return Err(LaunchError::collaborator(
                SERVICE,
                "first purchase must not require the mint key",
            ));
        }
    }

    let mut plan = LaunchPlan::with_capacity(pool_creation.len() + 6);
    push_fee_transfers(&mut plan, fee_transfers);

    let requires_mint = mint_ownership == MintOwnership::LocalMint;
    if requires_mint {
        let creation = local_mint.ok_or_else(|| {
            LaunchError::internal("local mint creation requested without mint parameters")
        })?;
        push_mint_creation(&mut plan, &fee_transfers.payer, creation)?;
    } else if !signs_as(&pool_creation, &request.mint) {
        return Err(LaunchError::collaborator(
            SERVICE,
            "pool creation does not take the mint key as signer",
        ));
    }

    for ix in pool_creation {
        plan.push(LaunchStep::Pool, ix);
    }

    sanity_check_launch_order(&plan.steps, requires_mint)?;

    Ok(PoolLaunchPlan {
        pool_address,
        mint_ownership,
        pool_creation: plan,
        first_buy,
    })
}
