//! Launch transaction construction
//!
//! ## Architecture
//!
//! - **errors**: error taxonomy shared by the whole pipeline
//! - **fees**: service fee total and platform/referrer split
//! - **space**: mint account sizing and rent reservation
//! - **instructions**: direct-launch sequencing, order checks, decoding
//! - **bonding**: pool-launch sequencing around the bonding curve service
//! - **bundle**: signable transaction bundles and their wire form
//! - **builder**: end-to-end assembly of unsigned bundles
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use launchpad::ledger::RpcLedgerClient;
//! use launchpad::tx_builder::{LaunchBuilder, LaunchSettings};
//!
//! # async fn example(request: launchpad::types::MintRequest) -> Result<(), launchpad::tx_builder::LaunchError> {
//! let rpc = Arc::new(RpcLedgerClient::new("https://api.devnet.solana.com", std::time::Duration::from_secs(10)));
//! let builder = LaunchBuilder::new(rpc.clone(), rpc, LaunchSettings::default());
//!
//! let requester = solana_sdk::pubkey::Pubkey::new_unique();
//! let mint = solana_sdk::pubkey::Pubkey::new_unique();
//! let prepared = builder.prepare(&request, &requester, &mint).await?;
//! println!("fee total: {} lamports", prepared.fees.total);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::LaunchError;

pub mod bonding;
pub mod builder;
pub mod bundle;
pub mod fees;
pub mod instructions;
pub mod space;

pub use bonding::{
    plan_pool_launch, BondingCurveService, MintOwnership, PoolLaunchInstructions, PoolLaunchPlan,
    PoolLaunchRequest,
};
pub use builder::{LaunchBuilder, LaunchBundles, LaunchSettings, PreparedLaunch};
pub use bundle::{sign_in_place, BundleRole, TransactionBundle};
pub use fees::{
    compute_fee_breakdown, compute_split, compute_total_fee, lamports_to_sol, FeeBreakdown,
    FeeSchedule, FeeSplit, MintConfig,
};
pub use instructions::{
    classify_instruction, plan_direct_launch, sanity_check_launch_order, AuthorityKind,
    DirectLaunchParams, FeeTransfers, InstructionKind, LaunchPlan, LaunchStep, MintCreation,
};
pub use space::{
    base_mint_space, compute_full_space, pack_metadata, packed_metadata_len, uri_len, MintSpace,
    SpaceRentEstimator, MAX_URI_LEN, METADATA_TLV_HEADER_LEN,
};
