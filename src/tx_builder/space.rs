//! Mint account sizing and rent reservation
//!
//! The mint is created at the pointer-extension-only size and grown in place
//! when the metadata record is initialized. Creation therefore has to fund the
//! account for its final size up front:
//!
//! ```text
//! full_space = mint_with_pointer_extension + TLV header (4) + packed metadata
//! ```

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use spl_pod::optional_keys::OptionalNonZeroPubkey;
use spl_token_2022::{extension::ExtensionType, state::Mint};
use spl_token_metadata_interface::state::TokenMetadata;
use tracing::debug;

use super::errors::LaunchError;
use crate::ledger::RentOracle;

/// Type + length prefix of the metadata TLV entry
pub const METADATA_TLV_HEADER_LEN: usize = 4;

/// Longest metadata URI accepted anywhere in the pipeline, in characters
pub const MAX_URI_LEN: usize = 200;

/// Length of `uri` as counted against [`MAX_URI_LEN`]
pub fn uri_len(uri: &str) -> usize {
    uri.chars().count()
}

/// Sizes and rent reservation for one mint account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintSpace {
    /// Bytes allocated by the create-account instruction
    pub initial_space: usize,
    /// Bytes after metadata initialization
    pub full_space: usize,
    /// Borsh length of the metadata record
    pub metadata_len: usize,
    /// Rent-exempt minimum for `full_space`
    pub rent_lamports: u64,
}

/// Mint base layout with the metadata-pointer extension
pub fn base_mint_space() -> Result<usize, LaunchError> {
    Ok(ExtensionType::try_calculate_account_len::<Mint>(&[
        ExtensionType::MetadataPointer,
    ])?)
}

/// Borsh encoding of the on-chain metadata record
///
/// Update authority and mint are fixed 32-byte fields, the three strings are
/// u32-length-prefixed and the additional-metadata list is empty.
pub fn pack_metadata(
    update_authority: &Pubkey,
    mint: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Result<Vec<u8>, LaunchError> {
    let metadata = TokenMetadata {
        update_authority: OptionalNonZeroPubkey(*update_authority),
        mint: *mint,
        name: name.to_string(),
        symbol: symbol.to_string(),
        uri: uri.to_string(),
        additional_metadata: Vec::new(),
    };
    borsh::to_vec(&metadata)
        .map_err(|e| LaunchError::internal(format!("metadata encoding failed: {e}")))
}

/// Packed metadata length; independent of the key values
pub fn packed_metadata_len(name: &str, symbol: &str, uri: &str) -> Result<usize, LaunchError> {
    pack_metadata(&Pubkey::default(), &Pubkey::default(), name, symbol, uri).map(|b| b.len())
}

pub fn compute_full_space(name: &str, symbol: &str, uri: &str) -> Result<usize, LaunchError> {
    Ok(base_mint_space()? + METADATA_TLV_HEADER_LEN + packed_metadata_len(name, symbol, uri)?)
}

/// Sizes mint accounts and prices them through a [`RentOracle`]
#[derive(Clone)]
pub struct SpaceRentEstimator {
    rent: Arc<dyn RentOracle>,
}

impl SpaceRentEstimator {
    pub fn new(rent: Arc<dyn RentOracle>) -> Self {
        Self { rent }
    }

    pub async fn compute_rent_exempt_lamports(&self, space: usize) -> Result<u64, LaunchError> {
        self.rent
            .minimum_balance_for_rent_exemption(space)
            .await
            .map_err(|e| LaunchError::collaborator("rent oracle", e.to_string()))
    }

    /// Sizes and rent for a mint carrying the given metadata
    pub async fn estimate(&self, name: &str, symbol: &str, uri: &str) -> Result<MintSpace, LaunchError> {
        let len = uri_len(uri);
        if len > MAX_URI_LEN {
            return Err(LaunchError::validation(format!(
                "metadata URI is {len} characters (max {MAX_URI_LEN})"
            )));
        }

        let initial_space = base_mint_space()?;
        let metadata_len = packed_metadata_len(name, symbol, uri)?;
        let full_space = initial_space + METADATA_TLV_HEADER_LEN + metadata_len;
        let rent_lamports = self.compute_rent_exempt_lamports(full_space).await?;

        debug!(
            initial_space,
            full_space,
            metadata_len,
            rent_lamports,
            "Mint space estimated"
        );

        Ok(MintSpace {
            initial_space,
            full_space,
            metadata_len,
            rent_lamports,
        })
    }
}

impl std::fmt::Debug for SpaceRentEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceRentEstimator").finish_non_exhaustive()
    }
}
