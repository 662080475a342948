//! Request-side types shared across the launch pipeline

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::tx_builder::{LaunchError, MintConfig};

/// How the token reaches the market
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchMode {
    /// Mint directly into the requester's wallet
    #[default]
    Direct,
    /// Launch a pool on an automated bonding curve
    BondingCurve,
}

impl LaunchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::BondingCurve => "bonding_curve",
        }
    }
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token details collected on the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDraft {
    pub name: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub decimals: u8,
    /// Whole tokens
    pub initial_supply: u64,
}

/// Fully populated launch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Whole tokens
    pub initial_supply: u64,
    pub image_uri: Option<String>,
    pub metadata_uri: Option<String>,
    pub config: MintConfig,
    pub launch_mode: LaunchMode,
    pub referrer: Option<Pubkey>,
    pub first_buy_lamports: Option<u64>,
}

impl MintRequest {
    pub fn from_draft(draft: &TokenDraft, config: MintConfig, launch_mode: LaunchMode) -> Self {
        Self {
            name: draft.name.clone(),
            symbol: draft.symbol.clone(),
            decimals: draft.decimals,
            initial_supply: draft.initial_supply,
            image_uri: None,
            metadata_uri: None,
            config,
            launch_mode,
            referrer: None,
            first_buy_lamports: None,
        }
    }

    /// Supply in base units: `initial_supply × 10^decimals`
    pub fn raw_supply(&self) -> Result<u64, LaunchError> {
        10u64
            .checked_pow(u32::from(self.decimals))
            .and_then(|scale| self.initial_supply.checked_mul(scale))
            .ok_or_else(|| {
                LaunchError::validation(format!(
                    "supply {} with {} decimals overflows the token amount",
                    self.initial_supply, self.decimals
                ))
            })
    }

    /// Metadata URI written on-chain; empty when none was uploaded
    pub fn metadata_uri(&self) -> &str {
        self.metadata_uri.as_deref().unwrap_or_default()
    }

    /// Referrer entitled to a fee share; self-referral counts as none
    pub fn effective_referrer(&self, requester: &Pubkey) -> Option<Pubkey> {
        self.referrer.filter(|referrer| referrer != requester)
    }

    /// Revocations actually applied
    ///
    /// Pool launches hand mint authority to the curve program, so nothing is
    /// revoked or charged there. Validation refuses pool requests that set
    /// revoke flags; this only shapes fee quotes for such requests.
    pub fn effective_config(&self) -> MintConfig {
        match self.launch_mode {
            LaunchMode::Direct => self.config,
            LaunchMode::BondingCurve => MintConfig::default(),
        }
    }
}
