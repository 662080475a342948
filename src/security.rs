//! Input validation and message redaction

use once_cell::sync::Lazy;
use regex::Regex;

/// Base58 runs long enough to be an address, signature or secret key
static BASE58_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,88}\b").expect("static pattern"));

/// Replace base58 addresses, signatures and keys with `abcd…wxyz`
pub fn redact_sensitive(message: &str) -> String {
    BASE58_RUN
        .replace_all(message, |caps: &regex::Captures<'_>| {
            let run = &caps[0];
            format!("{}…{}", &run[..4], &run[run.len() - 4..])
        })
        .into_owned()
}

/// Request and identifier validation
pub mod validator {
    use once_cell::sync::Lazy;
    use regex::Regex;
    use solana_sdk::{pubkey::Pubkey, signature::Signature};

    use crate::tx_builder::{uri_len, LaunchError, MAX_URI_LEN};
    use crate::types::{LaunchMode, MintRequest};

    pub const MAX_NAME_LEN: usize = 32;
    pub const MAX_SYMBOL_LEN: usize = 10;
    pub const MAX_DECIMALS: u8 = 9;

    static SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static pattern"));

    pub fn validate_name(name: &str) -> Result<(), LaunchError> {
        let len = name.chars().count();
        if name.trim().is_empty() || len > MAX_NAME_LEN {
            return Err(LaunchError::validation(format!(
                "name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn validate_symbol(symbol: &str) -> Result<(), LaunchError> {
        if symbol.len() > MAX_SYMBOL_LEN || !SYMBOL.is_match(symbol) {
            return Err(LaunchError::validation(format!(
                "symbol must be 1-{MAX_SYMBOL_LEN} letters or digits"
            )));
        }
        Ok(())
    }

    pub fn validate_decimals(decimals: u8) -> Result<(), LaunchError> {
        if decimals > MAX_DECIMALS {
            return Err(LaunchError::validation(format!(
                "decimals must be between 0 and {MAX_DECIMALS}"
            )));
        }
        Ok(())
    }

    pub fn validate_uri(uri: &str) -> Result<(), LaunchError> {
        if uri_len(uri) > MAX_URI_LEN {
            return Err(LaunchError::validation(format!(
                "metadata URI must be at most {MAX_URI_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Checks every field before any bundle is built
    pub fn validate_mint_request(request: &MintRequest) -> Result<(), LaunchError> {
        validate_name(&request.name)?;
        validate_symbol(&request.symbol)?;
        validate_decimals(request.decimals)?;
        if let Some(uri) = &request.metadata_uri {
            validate_uri(uri)?;
        }
        if request.launch_mode == LaunchMode::BondingCurve && request.config.revoked_count() > 0 {
            return Err(LaunchError::validation(
                "revoke options are not available for bonding curve launches; the pool program holds the mint authority",
            ));
        }
        request.raw_supply()?;
        Ok(())
    }

    pub fn validate_signature(signature: &str) -> Result<Signature, LaunchError> {
        signature
            .parse::<Signature>()
            .map_err(|e| LaunchError::validation(format!("invalid signature: {e}")))
    }

    pub fn validate_pubkey(value: &str) -> Result<Pubkey, LaunchError> {
        value
            .parse::<Pubkey>()
            .map_err(|e| LaunchError::validation(format!("invalid address: {e}")))
    }
}
