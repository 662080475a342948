//! Service fee computation and platform/referrer split
//!
//! All amounts are lamports. The referrer ratio is held in basis points so
//! the split stays in integer arithmetic; the referrer share is floored and
//! the platform absorbs the remainder.

use serde::{Deserialize, Serialize};

/// One SOL in lamports
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Default base fee: 0.08 SOL
pub const DEFAULT_BASE_FEE_LAMPORTS: u64 = 80_000_000;

/// Default surcharge per revoked authority: 0.1 SOL
pub const DEFAULT_PER_AUTHORITY_FEE_LAMPORTS: u64 = 100_000_000;

/// Default referrer share: 55%
pub const DEFAULT_REFERRER_SHARE_BPS: u16 = 5_500;

const BPS_DENOMINATOR: u128 = 10_000;

/// Configured fee levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_lamports: u64,
    pub per_authority_lamports: u64,
    pub referrer_share_bps: u16,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base_lamports: DEFAULT_BASE_FEE_LAMPORTS,
            per_authority_lamports: DEFAULT_PER_AUTHORITY_FEE_LAMPORTS,
            referrer_share_bps: DEFAULT_REFERRER_SHARE_BPS,
        }
    }
}

/// Which authorities the requester asked to revoke
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintConfig {
    pub revoke_mint: bool,
    pub revoke_freeze: bool,
}

impl MintConfig {
    pub fn revoked_count(&self) -> u64 {
        u64::from(self.revoke_mint) + u64::from(self.revoke_freeze)
    }
}

/// Fee totals and how they are divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub base: u64,
    pub authority_surcharge: u64,
    pub total: u64,
    pub referrer_share: u64,
    pub platform_share: u64,
}

impl FeeBreakdown {
    pub fn has_referrer_share(&self) -> bool {
        self.referrer_share > 0
    }
}

/// Platform and referrer portions of a total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub referrer_share: u64,
    pub platform_share: u64,
}

/// `base + per_authority × revoked flags`
pub fn compute_total_fee(schedule: &FeeSchedule, config: &MintConfig) -> u64 {
    schedule
        .base_lamports
        .saturating_add(schedule.per_authority_lamports.saturating_mul(config.revoked_count()))
}

/// Split `total` between referrer and platform
///
/// Referrer gets `floor(total × bps / 10_000)` when present, otherwise 0.
/// Shares always sum to `total`.
pub fn compute_split(total: u64, referrer_present: bool, referrer_share_bps: u16) -> FeeSplit {
    let referrer_share = if referrer_present {
        let bps = u128::from(referrer_share_bps.min(10_000));
        // total × bps fits in u128; the quotient is ≤ total
        (u128::from(total) * bps / BPS_DENOMINATOR) as u64
    } else {
        0
    };

    FeeSplit {
        referrer_share,
        platform_share: total - referrer_share,
    }
}

/// Full breakdown for a launch
pub fn compute_fee_breakdown(
    schedule: &FeeSchedule,
    config: &MintConfig,
    referrer_present: bool,
) -> FeeBreakdown {
    let total = compute_total_fee(schedule, config);
    let split = compute_split(total, referrer_present, schedule.referrer_share_bps);

    FeeBreakdown {
        base: schedule.base_lamports,
        authority_surcharge: total - schedule.base_lamports.min(total),
        total,
        referrer_share: split.referrer_share,
        platform_share: split.platform_share,
    }
}

/// Lamports rendered as SOL for logs and quotes
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schedule() -> FeeSchedule {
        FeeSchedule::default()
    }

    #[test]
    fn test_total_fee_all_flag_combinations() {
        let s = schedule();
        for (revoke_mint, revoke_freeze) in [(false, false), (true, false), (false, true), (true, true)] {
            let config = MintConfig {
                revoke_mint,
                revoke_freeze,
            };
            let expected = s.base_lamports
                + s.per_authority_lamports * (u64::from(revoke_mint) + u64::from(revoke_freeze));
            assert_eq!(compute_total_fee(&s, &config), expected);
        }
    }

    #[test]
    fn test_both_revocations_with_referrer() {
        let config = MintConfig {
            revoke_mint: true,
            revoke_freeze: true,
        };
        let fees = compute_fee_breakdown(&schedule(), &config, true);

        // 0.08 + 2 × 0.1 = 0.28 SOL
        assert_eq!(fees.total, 280_000_000);
        assert_eq!(fees.authority_surcharge, 200_000_000);
        // floor(0.28 × 0.55 × 1e9) = 154_000_000
        assert_eq!(fees.referrer_share, 154_000_000);
        assert_eq!(fees.platform_share, 126_000_000);
        assert!((lamports_to_sol(fees.total) - 0.28).abs() < 1e-12);
    }

    #[test]
    fn test_no_referrer_means_platform_takes_all() {
        let fees = compute_fee_breakdown(&schedule(), &MintConfig::default(), false);
        assert_eq!(fees.total, DEFAULT_BASE_FEE_LAMPORTS);
        assert_eq!(fees.referrer_share, 0);
        assert_eq!(fees.platform_share, fees.total);
        assert!(!fees.has_referrer_share());
    }

    #[test]
    fn test_rounding_favors_platform() {
        // 0.55 × 3 = 1.65 → referrer gets 1
        let split = compute_split(3, true, 5_500);
        assert_eq!(split.referrer_share, 1);
        assert_eq!(split.platform_share, 2);
    }

    #[test]
    fn test_zero_total() {
        let split = compute_split(0, true, 5_500);
        assert_eq!(split.referrer_share, 0);
        assert_eq!(split.platform_share, 0);
    }

    proptest! {
        #[test]
        fn prop_split_sums_to_total(total in any::<u64>(), present in any::<bool>()) {
            let split = compute_split(total, present, DEFAULT_REFERRER_SHARE_BPS);
            prop_assert_eq!(split.referrer_share + split.platform_share, total);
            if present {
                let expected = (u128::from(total) * 5_500 / 10_000) as u64;
                prop_assert_eq!(split.referrer_share, expected);
            } else {
                prop_assert_eq!(split.referrer_share, 0);
            }
        }

        #[test]
        fn prop_referrer_never_exceeds_total(total in any::<u64>(), bps in any::<u16>()) {
            let split = compute_split(total, true, bps);
            prop_assert!(split.referrer_share <= total);
        }
    }
}
