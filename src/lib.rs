//! Launchpad - token launch orchestration library
//!
//! Builds, signs, submits and confirms SPL Token-2022 launches, either as a
//! direct mint or as a pool on an external bonding curve, with the service
//! fee split between the platform and an optional referrer.
//!
//! Leaf-first:
//! - [`tx_builder`]: fees, mint sizing, instruction sequencing, bundles
//! - [`signing`]: multi-party signing and ordered submission
//! - [`submission_guard`]: one in-flight launch per wallet
//! - [`confirmation`] / [`endpoints`]: server-side confirmation over HTTP
//! - [`launch_flow`]: the Form → Success state machine and its driver

// Solana SDK compatibility layer
pub mod compat;

// Launch core
pub mod confirmation;
pub mod launch_flow;
pub mod signing;
pub mod submission_guard;
pub mod tx_builder;

// Collaborators
pub mod ledger;
pub mod upload;
pub mod wallet;

// Ambient services
pub mod config;
pub mod endpoints;
pub mod metrics;
pub mod observability;
pub mod security;
pub mod structured_logging;
pub mod task_queue;
pub mod types;

pub mod test_utils;

// Re-export commonly used types
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};

#[cfg(test)]
mod tests {
    mod test_helpers;

    mod scenario_bonding_curve_tests;
    mod scenario_direct_tests;
    mod scenario_failure_tests;
    mod fee_property_tests;
    mod instruction_ordering_tests;
    mod v0_transaction_compat_tests;
}
