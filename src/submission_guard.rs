//! At-most-one in-flight launch per key
//!
//! [`SubmissionGuard`] is an injectable keyed set. `mark_processing` is an
//! atomic test-and-insert, `mark_complete` an unconditional release. Callers
//! normally go through [`SubmissionGuard::try_acquire`], whose
//! [`SubmissionTicket`] releases the key when dropped, on success, error,
//! cancellation or panic alike.

use dashmap::{mapref::entry::Entry, DashMap};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

use crate::metrics::metrics;

#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<DashMap<String, Instant>>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`; false when it is already claimed
    pub fn mark_processing(&self, key: &str) -> bool {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    /// Release `key`; a no-op when it is not claimed
    pub fn mark_complete(&self, key: &str) {
        self.in_flight.remove(key);
    }

    pub fn is_processing(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Claim `key` behind a ticket that releases it on drop
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<SubmissionTicket> {
        let key = key.into();
        if !self.mark_processing(&key) {
            return None;
        }
        metrics().launches_in_flight.inc();
        Some(SubmissionTicket {
            guard: self.clone(),
            key,
            acquired_at: Instant::now(),
        })
    }
}

/// Key used for a requester's launch
///
/// Wallet addresses are hashed so the guard never holds raw identities.
pub fn launch_key(requester: &Pubkey) -> String {
    let digest = Sha256::digest(requester.as_ref());
    format!("launch:{}", bs58::encode(&digest[..16]).into_string())
}

/// Claim on one guard key, released on drop
#[derive(Debug)]
pub struct SubmissionTicket {
    guard: SubmissionGuard,
    key: String,
    acquired_at: Instant,
}

impl SubmissionTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.guard.mark_complete(&self.key);
        metrics().launches_in_flight.dec();
        debug!(
            key = %self.key,
            held_ms = self.held_for().as_millis() as u64,
            "Submission ticket released"
        );
    }
}
