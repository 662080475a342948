//! Version-agnostic access to `VersionedMessage` internals
//!
//! Bundles compiled locally are legacy messages, but the bonding curve
//! service may hand back V0 messages with lookup tables. Signing and
//! signer-set checks go through these helpers so both shapes behave the same.

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
};

#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Account keys embedded in the message (lookup-table addresses excluded)
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// The first `num_required_signatures` static keys
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let keys = get_static_account_keys(message);
    let count = (header.num_required_signatures as usize).min(keys.len());
    &keys[..count]
}

/// Signature slot of `pubkey`, if it is a required signer
#[inline]
#[must_use]
pub fn signer_index(message: &VersionedMessage, pubkey: &Pubkey) -> Option<usize> {
    get_required_signers(message).iter().position(|k| k == pubkey)
}

/// Fee payer (first required signer)
#[inline]
#[must_use]
pub fn fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_required_signers(message).first()
}
