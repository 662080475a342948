//! Signable launch bundles
//!
//! A [`TransactionBundle`] wraps one atomic `VersionedTransaction` together
//! with its role in the launch. Once compiled the message is frozen: the only
//! mutation allowed afterwards is adding signatures, and signed copies coming
//! back from a wallet must carry the exact same message.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{Message, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signature,
    signer::Signer,
    transaction::VersionedTransaction,
};

use super::errors::LaunchError;
use crate::compat;

/// What a bundle does within the launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleRole {
    /// Single bundle of a direct launch
    DirectMint,
    /// Bundle (a) of a pool launch; needs the mint co-signature
    PoolCreation,
    /// Optional bundle (b) of a pool launch; wallet-only
    FirstBuy,
}

/// One atomic transaction plus its role
#[derive(Debug, Clone)]
pub struct TransactionBundle {
    role: BundleRole,
    tx: VersionedTransaction,
}

impl TransactionBundle {
    /// Compile `instructions` into an unsigned legacy transaction
    pub fn from_instructions(
        role: BundleRole,
        instructions: &[Instruction],
        payer: &Pubkey,
        blockhash: Hash,
    ) -> Self {
        let message = Message::new_with_blockhash(instructions, Some(payer), &blockhash);
        let signatures = vec![Signature::default(); message.header.num_required_signatures as usize];
        Self {
            role,
            tx: VersionedTransaction {
                signatures,
                message: VersionedMessage::Legacy(message),
            },
        }
    }

    /// Wrap a transaction compiled elsewhere
    pub fn from_transaction(role: BundleRole, mut tx: VersionedTransaction) -> Self {
        let required = compat::get_message_header(&tx.message).num_required_signatures as usize;
        tx.signatures.resize(required, Signature::default());
        Self { role, tx }
    }

    pub fn role(&self) -> BundleRole {
        self.role
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.tx
    }

    pub fn into_transaction(self) -> VersionedTransaction {
        self.tx
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        compat::get_required_signers(&self.tx.message)
    }

    pub fn requires_signer(&self, pubkey: &Pubkey) -> bool {
        compat::signer_index(&self.tx.message, pubkey).is_some()
    }

    pub fn has_signature_from(&self, pubkey: &Pubkey) -> bool {
        compat::signer_index(&self.tx.message, pubkey)
            .and_then(|index| self.tx.signatures.get(index))
            .is_some_and(|sig| *sig != Signature::default())
    }

    /// Required signers whose slot is still empty
    pub fn missing_signers(&self) -> Vec<Pubkey> {
        self.required_signers()
            .iter()
            .zip(self.tx.signatures.iter())
            .filter(|(_, sig)| **sig == Signature::default())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.missing_signers().is_empty()
    }

    /// Add one signature, leaving every other slot untouched
    pub fn partial_sign(&mut self, signer: &dyn Signer) -> Result<(), LaunchError> {
        sign_in_place(&mut self.tx, signer)
    }

    /// Adopt the signed copy returned by a wallet
    ///
    /// Signatures already present locally are kept; the wallet's copy must
    /// carry the same message or it is refused.
    pub fn merge_signed(&mut self, signed: VersionedTransaction) -> Result<(), LaunchError> {
        if signed.message != self.tx.message {
            return Err(LaunchError::Authentication(
                "wallet returned a modified transaction".to_string(),
            ));
        }

        for (slot, incoming) in self.tx.signatures.iter_mut().zip(signed.signatures) {
            if *slot == Signature::default() {
                *slot = incoming;
            }
        }
        Ok(())
    }

    /// Signature identifying this bundle on the ledger (fee payer's)
    pub fn primary_signature(&self) -> Signature {
        self.tx.signatures.first().copied().unwrap_or_default()
    }

    /// bincode wire form
    pub fn serialize(&self) -> Result<Vec<u8>, LaunchError> {
        bincode::serialize(&self.tx)
            .map_err(|e| LaunchError::internal(format!("bundle serialization failed: {e}")))
    }

    pub fn to_base64(&self) -> Result<String, LaunchError> {
        Ok(BASE64.encode(self.serialize()?))
    }

    pub fn from_base64(role: BundleRole, encoded: &str) -> Result<Self, LaunchError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| LaunchError::validation(format!("bundle is not valid base64: {e}")))?;
        let tx: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| LaunchError::validation(format!("bundle does not decode: {e}")))?;
        Ok(Self::from_transaction(role, tx))
    }

    /// Serialized size in bytes
    pub fn wire_size(&self) -> Result<usize, LaunchError> {
        Ok(self.serialize()?.len())
    }

    /// Whether the bundle fits in a single ledger packet
    pub fn fits_in_packet(&self) -> Result<bool, LaunchError> {
        Ok(self.wire_size()? <= PACKET_DATA_SIZE)
    }
}

/// Place `signer`'s signature over the message at its signer slot
pub fn sign_in_place(tx: &mut VersionedTransaction, signer: &dyn Signer) -> Result<(), LaunchError> {
    let pubkey = signer
        .try_pubkey()
        .map_err(|e| LaunchError::internal(format!("signer unavailable: {e}")))?;
    let index = compat::signer_index(&tx.message, &pubkey).ok_or_else(|| {
        LaunchError::internal(format!("{pubkey} is not a required signer of this bundle"))
    })?;

    let required = compat::get_message_header(&tx.message).num_required_signatures as usize;
    if tx.signatures.len() < required {
        tx.signatures.resize(required, Signature::default());
    }

    let signature = signer
        .try_sign_message(&tx.message.serialize())
        .map_err(|e| LaunchError::internal(format!("signing failed: {e}")))?;
    tx.signatures[index] = signature;
    Ok(())
}
