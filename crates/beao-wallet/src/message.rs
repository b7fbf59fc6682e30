//! Signed messages: prove control of an address without spending from it.
//!
//! A message signature is the hex encoding of `public_key(32) || sig(64)`
//! over the BLAKE3 digest of a magic prefix plus the length-prefixed
//! message. Verification recovers the address from the embedded key; no
//! wallet key is needed.

use std::fmt;
use std::str::FromStr;

use beao_core::address::{Address, Network};
use beao_core::crypto::{KeyPair, PublicKey};
use beao_core::types::Hash256;

use crate::error::WalletError;

pub const MESSAGE_MAGIC: &str = "BeaoCoin Signed Message:\n";

const ENCODED_LEN: usize = 32 + 64;

pub fn message_digest(message: &str) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(MESSAGE_MAGIC.len() as u64).to_le_bytes());
    hasher.update(MESSAGE_MAGIC.as_bytes());
    hasher.update(&(message.len() as u64).to_le_bytes());
    hasher.update(message.as_bytes());
    Hash256(hasher.finalize().into())
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MessageSignature {
    public_key: PublicKey,
    signature: [u8; 64],
}

impl MessageSignature {
    pub fn sign(keypair: &KeyPair, message: &str) -> Self {
        Self {
            public_key: keypair.public_key(),
            signature: keypair.sign(message_digest(message).as_bytes()),
        }
    }

    /// The signer's address, if the signature is valid for `message`.
    pub fn recover(&self, message: &str, network: Network) -> Option<Address> {
        self.public_key
            .verify(message_digest(message).as_bytes(), &self.signature)
            .ok()
            .map(|_| Address::from_public_key(&self.public_key, network))
    }
}

impl fmt::Display for MessageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = [0u8; ENCODED_LEN];
        raw[..32].copy_from_slice(&self.public_key.to_bytes());
        raw[32..].copy_from_slice(&self.signature);
        f.write_str(&hex::encode(raw))
    }
}

impl fmt::Debug for MessageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageSignature({self})")
    }
}

impl FromStr for MessageSignature {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim()).map_err(|e| WalletError::MalformedSignature(e.to_string()))?;
        if raw.len() != ENCODED_LEN {
            return Err(WalletError::MalformedSignature(format!(
                "expected {ENCODED_LEN} bytes, got {}",
                raw.len()
            )));
        }
        let public_key = PublicKey::from_slice(&raw[..32])
            .map_err(|e| WalletError::MalformedSignature(e.to_string()))?;
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&raw[32..]);
        Ok(Self { public_key, signature })
    }
}

/// `Ok(false)` on any mismatch; `Err` only for undecodable signatures.
pub fn verify_message(address: &Address, message: &str, signature: &str) -> Result<bool, WalletError> {
    let sig: MessageSignature = signature.parse()?;
    Ok(sig.recover(message, address.network()).as_ref() == Some(address))
}

pub fn recover_address(message: &str, signature: &str, network: Network) -> Result<Option<Address>, WalletError> {
    let sig: MessageSignature = signature.parse()?;
    Ok(sig.recover(message, network))
}
