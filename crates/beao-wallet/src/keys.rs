//! Master seed and deterministic child keys.
//!
//! Every wallet key is an Ed25519 keypair derived from a 32-byte master seed
//! with BLAKE3's KDF mode over `seed || index`. A key is identified on disk
//! by its index and public-key hash only; the secret is re-derived when a
//! signature is needed.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use beao_core::address::{Address, Network};
use beao_core::crypto::KeyPair;
use beao_core::types::Hash256;

use crate::error::WalletError;

const KDF_CONTEXT: &str = "beaocoin wallet 2024-01 child key derivation";

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 32],
}

impl Seed {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, WalletError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::CorruptedFile(format!("seed is {} bytes", bytes.len())))?;
        Ok(Self { bytes: arr })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn derive(&self, index: u32) -> KeyPair {
        let mut ikm = Zeroizing::new([0u8; 36]);
        ikm[..32].copy_from_slice(&self.bytes);
        ikm[32..].copy_from_slice(&index.to_le_bytes());
        let mut derived = blake3::derive_key(KDF_CONTEXT, ikm.as_ref());
        let kp = KeyPair::from_secret_bytes(derived);
        derived.zeroize();
        kp
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// Public identity of a derived key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRecord {
    pub index: u32,
    pub pubkey_hash: Hash256,
}

impl KeyRecord {
    pub fn derive(seed: &Seed, index: u32) -> Self {
        Self { index, pubkey_hash: seed.derive(index).pubkey_hash() }
    }

    pub fn address(&self, network: Network) -> Address {
        Address::from_pubkey_hash(self.pubkey_hash, network)
    }
}

/// Decrypted key material, shared as `Arc<UnlockedKeys>` while the wallet is
/// unlocked. The seed is wiped when the last holder drops it.
pub struct UnlockedKeys {
    seed: Seed,
}

impl UnlockedKeys {
    pub fn new(seed: Seed) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// The keypair for `record`, or `None` if the record does not belong to
    /// this seed.
    pub fn keypair(&self, record: &KeyRecord) -> Option<KeyPair> {
        let kp = self.seed.derive(record.index);
        (kp.pubkey_hash() == record.pubkey_hash).then_some(kp)
    }
}

impl fmt::Debug for UnlockedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedKeys").finish_non_exhaustive()
    }
}
