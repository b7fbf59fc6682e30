//! Passphrase encryption of wallet secrets.
//!
//! Argon2id stretches the passphrase into a 256-bit key; AES-256-GCM seals
//! the secret. The GCM tag doubles as the passphrase check: a wrong
//! passphrase fails authentication and nothing else is needed.
//!
//! # Wire format
//! ```text
//! salt (32 bytes) || nonce (12 bytes) || ciphertext + auth_tag
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Argon2id cost parameters. Stored next to the ciphertext so a wallet keeps
/// opening after the defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { memory_kib: 64 * 1024, iterations: 3, parallelism: 1 }
    }
}

impl KdfParams {
    /// Minimal cost. For tests only.
    pub fn fast() -> Self {
        Self { memory_kib: 8, iterations: 1, parallelism: 1 }
    }

    fn to_argon2(self) -> Result<Params, WalletError> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, Some(KEY_LEN))
            .map_err(|e| WalletError::Encryption(format!("argon2 params: {e}")))
    }
}

pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, WalletError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, salt, key.as_mut())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(key)
}

pub fn encrypt(
    plaintext: &[u8],
    passphrase: &[u8],
    params: &KdfParams,
) -> Result<Vec<u8>, WalletError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt, params)?;
    let cipher =
        Aes256Gcm::new_from_slice(key.as_ref()).map_err(|e| WalletError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Fails with [`WalletError::WrongPassphrase`] when the tag does not verify.
pub fn decrypt(
    encrypted: &[u8],
    passphrase: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    if encrypted.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(WalletError::CorruptedFile(format!(
            "encrypted secret too short: {} bytes",
            encrypted.len()
        )));
    }
    let (salt, rest) = encrypted.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt, params)?;
    let cipher =
        Aes256Gcm::new_from_slice(key.as_ref()).map_err(|e| WalletError::Encryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::WrongPassphrase)
}
