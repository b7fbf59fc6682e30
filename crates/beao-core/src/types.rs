//! Transaction types as the wallet sees them.
//!
//! Amounts are in beos (1 BEAO = 10^8 beos).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::constants::LOCKTIME_THRESHOLD;
use crate::error::TransactionError;

/// A 32-byte hash value: txids, block hashes and pubkey hashes.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse 64 hex characters. Returns `None` for anything else.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s).ok()?;
        let bytes: [u8; 32] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Hash256 {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| TransactionError::InvalidHash(s.to_string()))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to one output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u64,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u64) -> Self {
        Self { txid, index }
    }

    /// The coinbase marker outpoint.
    pub fn null() -> Self {
        Self { txid: Hash256::ZERO, index: u64::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Ed25519 signature (64 bytes). Empty until signed and for coinbase.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes). Empty until signed and for coinbase.
    pub public_key: Vec<u8>,
}

impl TxInput {
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self { previous_output, signature: Vec::new(), public_key: Vec::new() }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty() && !self.public_key.is_empty()
    }
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    pub value: u64,
    /// BLAKE3 hash of the recipient's Ed25519 public key.
    pub pubkey_hash: Hash256,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    pub version: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Block height (below [`LOCKTIME_THRESHOLD`]) or unix time before which
    /// the transaction is not final. Zero means final.
    pub lock_time: u64,
}

impl Transaction {
    /// BLAKE3 over the bincode standard encoding.
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let encoded = self.encode()?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Encoding(e.to_string()))
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> Result<usize, TransactionError> {
        self.encode().map(|b| b.len())
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Whether the lock time has passed for a block at `height` / `time`.
    pub fn is_final(&self, height: u64, time: u64) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let cutoff = if self.lock_time < LOCKTIME_THRESHOLD { height } else { time };
        self.lock_time < cutoff
    }

    /// Context-free structural checks: non-empty, non-zero outputs, no value
    /// overflow, no input spent twice.
    pub fn check_structure(&self) -> Result<(), TransactionError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(TransactionError::EmptyInputsOrOutputs);
        }
        if let Some(i) = self.outputs.iter().position(|o| o.value == 0) {
            return Err(TransactionError::ZeroValueOutput(i));
        }
        self.total_output_value().ok_or(TransactionError::ValueOverflow)?;
        let mut seen = HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(input.previous_output) {
                return Err(TransactionError::DuplicateInput(input.previous_output.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput::unsigned(OutPoint::new(Hash256([1; 32]), 0))],
            outputs: vec![
                TxOutput { value: 500, pubkey_hash: Hash256([2; 32]) },
                TxOutput { value: 250, pubkey_hash: Hash256([3; 32]) },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn hash_hex_roundtrip_and_rejects_bad_input() {
        let h = Hash256([0xab; 32]);
        assert_eq!(Hash256::from_hex(&h.to_string()), Some(h));
        assert_eq!(Hash256::from_hex("abcd"), None);
        assert_eq!(Hash256::from_hex("zz"), None);
        assert!("not-a-hash".parse::<Hash256>().is_err());
    }

    #[test]
    fn txid_is_deterministic_and_sensitive() {
        let tx = sample_tx();
        assert_eq!(tx.txid().unwrap(), tx.txid().unwrap());
        let mut other = tx.clone();
        other.outputs[0].value += 1;
        assert_ne!(tx.txid().unwrap(), other.txid().unwrap());
    }

    #[test]
    fn coinbase_detection() {
        let mut tx = sample_tx();
        assert!(!tx.is_coinbase());
        tx.inputs = vec![TxInput::unsigned(OutPoint::null())];
        assert!(tx.is_coinbase());
    }

    #[test]
    fn total_output_value_detects_overflow() {
        let mut tx = sample_tx();
        assert_eq!(tx.total_output_value(), Some(750));
        tx.outputs[0].value = u64::MAX;
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn finality_by_height_and_time() {
        let mut tx = sample_tx();
        assert!(tx.is_final(0, 0));
        tx.lock_time = 100;
        assert!(!tx.is_final(100, 0));
        assert!(tx.is_final(101, 0));
        tx.lock_time = LOCKTIME_THRESHOLD + 10;
        assert!(!tx.is_final(1_000_000, LOCKTIME_THRESHOLD));
        assert!(tx.is_final(0, LOCKTIME_THRESHOLD + 11));
    }

    #[test]
    fn structure_checks() {
        assert!(sample_tx().check_structure().is_ok());

        let mut empty = sample_tx();
        empty.outputs.clear();
        assert_eq!(empty.check_structure(), Err(TransactionError::EmptyInputsOrOutputs));

        let mut zero = sample_tx();
        zero.outputs[1].value = 0;
        assert_eq!(zero.check_structure(), Err(TransactionError::ZeroValueOutput(1)));

        let mut dup = sample_tx();
        dup.inputs.push(dup.inputs[0].clone());
        assert!(matches!(dup.check_structure(), Err(TransactionError::DuplicateInput(_))));
    }

    #[test]
    fn size_grows_with_signatures() {
        let mut tx = sample_tx();
        let unsigned = tx.size().unwrap();
        tx.inputs[0].signature = vec![0; 64];
        tx.inputs[0].public_key = vec![0; 32];
        assert!(tx.inputs[0].is_signed());
        assert!(tx.size().unwrap() > unsigned + 90);
    }
}
