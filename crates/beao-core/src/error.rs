//! Errors raised by the primitive types.
//!
//! The wallet wraps these with `#[from]`, so every variant is `Clone` and
//! comparable in tests.

use thiserror::Error;

/// A transaction that cannot be encoded or is structurally unsound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction has no inputs or no outputs")]
    EmptyInputsOrOutputs,
    /// Output values sum past `u64::MAX`.
    #[error("output values overflow")]
    ValueOverflow,
    #[error("output {0} carries no value")]
    ZeroValueOutput(usize),
    #[error("outpoint {0} is spent twice")]
    DuplicateInput(String),
    #[error("not a 32-byte hex hash: {0}")]
    InvalidHash(String),
    #[error("transaction encoding failed: {0}")]
    Encoding(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("public key is not a valid Ed25519 point")]
    InvalidPublicKey,
    #[error("signature must be 64 bytes")]
    InvalidSignature,
    #[error("signature does not verify")]
    VerificationFailed,
    /// The input's public key does not own the output it spends.
    #[error("public key does not match the spent output")]
    PubkeyHashMismatch,
    #[error("input {index} out of range for {len} inputs")]
    InputIndexOutOfBounds { index: usize, len: usize },
}

/// Bech32m decoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("wrong or empty address prefix")]
    InvalidHrp,
    #[error("address has the wrong length")]
    InvalidLength,
    #[error("address checksum mismatch")]
    InvalidChecksum,
    #[error("'{0}' is not a bech32 character")]
    InvalidCharacter(char),
    #[error("unsupported address version {0}")]
    InvalidVersion(u8),
    #[error("non-zero padding bits")]
    InvalidPadding,
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),
    #[error("no '1' separator")]
    MissingSeparator,
    #[error("address mixes upper and lower case")]
    MixedCase,
}
