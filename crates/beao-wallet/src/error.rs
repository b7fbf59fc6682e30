//! Wallet error types.

use beao_core::error::{AddressError, CryptoError, TransactionError};
use thiserror::Error;

/// Errors surfaced by wallet operations.
///
/// Every variant maps to a stable [`ErrorCode`] so collaborators (RPC, UI)
/// can branch on the condition without parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The wallet is encrypted and locked, or the unlock timed out.
    #[error("wallet is locked")]
    Locked,

    #[error("wrong passphrase")]
    WrongPassphrase,

    /// No private key for this address is held by the wallet.
    #[error("no key for address {0}")]
    NoKey(String),

    #[error("address already in address book: {0}")]
    DuplicateAddress(String),

    #[error("duplicate recipient: {0}")]
    DuplicateRecipient(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// `fee` is set when the payment alone fits the balance but the
    /// payment plus fee does not.
    #[error("{}", insufficient_funds_message(.fee))]
    InsufficientFunds {
        requested: u64,
        available: u64,
        fee: Option<u64>,
    },

    /// The transaction is above the free-relay size and needs an explicit
    /// go-ahead for this fee.
    #[error("transaction requires a fee of {fee} beos; confirm to send")]
    FeeConfirmationRequired { fee: u64 },

    #[error("transaction creation failed: {0}")]
    TransactionCreationFailed(String),

    /// The network refused the signed transaction. Nothing was committed.
    #[error("transaction rejected by network: {0}")]
    TransactionRejected(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("wallet is not encrypted")]
    NotEncrypted,

    #[error("wallet is already encrypted")]
    AlreadyEncrypted,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address not in address book: {0}")]
    UnknownAddress(String),

    #[error("cannot delete receiving address {0}")]
    CannotDeleteReceiving(String),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    #[error("unsupported wallet version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("encryption: {0}")]
    Encryption(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

fn insufficient_funds_message(fee: &Option<u64>) -> String {
    match fee {
        None => "The amount exceeds your balance.".to_string(),
        Some(fee) => format!(
            "The total exceeds your balance when the {fee} beo transaction fee is included."
        ),
    }
}

/// Stable, machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Locked,
    WrongPassphrase,
    NoKey,
    DuplicateAddress,
    DuplicateRecipient,
    InvalidAmount,
    InsufficientFunds,
    FeeConfirmationRequired,
    TransactionCreationFailed,
    TransactionRejected,
    MalformedSignature,
    Persistence,
    NotEncrypted,
    AlreadyEncrypted,
    InvalidAddress,
    UnknownAddress,
    CannotDeleteReceiving,
    UnknownTransaction,
    CorruptedFile,
    UnsupportedVersion,
    Encryption,
    InvalidConfig,
    Crypto,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Locked => "wallet_locked",
            ErrorCode::WrongPassphrase => "wrong_passphrase",
            ErrorCode::NoKey => "no_key",
            ErrorCode::DuplicateAddress => "duplicate_address",
            ErrorCode::DuplicateRecipient => "duplicate_recipient",
            ErrorCode::InvalidAmount => "invalid_amount",
            ErrorCode::InsufficientFunds => "insufficient_funds",
            ErrorCode::FeeConfirmationRequired => "fee_confirmation_required",
            ErrorCode::TransactionCreationFailed => "transaction_creation_failed",
            ErrorCode::TransactionRejected => "transaction_rejected",
            ErrorCode::MalformedSignature => "malformed_signature",
            ErrorCode::Persistence => "persistence",
            ErrorCode::NotEncrypted => "not_encrypted",
            ErrorCode::AlreadyEncrypted => "already_encrypted",
            ErrorCode::InvalidAddress => "invalid_address",
            ErrorCode::UnknownAddress => "unknown_address",
            ErrorCode::CannotDeleteReceiving => "cannot_delete_receiving",
            ErrorCode::UnknownTransaction => "unknown_transaction",
            ErrorCode::CorruptedFile => "corrupted_file",
            ErrorCode::UnsupportedVersion => "unsupported_version",
            ErrorCode::Encryption => "encryption",
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::Crypto => "crypto",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WalletError::Locked => ErrorCode::Locked,
            WalletError::WrongPassphrase => ErrorCode::WrongPassphrase,
            WalletError::NoKey(_) => ErrorCode::NoKey,
            WalletError::DuplicateAddress(_) => ErrorCode::DuplicateAddress,
            WalletError::DuplicateRecipient(_) => ErrorCode::DuplicateRecipient,
            WalletError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            WalletError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            WalletError::FeeConfirmationRequired { .. } => ErrorCode::FeeConfirmationRequired,
            WalletError::TransactionCreationFailed(_) | WalletError::Transaction(_) => {
                ErrorCode::TransactionCreationFailed
            }
            WalletError::TransactionRejected(_) => ErrorCode::TransactionRejected,
            WalletError::MalformedSignature(_) => ErrorCode::MalformedSignature,
            WalletError::Persistence(_) => ErrorCode::Persistence,
            WalletError::NotEncrypted => ErrorCode::NotEncrypted,
            WalletError::AlreadyEncrypted => ErrorCode::AlreadyEncrypted,
            WalletError::InvalidAddress(_) | WalletError::Address(_) => ErrorCode::InvalidAddress,
            WalletError::UnknownAddress(_) => ErrorCode::UnknownAddress,
            WalletError::CannotDeleteReceiving(_) => ErrorCode::CannotDeleteReceiving,
            WalletError::UnknownTransaction(_) => ErrorCode::UnknownTransaction,
            WalletError::CorruptedFile(_) => ErrorCode::CorruptedFile,
            WalletError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            WalletError::Encryption(_) => ErrorCode::Encryption,
            WalletError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            WalletError::Crypto(_) => ErrorCode::Crypto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_messages_differ() {
        let plain = WalletError::InsufficientFunds { requested: 200, available: 100, fee: None };
        assert_eq!(plain.to_string(), "The amount exceeds your balance.");

        let with_fee =
            WalletError::InsufficientFunds { requested: 100, available: 100, fee: Some(3) };
        let msg = with_fee.to_string();
        assert!(msg.contains("3 beo transaction fee"), "{msg}");
        assert_eq!(plain.code(), with_fee.code());
    }

    #[test]
    fn codes_are_distinct_for_spend_conditions() {
        let errors = [
            WalletError::InvalidAmount("0".into()),
            WalletError::InsufficientFunds { requested: 1, available: 0, fee: None },
            WalletError::DuplicateRecipient("a".into()),
            WalletError::FeeConfirmationRequired { fee: 1 },
            WalletError::TransactionCreationFailed("x".into()),
            WalletError::TransactionRejected("x".into()),
        ];
        let codes: std::collections::HashSet<&str> =
            errors.iter().map(|e| e.code().as_str()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn from_core_errors() {
        let e: WalletError = CryptoError::InvalidPublicKey.into();
        assert_eq!(e, WalletError::Crypto(CryptoError::InvalidPublicKey));
        let e: WalletError = AddressError::InvalidChecksum.into();
        assert_eq!(e.code(), ErrorCode::InvalidAddress);
        let e: WalletError = TransactionError::ValueOverflow.into();
        assert_eq!(e.code(), ErrorCode::TransactionCreationFailed);
    }

    #[test]
    fn code_display_is_snake_case() {
        assert_eq!(ErrorCode::Locked.to_string(), "wallet_locked");
        assert_eq!(WalletError::WrongPassphrase.code().as_str(), "wrong_passphrase");
    }
}
