//! # beao-wallet: wallet transaction engine for BeaoCoin.
//!
//! Key custody with encryption at rest, coin selection, fee and change
//! computation, transaction signing, message signing, and the status
//! classification that turns chain height into transaction state.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` and stable `ErrorCode`s
//! - [`config`]: `WalletConfig` and its `BEAO_*` environment overlay
//! - [`encryption`]: Argon2id + AES-256-GCM secret encryption
//! - [`keys`]: master seed and deterministic child keys
//! - [`address_book`]: receiving and sending address labels
//! - [`keystore`]: key pool, lock state and signing capability
//! - [`coin_selection`]: fewest-inputs, deepest-first selection
//! - [`builder`]: fees, change, signing and structural checks
//! - [`message`]: message signatures proving address ownership
//! - [`ledger`]: transaction history and owned outputs
//! - [`chain_sync`]: chain height tracking and sync phase
//! - [`status`]: per-transaction confirmation status
//! - [`store`]: wallet file format and persistence backends
//! - [`mining`]: mining configuration and hash-rate readout
//! - [`wallet`]: the `Wallet` facade

pub mod address_book;
pub mod builder;
pub mod chain_sync;
pub mod coin_selection;
pub mod config;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod ledger;
pub mod message;
pub mod mining;
pub mod status;
pub mod store;
pub mod wallet;

pub use address_book::{AddressBookEntry, EntryKind};
pub use builder::{FeePolicy, PendingTransaction, Recipient, TransactionBuilder};
pub use chain_sync::{BlockAge, ChainState, ChainSyncTracker, SyncPhase};
pub use coin_selection::{Candidate, Selection};
pub use config::WalletConfig;
pub use encryption::KdfParams;
pub use error::{ErrorCode, WalletError};
pub use keystore::{KeyStore, LockState};
pub use ledger::{Balance, Ledger, TxKind, WalletTx};
pub use mining::{MiningConfig, MiningMode, MiningStatus};
pub use status::TxStatus;
pub use store::{FileStore, MemoryStore, WalletStore};
pub use wallet::{Broadcaster, ChainUpdate, SendOptions, SyncProgress, TxSummary, Wallet};
