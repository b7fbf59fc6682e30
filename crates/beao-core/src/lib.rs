//! # beao-core
//! Protocol primitives shared by the BeaoCoin wallet: hashes, transactions,
//! Ed25519 keys, Bech32m addresses and hard-coded checkpoints.

pub mod address;
pub mod checkpoints;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod types;
