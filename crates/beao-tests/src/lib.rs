//! Cross-crate test suite for the BeaoCoin wallet.
//!
//! Integration tests drive the `Wallet` facade the way the node and UI
//! collaborators do: chain updates in, spends and queries out. They cover
//! the payment scenarios, concurrent spends, and ledger properties.

pub mod helpers;
