//! User-facing transaction status.
//!
//! [`TxStatus::classify`] is a pure function of a wallet transaction, a chain
//! snapshot and the wall clock. Formatting lives in `Display`.

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use beao_core::constants::{COINBASE_MATURITY, LOCKTIME_THRESHOLD};

use crate::chain_sync::ChainState;
use crate::ledger::WalletTx;

pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 6;
/// Seconds without a peer acknowledgement before our own broadcast shows as offline.
pub const DEFAULT_OFFLINE_AFTER_SECS: u64 = 120;
/// Seconds a mined block may stay outside the best chain before it is given up.
pub const DEFAULT_NOT_ACCEPTED_AFTER_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSettings {
    pub required_confirmations: u64,
    pub coinbase_maturity: u64,
    pub offline_after_secs: u64,
    pub not_accepted_after_secs: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            coinbase_maturity: COINBASE_MATURITY,
            offline_after_secs: DEFAULT_OFFLINE_AFTER_SECS,
            not_accepted_after_secs: DEFAULT_NOT_ACCEPTED_AFTER_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    /// Height lock not yet reached.
    OpenFor { blocks: u64 },
    /// Time lock not yet reached (Unix seconds).
    OpenUntil { time: u64 },
    /// Our broadcast has not been acknowledged by any peer.
    Offline { depth: u64 },
    Unconfirmed { required: u64 },
    PartiallyConfirmed { depth: u64, required: u64 },
    Confirmed { depth: u64 },
    Immature { matures_in: u64 },
    /// A mined block that never made it into the best chain.
    NotAccepted,
}

impl TxStatus {
    pub fn classify(wtx: &WalletTx, chain: &ChainState, settings: &StatusSettings, now: u64) -> Self {
        let depth = wtx.depth(chain.height);
        let age = now.saturating_sub(wtx.received_at);

        if wtx.is_coinbase() {
            return match depth {
                0 if age > settings.not_accepted_after_secs => TxStatus::NotAccepted,
                0 => TxStatus::Immature { matures_in: settings.coinbase_maturity },
                d if d < settings.coinbase_maturity => TxStatus::Immature { matures_in: settings.coinbase_maturity - d },
                d => TxStatus::Confirmed { depth: d },
            };
        }

        if depth == 0 && !wtx.tx.is_final(chain.height.saturating_add(1), now) {
            let lock_time = wtx.tx.lock_time;
            return if lock_time < LOCKTIME_THRESHOLD {
                TxStatus::OpenFor { blocks: lock_time - chain.height }
            } else {
                TxStatus::OpenUntil { time: lock_time }
            };
        }

        let required = settings.required_confirmations;
        match depth {
            0 if wtx.from_me && wtx.peer_acks == 0 && age > settings.offline_after_secs => {
                TxStatus::Offline { depth }
            }
            0 => TxStatus::Unconfirmed { required },
            d if d < required => TxStatus::PartiallyConfirmed { depth: d, required },
            d => TxStatus::Confirmed { depth: d },
        }
    }

    /// Extra explanation for statuses that need one.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            TxStatus::NotAccepted => {
                Some("This block was not received by any other nodes and will probably not be accepted!")
            }
            TxStatus::Offline { .. } => Some("No peer has acknowledged this transaction yet."),
            _ => None,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TxStatus::OpenFor { blocks: 1 } => write!(f, "Open for 1 more block"),
            TxStatus::OpenFor { blocks } => write!(f, "Open for {blocks} more blocks"),
            TxStatus::OpenUntil { time } => match DateTime::from_timestamp(time as i64, 0) {
                Some(dt) => write!(f, "Open until {}", dt.format("%Y-%m-%d %H:%M UTC")),
                None => write!(f, "Open until {time}"),
            },
            TxStatus::Offline { depth } => write!(f, "Offline ({depth} confirmations)"),
            TxStatus::Unconfirmed { required } => write!(f, "Unconfirmed (0 of {required} confirmations)"),
            TxStatus::PartiallyConfirmed { depth, required } => {
                write!(f, "Unconfirmed ({depth} of {required} confirmations)")
            }
            TxStatus::Confirmed { depth } => write!(f, "Confirmed ({depth} confirmations)"),
            TxStatus::Immature { matures_in: 1 } => {
                write!(f, "Mined balance will be available when it matures in 1 more block")
            }
            TxStatus::Immature { matures_in } => {
                write!(f, "Mined balance will be available when it matures in {matures_in} more blocks")
            }
            TxStatus::NotAccepted => write!(f, "Generated but not accepted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TxKind;
    use beao_core::types::{Hash256, OutPoint, Transaction, TxInput, TxOutput};

    const NOW: u64 = 1_700_000_000;

    fn wtx(kind: TxKind, included_at: Option<u64>, lock_time: u64) -> WalletTx {
        let prev = if kind == TxKind::Mined { OutPoint::null() } else { OutPoint::new(Hash256([1; 32]), 0) };
        let tx = Transaction {
            version: 1,
            inputs: vec![TxInput::unsigned(prev)],
            outputs: vec![TxOutput { value: 50, pubkey_hash: Hash256([2; 32]) }],
            lock_time,
        };
        WalletTx {
            txid: tx.txid().unwrap(),
            tx,
            kind,
            received_at: NOW - 10,
            included_at,
            peer_acks: 0,
            from_me: kind == TxKind::Sent,
            credit: 50,
            debit: 0,
            fee: 0,
        }
    }

    fn chain(height: u64) -> ChainState {
        let mut c = ChainState::new(0);
        c.height = height;
        c
    }

    fn classify(w: &WalletTx, height: u64, now: u64) -> TxStatus {
        TxStatus::classify(w, &chain(height), &StatusSettings::default(), now)
    }

    #[test]
    fn mined_maturity_boundary() {
        // Included at 1: depth at tip h is h.
        let w = wtx(TxKind::Mined, Some(1), 0);
        assert_eq!(classify(&w, 119, NOW), TxStatus::Immature { matures_in: 1 });
        assert_eq!(classify(&w, 120, NOW), TxStatus::Confirmed { depth: 120 });
    }

    #[test]
    fn mined_outside_best_chain() {
        let mut w = wtx(TxKind::Mined, None, 0);
        assert_eq!(classify(&w, 50, NOW), TxStatus::Immature { matures_in: 120 });
        w.received_at = NOW - 121;
        assert_eq!(classify(&w, 50, NOW), TxStatus::NotAccepted);
        assert!(TxStatus::NotAccepted.warning().is_some());
    }

    #[test]
    fn confirmation_ladder() {
        let w = wtx(TxKind::Received, Some(100), 0);
        assert_eq!(classify(&w, 99, NOW), TxStatus::Unconfirmed { required: 6 });
        assert_eq!(classify(&w, 100, NOW), TxStatus::PartiallyConfirmed { depth: 1, required: 6 });
        assert_eq!(classify(&w, 104, NOW), TxStatus::PartiallyConfirmed { depth: 5, required: 6 });
        assert_eq!(classify(&w, 105, NOW), TxStatus::Confirmed { depth: 6 });
    }

    #[test]
    fn own_unacknowledged_broadcast_goes_offline() {
        let mut w = wtx(TxKind::Sent, None, 0);
        assert_eq!(classify(&w, 10, NOW), TxStatus::Unconfirmed { required: 6 });
        assert_eq!(classify(&w, 10, NOW + 200), TxStatus::Offline { depth: 0 });
        w.peer_acks = 1;
        assert_eq!(classify(&w, 10, NOW + 200), TxStatus::Unconfirmed { required: 6 });
    }

    #[test]
    fn incoming_is_never_offline() {
        let w = wtx(TxKind::Received, None, 0);
        assert_eq!(classify(&w, 10, NOW + 10_000), TxStatus::Unconfirmed { required: 6 });
    }

    #[test]
    fn height_lock() {
        let w = wtx(TxKind::Received, None, 15);
        assert_eq!(classify(&w, 10, NOW), TxStatus::OpenFor { blocks: 5 });
        assert_eq!(classify(&w, 14, NOW), TxStatus::OpenFor { blocks: 1 });
        assert_eq!(classify(&w, 15, NOW), TxStatus::Unconfirmed { required: 6 });
    }

    #[test]
    fn time_lock() {
        let w = wtx(TxKind::Received, None, NOW + 3_600);
        assert_eq!(classify(&w, 10, NOW), TxStatus::OpenUntil { time: NOW + 3_600 });
        assert_eq!(classify(&w, 10, NOW + 3_601), TxStatus::Unconfirmed { required: 6 });
    }

    #[test]
    fn locks_at_the_highest_tip() {
        let height_locked = wtx(TxKind::Received, None, 15);
        assert_eq!(classify(&height_locked, u64::MAX, NOW), TxStatus::Unconfirmed { required: 6 });
        let time_locked = wtx(TxKind::Received, None, NOW + 3_600);
        assert_eq!(classify(&time_locked, u64::MAX, NOW), TxStatus::OpenUntil { time: NOW + 3_600 });
    }

    #[test]
    fn included_locked_tx_is_not_open() {
        let w = wtx(TxKind::Received, Some(20), 15);
        assert_eq!(classify(&w, 20, NOW), TxStatus::PartiallyConfirmed { depth: 1, required: 6 });
    }

    #[test]
    fn display_strings() {
        assert_eq!(TxStatus::OpenFor { blocks: 1 }.to_string(), "Open for 1 more block");
        assert_eq!(TxStatus::OpenFor { blocks: 3 }.to_string(), "Open for 3 more blocks");
        assert_eq!(TxStatus::Offline { depth: 0 }.to_string(), "Offline (0 confirmations)");
        assert_eq!(
            TxStatus::PartiallyConfirmed { depth: 2, required: 6 }.to_string(),
            "Unconfirmed (2 of 6 confirmations)"
        );
        assert_eq!(TxStatus::Confirmed { depth: 9 }.to_string(), "Confirmed (9 confirmations)");
        assert_eq!(
            TxStatus::Immature { matures_in: 20 }.to_string(),
            "Mined balance will be available when it matures in 20 more blocks"
        );
        assert_eq!(TxStatus::OpenUntil { time: 0 }.to_string(), "Open until 1970-01-01 00:00 UTC");
    }
}
