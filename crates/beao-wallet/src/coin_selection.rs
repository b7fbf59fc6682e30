//! Coin selection: fewest inputs first, deepest confirmations on ties.
//!
//! The fee grows with the input count, so the selector first finds the
//! smallest `k` for which the `k` largest candidates cover
//! `target + fee(k)`. It then fills the `k` slots walking candidates from
//! deepest to shallowest, taking a coin only if the slots left over can
//! still cover what remains. The result uses the fewest possible inputs and,
//! among those, prefers older coins.

use beao_core::types::{Hash256, OutPoint};

use crate::error::WalletError;

/// A spendable output offered to the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub outpoint: OutPoint,
    pub value: u64,
    pub pubkey_hash: Hash256,
    /// Confirmation depth; 0 for unconfirmed own change.
    pub depth: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub inputs: Vec<Candidate>,
    pub total: u64,
    /// `fee(inputs.len())` as estimated during selection.
    pub fee: u64,
}

pub struct CoinSelector;

impl CoinSelector {
    pub fn select<F>(candidates: &[Candidate], target: u64, fee_for: F) -> Result<Selection, WalletError>
    where
        F: Fn(usize) -> u64,
    {
        let available = candidates.iter().fold(0u64, |acc, c| acc.saturating_add(c.value));
        if target > available || candidates.is_empty() {
            return Err(WalletError::InsufficientFunds { requested: target, available, fee: None });
        }

        let mut by_value: Vec<u64> = candidates.iter().map(|c| c.value).collect();
        by_value.sort_unstable_by(|a, b| b.cmp(a));

        let mut prefix = 0u64;
        let mut slots = None;
        for (i, value) in by_value.iter().enumerate() {
            prefix = prefix.saturating_add(*value);
            if prefix >= target.saturating_add(fee_for(i + 1)) {
                slots = Some(i + 1);
                break;
            }
        }
        let Some(k) = slots else {
            return Err(WalletError::InsufficientFunds {
                requested: target,
                available,
                fee: Some(fee_for(candidates.len())),
            });
        };
        let fee = fee_for(k);

        let mut order: Vec<&Candidate> = candidates.iter().collect();
        order.sort_by(|a, b| {
            b.depth.cmp(&a.depth).then(b.value.cmp(&a.value)).then(a.outpoint.cmp(&b.outpoint))
        });

        let mut need = target.saturating_add(fee);
        let mut left = k;
        let mut inputs = Vec::with_capacity(k);
        for (i, c) in order.iter().enumerate() {
            if left == 0 || need == 0 {
                break;
            }
            let rest = best_of(&order[i + 1..], left - 1);
            if c.value.saturating_add(rest) >= need {
                inputs.push((*c).clone());
                need = need.saturating_sub(c.value);
                left -= 1;
            }
        }

        let total = inputs.iter().map(|c| c.value).sum();
        Ok(Selection { inputs, total, fee })
    }
}

/// Sum of the `n` largest values in `pool`.
fn best_of(pool: &[&Candidate], n: usize) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut values: Vec<u64> = pool.iter().map(|c| c.value).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.iter().take(n).fold(0u64, |acc, v| acc.saturating_add(*v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(id: u8, value: u64, depth: u64) -> Candidate {
        Candidate {
            outpoint: OutPoint::new(Hash256([id; 32]), 0),
            value,
            pubkey_hash: Hash256([0xEE; 32]),
            depth,
        }
    }

    fn values(sel: &Selection) -> Vec<u64> {
        sel.inputs.iter().map(|c| c.value).collect()
    }

    #[test]
    fn single_coin_covers_payment() {
        let sel = CoinSelector::select(&[coin(1, 100, 6)], 40, |_| 1).unwrap();
        assert_eq!(values(&sel), vec![100]);
        assert_eq!(sel.total, 100);
        assert_eq!(sel.fee, 1);
    }

    #[test]
    fn prefers_fewest_inputs_over_depth() {
        let coins = [coin(1, 30, 100), coin(2, 30, 90), coin(3, 70, 1)];
        let sel = CoinSelector::select(&coins, 60, |_| 0).unwrap();
        assert_eq!(values(&sel), vec![70]);
    }

    #[test]
    fn ties_go_to_deeper_coins() {
        let coins = [coin(1, 50, 2), coin(2, 50, 40), coin(3, 50, 10)];
        let sel = CoinSelector::select(&coins, 45, |_| 0).unwrap();
        assert_eq!(sel.inputs[0].depth, 40);
    }

    #[test]
    fn deep_small_coin_is_skipped_when_it_would_strand_the_rest() {
        // Two inputs are required. The deepest coin (10) plus the best
        // remaining (60) cannot reach 100, so it is passed over.
        let coins = [coin(1, 10, 99), coin(2, 60, 50), coin(3, 45, 20), coin(4, 5, 10)];
        let sel = CoinSelector::select(&coins, 100, |_| 0).unwrap();
        assert_eq!(sel.inputs.len(), 2);
        assert_eq!(values(&sel), vec![60, 45]);
    }

    #[test]
    fn fee_growth_can_require_an_extra_input() {
        let coins = [coin(1, 50, 1), coin(2, 50, 1), coin(3, 50, 1)];
        // With fee(k) = 5k, two coins give 100 < 90 + 10.
        let sel = CoinSelector::select(&coins, 91, |k| 5 * k as u64).unwrap();
        assert_eq!(sel.inputs.len(), 3);
        assert_eq!(sel.fee, 15);
    }

    #[test]
    fn insufficient_without_fee() {
        let err = CoinSelector::select(&[coin(1, 100, 1)], 101, |_| 1).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { requested: 101, available: 100, fee: None });
    }

    #[test]
    fn insufficient_only_because_of_fee() {
        let err = CoinSelector::select(&[coin(1, 100, 1)], 100, |_| 1).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { requested: 100, available: 100, fee: Some(1) });
    }

    #[test]
    fn empty_candidates() {
        assert!(matches!(
            CoinSelector::select(&[], 1, |_| 0),
            Err(WalletError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn selection_never_repeats_an_outpoint() {
        let coins: Vec<_> = (0..20).map(|i| coin(i, 10 + i as u64, i as u64)).collect();
        let sel = CoinSelector::select(&coins, 150, |k| k as u64).unwrap();
        let mut ids: Vec<_> = sel.inputs.iter().map(|c| c.outpoint).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), sel.inputs.len());
        assert!(sel.total >= 150 + sel.fee);
    }
}
