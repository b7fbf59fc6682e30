//! Protocol constants. Monetary values are in beos (1 BEAO = 10^8 beos).

pub const COIN: u64 = 100_000_000;

/// Smallest unit with a name: 1 CENT = 10^6 beos.
pub const CENT: u64 = 1_000_000;

/// Blocks a coinbase output must wait before it can be spent.
pub const COINBASE_MATURITY: u64 = 120;

/// Lock times below this value are block heights, at or above it unix time.
pub const LOCKTIME_THRESHOLD: u64 = 500_000_000;

/// Target seconds between blocks.
pub const TARGET_BLOCK_INTERVAL_SECS: u64 = 150;

/// Transactions up to this size relay without the minimum relay fee.
pub const FREE_RELAY_MAX_SIZE: usize = 10_000;

pub const DEFAULT_TX_FEE_PER_KB: u64 = CENT;

pub const MIN_RELAY_FEE_PER_KB: u64 = CENT / 2;

pub const DUST_THRESHOLD: u64 = CENT / 100;

pub const TX_VERSION: u64 = 1;

pub const MAX_MONEY: u64 = 84_000_000 * COIN;

pub fn money_range(value: u64) -> bool {
    value <= MAX_MONEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_consistent() {
        assert_eq!(COIN / CENT, 100);
        assert!(DUST_THRESHOLD < MIN_RELAY_FEE_PER_KB);
        assert!(MIN_RELAY_FEE_PER_KB < DEFAULT_TX_FEE_PER_KB);
    }

    #[test]
    fn money_range_bounds() {
        assert!(money_range(0));
        assert!(money_range(MAX_MONEY));
        assert!(!money_range(MAX_MONEY + 1));
    }
}
