//! Hard-coded block checkpoints.
//!
//! Mainnet pins a handful of historical block hashes. The highest pinned
//! height is also a lower bound on the chain length, which the wallet uses
//! as its estimate of the total block count before peers report one.
//! Testnet has no checkpoints.

use crate::address::Network;

const MAINNET: &[(u64, &str)] = &[
    (0, "ca6228129efc24e9ddc80de984e46d1eb01bdff08bc5d2da15d8392da826ed2c"),
    (9, "db91faa7d06b2ef2c95f8d79a1c841d25ec875b0a29a1d7b8e85e21b954d41d0"),
    (99, "a30750e70999a6fd776c97625006625b04ffd37b9727bde60724537a3a57c3f7"),
    (999, "058f08095d567f63dd7f60d0d1ecf6a399756f74323cddbe918e109a96f6d094"),
    (7999, "c0d9bca06fc7c5c0739c7f5f8cf84336987264a22d25cf3a54fe07fb70af71ac"),
    (30000, "772d0d3e979da89d859f72000c77c607919761c7e962b6fe2ce9f6489a37f689"),
    (59500, "67b8cd3ea0a1984b10c959423fcda66d315471b263b185f1d2544345b18594e6"),
];

fn table(network: Network) -> &'static [(u64, &'static str)] {
    match network {
        Network::Mainnet => MAINNET,
        Network::Testnet => &[],
    }
}

/// Height of the highest checkpoint, or 0 when there are none.
pub fn total_blocks_estimate(network: Network) -> u64 {
    table(network).last().map_or(0, |&(h, _)| h)
}
