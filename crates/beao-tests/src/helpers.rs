//! Shared helpers for wallet integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use beao_core::address::{Address, Network};
use beao_core::types::*;
use beao_wallet::encryption::KdfParams;
use beao_wallet::keys::Seed;
use beao_wallet::wallet::Clock;
use beao_wallet::{Broadcaster, ChainUpdate, MemoryStore, Wallet, WalletConfig};

/// Unix time all test clocks start at.
pub const T0: u64 = 1_700_000_000;

/// Simple pubkey hash from a seed byte.
pub fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// A testnet address nobody in the test owns.
pub fn foreign(seed: u8) -> Address {
    Address::from_pubkey_hash(pkh(seed), Network::Testnet)
}

/// Coinbase paying `value` to `pubkey_hash`; `lock_time: height` keeps txids
/// distinct per height.
pub fn make_coinbase(value: u64, pubkey_hash: Hash256, height: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::unsigned(OutPoint::null())],
        outputs: vec![TxOutput { value, pubkey_hash }],
        lock_time: height,
    }
}

/// A payment from an outside outpoint identified by `nonce`.
pub fn make_payment(nonce: u8, outputs: Vec<(u64, Hash256)>) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput::unsigned(OutPoint::new(Hash256([nonce; 32]), 0))],
        outputs: outputs.into_iter().map(|(value, pubkey_hash)| TxOutput { value, pubkey_hash }).collect(),
        lock_time: 0,
    }
}

/// Testnet, cheap KDF, small key pool, 1 beo/kB fee, no dust floor.
pub fn test_config() -> WalletConfig {
    WalletConfig {
        network: Network::Testnet,
        keypool_size: 5,
        keypool_low_water: 3,
        pay_tx_fee_per_kb: 1,
        min_relay_fee_per_kb: 1,
        dust_threshold: 1,
        kdf: KdfParams::fast(),
        ..WalletConfig::default()
    }
}

/// Wall clock the test controls.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clock(&self) -> Clock {
        let inner = Arc::clone(&self.0);
        Box::new(move || inner.load(Ordering::SeqCst))
    }
}

/// Broadcaster that records what it accepts and can be switched to reject.
#[derive(Default)]
pub struct SimNet {
    accepted: Mutex<Vec<Transaction>>,
    reject_with: Mutex<Option<String>>,
}

impl SimNet {
    pub fn reject(&self, reason: &str) {
        *self.reject_with.lock() = Some(reason.to_string());
    }

    pub fn accept(&self) {
        *self.reject_with.lock() = None;
    }

    pub fn accepted(&self) -> Vec<Transaction> {
        self.accepted.lock().clone()
    }
}

impl Broadcaster for SimNet {
    fn broadcast(&self, tx: &Transaction) -> Result<(), String> {
        if let Some(reason) = self.reject_with.lock().clone() {
            return Err(reason);
        }
        self.accepted.lock().push(tx.clone());
        Ok(())
    }
}

pub struct TestWallet {
    pub wallet: Wallet,
    pub store: Arc<MemoryStore>,
    pub net: Arc<SimNet>,
    pub clock: ManualClock,
}

pub fn test_wallet() -> TestWallet {
    test_wallet_with(test_config(), [9; 32])
}

pub fn test_wallet_with(config: WalletConfig, seed: [u8; 32]) -> TestWallet {
    let store = Arc::new(MemoryStore::new());
    let net = Arc::new(SimNet::default());
    let clock = ManualClock::new(T0);
    let wallet =
        Wallet::create_with_clock(config, Seed::from_bytes(seed), Arc::clone(&store), Arc::clone(&net), clock.clock())
            .unwrap();
    TestWallet { wallet, store, net, clock }
}

/// Move the tip to `height` with a fresh block time.
pub fn set_tip(wallet: &Wallet, clock: &ManualClock, height: u64) {
    wallet.apply_chain_update(ChainUpdate::Tip { height, block_time: clock.now() }).unwrap();
}

/// Pay each of `values` to a new wallet address in one transaction,
/// included at `height`, and move the tip there.
pub fn fund_many(tw: &TestWallet, nonce: u8, values: &[u64], height: u64) -> Hash256 {
    let to = tw.wallet.generate_address("funding").unwrap();
    let tx = make_payment(nonce, values.iter().map(|v| (*v, to.pubkey_hash())).collect());
    let txid = tx.txid().unwrap();
    tw.wallet.apply_chain_update(ChainUpdate::Transaction(tx)).unwrap();
    tw.wallet.apply_chain_update(ChainUpdate::Included { txid, height }).unwrap();
    set_tip(&tw.wallet, &tw.clock, height);
    txid
}

pub fn fund(tw: &TestWallet, nonce: u8, value: u64) -> Hash256 {
    fund_many(tw, nonce, &[value], 1)
}

/// Coinbase to a new wallet address, included at `height`.
pub fn mine_to_wallet(tw: &TestWallet, value: u64, height: u64) -> Hash256 {
    let to = tw.wallet.generate_address("mined").unwrap();
    let tx = make_coinbase(value, to.pubkey_hash(), height);
    let txid = tx.txid().unwrap();
    tw.wallet.apply_chain_update(ChainUpdate::Transaction(tx)).unwrap();
    tw.wallet.apply_chain_update(ChainUpdate::Included { txid, height }).unwrap();
    set_tip(&tw.wallet, &tw.clock, height);
    txid
}
