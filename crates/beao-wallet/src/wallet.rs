//! The wallet facade.
//!
//! [`Wallet`] owns one key store, one ledger and one chain tracker and
//! enforces the locking discipline between them:
//!
//! - spends are serialized by a spend mutex held from coin selection until
//!   the ledger commit;
//! - the key store and ledger sit behind separate `RwLock`s, always taken in
//!   the order keys then ledger;
//! - the chain tracker has its own lock and never holds it while calling out.
//!
//! Reads (balance, history, status) only take read locks, and a spend drops
//! its key and ledger guards while the broadcaster runs.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use beao_core::address::{Address, Network};
use beao_core::types::{Hash256, Transaction};

use crate::address_book::AddressBookEntry;
use crate::builder::{FeePolicy, Recipient, TransactionBuilder};
use crate::chain_sync::{BlockAge, ChainSyncTracker, SyncPhase};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::keys::Seed;
use crate::keystore::{KeyStore, LockState};
use crate::ledger::{Balance, Ledger, TxKind};
use crate::message::{self, MessageSignature};
use crate::mining::{MiningConfig, MiningStatus};
use crate::status::TxStatus;
use crate::store::{WalletRecord, WalletStore};

/// Source of Unix time in seconds.
pub type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Box::new(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    })
}

/// Hands a signed transaction to the network.
pub trait Broadcaster: Send + Sync {
    /// `Err` carries the rejection reason.
    fn broadcast(&self, tx: &Transaction) -> Result<(), String>;
}

impl<T: Broadcaster + ?Sized> Broadcaster for Arc<T> {
    fn broadcast(&self, tx: &Transaction) -> Result<(), String> {
        (**self).broadcast(tx)
    }
}

/// Events pushed by the chain collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainUpdate {
    Tip { height: u64, block_time: u64 },
    EstimatedTotal(u64),
    Included { txid: Hash256, height: u64 },
    /// The including block was disconnected.
    Orphaned { txid: Hash256 },
    PeerAck { txid: Hash256 },
    /// A transaction seen in a block or the mempool.
    Transaction(Transaction),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Pay exactly this fee. Counts as confirming it.
    pub fee_override: Option<u64>,
    /// Accept the computed fee for a transaction above the free-relay size.
    pub confirm_fee: bool,
    pub lock_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSummary {
    pub txid: Hash256,
    pub kind: TxKind,
    pub net: i64,
    pub fee: u64,
    pub received_at: u64,
    pub depth: u64,
    pub status: TxStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub height: u64,
    pub estimated_total: u64,
    pub blocks_remaining: u64,
    /// In `[0, 1]`.
    pub progress: f64,
    pub last_block_age: Option<BlockAge>,
}

struct WalletInner {
    config: WalletConfig,
    store: Box<dyn WalletStore>,
    broadcaster: Box<dyn Broadcaster>,
    clock: Clock,
    spend: Mutex<()>,
    keys: RwLock<KeyStore>,
    ledger: RwLock<Ledger>,
    chain: ChainSyncTracker,
    pay_tx_fee: AtomicU64,
    mining: RwLock<MiningStatus>,
}

impl WalletInner {
    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn record(&self, keys: &KeyStore, ledger: &Ledger) -> WalletRecord {
        WalletRecord {
            keystore: keys.to_record(),
            ledger: ledger.to_record(),
            pay_tx_fee_per_kb: self.pay_tx_fee.load(Ordering::SeqCst),
        }
    }

    fn persist(&self, keys: &KeyStore, ledger: &Ledger) -> Result<(), WalletError> {
        self.store.save(&self.record(keys, ledger)).inspect_err(|e| {
            warn!(error = %e, "failed to persist wallet");
        })
    }

    /// Apply `f` to the key store and save. The store is restored if the
    /// save fails.
    fn mutate_keys<T, F>(&self, f: F) -> Result<T, WalletError>
    where
        F: FnOnce(&mut KeyStore) -> Result<T, WalletError>,
    {
        let mut keys = self.keys.write();
        keys.lock_if_expired();
        let snapshot = keys.clone();
        let out = f(&mut keys)?;
        let ledger = self.ledger.read();
        if let Err(e) = self.persist(&keys, &ledger) {
            *keys = snapshot;
            return Err(e);
        }
        Ok(out)
    }

    /// Same as [`mutate_keys`](Self::mutate_keys) for the ledger.
    fn mutate_ledger<T, F>(&self, f: F) -> Result<T, WalletError>
    where
        F: FnOnce(&KeyStore, &mut Ledger) -> Result<(T, bool), WalletError>,
    {
        let keys = self.keys.read();
        let mut ledger = self.ledger.write();
        let snapshot = ledger.clone();
        let (out, changed) = f(&keys, &mut ledger)?;
        if changed {
            if let Err(e) = self.persist(&keys, &ledger) {
                *ledger = snapshot;
                return Err(e);
            }
        }
        Ok(out)
    }
}

/// A single logical wallet. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Wallet {
    inner: Arc<WalletInner>,
}

impl Wallet {
    /// Load the wallet from `store`, or create one with a fresh random seed
    /// if the store is empty.
    pub fn open(
        config: WalletConfig,
        store: impl WalletStore + 'static,
        broadcaster: impl Broadcaster + 'static,
    ) -> Result<Self, WalletError> {
        Self::open_with_clock(config, store, broadcaster, system_clock())
    }

    pub fn open_with_clock(
        config: WalletConfig,
        store: impl WalletStore + 'static,
        broadcaster: impl Broadcaster + 'static,
        clock: Clock,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        match store.load()? {
            Some(record) => Self::from_record(config, record, Box::new(store), Box::new(broadcaster), clock),
            None => {
                info!(network = %config.network, "no wallet found, creating a new one");
                Self::create_with_clock(config, Seed::generate(), store, broadcaster, clock)
            }
        }
    }

    /// A new wallet from `seed`, saved immediately. Fails if `store` already
    /// holds a wallet.
    pub fn create(
        config: WalletConfig,
        seed: Seed,
        store: impl WalletStore + 'static,
        broadcaster: impl Broadcaster + 'static,
    ) -> Result<Self, WalletError> {
        Self::create_with_clock(config, seed, store, broadcaster, system_clock())
    }

    pub fn create_with_clock(
        config: WalletConfig,
        seed: Seed,
        store: impl WalletStore + 'static,
        broadcaster: impl Broadcaster + 'static,
        clock: Clock,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        if store.load()?.is_some() {
            return Err(WalletError::Persistence("a wallet already exists in this store".into()));
        }
        let keys = KeyStore::new(seed, config.network, config.pool_settings(), config.kdf);
        let wallet = Self::assemble(config, keys, Ledger::new(), None, Box::new(store), Box::new(broadcaster), clock);
        {
            let keys = wallet.inner.keys.read();
            let ledger = wallet.inner.ledger.read();
            wallet.inner.persist(&keys, &ledger)?;
        }
        info!(network = %wallet.inner.config.network, "wallet created");
        Ok(wallet)
    }

    fn from_record(
        config: WalletConfig,
        record: WalletRecord,
        store: Box<dyn WalletStore>,
        broadcaster: Box<dyn Broadcaster>,
        clock: Clock,
    ) -> Result<Self, WalletError> {
        if record.keystore.network != config.network {
            return Err(WalletError::InvalidConfig(format!(
                "wallet file is for {}, configured network is {}",
                record.keystore.network, config.network
            )));
        }
        let keys = KeyStore::from_record(record.keystore, config.pool_settings(), config.kdf)?;
        let ledger = Ledger::from_record(record.ledger)?;
        info!(
            network = %config.network,
            transactions = ledger.len(),
            encrypted = keys.is_encrypted(),
            "wallet loaded"
        );
        Ok(Self::assemble(config, keys, ledger, Some(record.pay_tx_fee_per_kb), store, broadcaster, clock))
    }

    fn assemble(
        config: WalletConfig,
        keys: KeyStore,
        ledger: Ledger,
        pay_tx_fee: Option<u64>,
        store: Box<dyn WalletStore>,
        broadcaster: Box<dyn Broadcaster>,
        clock: Clock,
    ) -> Self {
        let chain = ChainSyncTracker::new(config.network, config.sync_settings());
        let mining = MiningStatus::new(config.mining.clone());
        let pay_tx_fee = pay_tx_fee.unwrap_or(config.pay_tx_fee_per_kb);
        Self {
            inner: Arc::new(WalletInner {
                config,
                store,
                broadcaster,
                clock,
                spend: Mutex::new(()),
                keys: RwLock::new(keys),
                ledger: RwLock::new(ledger),
                chain,
                pay_tx_fee: AtomicU64::new(pay_tx_fee),
                mining: RwLock::new(mining),
            }),
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    pub fn network(&self) -> Network {
        self.inner.config.network
    }

    /// Decode an address and check it belongs to this wallet's network.
    pub fn parse_address(&self, s: &str) -> Result<Address, WalletError> {
        Address::decode_for(s, self.network()).map_err(|e| WalletError::InvalidAddress(format!("{s}: {e}")))
    }

    // --- keys and address book ---

    pub fn generate_address(&self, label: &str) -> Result<Address, WalletError> {
        self.inner.mutate_keys(|keys| keys.generate_key(label))
    }

    pub fn import_sending_address(&self, address: Address, label: &str) -> Result<(), WalletError> {
        self.inner.mutate_keys(|keys| keys.import_sending_address(address, label))
    }

    pub fn set_label(&self, address: &Address, label: &str) -> Result<(), WalletError> {
        self.inner.mutate_keys(|keys| keys.set_label(address, label))
    }

    pub fn delete_sending_address(&self, address: &Address) -> Result<(), WalletError> {
        self.inner.mutate_keys(|keys| keys.delete_sending_address(address))
    }

    pub fn address_book(&self) -> Vec<AddressBookEntry> {
        self.inner.keys.read().entries()
    }

    pub fn keypool_size(&self) -> usize {
        self.inner.keys.read().keypool_size()
    }

    pub fn top_up_keypool(&self) -> Result<usize, WalletError> {
        self.inner.mutate_keys(|keys| keys.top_up_keypool())
    }

    // --- encryption and locking ---

    pub fn lock_state(&self) -> LockState {
        self.inner.keys.read().lock_state()
    }

    pub fn encrypt(&self, passphrase: &str) -> Result<(), WalletError> {
        self.inner.mutate_keys(|keys| keys.encrypt(passphrase))
    }

    pub fn change_passphrase(&self, old: &str, new: &str) -> Result<(), WalletError> {
        self.inner.mutate_keys(|keys| keys.change_passphrase(old, new))
    }

    /// Remove the passphrase.
    pub fn decrypt(&self, passphrase: &str) -> Result<(), WalletError> {
        self.inner.mutate_keys(|keys| keys.decrypt_wallet(passphrase))
    }

    pub fn lock(&self) -> Result<(), WalletError> {
        self.inner.keys.write().lock()
    }

    /// Unlock until `duration` elapses, or until [`lock`](Self::lock) when
    /// `None`. A relock thread fires at the deadline; every access also
    /// checks expiry on its own.
    pub fn unlock(&self, passphrase: &str, duration: Option<Duration>) -> Result<(), WalletError> {
        let generation = {
            let mut keys = self.inner.keys.write();
            let generation = keys.unlock(passphrase, duration)?;
            let added = keys.top_up_keypool()?;
            if added > 0 {
                let ledger = self.inner.ledger.read();
                if let Err(e) = self.inner.persist(&keys, &ledger) {
                    warn!(error = %e, added, "key pool top-up not saved");
                }
            }
            generation
        };
        if let Some(duration) = duration {
            self.schedule_relock(generation, duration);
        }
        Ok(())
    }

    fn schedule_relock(&self, generation: u64, duration: Duration) {
        let weak: Weak<WalletInner> = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new().name("beao-relock".into()).spawn(move || {
            thread::sleep(duration);
            if let Some(inner) = weak.upgrade() {
                inner.keys.write().relock(generation);
            }
        });
        if let Err(e) = spawned {
            warn!(error = %e, "could not start relock thread; expiry is checked on access");
        }
    }

    // --- spending ---

    pub fn pay_tx_fee(&self) -> u64 {
        self.inner.pay_tx_fee.load(Ordering::SeqCst)
    }

    pub fn set_pay_tx_fee(&self, fee_per_kb: u64) -> Result<(), WalletError> {
        if fee_per_kb > beao_core::constants::MAX_MONEY {
            return Err(WalletError::InvalidAmount(format!("fee rate {fee_per_kb}")));
        }
        let keys = self.inner.keys.read();
        let ledger = self.inner.ledger.read();
        let previous = self.inner.pay_tx_fee.swap(fee_per_kb, Ordering::SeqCst);
        if let Err(e) = self.inner.persist(&keys, &ledger) {
            self.inner.pay_tx_fee.store(previous, Ordering::SeqCst);
            return Err(e);
        }
        info!(fee_per_kb, "transaction fee rate set");
        Ok(())
    }

    fn fee_policy(&self) -> FeePolicy {
        FeePolicy { fee_per_kb: self.pay_tx_fee(), ..self.inner.config.fee_policy() }
    }

    /// Select, build, sign, broadcast and commit a payment.
    ///
    /// The spend is committed and saved before it is broadcast. If signing
    /// or saving fails, reservations and the change key are released. If the
    /// network rejects it, the commit is undone unless a block already
    /// includes it.
    pub fn send(&self, recipients: Vec<Recipient>, options: SendOptions) -> Result<Hash256, WalletError> {
        let inner = &self.inner;
        for r in &recipients {
            if r.address.network() != self.network() {
                return Err(WalletError::InvalidAddress(format!("{} is not a {} address", r.address, self.network())));
            }
        }
        let mut builder = TransactionBuilder::new(self.fee_policy());
        builder
            .add_recipients(recipients)
            .fee_override(options.fee_override)
            .confirm_fee(options.confirm_fee)
            .lock_time(options.lock_time);
        builder.check_recipients()?;

        let _spend = inner.spend.lock();
        let mut keys = inner.keys.write();
        keys.lock_if_expired();
        let capability = keys.unlocked_keys()?;
        let mut ledger = inner.ledger.write();

        let tip = inner.chain.height();
        let candidates = ledger.spendable(tip, inner.config.coinbase_maturity, inner.config.spend_zero_conf_change);
        let change_key = keys.reserve_change_key()?;

        let pending = match builder.build(&candidates, change_key.pubkey_hash) {
            Ok(p) => p,
            Err(e) => {
                keys.return_key(change_key);
                return Err(e);
            }
        };
        let outpoints = pending.outpoints();
        if let Err(e) = ledger.reserve(&outpoints) {
            keys.return_key(change_key);
            return Err(e);
        }

        let signed = TransactionBuilder::sign(&pending, |pkh| {
            let record = keys
                .record(pkh)
                .ok_or_else(|| WalletError::NoKey(Address::from_pubkey_hash(*pkh, keys.network()).to_string()))?;
            capability
                .keypair(&record)
                .ok_or_else(|| WalletError::NoKey(record.address(keys.network()).to_string()))
        })
        .and_then(|tx| {
            TransactionBuilder::verify_signed(&pending, &tx)?;
            let txid = tx.txid()?;
            Ok((tx, txid))
        });
        let (tx, txid) = match signed {
            Ok(v) => v,
            Err(e) => {
                ledger.release(&outpoints);
                keys.return_key(change_key);
                warn!(error = %e, "spend aborted, reservations released");
                return Err(e);
            }
        };
        drop(capability);

        // Chain events for this tx can arrive while the broadcast runs, so the
        // spend and its change key must already be recorded.
        let now = inner.now();
        if pending.change.is_some() {
            keys.issue_key(change_key);
        } else {
            keys.return_key(change_key);
        }
        if let Err(e) = ledger.commit(tx.clone(), now, |h| keys.is_mine(h)) {
            ledger.release(&outpoints);
            keys.return_key(change_key);
            return Err(e);
        }
        if let Err(e) = inner.persist(&keys, &ledger) {
            if let Err(undo) = ledger.remove_transaction(&txid) {
                warn!(%txid, error = %undo, "could not undo unsaved spend");
            }
            keys.return_key(change_key);
            return Err(e);
        }
        drop(ledger);
        drop(keys);

        if let Err(reason) = inner.broadcaster.broadcast(&tx) {
            let mut keys = inner.keys.write();
            let mut ledger = inner.ledger.write();
            if ledger.get(&txid).is_some_and(|wtx| wtx.included_at.is_some()) {
                warn!(%txid, %reason, "broadcast rejected but transaction is already in a block");
                return Ok(txid);
            }
            match ledger.remove_transaction(&txid) {
                Ok(_) if pending.change.is_some() => keys.return_key(change_key),
                Ok(_) => {}
                Err(e) => warn!(%txid, error = %e, "rejected transaction left in ledger"),
            }
            if let Err(e) = inner.persist(&keys, &ledger) {
                warn!(%txid, error = %e, "failed to save rollback of rejected transaction");
            }
            warn!(%txid, %reason, "transaction rejected by network");
            return Err(WalletError::TransactionRejected(reason));
        }

        info!(
            %txid,
            inputs = outpoints.len(),
            sent = pending.total_sent(),
            fee = pending.fee,
            "transaction sent"
        );
        if pending.change.is_some() {
            let mut keys = inner.keys.write();
            let ledger = inner.ledger.read();
            keys.keep_key(change_key);
            if let Err(e) = inner.persist(&keys, &ledger) {
                warn!(%txid, error = %e, "failed to save refilled keypool");
            }
        }
        Ok(txid)
    }

    // --- messages ---

    pub fn sign_message(&self, address: &Address, message: &str) -> Result<String, WalletError> {
        let keys = self.inner.keys.read();
        let keypair = keys.keypair(&address.pubkey_hash())?;
        Ok(MessageSignature::sign(&keypair, message).to_string())
    }

    pub fn verify_message(&self, address: &Address, message: &str, signature: &str) -> Result<bool, WalletError> {
        message::verify_message(address, message, signature)
    }

    /// The signer's address and, if it is in the address book, its label.
    pub fn recover_signer(
        &self,
        message: &str,
        signature: &str,
    ) -> Result<Option<(Address, Option<String>)>, WalletError> {
        let Some(address) = message::recover_address(message, signature, self.network())? else {
            return Ok(None);
        };
        let label = self.inner.keys.read().address_book_entry(&address).map(|e| e.label.clone());
        Ok(Some((address, label)))
    }

    // --- chain updates ---

    pub fn apply_chain_update(&self, update: ChainUpdate) -> Result<(), WalletError> {
        let inner = &self.inner;
        let now = inner.now();
        match update {
            ChainUpdate::Tip { height, block_time } => {
                inner.chain.set_tip(height, block_time, now);
            }
            ChainUpdate::EstimatedTotal(total) => {
                inner.chain.set_estimated_total(total, now);
            }
            ChainUpdate::Included { txid, height } => inner.mutate_ledger(|_, ledger| {
                if ledger.get(&txid).is_none() {
                    return Ok(((), false));
                }
                ledger.confirm(&txid, height)?;
                debug!(%txid, height, "transaction included");
                Ok(((), true))
            })?,
            ChainUpdate::Orphaned { txid } => inner.mutate_ledger(|_, ledger| {
                if ledger.get(&txid).is_none() {
                    return Ok(((), false));
                }
                ledger.unconfirm(&txid)?;
                Ok(((), true))
            })?,
            ChainUpdate::PeerAck { txid } => {
                let mut ledger = inner.ledger.write();
                if ledger.get(&txid).is_some() {
                    ledger.note_peer_ack(&txid)?;
                }
            }
            ChainUpdate::Transaction(tx) => inner.mutate_ledger(|keys, ledger| {
                let added = ledger.get(&tx.txid()?).is_none();
                let relevant = ledger.add_transaction(tx, now, |h| keys.is_mine(h))?;
                Ok(((), added && relevant.is_some()))
            })?,
        }
        Ok(())
    }

    pub fn refresh_sync(&self) -> SyncPhase {
        self.inner.chain.refresh(self.inner.now())
    }

    // --- queries ---

    pub fn balance(&self) -> Balance {
        let tip = self.inner.chain.height();
        self.inner.ledger.read().balance(tip, self.inner.config.coinbase_maturity)
    }

    pub fn transaction_status(&self, txid: &Hash256) -> Result<TxStatus, WalletError> {
        let chain = self.inner.chain.snapshot();
        let ledger = self.inner.ledger.read();
        let wtx = ledger.get(txid).ok_or_else(|| WalletError::UnknownTransaction(txid.to_string()))?;
        Ok(TxStatus::classify(wtx, &chain, &self.inner.config.status_settings(), self.inner.now()))
    }

    /// Newest first.
    pub fn transactions(&self) -> Vec<TxSummary> {
        let chain = self.inner.chain.snapshot();
        let settings = self.inner.config.status_settings();
        let now = self.inner.now();
        let ledger = self.inner.ledger.read();
        ledger
            .transactions()
            .into_iter()
            .map(|wtx| TxSummary {
                txid: wtx.txid,
                kind: wtx.kind,
                net: wtx.net(),
                fee: wtx.fee,
                received_at: wtx.received_at,
                depth: wtx.depth(chain.height),
                status: TxStatus::classify(wtx, &chain, &settings, now),
            })
            .collect()
    }

    pub fn sync_progress(&self) -> SyncProgress {
        let state = self.inner.chain.snapshot();
        SyncProgress {
            phase: state.phase,
            height: state.height,
            estimated_total: state.estimated_total(),
            blocks_remaining: state.blocks_remaining(),
            progress: state.progress(),
            last_block_age: state.last_block_age(self.inner.now()),
        }
    }

    // --- mining ---

    pub fn mining_status(&self) -> MiningStatus {
        self.inner.mining.read().clone()
    }

    pub fn set_mining_config(&self, config: MiningConfig) -> Result<(), WalletError> {
        config.validate()?;
        let mut mining = self.inner.mining.write();
        *mining = MiningStatus::new(config);
        Ok(())
    }

    pub fn report_hash_rate(&self, hashes_per_sec: f64) {
        self.inner.mining.write().report(hashes_per_sec);
    }

    // --- persistence ---

    /// Flush the current state.
    pub fn save(&self) -> Result<(), WalletError> {
        let keys = self.inner.keys.read();
        let ledger = self.inner.ledger.read();
        self.inner.persist(&keys, &ledger)
    }

    pub fn backup(&self, destination: &Path) -> Result<(), WalletError> {
        let keys = self.inner.keys.read();
        let ledger = self.inner.ledger.read();
        self.inner.store.backup(&self.inner.record(&keys, &ledger), destination)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network())
            .field("lock_state", &self.lock_state())
            .field("transactions", &self.inner.ledger.read().len())
            .finish_non_exhaustive()
    }
}
