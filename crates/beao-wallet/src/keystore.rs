//! Key custody: the master secret, the key pool, issued keys, the address
//! book and the lock state.
//!
//! Keys are never stored individually. Pool and issued keys are kept as
//! `(index, pubkey_hash)` records, so ownership checks work while the wallet
//! is locked; secrets are derived from the seed only while it is available.
//!
//! While unlocked the decrypted seed lives in an `Arc<UnlockedKeys>`. A
//! signer clones that `Arc` and releases the store, so a relock that fires
//! mid-signature only stops *new* signatures.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use beao_core::address::{Address, Network};
use beao_core::crypto::KeyPair;
use beao_core::types::Hash256;

use crate::address_book::{AddressBook, AddressBookEntry, EntryKind};
use crate::encryption::{self, KdfParams};
use crate::error::WalletError;
use crate::keys::{KeyRecord, Seed, UnlockedKeys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unencrypted,
    Locked,
    /// `until` is `None` for an unlock without timeout.
    Unlocked { until: Option<Instant> },
}

#[derive(Debug, Clone, Copy)]
pub struct KeyPoolSettings {
    pub target: usize,
    pub low_water: usize,
}

#[derive(Clone)]
enum Secret {
    Plain(Seed),
    Encrypted { ciphertext: Vec<u8>, kdf: KdfParams },
}

#[derive(Clone)]
pub struct KeyStore {
    network: Network,
    pool_settings: KeyPoolSettings,
    kdf: KdfParams,
    secret: Secret,
    unlocked: Option<Arc<UnlockedKeys>>,
    unlocked_until: Option<Instant>,
    generation: u64,
    ever_encrypted: bool,
    next_index: u32,
    pool: VecDeque<KeyRecord>,
    issued: HashMap<Hash256, KeyRecord>,
    book: AddressBook,
}

impl KeyStore {
    /// A fresh, unencrypted store with a full key pool.
    pub fn new(seed: Seed, network: Network, pool_settings: KeyPoolSettings, kdf: KdfParams) -> Self {
        let keys = Arc::new(UnlockedKeys::new(seed.clone()));
        let mut store = Self {
            network,
            pool_settings,
            kdf,
            secret: Secret::Plain(seed),
            unlocked: Some(Arc::clone(&keys)),
            unlocked_until: None,
            generation: 0,
            ever_encrypted: false,
            next_index: 0,
            pool: VecDeque::new(),
            issued: HashMap::new(),
            book: AddressBook::default(),
        };
        store.fill_pool(&keys);
        store
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.secret, Secret::Encrypted { .. })
    }

    /// True once the store has ever been encrypted; the file format never
    /// goes back to the unencrypted version after that.
    pub fn ever_encrypted(&self) -> bool {
        self.ever_encrypted
    }

    pub fn lock_state(&self) -> LockState {
        if !self.is_encrypted() {
            return LockState::Unencrypted;
        }
        match &self.unlocked {
            Some(_) if !self.expired() => LockState::Unlocked { until: self.unlocked_until },
            _ => LockState::Locked,
        }
    }

    fn expired(&self) -> bool {
        self.unlocked_until.is_some_and(|t| Instant::now() >= t)
    }

    /// The signing capability, or `Locked`.
    pub fn unlocked_keys(&self) -> Result<Arc<UnlockedKeys>, WalletError> {
        match &self.unlocked {
            Some(keys) if !self.expired() => Ok(Arc::clone(keys)),
            _ => Err(WalletError::Locked),
        }
    }

    // --- key pool ---

    pub fn keypool_size(&self) -> usize {
        self.pool.len()
    }

    fn fill_pool(&mut self, keys: &UnlockedKeys) -> usize {
        let mut added = 0;
        while self.pool.len() < self.pool_settings.target {
            self.pool.push_back(KeyRecord::derive(keys.seed(), self.next_index));
            self.next_index = self.next_index.saturating_add(1);
            added += 1;
        }
        if added > 0 {
            debug!(added, size = self.pool.len(), "key pool topped up");
        }
        added
    }

    /// Refill the pool to its target size. Needs the seed.
    pub fn top_up_keypool(&mut self) -> Result<usize, WalletError> {
        let keys = self.unlocked_keys()?;
        Ok(self.fill_pool(&keys))
    }

    fn replenish(&mut self, keys: &UnlockedKeys) {
        if self.pool.len() < self.pool_settings.low_water.max(1) {
            self.fill_pool(keys);
        }
    }

    fn draw(&mut self, keys: &UnlockedKeys) -> KeyRecord {
        match self.pool.pop_front() {
            Some(record) => record,
            None => {
                let record = KeyRecord::derive(keys.seed(), self.next_index);
                self.next_index = self.next_index.saturating_add(1);
                record
            }
        }
    }

    /// Take a key for a change output. It is not entered in the address
    /// book; pass it to [`issue_key`](Self::issue_key) when the spend
    /// commits or [`return_key`](Self::return_key) if it is abandoned.
    pub fn reserve_change_key(&mut self) -> Result<KeyRecord, WalletError> {
        let keys = self.unlocked_keys()?;
        Ok(self.draw(&keys))
    }

    /// Mark a drawn key as in use without refilling the pool.
    pub fn issue_key(&mut self, record: KeyRecord) {
        self.issued.insert(record.pubkey_hash, record);
    }

    /// [`issue_key`](Self::issue_key), then refill the pool if it ran low.
    pub fn keep_key(&mut self, record: KeyRecord) {
        self.issue_key(record);
        if let Ok(keys) = self.unlocked_keys() {
            self.replenish(&keys);
        }
    }

    /// Put a drawn key back at the front of the pool, withdrawing it from
    /// use if it was issued.
    pub fn return_key(&mut self, record: KeyRecord) {
        self.issued.remove(&record.pubkey_hash);
        if !self.pool.contains(&record) {
            self.pool.push_front(record);
        }
    }

    // --- address book ---

    /// Issue a new receiving address from the pool.
    pub fn generate_key(&mut self, label: &str) -> Result<Address, WalletError> {
        let keys = self.unlocked_keys()?;
        let (record, address) = loop {
            let record = self.draw(&keys);
            self.issued.insert(record.pubkey_hash, record);
            let address = record.address(self.network);
            if !self.book.contains(&address) {
                break (record, address);
            }
        };
        self.book.insert(address.clone(), label, EntryKind::Receiving)?;
        self.replenish(&keys);
        info!(%address, index = record.index, "generated receiving address");
        Ok(address)
    }

    pub fn import_sending_address(&mut self, address: Address, label: &str) -> Result<(), WalletError> {
        if address.network() != self.network {
            return Err(WalletError::InvalidAddress(format!("{address} is not a {} address", self.network)));
        }
        if self.is_mine(&address.pubkey_hash()) {
            return Err(WalletError::DuplicateAddress(address.to_string()));
        }
        self.book.insert(address.clone(), label, EntryKind::Sending)?;
        debug!(%address, "imported sending address");
        Ok(())
    }

    pub fn set_label(&mut self, address: &Address, label: &str) -> Result<(), WalletError> {
        self.book.set_label(address, label)
    }

    pub fn delete_sending_address(&mut self, address: &Address) -> Result<(), WalletError> {
        self.book.remove_sending(address).map(|_| ())
    }

    pub fn entries(&self) -> Vec<AddressBookEntry> {
        self.book.entries()
    }

    pub fn address_book_entry(&self, address: &Address) -> Option<&AddressBookEntry> {
        self.book.get(address)
    }

    pub fn is_mine(&self, pubkey_hash: &Hash256) -> bool {
        self.issued.contains_key(pubkey_hash) || self.pool.iter().any(|r| r.pubkey_hash == *pubkey_hash)
    }

    pub fn record(&self, pubkey_hash: &Hash256) -> Option<KeyRecord> {
        self.issued
            .get(pubkey_hash)
            .copied()
            .or_else(|| self.pool.iter().find(|r| r.pubkey_hash == *pubkey_hash).copied())
    }

    // --- signing ---

    /// The capability and record needed to sign for `pubkey_hash`.
    pub fn signing_key(&self, pubkey_hash: &Hash256) -> Result<(Arc<UnlockedKeys>, KeyRecord), WalletError> {
        let record = self.record(pubkey_hash).ok_or_else(|| {
            WalletError::NoKey(Address::from_pubkey_hash(*pubkey_hash, self.network).to_string())
        })?;
        Ok((self.unlocked_keys()?, record))
    }

    pub fn keypair(&self, pubkey_hash: &Hash256) -> Result<KeyPair, WalletError> {
        let (keys, record) = self.signing_key(pubkey_hash)?;
        keys.keypair(&record)
            .ok_or_else(|| WalletError::NoKey(record.address(self.network).to_string()))
    }

    pub fn sign(&self, address: &Address, digest: &[u8]) -> Result<[u8; 64], WalletError> {
        Ok(self.keypair(&address.pubkey_hash())?.sign(digest))
    }

    // --- encryption ---

    pub fn encrypt(&mut self, passphrase: &str) -> Result<(), WalletError> {
        let Secret::Plain(seed) = &self.secret else {
            return Err(WalletError::AlreadyEncrypted);
        };
        if passphrase.is_empty() {
            return Err(WalletError::Encryption("passphrase must not be empty".into()));
        }
        let ciphertext = encryption::encrypt(seed.as_bytes(), passphrase.as_bytes(), &self.kdf)?;
        self.secret = Secret::Encrypted { ciphertext, kdf: self.kdf };
        self.ever_encrypted = true;
        self.drop_keys();
        info!("wallet encrypted");
        Ok(())
    }

    fn decrypt_seed(&self, passphrase: &str) -> Result<Seed, WalletError> {
        let Secret::Encrypted { ciphertext, kdf } = &self.secret else {
            return Err(WalletError::NotEncrypted);
        };
        let plain = encryption::decrypt(ciphertext, passphrase.as_bytes(), kdf)?;
        Seed::from_slice(&plain)
    }

    /// Returns the unlock generation, used to match a delayed relock to
    /// the unlock that scheduled it.
    pub fn unlock(&mut self, passphrase: &str, duration: Option<Duration>) -> Result<u64, WalletError> {
        let until = match duration {
            Some(d) => Some(Instant::now().checked_add(d).ok_or_else(|| {
                WalletError::InvalidConfig(format!("unlock duration of {}s is out of range", d.as_secs()))
            })?),
            None => None,
        };
        let seed = self.decrypt_seed(passphrase)?;
        self.unlocked = Some(Arc::new(UnlockedKeys::new(seed)));
        self.unlocked_until = until;
        self.generation = self.generation.wrapping_add(1);
        info!(timeout_secs = duration.map(|d| d.as_secs()), "wallet unlocked");
        Ok(self.generation)
    }

    pub fn lock(&mut self) -> Result<(), WalletError> {
        if !self.is_encrypted() {
            return Err(WalletError::NotEncrypted);
        }
        self.drop_keys();
        info!("wallet locked");
        Ok(())
    }

    fn drop_keys(&mut self) {
        self.unlocked = None;
        self.unlocked_until = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Lock if `generation` is still the current unlock.
    pub fn relock(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.unlocked.is_none() || !self.is_encrypted() {
            return false;
        }
        self.drop_keys();
        info!("unlock timeout reached, wallet relocked");
        true
    }

    pub fn lock_if_expired(&mut self) -> bool {
        if self.is_encrypted() && self.unlocked.is_some() && self.expired() {
            self.drop_keys();
            info!("unlock timeout reached, wallet relocked");
            return true;
        }
        false
    }

    pub fn change_passphrase(&mut self, old: &str, new: &str) -> Result<(), WalletError> {
        let seed = self.decrypt_seed(old)?;
        if new.is_empty() {
            return Err(WalletError::Encryption("passphrase must not be empty".into()));
        }
        let ciphertext = encryption::encrypt(seed.as_bytes(), new.as_bytes(), &self.kdf)?;
        self.secret = Secret::Encrypted { ciphertext, kdf: self.kdf };
        info!("wallet passphrase changed");
        Ok(())
    }

    /// Remove the passphrase. The secret is stored in plain again.
    pub fn decrypt_wallet(&mut self, passphrase: &str) -> Result<(), WalletError> {
        let seed = self.decrypt_seed(passphrase)?;
        self.unlocked = Some(Arc::new(UnlockedKeys::new(seed.clone())));
        self.unlocked_until = None;
        self.generation = self.generation.wrapping_add(1);
        self.secret = Secret::Plain(seed);
        info!("wallet passphrase removed");
        Ok(())
    }

    // --- persistence ---

    pub fn to_record(&self) -> KeyStoreRecord {
        let secret = match &self.secret {
            Secret::Plain(seed) => SecretRecord::Plain { seed: hex::encode(seed.as_bytes()) },
            Secret::Encrypted { ciphertext, kdf } => {
                SecretRecord::Encrypted { ciphertext: hex::encode(ciphertext), kdf: *kdf }
            }
        };
        let mut issued: Vec<KeyRecord> = self.issued.values().copied().collect();
        issued.sort_by_key(|r| r.index);
        KeyStoreRecord {
            network: self.network,
            secret,
            ever_encrypted: self.ever_encrypted,
            next_index: self.next_index,
            pool: self.pool.iter().copied().collect(),
            issued,
            address_book: self.book.entries(),
        }
    }

    /// Rebuild from disk. An encrypted store comes back locked.
    pub fn from_record(
        record: KeyStoreRecord,
        pool_settings: KeyPoolSettings,
        kdf: KdfParams,
    ) -> Result<Self, WalletError> {
        let (secret, unlocked) = match record.secret {
            SecretRecord::Plain { seed } => {
                let raw = zeroize::Zeroizing::new(
                    hex::decode(&seed).map_err(|e| WalletError::CorruptedFile(e.to_string()))?,
                );
                let seed = Seed::from_slice(&raw)?;
                let keys = Arc::new(UnlockedKeys::new(seed.clone()));
                (Secret::Plain(seed), Some(keys))
            }
            SecretRecord::Encrypted { ciphertext, kdf } => {
                let ciphertext =
                    hex::decode(&ciphertext).map_err(|e| WalletError::CorruptedFile(e.to_string()))?;
                (Secret::Encrypted { ciphertext, kdf }, None)
            }
        };
        if record.pool.iter().chain(&record.issued).any(|r| r.index >= record.next_index) {
            return Err(WalletError::CorruptedFile("key index beyond next_index".into()));
        }
        Ok(Self {
            network: record.network,
            pool_settings,
            kdf,
            secret,
            unlocked,
            unlocked_until: None,
            generation: 0,
            ever_encrypted: record.ever_encrypted,
            next_index: record.next_index,
            pool: record.pool.into_iter().collect(),
            issued: record.issued.into_iter().map(|r| (r.pubkey_hash, r)).collect(),
            book: AddressBook::from_entries(record.address_book),
        })
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("network", &self.network)
            .field("lock_state", &self.lock_state())
            .field("pool", &self.pool.len())
            .field("issued", &self.issued.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreRecord {
    pub network: Network,
    pub secret: SecretRecord,
    pub ever_encrypted: bool,
    pub next_index: u32,
    pub pool: Vec<KeyRecord>,
    pub issued: Vec<KeyRecord>,
    pub address_book: Vec<AddressBookEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SecretRecord {
    Plain { seed: String },
    Encrypted { ciphertext: String, kdf: KdfParams },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn settings() -> KeyPoolSettings {
        KeyPoolSettings { target: 5, low_water: 3 }
    }

    fn store() -> KeyStore {
        KeyStore::new(Seed::from_bytes([7; 32]), Network::Testnet, settings(), KdfParams::fast())
    }

    fn encrypted_store(pw: &str) -> KeyStore {
        let mut ks = store();
        ks.encrypt(pw).unwrap();
        ks
    }

    #[test]
    fn new_store_has_full_pool_and_is_unencrypted() {
        let ks = store();
        assert_eq!(ks.keypool_size(), 5);
        assert_eq!(ks.lock_state(), LockState::Unencrypted);
        assert!(ks.unlocked_keys().is_ok());
    }

    #[test]
    fn generate_key_adds_receiving_entry_and_never_repeats() {
        let mut ks = store();
        let mut seen = HashSet::new();
        for i in 0..20 {
            let addr = ks.generate_key(&format!("k{i}")).unwrap();
            assert!(seen.insert(addr.clone()));
            assert_eq!(ks.address_book_entry(&addr).unwrap().kind, EntryKind::Receiving);
            assert!(ks.is_mine(&addr.pubkey_hash()));
            assert!(ks.keypool_size() >= 3);
        }
    }

    #[test]
    fn pool_refills_at_low_water() {
        let mut ks = store();
        ks.generate_key("a").unwrap();
        ks.generate_key("b").unwrap();
        assert_eq!(ks.keypool_size(), 3);
        ks.generate_key("c").unwrap();
        assert_eq!(ks.keypool_size(), 5);
    }

    #[test]
    fn pooled_keys_are_recognised() {
        let ks = store();
        let pooled = ks.pool[0];
        assert!(ks.is_mine(&pooled.pubkey_hash));
        assert!(!ks.is_mine(&Hash256([1; 32])));
    }

    #[test]
    fn change_keys_stay_out_of_address_book() {
        let mut ks = store();
        let change = ks.reserve_change_key().unwrap();
        ks.keep_key(change);
        assert!(ks.is_mine(&change.pubkey_hash));
        assert!(ks.address_book_entry(&change.address(Network::Testnet)).is_none());
    }

    #[test]
    fn returned_change_key_goes_back_to_pool() {
        let mut ks = store();
        let change = ks.reserve_change_key().unwrap();
        assert_eq!(ks.keypool_size(), 4);
        ks.return_key(change);
        assert_eq!(ks.keypool_size(), 5);
        assert_eq!(ks.reserve_change_key().unwrap(), change);
    }

    #[test]
    fn issued_change_key_can_be_withdrawn() {
        let mut ks = store();
        let change = ks.reserve_change_key().unwrap();
        ks.issue_key(change);
        assert!(ks.is_mine(&change.pubkey_hash));
        assert_eq!(ks.keypool_size(), 4);

        ks.return_key(change);
        assert_eq!(ks.keypool_size(), 5);
        assert!(!ks.issued.contains_key(&change.pubkey_hash));
        assert_eq!(ks.pool.front(), Some(&change));
        assert_eq!(ks.reserve_change_key().unwrap(), change);
    }

    #[test]
    fn import_sending_address_rules() {
        let mut ks = store();
        let foreign = Address::from_pubkey_hash(Hash256([9; 32]), Network::Testnet);
        ks.import_sending_address(foreign.clone(), "shop").unwrap();
        assert!(matches!(
            ks.import_sending_address(foreign.clone(), "again"),
            Err(WalletError::DuplicateAddress(_))
        ));

        let mainnet = Address::from_pubkey_hash(Hash256([9; 32]), Network::Mainnet);
        assert!(matches!(ks.import_sending_address(mainnet, "x"), Err(WalletError::InvalidAddress(_))));

        let own = ks.generate_key("mine").unwrap();
        assert!(matches!(ks.import_sending_address(own.clone(), "x"), Err(WalletError::DuplicateAddress(_))));
        assert!(matches!(ks.delete_sending_address(&own), Err(WalletError::CannotDeleteReceiving(_))));
        ks.delete_sending_address(&foreign).unwrap();
    }

    #[test]
    fn unrepresentable_unlock_duration_leaves_store_locked() {
        let mut ks = encrypted_store("pw");
        let generation = ks.generation;
        assert!(matches!(
            ks.unlock("pw", Some(Duration::from_secs(u64::MAX))),
            Err(WalletError::InvalidConfig(_))
        ));
        assert_eq!(ks.lock_state(), LockState::Locked);
        assert_eq!(ks.generation, generation);
        assert!(ks.unlocked_keys().is_err());
    }

    #[test]
    fn sign_requires_key_and_unlock() {
        let mut ks = encrypted_store("pw");
        let foreign = Address::from_pubkey_hash(Hash256([9; 32]), Network::Testnet);
        assert!(matches!(ks.sign(&foreign, b"digest"), Err(WalletError::NoKey(_))));

        let own = ks.pool[0].address(Network::Testnet);
        assert_eq!(ks.sign(&own, b"digest"), Err(WalletError::Locked));

        ks.unlock("pw", None).unwrap();
        let sig = ks.sign(&own, b"digest").unwrap();
        let kp = ks.keypair(&own.pubkey_hash()).unwrap();
        kp.public_key().verify(b"digest", &sig).unwrap();
    }

    #[test]
    fn encrypt_transitions_to_locked() {
        let mut ks = encrypted_store("pw");
        assert_eq!(ks.lock_state(), LockState::Locked);
        assert!(ks.ever_encrypted());
        assert_eq!(ks.encrypt("again"), Err(WalletError::AlreadyEncrypted));
        assert_eq!(ks.generate_key("x"), Err(WalletError::Locked));
    }

    #[test]
    fn empty_passphrase_rejected() {
        let mut ks = store();
        assert!(matches!(ks.encrypt(""), Err(WalletError::Encryption(_))));
        assert!(!ks.is_encrypted());
    }

    #[test]
    fn wrong_passphrase_leaves_state_unchanged() {
        let mut ks = encrypted_store("pw");
        assert_eq!(ks.unlock("nope", None), Err(WalletError::WrongPassphrase));
        assert_eq!(ks.lock_state(), LockState::Locked);
    }

    #[test]
    fn unlock_on_plain_wallet_fails() {
        let mut ks = store();
        assert_eq!(ks.unlock("pw", None), Err(WalletError::NotEncrypted));
        assert_eq!(ks.lock(), Err(WalletError::NotEncrypted));
    }

    #[test]
    fn timed_unlock_expires() {
        let mut ks = encrypted_store("pw");
        ks.unlock("pw", Some(Duration::from_millis(30))).unwrap();
        assert!(matches!(ks.lock_state(), LockState::Unlocked { until: Some(_) }));
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(ks.lock_state(), LockState::Locked);
        assert_eq!(ks.unlocked_keys().err(), Some(WalletError::Locked));
        assert!(ks.lock_if_expired());
        assert!(!ks.lock_if_expired());
    }

    #[test]
    fn capability_outlives_relock() {
        let mut ks = encrypted_store("pw");
        ks.unlock("pw", None).unwrap();
        let own = ks.pool[0];
        let keys = ks.unlocked_keys().unwrap();
        ks.lock().unwrap();
        assert!(keys.keypair(&own).is_some());
        assert_eq!(ks.unlocked_keys().err(), Some(WalletError::Locked));
    }

    #[test]
    fn stale_relock_is_ignored() {
        let mut ks = encrypted_store("pw");
        let first = ks.unlock("pw", Some(Duration::from_secs(60))).unwrap();
        let second = ks.unlock("pw", None).unwrap();
        assert!(!ks.relock(first));
        assert!(matches!(ks.lock_state(), LockState::Unlocked { .. }));
        assert!(ks.relock(second));
        assert_eq!(ks.lock_state(), LockState::Locked);
    }

    #[test]
    fn change_passphrase_requires_old() {
        let mut ks = encrypted_store("old");
        assert_eq!(ks.change_passphrase("bad", "new"), Err(WalletError::WrongPassphrase));
        ks.change_passphrase("old", "new").unwrap();
        assert_eq!(ks.unlock("old", None), Err(WalletError::WrongPassphrase));
        ks.unlock("new", None).unwrap();
    }

    #[test]
    fn decrypt_wallet_keeps_encrypted_format_marker() {
        let mut ks = encrypted_store("pw");
        ks.decrypt_wallet("pw").unwrap();
        assert_eq!(ks.lock_state(), LockState::Unencrypted);
        assert!(ks.ever_encrypted());
        assert!(ks.generate_key("x").is_ok());
    }

    #[test]
    fn record_roundtrip_locked() {
        let mut ks = store();
        let addr = ks.generate_key("mine").unwrap();
        ks.encrypt("pw").unwrap();

        let json = serde_json::to_string(&ks.to_record()).unwrap();
        assert!(!json.contains(&hex::encode([7u8; 32])));
        let record: KeyStoreRecord = serde_json::from_str(&json).unwrap();
        let mut restored = KeyStore::from_record(record, settings(), KdfParams::fast()).unwrap();

        assert_eq!(restored.lock_state(), LockState::Locked);
        assert!(restored.is_mine(&addr.pubkey_hash()));
        assert_eq!(restored.entries(), ks.entries());
        restored.unlock("pw", None).unwrap();
        assert!(restored.sign(&addr, b"m").is_ok());
    }

    #[test]
    fn corrupted_record_is_rejected() {
        let mut record = store().to_record();
        record.next_index = 1;
        assert!(matches!(
            KeyStore::from_record(record, settings(), KdfParams::fast()),
            Err(WalletError::CorruptedFile(_))
        ));
    }
}
