//! Wallet file format and persistence backends.
//!
//! # File format
//! ```text
//! header_len (4 bytes LE) || header_json || payload_json
//! ```
//! The header carries the magic, the writer's version and the minimum
//! reader version. Secrets inside the payload are already encrypted by the
//! key store when the wallet has a passphrase.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::keystore::KeyStoreRecord;
use crate::ledger::LedgerRecord;

/// Magic bytes identifying a BeaoCoin wallet file.
pub const WALLET_MAGIC: &[u8; 4] = b"BEAO";

/// Current wallet file format version.
pub const WALLET_VERSION: u32 = 2;

/// Oldest reader that can open a wallet that was never encrypted.
pub const PLAIN_MIN_VERSION: u32 = 1;

/// Oldest reader that understands encrypted secrets. Once a wallet has been
/// encrypted its files keep this minimum, even after the passphrase is removed.
pub const ENCRYPTED_MIN_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct WalletFileHeader {
    magic: String,
    version: u32,
    min_version: u32,
}

/// Everything persisted for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub keystore: KeyStoreRecord,
    pub ledger: LedgerRecord,
    pub pay_tx_fee_per_kb: u64,
}

impl WalletRecord {
    pub fn min_version(&self) -> u32 {
        if self.keystore.ever_encrypted { ENCRYPTED_MIN_VERSION } else { PLAIN_MIN_VERSION }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        let header = WalletFileHeader {
            magic: String::from_utf8_lossy(WALLET_MAGIC).to_string(),
            version: WALLET_VERSION,
            min_version: self.min_version(),
        };
        let header_json = serde_json::to_vec(&header).map_err(|e| WalletError::Persistence(e.to_string()))?;
        let payload_json = serde_json::to_vec(self).map_err(|e| WalletError::Persistence(e.to_string()))?;

        let header_len = header_json.len() as u32;
        let mut data = Vec::with_capacity(4 + header_json.len() + payload_json.len());
        data.extend_from_slice(&header_len.to_le_bytes());
        data.extend_from_slice(&header_json);
        data.extend_from_slice(&payload_json);
        Ok(data)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WalletError> {
        let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
            return Err(WalletError::CorruptedFile("file too short".into()));
        };
        let header_len = u32::from_le_bytes(*len_bytes) as usize;
        if rest.len() < header_len {
            return Err(WalletError::CorruptedFile("header truncated".into()));
        }
        let (header_json, payload_json) = rest.split_at(header_len);

        let header: WalletFileHeader = serde_json::from_slice(header_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;
        if header.magic.as_bytes() != WALLET_MAGIC {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.min_version > WALLET_VERSION {
            return Err(WalletError::UnsupportedVersion { found: header.min_version, supported: WALLET_VERSION });
        }

        serde_json::from_slice(payload_json).map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))
    }
}

/// Load/save/backup collaborator. Each call is atomic: a reader sees either
/// the previous record or the new one.
pub trait WalletStore: Send + Sync {
    /// `None` when no wallet has been saved yet.
    fn load(&self) -> Result<Option<WalletRecord>, WalletError>;
    fn save(&self, record: &WalletRecord) -> Result<(), WalletError>;
    fn backup(&self, record: &WalletRecord, destination: &Path) -> Result<(), WalletError>;
}

impl<T: WalletStore + ?Sized> WalletStore for Arc<T> {
    fn load(&self) -> Result<Option<WalletRecord>, WalletError> {
        (**self).load()
    }

    fn save(&self, record: &WalletRecord) -> Result<(), WalletError> {
        (**self).save(record)
    }

    fn backup(&self, record: &WalletRecord, destination: &Path) -> Result<(), WalletError> {
        (**self).backup(record, destination)
    }
}

/// Wallet file on disk, replaced through a temp file and rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WalletStore for FileStore {
    fn load(&self) -> Result<Option<WalletRecord>, WalletError> {
        if !self.path.exists() {
            let tmp = tmp_path(&self.path);
            if tmp.exists() {
                return Err(WalletError::Persistence(format!(
                    "{} is missing but an unfinished save remains at {}",
                    self.path.display(),
                    tmp.display()
                )));
            }
            return Ok(None);
        }
        let data = fs::read(&self.path).map_err(|e| WalletError::Persistence(format!("{}: {e}", self.path.display())))?;
        let record = WalletRecord::decode(&data)?;
        debug!(path = %self.path.display(), "wallet loaded");
        Ok(Some(record))
    }

    fn save(&self, record: &WalletRecord) -> Result<(), WalletError> {
        let data = record.encode()?;
        write_file_atomic(&self.path, &data).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "wallet save failed");
            WalletError::Persistence(format!("{}: {e}", self.path.display()))
        })
    }

    fn backup(&self, record: &WalletRecord, destination: &Path) -> Result<(), WalletError> {
        if destination == self.path {
            return Err(WalletError::Persistence("backup destination is the wallet file".into()));
        }
        let data = record.encode()?;
        write_file_atomic(destination, &data)
            .map_err(|e| WalletError::Persistence(format!("{}: {e}", destination.display())))?;
        info!(destination = %destination.display(), "wallet backed up");
        Ok(())
    }
}

/// Sibling path a save is staged in before it replaces `path`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write to the staging file, flush it to disk, then rename it over `path`.
/// A failure at any step leaves the existing file untouched.
fn write_file_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let staged = File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = staged.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// In-memory store for tests and embedding. Goes through the same encoding
/// as [`FileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<Vec<u8>>>,
    backups: Mutex<HashMap<PathBuf, Vec<u8>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` and `backup` fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.data.lock().clone()
    }

    pub fn backup_at(&self, destination: &Path) -> Option<WalletRecord> {
        let backups = self.backups.lock();
        backups.get(destination).and_then(|d| WalletRecord::decode(d).ok())
    }

    fn check_writable(&self) -> Result<(), WalletError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(WalletError::Persistence("store is read-only".into()));
        }
        Ok(())
    }
}

impl WalletStore for MemoryStore {
    fn load(&self) -> Result<Option<WalletRecord>, WalletError> {
        self.data.lock().as_deref().map(WalletRecord::decode).transpose()
    }

    fn save(&self, record: &WalletRecord) -> Result<(), WalletError> {
        self.check_writable()?;
        let data = record.encode()?;
        *self.data.lock() = Some(data);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backup(&self, record: &WalletRecord, destination: &Path) -> Result<(), WalletError> {
        self.check_writable()?;
        let data = record.encode()?;
        self.backups.lock().insert(destination.to_path_buf(), data);
        Ok(())
    }
}
