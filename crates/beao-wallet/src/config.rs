//! Wallet configuration.
//!
//! [`WalletConfig`] carries defaults for every tunable the wallet core uses.
//! It can be built programmatically, deserialized, or overlaid with
//! `BEAO_*` environment variables through [`WalletConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use beao_core::address::Network;
use beao_core::constants::{
    COINBASE_MATURITY, DEFAULT_TX_FEE_PER_KB, DUST_THRESHOLD, FREE_RELAY_MAX_SIZE, MAX_MONEY, MIN_RELAY_FEE_PER_KB,
    TARGET_BLOCK_INTERVAL_SECS,
};

use crate::builder::FeePolicy;
use crate::chain_sync::{DEFAULT_UP_TO_DATE_WINDOW, SyncSettings};
use crate::encryption::KdfParams;
use crate::error::WalletError;
use crate::keystore::KeyPoolSettings;
use crate::mining::MiningConfig;
use crate::status::{
    DEFAULT_NOT_ACCEPTED_AFTER_SECS, DEFAULT_OFFLINE_AFTER_SECS, DEFAULT_REQUIRED_CONFIRMATIONS, StatusSettings,
};

pub const DEFAULT_KEYPOOL_SIZE: usize = 100;
pub const WALLET_FILE_NAME: &str = "wallet.dat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    /// Root directory for the wallet file and backups.
    pub data_dir: PathBuf,
    pub keypool_size: usize,
    /// The pool is refilled when it drops below this.
    pub keypool_low_water: usize,
    /// Fee rate in beos per 1000 bytes.
    pub pay_tx_fee_per_kb: u64,
    pub min_relay_fee_per_kb: u64,
    pub free_relay_max_size: usize,
    pub dust_threshold: u64,
    pub coinbase_maturity: u64,
    pub required_confirmations: u64,
    pub target_block_interval_secs: u64,
    /// Block intervals a tip may age and still count as up to date.
    pub up_to_date_window: u64,
    pub offline_after_secs: u64,
    pub not_accepted_after_secs: u64,
    /// Allow spending our own unconfirmed change.
    pub spend_zero_conf_change: bool,
    pub kdf: KdfParams,
    pub mining: MiningConfig,
}

impl Default for WalletConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("beao");

        Self {
            network: Network::Mainnet,
            data_dir,
            keypool_size: DEFAULT_KEYPOOL_SIZE,
            keypool_low_water: DEFAULT_KEYPOOL_SIZE * 9 / 10,
            pay_tx_fee_per_kb: DEFAULT_TX_FEE_PER_KB,
            min_relay_fee_per_kb: MIN_RELAY_FEE_PER_KB,
            free_relay_max_size: FREE_RELAY_MAX_SIZE,
            dust_threshold: DUST_THRESHOLD,
            coinbase_maturity: COINBASE_MATURITY,
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            target_block_interval_secs: TARGET_BLOCK_INTERVAL_SECS,
            up_to_date_window: DEFAULT_UP_TO_DATE_WINDOW,
            offline_after_secs: DEFAULT_OFFLINE_AFTER_SECS,
            not_accepted_after_secs: DEFAULT_NOT_ACCEPTED_AFTER_SECS,
            spend_zero_conf_change: true,
            kdf: KdfParams::default(),
            mining: MiningConfig::default(),
        }
    }
}

impl WalletConfig {
    /// Defaults overlaid with `BEAO_*` environment variables.
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each `BEAO_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("BEAO_NETWORK") {
            cfg.network = v.parse().map_err(|_| invalid("BEAO_NETWORK", &v))?;
        }
        if let Some(v) = lookup("BEAO_DATA_DIR") {
            cfg.data_dir = PathBuf::from(v);
        }
        overlay(&lookup, "BEAO_KEYPOOL_SIZE", &mut cfg.keypool_size)?;
        overlay(&lookup, "BEAO_KEYPOOL_LOW_WATER", &mut cfg.keypool_low_water)?;
        overlay(&lookup, "BEAO_PAY_TX_FEE", &mut cfg.pay_tx_fee_per_kb)?;
        overlay(&lookup, "BEAO_MIN_RELAY_FEE", &mut cfg.min_relay_fee_per_kb)?;
        overlay(&lookup, "BEAO_REQUIRED_CONFIRMATIONS", &mut cfg.required_confirmations)?;
        overlay(&lookup, "BEAO_SPEND_ZERO_CONF_CHANGE", &mut cfg.spend_zero_conf_change)?;
        overlay(&lookup, "BEAO_KDF_MEMORY_KIB", &mut cfg.kdf.memory_kib)?;
        overlay(&lookup, "BEAO_KDF_ITERATIONS", &mut cfg.kdf.iterations)?;
        overlay(&lookup, "BEAO_MINING_THREADS", &mut cfg.mining.threads)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.keypool_size == 0 {
            return Err(WalletError::InvalidConfig("keypool_size must be at least 1".into()));
        }
        if self.keypool_low_water > self.keypool_size {
            return Err(WalletError::InvalidConfig("keypool_low_water exceeds keypool_size".into()));
        }
        if self.pay_tx_fee_per_kb > MAX_MONEY {
            return Err(WalletError::InvalidConfig("pay_tx_fee_per_kb out of range".into()));
        }
        if self.required_confirmations == 0 {
            return Err(WalletError::InvalidConfig("required_confirmations must be at least 1".into()));
        }
        if self.target_block_interval_secs == 0 {
            return Err(WalletError::InvalidConfig("target_block_interval_secs must be non-zero".into()));
        }
        self.mining.validate()
    }

    /// `<data_dir>/wallet.dat` on mainnet, `<data_dir>/testnet/wallet.dat` otherwise.
    pub fn wallet_path(&self) -> PathBuf {
        match self.network {
            Network::Mainnet => self.data_dir.join(WALLET_FILE_NAME),
            Network::Testnet => self.data_dir.join("testnet").join(WALLET_FILE_NAME),
        }
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            fee_per_kb: self.pay_tx_fee_per_kb,
            min_relay_fee_per_kb: self.min_relay_fee_per_kb,
            free_relay_max_size: self.free_relay_max_size,
            dust_threshold: self.dust_threshold,
        }
    }

    pub fn pool_settings(&self) -> KeyPoolSettings {
        KeyPoolSettings { target: self.keypool_size, low_water: self.keypool_low_water }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            target_block_interval: self.target_block_interval_secs,
            up_to_date_window: self.up_to_date_window,
        }
    }

    pub fn status_settings(&self) -> StatusSettings {
        StatusSettings {
            required_confirmations: self.required_confirmations,
            coinbase_maturity: self.coinbase_maturity,
            offline_after_secs: self.offline_after_secs,
            not_accepted_after_secs: self.not_accepted_after_secs,
        }
    }
}

fn invalid(key: &str, value: &str) -> WalletError {
    WalletError::InvalidConfig(format!("{key}: cannot parse {value:?}"))
}

fn overlay<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), WalletError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(v) = lookup(key) {
        *slot = v.trim().parse().map_err(|_| invalid(key, &v))?;
    }
    Ok(())
}
