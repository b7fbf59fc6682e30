//! Mining configuration and the hash-rate readout.
//!
//! The search loop itself runs elsewhere; the wallet only keeps the
//! settings it is started with and the last rate it reported.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

pub const DEFAULT_SCANTIME_SECS: u64 = 60;
pub const DEFAULT_POOL_PORT: u16 = 9_332;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MiningMode {
    Solo,
    Pool { server: String, port: u16, username: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    #[serde(flatten)]
    pub mode: MiningMode,
    /// Worker threads; 0 means one per CPU.
    pub threads: usize,
    /// Seconds spent on one work unit before refreshing it.
    pub scantime_secs: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self { mode: MiningMode::Solo, threads: 0, scantime_secs: DEFAULT_SCANTIME_SECS }
    }
}

impl MiningConfig {
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.scantime_secs == 0 {
            return Err(WalletError::InvalidConfig("mining scantime must be at least 1 second".into()));
        }
        if let MiningMode::Pool { server, port, username } = &self.mode {
            if server.trim().is_empty() {
                return Err(WalletError::InvalidConfig("pool server is empty".into()));
            }
            if *port == 0 {
                return Err(WalletError::InvalidConfig("pool port must be non-zero".into()));
            }
            if username.trim().is_empty() {
                return Err(WalletError::InvalidConfig("pool username is empty".into()));
            }
        }
        Ok(())
    }

    pub fn is_pool(&self) -> bool {
        matches!(self.mode, MiningMode::Pool { .. })
    }
}

/// Hashes per second, shown in the largest unit that keeps the value ≥ 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct HashRate(pub f64);

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rate = self.0;
        if rate >= 1e9 {
            write!(f, "{:.2} GH/s", rate / 1e9)
        } else if rate >= 1e6 {
            write!(f, "{:.2} MH/s", rate / 1e6)
        } else if rate >= 1e3 {
            write!(f, "{:.2} kH/s", rate / 1e3)
        } else {
            write!(f, "{rate:.0} H/s")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningStatus {
    pub config: MiningConfig,
    pub active: bool,
    pub hash_rate: HashRate,
}

impl MiningStatus {
    pub fn new(config: MiningConfig) -> Self {
        Self { config, active: false, hash_rate: HashRate::default() }
    }

    /// Record a readout from the miner. A rate of zero marks it idle.
    pub fn report(&mut self, hashes_per_sec: f64) {
        let rate = if hashes_per_sec.is_finite() { hashes_per_sec.max(0.0) } else { 0.0 };
        self.hash_rate = HashRate(rate);
        self.active = rate > 0.0;
    }
}

impl fmt::Display for MiningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.active {
            return f.write_str("Not mining");
        }
        match &self.config.mode {
            MiningMode::Solo => write!(f, "Solo mining at {}", self.hash_rate),
            MiningMode::Pool { server, port, .. } => {
                write!(f, "Pool mining at {} via {server}:{port}", self.hash_rate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> MiningConfig {
        MiningConfig {
            mode: MiningMode::Pool { server: "pool.example".into(), port: DEFAULT_POOL_PORT, username: "w1".into() },
            threads: 2,
            scantime_secs: 30,
        }
    }

    #[test]
    fn default_is_valid_solo() {
        let cfg = MiningConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.is_pool());
    }

    #[test]
    fn pool_requires_server_port_and_user() {
        assert!(pool().validate().is_ok());
        let mut cfg = pool();
        cfg.mode = MiningMode::Pool { server: " ".into(), port: 1, username: "u".into() };
        assert!(matches!(cfg.validate(), Err(WalletError::InvalidConfig(_))));
        cfg.mode = MiningMode::Pool { server: "s".into(), port: 0, username: "u".into() };
        assert!(cfg.validate().is_err());
        cfg.mode = MiningMode::Pool { server: "s".into(), port: 1, username: "".into() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_scantime_is_rejected() {
        let cfg = MiningConfig { scantime_secs: 0, ..MiningConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hash_rate_units() {
        assert_eq!(HashRate(950.0).to_string(), "950 H/s");
        assert_eq!(HashRate(1_500.0).to_string(), "1.50 kH/s");
        assert_eq!(HashRate(2_250_000.0).to_string(), "2.25 MH/s");
        assert_eq!(HashRate(3e9).to_string(), "3.00 GH/s");
    }

    #[test]
    fn report_toggles_activity() {
        let mut status = MiningStatus::new(pool());
        assert_eq!(status.to_string(), "Not mining");
        status.report(1_500.0);
        assert!(status.active);
        assert_eq!(status.to_string(), "Pool mining at 1.50 kH/s via pool.example:9332");
        status.report(f64::NAN);
        assert!(!status.active);
    }

    #[test]
    fn config_serde_is_flat() {
        let json = serde_json::to_value(pool()).unwrap();
        assert_eq!(json["mode"], "pool");
        assert_eq!(json["server"], "pool.example");
        let back: MiningConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, pool());
    }
}
