//! Chain synchronization progress as seen by the wallet.
//!
//! The chain collaborator pushes tip heights, block times and peer height
//! estimates. The tracker folds them into one [`ChainState`] value behind a
//! single lock, so readers always see a consistent height/phase pair.

use std::fmt;

use parking_lot::RwLock;
use tracing::info;

use beao_core::address::Network;
use beao_core::checkpoints;
use beao_core::constants::TARGET_BLOCK_INTERVAL_SECS;

/// Default number of block intervals a tip may age before the wallet no
/// longer considers itself up to date.
pub const DEFAULT_UP_TO_DATE_WINDOW: u64 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No tip seen yet.
    Initializing,
    CatchingUp,
    UpToDate,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncPhase::Initializing => "initializing",
            SyncPhase::CatchingUp => "catching up",
            SyncPhase::UpToDate => "up to date",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub target_block_interval: u64,
    pub up_to_date_window: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { target_block_interval: TARGET_BLOCK_INTERVAL_SECS, up_to_date_window: DEFAULT_UP_TO_DATE_WINDOW }
    }
}

impl SyncSettings {
    /// Maximum tip age, in seconds, that still counts as fresh.
    pub fn freshness(&self) -> u64 {
        self.target_block_interval.saturating_mul(self.up_to_date_window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    pub phase: SyncPhase,
    pub height: u64,
    /// Highest chain height reported by peers.
    pub peer_estimate: u64,
    /// Lower bound from the checkpoint table.
    pub checkpoint_estimate: u64,
    /// Unix seconds of the tip block.
    pub last_block_time: Option<u64>,
}

impl ChainState {
    pub fn new(checkpoint_estimate: u64) -> Self {
        Self {
            phase: SyncPhase::Initializing,
            height: 0,
            peer_estimate: 0,
            checkpoint_estimate,
            last_block_time: None,
        }
    }

    pub fn estimated_total(&self) -> u64 {
        self.peer_estimate.max(self.checkpoint_estimate)
    }

    pub fn blocks_remaining(&self) -> u64 {
        self.estimated_total().saturating_sub(self.height)
    }

    /// Fraction of the estimated chain we have, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let total = self.estimated_total();
        if total == 0 {
            return if self.height == 0 { 0.0 } else { 1.0 };
        }
        (self.height as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn last_block_age(&self, now: u64) -> Option<BlockAge> {
        self.last_block_time.map(|t| BlockAge::from_secs(now.saturating_sub(t)))
    }

    fn is_fresh(&self, settings: &SyncSettings, now: u64) -> bool {
        self.last_block_time.is_some_and(|t| now.saturating_sub(t) < settings.freshness())
    }

    /// Phase implied by the current fields. `Initializing` only ends with a tip.
    fn next_phase(&self, settings: &SyncSettings, now: u64) -> SyncPhase {
        let fresh = self.is_fresh(settings, now);
        match self.phase {
            SyncPhase::Initializing => SyncPhase::Initializing,
            SyncPhase::CatchingUp if self.height >= self.estimated_total() && fresh => SyncPhase::UpToDate,
            SyncPhase::UpToDate if self.estimated_total() > self.height.saturating_add(1) || !fresh => {
                SyncPhase::CatchingUp
            }
            phase => phase,
        }
    }
}

/// Time since the last block, in the largest whole unit that is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAge {
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
}

impl BlockAge {
    pub fn from_secs(secs: u64) -> Self {
        match secs {
            s if s < 60 => BlockAge::Seconds(s),
            s if s < 3_600 => BlockAge::Minutes(s / 60),
            s if s < 86_400 => BlockAge::Hours(s / 3_600),
            s => BlockAge::Days(s / 86_400),
        }
    }
}

impl fmt::Display for BlockAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = match *self {
            BlockAge::Seconds(n) => (n, "second"),
            BlockAge::Minutes(n) => (n, "minute"),
            BlockAge::Hours(n) => (n, "hour"),
            BlockAge::Days(n) => (n, "day"),
        };
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{n} {unit}{plural} ago")
    }
}

pub struct ChainSyncTracker {
    settings: SyncSettings,
    state: RwLock<ChainState>,
}

impl ChainSyncTracker {
    pub fn new(network: Network, settings: SyncSettings) -> Self {
        Self {
            settings,
            state: RwLock::new(ChainState::new(checkpoints::total_blocks_estimate(network))),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub fn snapshot(&self) -> ChainState {
        *self.state.read()
    }

    pub fn height(&self) -> u64 {
        self.state.read().height
    }

    /// A new best tip. Leaves `Initializing` on the first call.
    pub fn set_tip(&self, height: u64, block_time: u64, now: u64) -> SyncPhase {
        self.update(now, |s| {
            s.height = height;
            s.last_block_time = Some(block_time);
            if s.phase == SyncPhase::Initializing {
                s.phase = SyncPhase::CatchingUp;
            }
        })
    }

    /// Peers report a chain of `total` blocks.
    pub fn set_estimated_total(&self, total: u64, now: u64) -> SyncPhase {
        self.update(now, |s| s.peer_estimate = total)
    }

    /// Re-evaluate freshness without new chain data.
    pub fn refresh(&self, now: u64) -> SyncPhase {
        self.update(now, |_| {})
    }

    fn update<F>(&self, now: u64, mutate: F) -> SyncPhase
    where
        F: FnOnce(&mut ChainState),
    {
        let mut state = self.state.write();
        let before = state.phase;
        mutate(&mut state);
        let next = state.next_phase(&self.settings, now);
        state.phase = next;
        if before != next {
            info!(
                from = %before,
                to = %next,
                height = state.height,
                estimated_total = state.estimated_total(),
                "chain sync phase changed"
            );
        }
        next
    }
}
