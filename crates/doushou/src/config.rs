//! Service configuration.
//!
//! Plain structs with defaults; where the values come from (file, env,
//! flags) is up to the binary that embeds the service.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use doushou_protocol::DeskMode;
use doushou_room::DeskConfig;
use doushou_session::QueueConfig;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Stake charged to a desk's creator per mode, written as `"1/2,2/4"`
/// (mode 1 costs 2, mode 2 costs 4). Modes missing from the table are
/// free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StakeTable {
    stakes: HashMap<DeskMode, i64>,
}

impl StakeTable {
    pub fn new() -> Self {
        Self {
            stakes: HashMap::new(),
        }
    }

    pub fn with(mut self, mode: DeskMode, stake: i64) -> Self {
        self.stakes.insert(mode, stake);
        self
    }

    pub fn stake(&self, mode: DeskMode) -> i64 {
        self.stakes.get(&mode).copied().unwrap_or(0)
    }
}

impl Default for StakeTable {
    fn default() -> Self {
        Self::new().with(DeskMode::Room, 2).with(DeskMode::Match, 4)
    }
}

impl FromStr for StakeTable {
    type Err = ConfigError;

    fn from_str(table: &str) -> Result<Self, Self::Err> {
        let mut stakes = HashMap::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || ConfigError::InvalidStake(entry.to_string());
            let (mode, stake) = entry.split_once('/').ok_or_else(invalid)?;
            let mode: u8 = mode.trim().parse().map_err(|_| invalid())?;
            let mode = DeskMode::try_from(mode).map_err(|_| invalid())?;
            let stake: i64 = stake.trim().parse().map_err(|_| invalid())?;
            if stake < 0 {
                return Err(invalid());
            }
            stakes.insert(mode, stake);
        }
        Ok(Self { stakes })
    }
}

impl TryFrom<String> for StakeTable {
    type Error = ConfigError;

    fn try_from(table: String) -> Result<Self, Self::Error> {
        table.parse()
    }
}

impl fmt::Display for StakeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.stakes.iter().collect();
        entries.sort_by_key(|(mode, _)| mode.code());
        for (i, (mode, stake)) in entries.into_iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}/{}", mode.code(), stake)?;
        }
        Ok(())
    }
}

impl From<StakeTable> for String {
    fn from(table: StakeTable) -> String {
        table.to_string()
    }
}

/// Everything the service needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Current client build. Only enforced when `force_update` is set.
    pub version: String,
    /// Reject `CreateDesk` / `JoinDesk` from other client versions.
    pub force_update: bool,
    pub stakes: StakeTable,
    /// How often the kick/reset/recharge queue is drained.
    pub command_interval: Duration,
    /// How often the desk sweep runs.
    pub sweep_interval: Duration,
    /// Capacity of the dispatcher's inbound queue.
    pub inbound_capacity: usize,
    pub desk: DeskConfig,
    pub queue: QueueConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            force_update: false,
            stakes: StakeTable::default(),
            command_interval: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(5 * 60),
            inbound_capacity: 1024,
            desk: DeskConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}
