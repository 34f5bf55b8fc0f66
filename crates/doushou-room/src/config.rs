//! Desk configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Seats per desk. A desk never holds more than this many players.
pub const SEATS: usize = 2;

/// Timing and sizing shared by every desk the registry spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskConfig {
    /// How long the owning camp may stay silent before the opposing camp
    /// is declared winner.
    pub turn_timeout: Duration,

    /// Desks created longer ago than this are reclaimed by the sweep,
    /// whatever their state.
    pub idle_deadline: Duration,

    /// Capacity of each desk's command queue. Senders wait when it is full.
    pub channel_size: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            idle_deadline: Duration::from_secs(30 * 60),
            channel_size: 64,
        }
    }
}
