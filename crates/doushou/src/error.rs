//! Unified error type for the Doushou service.

use doushou_protocol::PlayerId;
use doushou_room::DeskError;
use doushou_session::SessionError;

/// A persistence call failed.
///
/// Persistence failures are logged and never retried; live state is not
/// rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("player {0} has no stored record")]
    UnknownPlayer(PlayerId),

    #[error("room record {0} not found")]
    UnknownRoom(i64),

    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid stake entry `{0}`, expected `mode/stake`")]
    InvalidStake(String),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A player-registry or command-queue error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A desk-level error (full, not found, invalid state).
    #[error(transparent)]
    Desk(#[from] DeskError),

    /// A persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The dispatcher has shut down.
    #[error("service is not running")]
    Unavailable,
}
