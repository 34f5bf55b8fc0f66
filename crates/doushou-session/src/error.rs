//! Error types for the session layer.

use doushou_protocol::{PlayerId, SessionId};

/// Errors from the player registry and the command queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No live record for this player.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// The session never logged in, or was replaced by a newer one.
    #[error("session {0} is not bound to a player")]
    NotLoggedIn(SessionId),

    /// Reset refuses to drop the record of a connected player.
    #[error("player {0} is online")]
    StillOnline(PlayerId),

    /// The named command backlog is full; the command was not queued.
    #[error("{0} queue is full")]
    QueueFull(&'static str),

    /// The consumer of the command queue has shut down.
    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
}
