//! Error types for the desk layer.

use doushou_protocol::{DeskCode, DeskState, PlayerId};

/// Errors returned by desk operations.
///
/// `NotYourTurn`, `ForeignPiece` and `InvalidState` on an action are the
/// "rejected action" family: the desk changed nothing and broadcast
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeskError {
    /// No live desk with this code.
    #[error("desk {0} not found")]
    NotFound(DeskCode),

    /// Both seats are taken.
    #[error("desk {0} is full")]
    Full(DeskCode),

    #[error("player {0} already seated at desk {1}")]
    AlreadySeated(PlayerId, DeskCode),

    #[error("player {0} not seated at desk {1}")]
    NotSeated(PlayerId, DeskCode),

    /// The desk is in a state that does not allow this operation, for
    /// example joining a desk whose round has started.
    #[error("invalid desk state for this operation: {0}")]
    InvalidState(DeskState),

    /// The acting player's camp does not own the current turn.
    #[error("not player {0}'s turn")]
    NotYourTurn(PlayerId),

    /// Moving or capturing with a piece of the opposing camp.
    #[error("player {player} does not own the piece at {index}")]
    ForeignPiece { player: PlayerId, index: i32 },

    /// The desk's command channel is closed.
    #[error("desk {0} is unavailable")]
    Unavailable(DeskCode),
}
