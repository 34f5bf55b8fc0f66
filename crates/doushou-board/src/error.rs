//! Error types for the board.

/// Raised only when building a board from an explicit deal order.
/// Gameplay operations report failure through their return values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("piece id {0} is outside 1..=16")]
    InvalidPiece(u8),

    #[error("piece id {0} appears twice in the deal order")]
    DuplicatePiece(u8),
}
