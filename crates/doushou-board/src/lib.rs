//! Hidden-piece animal chess board ("Dou Shou Qi").
//!
//! Sixteen cells, sixteen pieces: eight per camp, ranked rat (1) to
//! elephant (8). Every piece starts face down in a shuffled order.
//! Players reveal cells, move revealed pieces onto empty cells, and
//! capture opposing pieces by rank.
//!
//! The board is plain data. It has no notion of turns, players or time;
//! the desk that owns it decides who may call what and when.
//!
//! # Key types
//!
//! - [`Board`] — cell array plus deal order
//! - [`Piece`] / [`Cell`] — piece identity and what a cell shows
//! - [`Capture`] / [`Outcome`] — results of a capture and of the round

mod board;
mod error;
mod piece;

pub use board::{Board, Capture, Outcome};
pub use error::BoardError;
pub use piece::{Cell, PIECE_COUNT, Piece};
