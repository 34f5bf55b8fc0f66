//! Pieces and cells.

use std::fmt;

use doushou_protocol::Camp;

/// Number of distinct pieces, which is also the number of board cells.
pub const PIECE_COUNT: usize = 16;

/// Pieces per camp.
const CAMP_SIZE: u8 = 8;

/// A piece identity, 1..=16.
///
/// Ids 1..=8 belong to camp A and 9..=16 to camp B. Within a camp the
/// rank runs from 1 (rat) to 8 (elephant), so id 9 is camp B's rat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Piece(pub(crate) u8);

impl Piece {
    pub const RAT: u8 = 1;
    pub const ELEPHANT: u8 = 8;

    /// Returns `None` for ids outside 1..=16.
    pub fn new(id: u8) -> Option<Self> {
        (1..=PIECE_COUNT as u8).contains(&id).then_some(Self(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn camp(self) -> Camp {
        if self.0 <= CAMP_SIZE {
            Camp::A
        } else {
            Camp::B
        }
    }

    /// Rank within the camp: camp B ids are offset by 8.
    pub fn rank(self) -> u8 {
        match self.camp() {
            Camp::A => self.0,
            Camp::B => self.0 - CAMP_SIZE,
        }
    }

    /// All sixteen pieces in id order.
    pub fn all() -> impl Iterator<Item = Piece> {
        (1..=PIECE_COUNT as u8).map(Piece)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.camp(), self.rank())
    }
}

/// What a board cell currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    /// Face down. Every cell starts this way.
    Hidden,
    /// Vacated by a move or a capture.
    Empty,
    /// Face up.
    Revealed(Piece),
}

impl Cell {
    /// Wire encoding: `-1` hidden, `0` empty, otherwise the piece id.
    pub fn wire(self) -> i32 {
        match self {
            Self::Hidden => -1,
            Self::Empty => 0,
            Self::Revealed(piece) => i32::from(piece.id()),
        }
    }

    pub fn piece(self) -> Option<Piece> {
        match self {
            Self::Revealed(piece) => Some(piece),
            _ => None,
        }
    }
}
