//! The sixteen-cell board.

use std::fmt;

use doushou_protocol::Camp;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::{BoardError, Cell, PIECE_COUNT, Piece};

/// Result of a capture attempt.
///
/// The numeric codes are what `EatPiece` responses and `onEatPiece`
/// broadcasts carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Not a legal capture; the board is unchanged.
    Failed,
    /// The defender is removed and the attacker takes its cell.
    AttackerWins,
    /// The attacker is removed; the defender stays.
    AttackerLoses,
    /// Equal ranks: both cells are cleared.
    Mutual,
}

impl Capture {
    pub fn code(self) -> i32 {
        match self {
            Self::Failed => 0,
            Self::AttackerWins => 1,
            Self::AttackerLoses => 2,
            Self::Mutual => 3,
        }
    }

    pub fn succeeded(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Whether the round is over, judged from the cells alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Some cell is still hidden, or both camps still have pieces.
    Undetermined,
    /// Everything is revealed and no piece is left on the board.
    Draw,
    /// Everything is revealed and only this camp has pieces left.
    Winner(Camp),
}

impl Outcome {
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Undetermined)
    }
}

/// One desk's board.
///
/// `deal` is the face-down order fixed by [`shuffle`](Self::shuffle);
/// revealing cell `i` exposes `deal[i]`. `cells` is what players see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    deal: [Piece; PIECE_COUNT],
    cells: [Cell; PIECE_COUNT],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// A board with the deal order 1..=16 and every cell hidden.
    pub fn new() -> Self {
        Self {
            deal: std::array::from_fn(|i| Piece(i as u8 + 1)),
            cells: [Cell::Hidden; PIECE_COUNT],
        }
    }

    /// A board dealt in a fixed order. `order` must be a permutation of
    /// the ids 1..=16.
    pub fn with_deal_order(order: [u8; PIECE_COUNT]) -> Result<Self, BoardError> {
        let mut board = Self::new();
        let mut seen = [false; PIECE_COUNT];
        for (slot, id) in board.deal.iter_mut().zip(order) {
            let piece = Piece::new(id).ok_or(BoardError::InvalidPiece(id))?;
            let index = usize::from(id) - 1;
            if seen[index] {
                return Err(BoardError::DuplicatePiece(id));
            }
            seen[index] = true;
            *slot = piece;
        }
        Ok(board)
    }

    /// Back to the initial layout: ordered deal, every cell hidden.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Reshuffles the deal order and hides every cell.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cells = [Cell::Hidden; PIECE_COUNT];
        self.deal.shuffle(rng);
    }

    /// Turns cell `index` face up and returns the piece found there.
    ///
    /// Returns `None` without touching the board when `index` is out of
    /// range or the cell is not hidden.
    pub fn reveal(&mut self, index: usize) -> Option<Piece> {
        match self.cells.get(index) {
            Some(Cell::Hidden) => {
                let piece = self.deal[index];
                self.cells[index] = Cell::Revealed(piece);
                Some(piece)
            }
            _ => None,
        }
    }

    /// Moves the revealed piece at `src` onto the empty cell `dst`.
    pub fn move_piece(&mut self, src: usize, dst: usize) -> bool {
        if src == dst {
            return false;
        }
        match (self.piece_at(src), self.cells.get(dst)) {
            (Some(piece), Some(Cell::Empty)) => {
                self.cells[dst] = Cell::Revealed(piece);
                self.cells[src] = Cell::Empty;
                true
            }
            _ => false,
        }
    }

    /// The piece at `src` attacks the piece at `dst`.
    ///
    /// Both cells must hold revealed pieces of opposite camps. Ranks are
    /// compared within their camps; the lower rank is removed, equal
    /// ranks remove both. A rat attacking an elephant wins. An elephant
    /// attacking a rat also wins, by plain rank order.
    pub fn capture(&mut self, src: usize, dst: usize) -> Capture {
        let (Some(attacker), Some(defender)) = (self.piece_at(src), self.piece_at(dst)) else {
            return Capture::Failed;
        };
        if attacker.camp() == defender.camp() {
            return Capture::Failed;
        }

        let (mine, theirs) = (attacker.rank(), defender.rank());
        if mine == theirs {
            self.cells[src] = Cell::Empty;
            self.cells[dst] = Cell::Empty;
            return Capture::Mutual;
        }

        let attacker_loses = if mine == Piece::RAT && theirs == Piece::ELEPHANT {
            false
        } else {
            mine < theirs
        };

        self.cells[src] = Cell::Empty;
        if attacker_loses {
            Capture::AttackerLoses
        } else {
            self.cells[dst] = Cell::Revealed(attacker);
            Capture::AttackerWins
        }
    }

    pub fn outcome(&self) -> Outcome {
        if !self.is_fully_revealed() {
            return Outcome::Undetermined;
        }
        match (self.remaining(Camp::A), self.remaining(Camp::B)) {
            (0, 0) => Outcome::Draw,
            (_, 0) => Outcome::Winner(Camp::A),
            (0, _) => Outcome::Winner(Camp::B),
            _ => Outcome::Undetermined,
        }
    }

    pub fn is_fully_revealed(&self) -> bool {
        !self.cells.contains(&Cell::Hidden)
    }

    /// Revealed pieces of `camp` still on the board.
    pub fn remaining(&self, camp: Camp) -> usize {
        self.cells
            .iter()
            .filter_map(|cell| cell.piece())
            .filter(|piece| piece.camp() == camp)
            .count()
    }

    pub fn cell(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// The revealed piece at `index`, if any.
    pub fn piece_at(&self, index: usize) -> Option<Piece> {
        self.cell(index).and_then(Cell::piece)
    }

    /// Cells in wire encoding (`-1` hidden, `0` empty, piece id).
    pub fn cells_wire(&self) -> Vec<i32> {
        self.cells.iter().map(|cell| cell.wire()).collect()
    }

    /// The deal order as piece ids.
    pub fn deal_wire(&self) -> Vec<i32> {
        self.deal.iter().map(|piece| i32::from(piece.id())).collect()
    }
}

impl fmt::Display for Board {
    /// Compact dump for debug logs: deal order then visible cells.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deal={:?} cells={:?}", self.deal_wire(), self.cells_wire())
    }
}
