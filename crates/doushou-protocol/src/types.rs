//! Identifiers and small enums shared by every Doushou crate.
//!
//! Everything here travels on the wire at some point, so the serde
//! representation is part of the contract: ids are plain numbers or
//! strings, and the enums the client switches on (camp, desk status,
//! desk mode) are serialized as their numeric codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable player identity, assigned by the account system.
///
/// `#[serde(transparent)]` keeps the JSON form a bare number, which is
/// what the client sends as `uid` / `acId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifies one live connection. Allocated by the transport adapter,
/// never reused while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// The externally visible room code of a desk (six decimal digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeskCode(String);

impl DeskCode {
    /// Number of digits in a generated code.
    pub const LEN: usize = 6;

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeskCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeskCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

// ---------------------------------------------------------------------------
// Camp
// ---------------------------------------------------------------------------

/// One of the two opposing sides of a match.
///
/// Camp A owns piece ids 1..=8, camp B owns 9..=16. Which player gets
/// which camp is drawn at random when a round starts, so the camp is
/// independent of seat order. On the wire a camp is `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Camp {
    A,
    B,
}

impl Camp {
    pub const BOTH: [Camp; 2] = [Camp::A, Camp::B];

    /// The other side.
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// The numeric wire code (1 or 2).
    pub fn code(self) -> u8 {
        match self {
            Self::A => 1,
            Self::B => 2,
        }
    }
}

impl From<Camp> for u8 {
    fn from(camp: Camp) -> u8 {
        camp.code()
    }
}

impl TryFrom<u8> for Camp {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::A),
            2 => Ok(Self::B),
            other => Err(ProtocolError::InvalidCamp(other)),
        }
    }
}

impl fmt::Display for Camp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

// ---------------------------------------------------------------------------
// DeskState
// ---------------------------------------------------------------------------

/// Lifecycle of a desk.
///
/// ```text
/// Created ─▶ DuanPai ─▶ QiPai ─▶ Playing ─▶ Interrupted ─▶ Destroyed
///    ▲                                                        │
///    └──────────── Cleaned (behaves like Created) ◀───────────┘
/// ```
///
/// `Destroyed` is reachable from every state. The numeric codes are the
/// `status` field clients receive in `tableInfo` and `onSyncDesk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DeskState {
    Created,
    /// Dealing: camps are drawn and the shuffled board is announced.
    DuanPai,
    /// Arranging: waiting for every seat to confirm it is ready to play.
    QiPai,
    Playing,
    Interrupted,
    Destroyed,
    Cleaned,
}

impl DeskState {
    /// Returns `true` for the states in which seats may change and a new
    /// round may start.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Created | Self::Cleaned)
    }

    /// Returns `true` once a round has been dealt and until it settles.
    pub fn is_in_round(self) -> bool {
        matches!(self, Self::DuanPai | Self::QiPai | Self::Playing)
    }

    pub fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroyed)
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::DuanPai => 1,
            Self::QiPai => 2,
            Self::Playing => 3,
            Self::Interrupted => 4,
            Self::Destroyed => 5,
            Self::Cleaned => 6,
        }
    }
}

impl From<DeskState> for u8 {
    fn from(state: DeskState) -> u8 {
        state.code()
    }
}

impl TryFrom<u8> for DeskState {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Created,
            1 => Self::DuanPai,
            2 => Self::QiPai,
            3 => Self::Playing,
            4 => Self::Interrupted,
            5 => Self::Destroyed,
            6 => Self::Cleaned,
            other => return Err(ProtocolError::InvalidDeskState(other)),
        })
    }
}

impl fmt::Display for DeskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::DuanPai => "DuanPai",
            Self::QiPai => "QiPai",
            Self::Playing => "Playing",
            Self::Interrupted => "Interrupted",
            Self::Destroyed => "Destroyed",
            Self::Cleaned => "Cleaned",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// DeskMode
// ---------------------------------------------------------------------------

/// How a desk was opened. The mode decides the stake charged to the
/// creator when a round starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DeskMode {
    /// A private room opened with a desk code.
    Room,
    /// A match desk.
    Match,
}

impl DeskMode {
    pub fn code(self) -> u8 {
        match self {
            Self::Room => 1,
            Self::Match => 2,
        }
    }

    /// Short human-readable label used in desk descriptions.
    pub fn label(self) -> &'static str {
        match self {
            Self::Room => "room mode",
            Self::Match => "match mode",
        }
    }
}

impl From<DeskMode> for u8 {
    fn from(mode: DeskMode) -> u8 {
        mode.code()
    }
}

impl TryFrom<u8> for DeskMode {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Room),
            2 => Ok(Self::Match),
            other => Err(ProtocolError::InvalidMode(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Response codes
// ---------------------------------------------------------------------------

/// Numeric result codes carried in the `code` field of responses.
pub mod code {
    pub const OK: i32 = 0;
    pub const FAIL: i32 = 1;
    /// `Code` of the `onDissolve` push: the desk no longer exists.
    pub const DISSOLVED: i32 = 2;
    /// `ReJoinDesk` / `ReEnterDesk` on a desk that is gone.
    pub const DESK_GONE: i32 = -1;

    pub const DESK_FULL: i32 = 1001;
    pub const JOIN_VERSION_EXPIRED: i32 = 1002;
    pub const DESK_NOT_FOUND: i32 = 1003;
    pub const ALREADY_IN_DESK: i32 = 1004;
    pub const CREATE_VERSION_EXPIRED: i32 = 1005;
    pub const NOT_ENOUGH_COIN: i32 = 1006;
    pub const NOT_IN_DESK: i32 = 1007;
}
