//! Wire vocabulary for the Doushou game service.
//!
//! This crate defines what the core and its clients say to each other:
//!
//! - **Types** ([`PlayerId`], [`DeskCode`], [`Camp`], [`DeskState`], ...) —
//!   identifiers and the numeric enums clients switch on.
//! - **Messages** ([`ClientMessage`], [`Reply`], [`Push`]) — every
//!   request, response and broadcast, with the exact JSON field names.
//! - **Outbound** ([`Outbound`]) — what the core hands to a session's
//!   transport adapter.
//!
//! It knows nothing about sockets, desks or players. Framing and byte
//! encoding belong to the transport adapter.

mod error;
mod message;
mod types;

pub use error::ProtocolError;
pub use message::{
    CampInfo, ClientMessage, CodeResponse, CoinChange, CreateDeskRequest, DeskBasicInfo,
    DeskOptions, DeskPlayerData, DeskRequest, DeskResponse, DuanPai, EmojiNotify, EmojiRequest,
    EnterDeskInfo, ExitRequest, ExitResponse, GameResult, HintPlayer, JoinDeskRequest,
    LoginResponse, OpenPieceRequest, OpenPieceResponse, Outbound, PieceEatNotify,
    PieceMoveNotify, PieceOpenNotify, PiecePairRequest, PiecesResponse, PlayerEnterDesk,
    PlayerProfile, Push, Reply, SyncDesk, TableInfo, UnCompleteDeskResponse,
};
pub use types::{Camp, DeskCode, DeskMode, DeskState, PlayerId, SessionId, code};
