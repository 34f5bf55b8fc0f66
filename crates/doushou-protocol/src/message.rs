//! Request, response and push payloads.
//!
//! Field names follow the JSON contract the game client already speaks
//! (`deskId`, `indexSrc`, `headURL`, ...), so most structs carry explicit
//! `#[serde(rename)]` attributes rather than a blanket `rename_all`.
//!
//! Three enums tie the payloads to route names:
//!
//! - [`ClientMessage`] — everything a seated or lobby player can request
//! - [`Reply`] — the direct response to one request
//! - [`Push`] — a server-initiated message, usually broadcast to a desk
//!
//! All three are adjacently tagged: `{ "route": "OpenPiece", "body": {...} }`.
//! The transport adapter decides how that maps onto its own framing.

use serde::{Deserialize, Serialize};

use crate::{Camp, DeskCode, DeskMode, DeskState, PlayerId};

// ===========================================================================
// Requests
// ===========================================================================

/// Identity and profile sent with `Login` and `Reconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub uid: PlayerId,
    pub name: String,
    #[serde(rename = "headUrl", default)]
    pub head_url: String,
    #[serde(default)]
    pub sex: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskOptions {
    /// Raw mode code; validated against [`DeskMode`] by the lobby so an
    /// unknown value gets a response instead of a decode failure.
    pub mode: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDeskRequest {
    /// Client build version, checked when forced updates are on.
    #[serde(default)]
    pub version: String,
    pub options: DeskOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDeskRequest {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "deskId")]
    pub desk: DeskCode,
}

/// A request that only names a desk (`GiveUp`, `ReJoinDesk`, `ReEnterDesk`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskRequest {
    #[serde(rename = "deskId")]
    pub desk: DeskCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPieceRequest {
    pub index: i32,
}

/// Source and destination cells for `MovePiece` and `EatPiece`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecePairRequest {
    #[serde(rename = "indexSrc")]
    pub src: i32,
    #[serde(rename = "indexDest")]
    pub dest: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRequest {
    #[serde(rename = "isDestroy", default)]
    pub is_destroy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiRequest {
    pub index: i32,
}

/// Every request a logged-in session can make.
///
/// `Login` and `Reconnect` are not listed: they bind a session to a
/// player and therefore go through dedicated service entry points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "body")]
pub enum ClientMessage {
    CreateDesk(CreateDeskRequest),
    JoinDesk(JoinDeskRequest),
    Ready,
    ArrangeDone,
    GiveUp(DeskRequest),
    OpenPiece(OpenPieceRequest),
    MovePiece(PiecePairRequest),
    EatPiece(PiecePairRequest),
    Exit(ExitRequest),
    ReJoinDesk(DeskRequest),
    ReEnterDesk(DeskRequest),
    UnCompleteDesk,
    ShowEmoji(EmojiRequest),
}

impl ClientMessage {
    /// Route name, used in logs.
    pub fn route(&self) -> &'static str {
        match self {
            Self::CreateDesk(_) => "CreateDesk",
            Self::JoinDesk(_) => "JoinDesk",
            Self::Ready => "Ready",
            Self::ArrangeDone => "ArrangeDone",
            Self::GiveUp(_) => "GiveUp",
            Self::OpenPiece(_) => "OpenPiece",
            Self::MovePiece(_) => "MovePiece",
            Self::EatPiece(_) => "EatPiece",
            Self::Exit(_) => "Exit",
            Self::ReJoinDesk(_) => "ReJoinDesk",
            Self::ReEnterDesk(_) => "ReEnterDesk",
            Self::UnCompleteDesk => "UnCompleteDesk",
            Self::ShowEmoji(_) => "ShowEmoji",
        }
    }
}

// ===========================================================================
// Responses
// ===========================================================================

/// Desk summary returned by create/join and `UnCompleteDesk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(rename = "deskId")]
    pub desk: DeskCode,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub creator: PlayerId,
    pub title: String,
    pub desc: String,
    pub status: DeskState,
    pub mode: DeskMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub code: i32,
    pub uid: PlayerId,
    pub coin: i64,
}

/// Response to `CreateDesk` and `JoinDesk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskResponse {
    pub code: i32,
    #[serde(default)]
    pub error: String,
    #[serde(rename = "tableInfo", default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableInfo>,
}

impl DeskResponse {
    pub fn ok(table: TableInfo) -> Self {
        Self {
            code: crate::code::OK,
            error: String::new(),
            table: Some(table),
        }
    }

    pub fn fail(code: i32, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
            table: None,
        }
    }
}

/// A bare `{code, error}` response (`ReJoinDesk`, `ReEnterDesk`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeResponse {
    pub code: i32,
    #[serde(default)]
    pub error: String,
}

/// Response to `Exit`, also the body of the `onDissolve` push.
///
/// The capitalised `Code` key is what the client expects here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitResponse {
    #[serde(rename = "Code")]
    pub code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPieceResponse {
    pub code: i32,
    pub index: i32,
    pub piece: i32,
}

/// Response to `MovePiece` and `EatPiece`: result code plus the board.
///
/// For `EatPiece` the code is the capture result (0 failed, 1 attacker
/// wins, 2 attacker loses, 3 both destroyed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecesResponse {
    pub code: i32,
    pub pieces: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnCompleteDeskResponse {
    pub exist: bool,
    #[serde(rename = "tableInfo", default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableInfo>,
}

/// The direct response to one request, tagged with the request's route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "body")]
pub enum Reply {
    Login(LoginResponse),
    CreateDesk(DeskResponse),
    JoinDesk(DeskResponse),
    Exit(ExitResponse),
    OpenPiece(OpenPieceResponse),
    MovePiece(PiecesResponse),
    EatPiece(PiecesResponse),
    ReJoinDesk(CodeResponse),
    ReEnterDesk(CodeResponse),
    UnCompleteDesk(UnCompleteDeskResponse),
}

// ===========================================================================
// Pushes
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskBasicInfo {
    #[serde(rename = "deskId")]
    pub desk: DeskCode,
    pub title: String,
    pub desc: String,
    pub mode: DeskMode,
}

/// One seat as shown in `onPlayerEnter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterDeskInfo {
    #[serde(rename = "deskPos")]
    pub desk_pos: usize,
    #[serde(rename = "acId")]
    pub uid: PlayerId,
    pub nickname: String,
    #[serde(rename = "isReady")]
    pub is_ready: bool,
    pub sex: u8,
    #[serde(rename = "isExit")]
    pub is_exit: bool,
    #[serde(rename = "headURL")]
    pub head_url: String,
    pub score: i64,
    pub ip: String,
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEnterDesk {
    pub data: Vec<EnterDeskInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampInfo {
    pub uid: PlayerId,
    pub camp: Camp,
}

/// Broadcast when a round is dealt: the shuffled deal order and who plays
/// which camp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuanPai {
    pub pieces: Vec<i32>,
    pub camps: Vec<CampInfo>,
}

/// Turn hint: `uid` playing `camp` must act now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintPlayer {
    pub uid: PlayerId,
    pub camp: Camp,
    /// Unix seconds at which the turn opened.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceOpenNotify {
    pub uid: PlayerId,
    pub index: i32,
    pub piece: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceMoveNotify {
    pub uid: PlayerId,
    #[serde(rename = "indexSrc")]
    pub src: i32,
    #[serde(rename = "indexDest")]
    pub dest: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceEatNotify {
    pub uid: PlayerId,
    pub code: i32,
    #[serde(rename = "indexSrc")]
    pub src: i32,
    #[serde(rename = "indexDest")]
    pub dest: i32,
}

/// Round settlement.
///
/// A draw carries `winner = 0` and `camp = 0`, which is why both are
/// plain numbers rather than [`PlayerId`] / [`Camp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: u64,
    pub coin: i64,
    pub camp: u8,
    pub giveup: bool,
    #[serde(rename = "timeOut")]
    pub time_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinChange {
    pub coin: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskPlayerData {
    #[serde(rename = "acId")]
    pub uid: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camp: Option<Camp>,
}

/// Full desk snapshot pushed to a player who rejoins a running round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDesk {
    pub status: DeskState,
    pub players: Vec<DeskPlayerData>,
    pub pieces: Vec<i32>,
    /// Camp whose turn is open, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<Camp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiNotify {
    pub uid: PlayerId,
    pub index: i32,
}

/// Server-initiated messages, tagged with their `on...` route name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "body")]
pub enum Push {
    #[serde(rename = "onDeskBasicInfo")]
    DeskBasicInfo(DeskBasicInfo),
    #[serde(rename = "onPlayerEnter")]
    PlayerEnter(PlayerEnterDesk),
    #[serde(rename = "onDuanPai")]
    DuanPai(DuanPai),
    #[serde(rename = "onHintPlayer")]
    HintPlayer(HintPlayer),
    #[serde(rename = "onOpenPiece")]
    OpenPiece(PieceOpenNotify),
    #[serde(rename = "onMovePiece")]
    MovePiece(PieceMoveNotify),
    #[serde(rename = "onEatPiece")]
    EatPiece(PieceEatNotify),
    #[serde(rename = "onGameEnd")]
    GameEnd(GameResult),
    #[serde(rename = "onCoinChange")]
    CoinChange(CoinChange),
    #[serde(rename = "onSyncDesk")]
    SyncDesk(SyncDesk),
    #[serde(rename = "onDissolve")]
    Dissolve(ExitResponse),
    #[serde(rename = "onShowEnjoy")]
    Emoji(EmojiNotify),
}

impl Push {
    /// Route name as it appears on the wire.
    pub fn route(&self) -> &'static str {
        match self {
            Self::DeskBasicInfo(_) => "onDeskBasicInfo",
            Self::PlayerEnter(_) => "onPlayerEnter",
            Self::DuanPai(_) => "onDuanPai",
            Self::HintPlayer(_) => "onHintPlayer",
            Self::OpenPiece(_) => "onOpenPiece",
            Self::MovePiece(_) => "onMovePiece",
            Self::EatPiece(_) => "onEatPiece",
            Self::GameEnd(_) => "onGameEnd",
            Self::CoinChange(_) => "onCoinChange",
            Self::SyncDesk(_) => "onSyncDesk",
            Self::Dissolve(_) => "onDissolve",
            Self::Emoji(_) => "onShowEnjoy",
        }
    }
}

// ===========================================================================
// Outbound
// ===========================================================================

/// What the core hands to a session's transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Direct response to the request the session just made.
    Response(Reply),
    /// A push or a desk broadcast.
    Push(Push),
    /// The connection should be closed (replaced by a newer session, or
    /// kicked). Nothing more will be sent after this.
    Close { reason: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! These pin the JSON field names the client depends on.

    use super::*;

    #[test]
    fn test_client_message_open_piece_json_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{ "route": "OpenPiece", "body": { "index": 5 } }"#,
        )
        .unwrap();
        assert_eq!(msg, ClientMessage::OpenPiece(OpenPieceRequest { index: 5 }));
        assert_eq!(msg.route(), "OpenPiece");
    }

    #[test]
    fn test_client_message_unit_variant_without_body() {
        let msg: ClientMessage = serde_json::from_str(r#"{ "route": "Ready" }"#).unwrap();
        assert_eq!(msg, ClientMessage::Ready);
    }

    #[test]
    fn test_client_message_eat_piece_uses_index_names() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{ "route": "EatPiece", "body": { "indexSrc": 3, "indexDest": 4 } }"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::EatPiece(PiecePairRequest { src: 3, dest: 4 })
        );
    }

    #[test]
    fn test_create_desk_request_json_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{ "route": "CreateDesk", "body": { "version": "1.0.2", "options": { "mode": 1 } } }"#,
        )
        .unwrap();
        let ClientMessage::CreateDesk(req) = msg else {
            panic!("expected CreateDesk");
        };
        assert_eq!(req.version, "1.0.2");
        assert_eq!(req.options.mode, 1);
    }

    #[test]
    fn test_exit_request_defaults_is_destroy() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{ "route": "Exit", "body": {} }"#).unwrap();
        assert_eq!(msg, ClientMessage::Exit(ExitRequest { is_destroy: false }));
    }

    #[test]
    fn test_rejoin_request_uses_desk_id_key() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{ "route": "ReJoinDesk", "body": { "deskId": "123456" } }"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::ReJoinDesk(DeskRequest {
                desk: DeskCode::new("123456")
            })
        );
    }

    #[test]
    fn test_exit_response_uses_capitalised_code() {
        let json = serde_json::to_value(ExitResponse { code: 1007 }).unwrap();
        assert_eq!(json["Code"], 1007);
        assert!(json.get("code").is_none());
    }

    #[test]
    fn test_desk_response_failure_omits_table_info() {
        let json = serde_json::to_value(DeskResponse::fail(1003, "desk not found")).unwrap();
        assert_eq!(json["code"], 1003);
        assert_eq!(json["error"], "desk not found");
        assert!(json.get("tableInfo").is_none());
    }

    #[test]
    fn test_table_info_json_format() {
        let info = TableInfo {
            desk: DeskCode::new("000042"),
            created_at: 1_700_000_000,
            creator: PlayerId(9),
            title: "desk 000042".into(),
            desc: "doushou".into(),
            status: DeskState::Created,
            mode: DeskMode::Room,
        };
        let json = serde_json::to_value(DeskResponse::ok(info)).unwrap();
        let table = &json["tableInfo"];
        assert_eq!(table["deskId"], "000042");
        assert_eq!(table["createdAt"], 1_700_000_000);
        assert_eq!(table["creator"], 9);
        assert_eq!(table["status"], 0);
        assert_eq!(table["mode"], 1);
    }

    #[test]
    fn test_push_route_matches_serialized_tag() {
        let push = Push::HintPlayer(HintPlayer {
            uid: PlayerId(1),
            camp: Camp::B,
            timestamp: 77,
        });
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["route"], push.route());
        assert_eq!(json["body"]["uid"], 1);
        assert_eq!(json["body"]["camp"], 2);
        assert_eq!(json["body"]["timestamp"], 77);
    }

    #[test]
    fn test_game_result_json_format() {
        let push = Push::GameEnd(GameResult {
            winner: 3,
            coin: 2,
            camp: 1,
            giveup: false,
            time_out: true,
        });
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["route"], "onGameEnd");
        assert_eq!(json["body"]["winner"], 3);
        assert_eq!(json["body"]["timeOut"], true);
        assert_eq!(json["body"]["giveup"], false);
    }

    #[test]
    fn test_enter_desk_info_json_format() {
        let info = EnterDeskInfo {
            desk_pos: 1,
            uid: PlayerId(5),
            nickname: "bo".into(),
            is_ready: true,
            sex: 1,
            is_exit: false,
            head_url: "http://img/5.png".into(),
            score: 1000,
            ip: "10.0.0.5".into(),
            offline: true,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["deskPos"], 1);
        assert_eq!(json["acId"], 5);
        assert_eq!(json["isReady"], true);
        assert_eq!(json["headURL"], "http://img/5.png");
        assert_eq!(json["offline"], true);
    }

    #[test]
    fn test_duan_pai_camps_serialize_as_codes() {
        let push = Push::DuanPai(DuanPai {
            pieces: vec![3, 9, 1],
            camps: vec![
                CampInfo { uid: PlayerId(1), camp: Camp::B },
                CampInfo { uid: PlayerId(2), camp: Camp::A },
            ],
        });
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["body"]["pieces"], serde_json::json!([3, 9, 1]));
        assert_eq!(json["body"]["camps"][0]["camp"], 2);
        assert_eq!(json["body"]["camps"][1]["uid"], 2);
    }

    #[test]
    fn test_pieces_response_json_format() {
        let reply = Reply::EatPiece(PiecesResponse {
            code: 3,
            pieces: vec![-1, 0, 12],
        });
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["route"], "EatPiece");
        assert_eq!(json["body"]["code"], 3);
        assert_eq!(json["body"]["pieces"], serde_json::json!([-1, 0, 12]));
    }
}
