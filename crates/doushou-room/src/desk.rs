//! Desk actor: one Tokio task per desk that owns the seats, the board and
//! the round state.
//!
//! Every request for a desk is a [`DeskCommand`] on the desk's queue, and
//! so is the control loop's own turn bookkeeping. Commands are handled to
//! completion one at a time. Turn ownership is checked and the board is
//! mutated in the same step, so two actions racing for one turn cannot
//! both be accepted.

use std::collections::HashSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use doushou_board::{Board, Cell, Outcome};
use doushou_protocol::{
    Camp, CampInfo, DeskBasicInfo, DeskCode, DeskMode, DeskPlayerData, DeskState, DuanPai,
    EmojiNotify, EnterDeskInfo, ExitResponse, GameResult, HintPlayer, OpenPieceResponse,
    PieceEatNotify, PieceMoveNotify, PieceOpenNotify, PiecesResponse, PlayerEnterDesk, PlayerId,
    Push, Reply, SessionId, SyncDesk, TableInfo, code,
};
use doushou_session::Session;
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SEATS;
use crate::control::spawn_round;
use crate::gate::{RoundGates, TurnEnd, TurnSignal, turn_gate};
use crate::seat::{Seat, SeatProfile};
use crate::{DeskConfig, DeskError};

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

/// A board action from the player who owns the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reveal { index: i32 },
    Move { src: i32, dest: i32 },
    Capture { src: i32, dest: i32 },
}

/// How the control loop saw the round end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundEnd {
    Board(Outcome),
    Surrender { loser: Camp },
    Timeout { loser: Camp },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyCause {
    /// The round was played out; carries the broadcast result.
    Settled(GameResult),
    /// A player left before the round started.
    Dissolved,
    /// Destroyed from outside (sweep or service shutdown).
    Requested,
}

/// Events a desk reports to whoever owns the registry.
///
/// Sent on an unbounded channel so the desk never waits on its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskNotice {
    /// Camps were drawn and the board dealt.
    RoundStarted {
        desk: DeskCode,
        creator: PlayerId,
        mode: DeskMode,
        stake: i64,
        camps: Vec<(PlayerId, Camp)>,
    },
    /// Sent exactly once per desk. `players` are the seats at that moment.
    Destroyed {
        desk: DeskCode,
        players: Vec<PlayerId>,
        cause: DestroyCause,
        /// Persisted room record, if its insert came back in time.
        record: Option<i64>,
    },
}

pub type NoticeSender = mpsc::UnboundedSender<DeskNotice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<DeskNotice>;

/// Fixed facts about a desk, decided when it is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskSpec {
    pub code: DeskCode,
    pub creator: PlayerId,
    pub mode: DeskMode,
    /// Charged to the creator at deal time, reported in `onGameEnd`.
    pub stake: i64,
    pub created_at: i64,
}

/// A snapshot of a desk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskInfo {
    pub spec: DeskSpec,
    pub state: DeskState,
    pub players: Vec<PlayerId>,
    pub ready: Vec<PlayerId>,
    /// Camp whose turn is open right now.
    pub turn: Option<Camp>,
    pub last_hinted: Option<PlayerId>,
    pub cells: Vec<i32>,
    pub record: Option<i64>,
}

impl DeskInfo {
    pub fn table(&self) -> TableInfo {
        table_info(&self.spec, self.state)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= SEATS
    }

    pub fn is_seated(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }
}

fn table_info(spec: &DeskSpec, state: DeskState) -> TableInfo {
    TableInfo {
        desk: spec.code.clone(),
        created_at: spec.created_at,
        creator: spec.creator,
        title: title(&spec.code),
        desc: desc(spec.mode),
        status: state,
        mode: spec.mode,
    }
}

fn title(code: &DeskCode) -> String {
    format!("Desk {code}")
}

fn desc(mode: DeskMode) -> String {
    format!("Doushou {}", mode.label())
}

/// Negative wire indices map to an index the board treats as out of range.
fn board_index(index: i32) -> usize {
    usize::try_from(index).unwrap_or(usize::MAX)
}

/// Commands sent to a desk actor. Variants with a `reply` are answered on
/// that oneshot channel.
pub(crate) enum DeskCommand {
    Join {
        seat: SeatProfile,
        session: Option<Session>,
        reply: oneshot::Sender<Result<TableInfo, DeskError>>,
    },
    Ready {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), DeskError>>,
    },
    ArrangeDone {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), DeskError>>,
    },
    Act {
        player: PlayerId,
        action: Action,
        reply: oneshot::Sender<Result<Reply, DeskError>>,
    },
    GiveUp {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), DeskError>>,
    },
    Exit {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), DeskError>>,
    },
    /// Take a session out of the broadcast group.
    Detach {
        player: PlayerId,
        session: SessionId,
        offline: bool,
    },
    Rejoin {
        player: PlayerId,
        session: Session,
        reply: oneshot::Sender<Result<(), DeskError>>,
    },
    Emoji {
        player: PlayerId,
        index: i32,
    },
    Info {
        reply: oneshot::Sender<DeskInfo>,
    },
    SetRecord {
        id: i64,
    },
    Destroy {
        reply: oneshot::Sender<bool>,
    },

    // Control loop.
    BeginRound {
        reply: oneshot::Sender<bool>,
    },
    OpenTurn {
        camp: Camp,
        reply: oneshot::Sender<Option<PlayerId>>,
    },
    ExpireTurn {
        camp: Camp,
        reply: oneshot::Sender<bool>,
    },
    Settle {
        end: RoundEnd,
    },
}

/// Handle to a running desk actor.
///
/// Cheap to clone: a channel sender and a watch receiver. The registry
/// holds one per desk; the control loop holds another while a round runs.
#[derive(Clone)]
pub struct DeskHandle {
    code: DeskCode,
    created_at: i64,
    sender: mpsc::Sender<DeskCommand>,
    termination: watch::Receiver<bool>,
}

impl fmt::Debug for DeskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeskHandle")
            .field("code", &self.code)
            .field("created_at", &self.created_at)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl DeskHandle {
    pub fn code(&self) -> &DeskCode {
        &self.code
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// `true` once the desk has been destroyed or its actor is gone.
    pub fn is_destroyed(&self) -> bool {
        *self.termination.borrow() || self.sender.is_closed()
    }

    /// Resolves when the desk's termination signal fires.
    pub async fn destroyed(&self) {
        let mut termination = self.termination.clone();
        let _ = termination.wait_for(|done| *done).await;
    }

    pub(crate) fn termination(&self) -> watch::Receiver<bool> {
        self.termination.clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DeskCommand,
    ) -> Result<T, DeskError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| DeskError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| DeskError::Unavailable(self.code.clone()))
    }

    async fn tell(&self, command: DeskCommand) -> Result<(), DeskError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| DeskError::Unavailable(self.code.clone()))
    }

    /// Seats a player and returns the desk's `tableInfo`.
    pub async fn join(
        &self,
        seat: SeatProfile,
        session: Option<Session>,
    ) -> Result<TableInfo, DeskError> {
        self.request(|reply| DeskCommand::Join {
            seat,
            session,
            reply,
        })
        .await?
    }

    pub async fn ready(&self, player: PlayerId) -> Result<(), DeskError> {
        self.request(|reply| DeskCommand::Ready { player, reply })
            .await?
    }

    pub async fn arrange_done(&self, player: PlayerId) -> Result<(), DeskError> {
        self.request(|reply| DeskCommand::ArrangeDone { player, reply })
            .await?
    }

    /// Applies a board action. `Ok` carries the response for the actor,
    /// which may itself report a failed move; `Err` means the action was
    /// not admitted at all.
    pub async fn act(&self, player: PlayerId, action: Action) -> Result<Reply, DeskError> {
        self.request(|reply| DeskCommand::Act {
            player,
            action,
            reply,
        })
        .await?
    }

    pub async fn give_up(&self, player: PlayerId) -> Result<(), DeskError> {
        self.request(|reply| DeskCommand::GiveUp { player, reply })
            .await?
    }

    /// Leaves before the round starts, which dissolves the desk.
    pub async fn exit(&self, player: PlayerId) -> Result<(), DeskError> {
        self.request(|reply| DeskCommand::Exit { player, reply })
            .await?
    }

    /// Removes `session` from the broadcast group. With `offline` the seat
    /// is also marked offline; membership, camp and ready state stay.
    pub async fn detach(
        &self,
        player: PlayerId,
        session: SessionId,
        offline: bool,
    ) -> Result<(), DeskError> {
        self.tell(DeskCommand::Detach {
            player,
            session,
            offline,
        })
        .await
    }

    /// Resyncs a seated player on `session` and attaches it to the group.
    pub async fn rejoin(&self, player: PlayerId, session: Session) -> Result<(), DeskError> {
        self.request(|reply| DeskCommand::Rejoin {
            player,
            session,
            reply,
        })
        .await?
    }

    pub async fn emoji(&self, player: PlayerId, index: i32) -> Result<(), DeskError> {
        self.tell(DeskCommand::Emoji { player, index }).await
    }

    pub async fn info(&self) -> Result<DeskInfo, DeskError> {
        self.request(|reply| DeskCommand::Info { reply }).await
    }

    /// Attaches the id of the persisted room record. It comes back with
    /// the `Destroyed` notice.
    pub async fn set_record(&self, id: i64) -> Result<(), DeskError> {
        self.tell(DeskCommand::SetRecord { id }).await
    }

    /// Destroys the desk. Returns `false` if it was already destroyed.
    pub async fn destroy(&self) -> Result<bool, DeskError> {
        self.request(|reply| DeskCommand::Destroy { reply }).await
    }

    pub(crate) async fn begin_round(&self) -> Result<bool, DeskError> {
        self.request(|reply| DeskCommand::BeginRound { reply }).await
    }

    pub(crate) async fn open_turn(&self, camp: Camp) -> Result<Option<PlayerId>, DeskError> {
        self.request(|reply| DeskCommand::OpenTurn { camp, reply })
            .await
    }

    pub(crate) async fn expire_turn(&self, camp: Camp) -> Result<bool, DeskError> {
        self.request(|reply| DeskCommand::ExpireTurn { camp, reply })
            .await
    }

    pub(crate) async fn settle(&self, end: RoundEnd) -> Result<(), DeskError> {
        self.tell(DeskCommand::Settle { end }).await
    }
}

/// The desk's state. Lives inside the actor task.
struct DeskActor {
    spec: DeskSpec,
    state: DeskState,
    seats: Vec<Seat>,
    board: Board,
    ready: HashSet<PlayerId>,
    arranged: HashSet<PlayerId>,
    /// Camp whose turn is open. `None` between turns.
    current: Option<Camp>,
    first_camp: Camp,
    last_hinted: Option<PlayerId>,
    record: Option<i64>,
    termination: watch::Sender<bool>,
    notices: NoticeSender,
    config: DeskConfig,
    /// Used to hand the control loop a handle without keeping the actor's
    /// own queue alive.
    this: mpsc::WeakSender<DeskCommand>,
    receiver: mpsc::Receiver<DeskCommand>,
}

impl DeskActor {
    async fn run(mut self) {
        tracing::info!(
            desk = %self.spec.code,
            creator = %self.spec.creator,
            mode = self.spec.mode.label(),
            "desk actor started"
        );

        while let Some(command) = self.receiver.recv().await {
            self.handle(command);
        }

        tracing::info!(desk = %self.spec.code, "desk actor stopped");
    }

    fn handle(&mut self, command: DeskCommand) {
        match command {
            DeskCommand::Join {
                seat,
                session,
                reply,
            } => {
                let _ = reply.send(self.handle_join(seat, session));
            }
            DeskCommand::Ready { player, reply } => {
                let _ = reply.send(self.handle_ready(player));
            }
            DeskCommand::ArrangeDone { player, reply } => {
                let _ = reply.send(self.handle_arrange_done(player));
            }
            DeskCommand::Act {
                player,
                action,
                reply,
            } => {
                let result = self.handle_act(player, action);
                if let Err(err) = &result {
                    tracing::debug!(
                        desk = %self.spec.code,
                        player_id = %player,
                        ?action,
                        %err,
                        "action rejected"
                    );
                }
                let _ = reply.send(result);
            }
            DeskCommand::GiveUp { player, reply } => {
                let result = self.handle_give_up(player);
                if let Err(err) = &result {
                    tracing::debug!(
                        desk = %self.spec.code,
                        player_id = %player,
                        %err,
                        "surrender rejected"
                    );
                }
                let _ = reply.send(result);
            }
            DeskCommand::Exit { player, reply } => {
                let _ = reply.send(self.handle_exit(player));
            }
            DeskCommand::Detach {
                player,
                session,
                offline,
            } => self.handle_detach(player, session, offline),
            DeskCommand::Rejoin {
                player,
                session,
                reply,
            } => {
                let _ = reply.send(self.handle_rejoin(player, session));
            }
            DeskCommand::Emoji { player, index } => {
                if self.seat(player).is_some() {
                    self.broadcast(Push::Emoji(EmojiNotify { uid: player, index }));
                }
            }
            DeskCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            DeskCommand::SetRecord { id } => {
                if self.state.is_destroyed() {
                    tracing::warn!(desk = %self.spec.code, record = id, "record id arrived after destroy");
                } else {
                    self.record = Some(id);
                }
            }
            DeskCommand::Destroy { reply } => {
                let _ = reply.send(self.destroy(DestroyCause::Requested));
            }
            DeskCommand::BeginRound { reply } => {
                let _ = reply.send(self.begin_round());
            }
            DeskCommand::OpenTurn { camp, reply } => {
                let _ = reply.send(self.open_turn(camp));
            }
            DeskCommand::ExpireTurn { camp, reply } => {
                let _ = reply.send(self.expire_turn(camp));
            }
            DeskCommand::Settle { end } => {
                if self.state == DeskState::Playing {
                    self.settle(end);
                } else {
                    tracing::debug!(
                        desk = %self.spec.code,
                        state = %self.state,
                        "settle ignored, round not playing"
                    );
                }
            }
        }
    }

    // -- Seating ----------------------------------------------------------

    fn handle_join(
        &mut self,
        profile: SeatProfile,
        session: Option<Session>,
    ) -> Result<TableInfo, DeskError> {
        let uid = profile.uid;
        if self.seat(uid).is_some() {
            return Err(DeskError::AlreadySeated(uid, self.spec.code.clone()));
        }
        if self.seats.len() >= SEATS {
            return Err(DeskError::Full(self.spec.code.clone()));
        }
        if !self.state.is_open() {
            return Err(DeskError::InvalidState(self.state));
        }

        self.seats.push(Seat::new(profile, session));
        tracing::info!(
            desk = %self.spec.code,
            player_id = %uid,
            players = self.seats.len(),
            "player seated"
        );
        self.broadcast_enter();
        Ok(table_info(&self.spec, self.state))
    }

    fn handle_ready(&mut self, player: PlayerId) -> Result<(), DeskError> {
        self.seated(player)?;
        if !self.state.is_open() {
            return Err(DeskError::InvalidState(self.state));
        }
        self.ready.insert(player);
        self.broadcast_enter();
        self.check_start();
        Ok(())
    }

    fn handle_exit(&mut self, player: PlayerId) -> Result<(), DeskError> {
        let position = self
            .seats
            .iter()
            .position(|seat| seat.uid() == player)
            .ok_or_else(|| DeskError::NotSeated(player, self.spec.code.clone()))?;
        if !self.state.is_open() {
            return Err(DeskError::InvalidState(self.state));
        }

        self.seats.remove(position);
        self.ready.remove(&player);
        tracing::info!(
            desk = %self.spec.code,
            player_id = %player,
            "player left before the round, dissolving desk"
        );
        self.broadcast(Push::Dissolve(ExitResponse {
            code: code::DISSOLVED,
        }));
        self.destroy(DestroyCause::Dissolved);
        Ok(())
    }

    fn handle_detach(&mut self, player: PlayerId, session: SessionId, offline: bool) {
        let code = self.spec.code.clone();
        let Some(seat) = self.seat_mut(player) else {
            tracing::debug!(desk = %code, player_id = %player, "detach for unseated player");
            return;
        };
        let attached = seat.session.as_ref().map(Session::id) == Some(session);
        if attached {
            seat.session = None;
        }
        if offline && (attached || seat.session.is_none()) {
            seat.online = false;
            tracing::info!(desk = %code, player_id = %player, "seat offline");
        }
    }

    fn handle_rejoin(&mut self, player: PlayerId, session: Session) -> Result<(), DeskError> {
        self.seated(player)?;
        if self.state.is_destroyed() {
            return Err(DeskError::InvalidState(self.state));
        }

        session.push(Push::DeskBasicInfo(self.basic_info()));
        session.push(Push::PlayerEnter(self.enter_info()));

        if let Some(seat) = self.seat_mut(player) {
            seat.attach(session.clone());
        }
        tracing::info!(
            desk = %self.spec.code,
            player_id = %player,
            state = %self.state,
            "player rejoined desk"
        );

        if self.state.is_in_round() {
            session.push(Push::SyncDesk(self.sync_desk()));
        } else {
            self.ready.insert(player);
            self.broadcast_enter();
            self.check_start();
        }
        Ok(())
    }

    // -- Round start ------------------------------------------------------

    fn check_start(&mut self) {
        if !self.state.is_open() {
            tracing::debug!(desk = %self.spec.code, state = %self.state, "cannot start in this state");
            return;
        }
        if self.seats.len() < SEATS {
            tracing::debug!(
                desk = %self.spec.code,
                players = self.seats.len(),
                "waiting for more players"
            );
            return;
        }
        if let Some(seat) = self.seats.iter().find(|s| !self.ready.contains(&s.uid())) {
            tracing::debug!(desk = %self.spec.code, player_id = %seat.uid(), "player not ready");
            return;
        }
        self.deal();
    }

    fn deal(&mut self) {
        self.state = DeskState::DuanPai;
        self.board.shuffle();

        let mut rng = rand::rng();
        let first_seat = if rng.random_bool(0.5) { Camp::A } else { Camp::B };
        for (position, seat) in self.seats.iter_mut().enumerate() {
            seat.camp = Some(if position == 0 {
                first_seat
            } else {
                first_seat.opponent()
            });
        }
        self.first_camp = if rng.random_bool(0.5) { Camp::A } else { Camp::B };
        self.arranged.clear();

        tracing::info!(
            desk = %self.spec.code,
            first_camp = self.first_camp.code(),
            "round dealt"
        );
        tracing::debug!(desk = %self.spec.code, board = %self.board, "deal order");

        let camps: Vec<(PlayerId, Camp)> = self
            .seats
            .iter()
            .filter_map(|seat| seat.camp.map(|camp| (seat.uid(), camp)))
            .collect();

        self.broadcast(Push::DeskBasicInfo(self.basic_info()));
        self.broadcast(Push::DuanPai(DuanPai {
            pieces: self.board.deal_wire(),
            camps: camps
                .iter()
                .map(|&(uid, camp)| CampInfo { uid, camp })
                .collect(),
        }));

        self.notify(DeskNotice::RoundStarted {
            desk: self.spec.code.clone(),
            creator: self.spec.creator,
            mode: self.spec.mode,
            stake: self.spec.stake,
            camps,
        });
    }

    fn handle_arrange_done(&mut self, player: PlayerId) -> Result<(), DeskError> {
        self.seated(player)?;
        if self.state != DeskState::DuanPai {
            return Err(DeskError::InvalidState(self.state));
        }
        self.arranged.insert(player);
        if self.seats.iter().all(|s| self.arranged.contains(&s.uid())) {
            self.arm_round();
        }
        Ok(())
    }

    /// Fresh gates for every seat, then the control loop.
    fn arm_round(&mut self) {
        self.state = DeskState::QiPai;

        let (gate_a, receiver_a) = turn_gate();
        let (gate_b, receiver_b) = turn_gate();
        for seat in &mut self.seats {
            seat.gate = match seat.camp {
                Some(Camp::A) => Some(gate_a.clone()),
                Some(Camp::B) => Some(gate_b.clone()),
                None => None,
            };
        }

        let Some(sender) = self.this.upgrade() else {
            tracing::warn!(desk = %self.spec.code, "desk queue closed, round not started");
            return;
        };
        let handle = DeskHandle {
            code: self.spec.code.clone(),
            created_at: self.spec.created_at,
            sender,
            termination: self.termination.subscribe(),
        };
        tracing::info!(desk = %self.spec.code, "all players arranged, starting control loop");
        spawn_round(
            handle,
            RoundGates::new(receiver_a, receiver_b),
            self.first_camp,
            self.config.turn_timeout,
        );
    }

    // -- Turns ------------------------------------------------------------

    fn begin_round(&mut self) -> bool {
        if self.state != DeskState::QiPai {
            return false;
        }
        self.state = DeskState::Playing;
        tracing::info!(desk = %self.spec.code, "round playing");
        true
    }

    fn open_turn(&mut self, camp: Camp) -> Option<PlayerId> {
        if self.state != DeskState::Playing {
            return None;
        }
        let uid = self.seats.iter().find(|s| s.camp == Some(camp))?.uid();
        self.current = Some(camp);
        self.last_hinted = Some(uid);
        self.broadcast(Push::HintPlayer(HintPlayer {
            uid,
            camp,
            timestamp: unix_now(),
        }));
        Some(uid)
    }

    fn expire_turn(&mut self, camp: Camp) -> bool {
        if self.state != DeskState::Playing || self.current != Some(camp) {
            return false;
        }
        tracing::info!(desk = %self.spec.code, camp = camp.code(), "turn timed out");
        self.settle(RoundEnd::Timeout { loser: camp });
        true
    }

    /// Admission check for every board action and surrender.
    fn admit(&self, player: PlayerId) -> Result<Camp, DeskError> {
        let seat = self.seated(player)?;
        if self.state != DeskState::Playing {
            return Err(DeskError::InvalidState(self.state));
        }
        match seat.camp {
            Some(camp) if self.current == Some(camp) => Ok(camp),
            _ => Err(DeskError::NotYourTurn(player)),
        }
    }

    fn handle_act(&mut self, player: PlayerId, action: Action) -> Result<Reply, DeskError> {
        let camp = self.admit(player)?;
        let reply = match action {
            Action::Reveal { index } => self.reveal(player, index),
            Action::Move { src, dest } => {
                self.check_owner(player, camp, src)?;
                self.move_piece(player, src, dest)
            }
            Action::Capture { src, dest } => {
                self.check_owner(player, camp, src)?;
                self.capture(player, src, dest)
            }
        };
        Ok(reply)
    }

    fn check_owner(&self, player: PlayerId, camp: Camp, src: i32) -> Result<(), DeskError> {
        match self.board.piece_at(board_index(src)) {
            Some(piece) if piece.camp() != camp => {
                Err(DeskError::ForeignPiece { player, index: src })
            }
            _ => Ok(()),
        }
    }

    fn reveal(&mut self, player: PlayerId, index: i32) -> Reply {
        let Some(piece) = self.board.reveal(board_index(index)) else {
            tracing::debug!(desk = %self.spec.code, player_id = %player, index, "reveal failed");
            return Reply::OpenPiece(OpenPieceResponse {
                code: code::FAIL,
                index,
                piece: Cell::Hidden.wire(),
            });
        };
        let piece = i32::from(piece.id());
        self.broadcast(Push::OpenPiece(PieceOpenNotify {
            uid: player,
            index,
            piece,
        }));
        self.accept(player);
        Reply::OpenPiece(OpenPieceResponse {
            code: code::OK,
            index,
            piece,
        })
    }

    fn move_piece(&mut self, player: PlayerId, src: i32, dest: i32) -> Reply {
        if !self.board.move_piece(board_index(src), board_index(dest)) {
            tracing::debug!(desk = %self.spec.code, player_id = %player, src, dest, "move failed");
            return Reply::MovePiece(PiecesResponse {
                code: code::FAIL,
                pieces: self.board.cells_wire(),
            });
        }
        self.broadcast(Push::MovePiece(PieceMoveNotify {
            uid: player,
            src,
            dest,
        }));
        self.accept(player);
        Reply::MovePiece(PiecesResponse {
            code: code::OK,
            pieces: self.board.cells_wire(),
        })
    }

    fn capture(&mut self, player: PlayerId, src: i32, dest: i32) -> Reply {
        let result = self.board.capture(board_index(src), board_index(dest));
        if result.succeeded() {
            self.broadcast(Push::EatPiece(PieceEatNotify {
                uid: player,
                code: result.code(),
                src,
                dest,
            }));
            self.accept(player);
        } else {
            tracing::debug!(desk = %self.spec.code, player_id = %player, src, dest, "capture failed");
        }
        Reply::EatPiece(PiecesResponse {
            code: result.code(),
            pieces: self.board.cells_wire(),
        })
    }

    fn handle_give_up(&mut self, player: PlayerId) -> Result<(), DeskError> {
        self.admit(player)?;
        tracing::info!(desk = %self.spec.code, player_id = %player, "player gave up");
        self.close_turn(player, TurnEnd::Surrender);
        Ok(())
    }

    /// An accepted board action ends the turn.
    fn accept(&mut self, player: PlayerId) {
        let end = match self.board.outcome() {
            outcome if outcome.is_decided() => TurnEnd::Decided(outcome),
            _ => TurnEnd::Advance,
        };
        self.close_turn(player, end);
    }

    /// Closes the turn before signalling, so a second action for the same
    /// turn fails admission even if the control loop has not woken yet.
    fn close_turn(&mut self, player: PlayerId, end: TurnEnd) {
        self.current = None;
        let code = self.spec.code.clone();
        let Some(gate) = self.seat(player).and_then(|seat| seat.gate.as_ref()) else {
            tracing::warn!(desk = %code, player_id = %player, "no turn gate for seat");
            return;
        };
        if let Err(err) = gate.try_send(TurnSignal { player, end }) {
            tracing::warn!(desk = %code, player_id = %player, %err, "turn gate refused signal");
        }
    }

    // -- Settlement and teardown -----------------------------------------

    fn settle(&mut self, end: RoundEnd) {
        self.current = None;
        self.state = DeskState::Interrupted;

        let (winner_camp, giveup, time_out) = match end {
            RoundEnd::Board(Outcome::Winner(camp)) => (Some(camp), false, false),
            RoundEnd::Board(_) => (None, false, false),
            RoundEnd::Surrender { loser } => (Some(loser.opponent()), true, false),
            RoundEnd::Timeout { loser } => (Some(loser.opponent()), false, true),
        };
        let winner = winner_camp
            .and_then(|camp| self.seats.iter().find(|s| s.camp == Some(camp)))
            .map_or(0, |seat| seat.uid().0);
        let result = GameResult {
            winner,
            coin: self.spec.stake,
            camp: winner_camp.map_or(0, Camp::code),
            giveup,
            time_out,
        };

        tracing::info!(
            desk = %self.spec.code,
            winner,
            camp = result.camp,
            giveup,
            time_out,
            "round settled"
        );
        self.broadcast(Push::GameEnd(result));
        self.destroy(DestroyCause::Settled(result));
    }

    /// Idempotent. Fires the termination signal, empties the seats (which
    /// drops their gates and sessions) and notifies the owner once.
    fn destroy(&mut self, cause: DestroyCause) -> bool {
        if self.state.is_destroyed() {
            tracing::info!(desk = %self.spec.code, "desk already destroyed");
            return false;
        }
        self.state = DeskState::Destroyed;
        self.current = None;
        self.termination.send_replace(true);

        let players: Vec<PlayerId> = self.seats.drain(..).map(|seat| seat.uid()).collect();
        self.ready.clear();
        self.arranged.clear();

        tracing::info!(
            desk = %self.spec.code,
            ?cause,
            players = players.len(),
            "desk destroyed"
        );
        self.notify(DeskNotice::Destroyed {
            desk: self.spec.code.clone(),
            players,
            cause,
            record: self.record,
        });
        true
    }

    fn notify(&self, notice: DeskNotice) {
        if self.notices.send(notice).is_err() {
            tracing::debug!(desk = %self.spec.code, "notice receiver gone");
        }
    }

    // -- Projections ------------------------------------------------------

    fn seat(&self, player: PlayerId) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.uid() == player)
    }

    fn seat_mut(&mut self, player: PlayerId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|seat| seat.uid() == player)
    }

    fn seated(&self, player: PlayerId) -> Result<&Seat, DeskError> {
        self.seat(player)
            .ok_or_else(|| DeskError::NotSeated(player, self.spec.code.clone()))
    }

    fn broadcast(&self, push: Push) {
        for seat in &self.seats {
            seat.push(push.clone());
        }
    }

    fn broadcast_enter(&self) {
        self.broadcast(Push::PlayerEnter(self.enter_info()));
    }

    fn basic_info(&self) -> DeskBasicInfo {
        DeskBasicInfo {
            desk: self.spec.code.clone(),
            title: title(&self.spec.code),
            desc: desc(self.spec.mode),
            mode: self.spec.mode,
        }
    }

    fn enter_info(&self) -> PlayerEnterDesk {
        let data = self
            .seats
            .iter()
            .enumerate()
            .map(|(position, seat)| EnterDeskInfo {
                desk_pos: position,
                uid: seat.uid(),
                nickname: seat.profile.name.clone(),
                is_ready: self.ready.contains(&seat.uid()),
                sex: seat.profile.sex,
                is_exit: false,
                head_url: seat.profile.head_url.clone(),
                score: seat.profile.coin,
                ip: seat.profile.ip.clone(),
                offline: !seat.online,
            })
            .collect();
        PlayerEnterDesk { data }
    }

    fn sync_desk(&self) -> SyncDesk {
        SyncDesk {
            status: self.state,
            players: self
                .seats
                .iter()
                .map(|seat| DeskPlayerData {
                    uid: seat.uid(),
                    camp: seat.camp,
                })
                .collect(),
            pieces: self.board.cells_wire(),
            turn: self.current,
        }
    }

    fn info(&self) -> DeskInfo {
        DeskInfo {
            spec: self.spec.clone(),
            state: self.state,
            players: self.seats.iter().map(Seat::uid).collect(),
            ready: self
                .seats
                .iter()
                .map(Seat::uid)
                .filter(|uid| self.ready.contains(uid))
                .collect(),
            turn: self.current,
            last_hinted: self.last_hinted,
            cells: self.board.cells_wire(),
            record: self.record,
        }
    }
}

/// Spawns a desk actor and returns a handle to it.
pub(crate) fn spawn_desk(spec: DeskSpec, config: &DeskConfig, notices: NoticeSender) -> DeskHandle {
    let (sender, receiver) = mpsc::channel(config.channel_size.max(1));
    let (termination, termination_rx) = watch::channel(false);

    let handle = DeskHandle {
        code: spec.code.clone(),
        created_at: spec.created_at,
        sender: sender.clone(),
        termination: termination_rx,
    };

    let actor = DeskActor {
        spec,
        state: DeskState::Created,
        seats: Vec::with_capacity(SEATS),
        board: Board::new(),
        ready: HashSet::new(),
        arranged: HashSet::new(),
        current: None,
        first_camp: Camp::A,
        last_hinted: None,
        record: None,
        termination,
        notices,
        config: config.clone(),
        this: sender.downgrade(),
        receiver,
    };

    tokio::spawn(actor.run());
    handle
}
