//! Request routing for logged-in sessions.
//!
//! Every [`ClientMessage`] lands here on the dispatcher. Lobby requests
//! (create, join, exit, rejoin) are answered from the registries; board
//! actions are forwarded to the player's desk, which owns turn order.
//!
//! Rejections follow one rule: log at debug, change nothing, and send a
//! non-success response where the client expects one.

use doushou_protocol::{
    ClientMessage, CodeResponse, CreateDeskRequest, DeskCode, DeskMode, DeskResponse,
    ExitResponse, JoinDeskRequest, OpenPieceResponse, PiecesResponse, PlayerId, Reply, SessionId,
    UnCompleteDeskResponse, code,
};
use doushou_room::{Action, DeskError, DeskHandle, SeatProfile, unix_now};

use crate::dispatcher::Dispatcher;
use crate::store::Persistence;

const ALREADY_IN_DESK_MESSAGE: &str = "you are already in a desk";
const VERSION_EXPIRED_MESSAGE: &str = "client version is out of date, please update";
const INVALID_MODE_MESSAGE: &str = "invalid desk mode";
const NOT_ENOUGH_COIN_MESSAGE: &str = "not enough coin";
const DESK_NOT_FOUND_MESSAGE: &str = "desk not found, check the code and try again";
const DESK_FULL_MESSAGE: &str = "desk is full";
const DESK_GONE_MESSAGE: &str = "desk dissolved";

impl<P: Persistence> Dispatcher<P> {
    pub(crate) async fn handle_message(&mut self, session: SessionId, message: ClientMessage) {
        let uid = match self.world.players.by_session(session) {
            Ok(player) => player.id,
            Err(err) => {
                tracing::debug!(%session, route = message.route(), %err, "request dropped");
                return;
            }
        };
        tracing::debug!(player_id = %uid, route = message.route(), "request");

        match message {
            ClientMessage::CreateDesk(req) => {
                let response = self.create_desk(uid, req).await;
                self.respond(uid, Reply::CreateDesk(response));
            }
            ClientMessage::JoinDesk(req) => {
                let response = self.join_desk(uid, req).await;
                self.respond(uid, Reply::JoinDesk(response));
            }
            ClientMessage::Ready => {
                let Some(desk) = self.seated(uid) else {
                    return;
                };
                if let Err(err) = desk.ready(uid).await {
                    tracing::debug!(player_id = %uid, %err, "ready rejected");
                }
            }
            ClientMessage::ArrangeDone => {
                let Some(desk) = self.seated(uid) else {
                    return;
                };
                if let Err(err) = desk.arrange_done(uid).await {
                    tracing::debug!(player_id = %uid, %err, "arrange rejected");
                }
            }
            ClientMessage::GiveUp(req) => {
                let Some(desk) = self.seated(uid) else {
                    return;
                };
                if desk.code() != &req.desk {
                    tracing::debug!(player_id = %uid, requested = %req.desk, desk = %desk.code(), "surrender names another desk");
                }
                if let Err(err) = desk.give_up(uid).await {
                    tracing::debug!(player_id = %uid, %err, "surrender rejected");
                }
            }
            ClientMessage::OpenPiece(req) => {
                let reply = self.act(uid, Action::Reveal { index: req.index }).await;
                self.respond(uid, reply.unwrap_or(Reply::OpenPiece(OpenPieceResponse {
                    code: code::FAIL,
                    index: req.index,
                    piece: -1,
                })));
            }
            ClientMessage::MovePiece(req) => {
                let action = Action::Move {
                    src: req.src,
                    dest: req.dest,
                };
                let reply = self.act(uid, action).await;
                self.respond(uid, reply.unwrap_or(Reply::MovePiece(PiecesResponse {
                    code: code::FAIL,
                    pieces: Vec::new(),
                })));
            }
            ClientMessage::EatPiece(req) => {
                let action = Action::Capture {
                    src: req.src,
                    dest: req.dest,
                };
                let reply = self.act(uid, action).await;
                // Capture result 0 is "failed"; 1 would mean the attacker won.
                self.respond(uid, reply.unwrap_or(Reply::EatPiece(PiecesResponse {
                    code: 0,
                    pieces: Vec::new(),
                })));
            }
            ClientMessage::Exit(_) => {
                let response = self.exit(uid).await;
                self.respond(uid, Reply::Exit(response));
            }
            ClientMessage::ReJoinDesk(req) => {
                let response = self.rejoin(uid, &req.desk).await;
                self.respond(uid, Reply::ReJoinDesk(response));
            }
            ClientMessage::ReEnterDesk(req) => {
                let recorded = self.world.players.get(uid).and_then(|p| p.desk().cloned());
                if recorded.as_ref() != Some(&req.desk) {
                    tracing::debug!(player_id = %uid, requested = %req.desk, recorded = ?recorded, "re-enter of a desk the player is not linked to");
                    return;
                }
                let response = self.rejoin(uid, &req.desk).await;
                self.respond(uid, Reply::ReEnterDesk(response));
            }
            ClientMessage::UnCompleteDesk => {
                let response = self.uncomplete_desk(uid).await;
                self.respond(uid, Reply::UnCompleteDesk(response));
            }
            ClientMessage::ShowEmoji(req) => {
                let Some(desk) = self.seated(uid) else {
                    return;
                };
                if let Err(err) = desk.emoji(uid, req.index).await {
                    tracing::debug!(player_id = %uid, %err, "emoji dropped");
                }
            }
        }
    }

    fn respond(&self, uid: PlayerId, reply: Reply) {
        if let Some(player) = self.world.players.get(uid) {
            player.respond(reply);
        }
    }

    /// The live desk the player is linked to.
    fn seated_desk(&self, uid: PlayerId) -> Option<DeskHandle> {
        let code = self.world.players.get(uid)?.desk()?;
        self.world
            .desks
            .lookup(code)
            .filter(|desk| !desk.is_destroyed())
            .cloned()
    }

    /// Like [`seated_desk`](Self::seated_desk), logging when there is none.
    fn seated(&self, uid: PlayerId) -> Option<DeskHandle> {
        let desk = self.seated_desk(uid);
        if desk.is_none() {
            tracing::debug!(player_id = %uid, "request needs a desk, player has none");
        }
        desk
    }

    fn version_expired(&self, version: &str) -> bool {
        self.config.force_update && version != self.config.version
    }

    async fn act(&self, uid: PlayerId, action: Action) -> Option<Reply> {
        let desk = self.seated(uid)?;
        match desk.act(uid, action).await {
            Ok(reply) => Some(reply),
            Err(err) => {
                tracing::debug!(player_id = %uid, desk = %desk.code(), ?action, %err, "action rejected");
                None
            }
        }
    }

    async fn create_desk(&mut self, uid: PlayerId, req: CreateDeskRequest) -> DeskResponse {
        let Some(player) = self.world.players.get(uid) else {
            return DeskResponse::fail(code::FAIL, "player not found");
        };
        if player.desk().is_some() {
            return DeskResponse::fail(code::ALREADY_IN_DESK, ALREADY_IN_DESK_MESSAGE);
        }
        if self.version_expired(&req.version) {
            return DeskResponse::fail(code::CREATE_VERSION_EXPIRED, VERSION_EXPIRED_MESSAGE);
        }
        let Ok(mode) = DeskMode::try_from(req.options.mode) else {
            tracing::debug!(player_id = %uid, mode = req.options.mode, "unknown desk mode");
            return DeskResponse::fail(code::FAIL, INVALID_MODE_MESSAGE);
        };
        let stake = self.config.stakes.stake(mode);
        if player.coin < stake {
            tracing::debug!(player_id = %uid, coin = player.coin, stake, "balance below stake");
            return DeskResponse::fail(code::NOT_ENOUGH_COIN, NOT_ENOUGH_COIN_MESSAGE);
        }

        let seat = SeatProfile::from(player);
        let session = player.session().cloned();
        let desk = self.world.desks.create(uid, mode, stake, unix_now());
        match desk.join(seat, session).await {
            Ok(table) => {
                self.link(uid, desk.code());
                DeskResponse::ok(table)
            }
            Err(err) => {
                tracing::warn!(player_id = %uid, desk = %desk.code(), %err, "creator could not sit at a new desk");
                self.discard_desk(&desk).await;
                DeskResponse::fail(code::FAIL, err.to_string())
            }
        }
    }

    /// Forgets a desk whose creator never got seated.
    async fn discard_desk(&mut self, desk: &DeskHandle) {
        self.world.desks.remove(desk.code());
        match desk.destroy().await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(desk = %desk.code(), "discarded desk was already destroyed"),
            Err(err) => tracing::debug!(desk = %desk.code(), %err, "discarded desk unreachable"),
        }
    }

    async fn join_desk(&mut self, uid: PlayerId, req: JoinDeskRequest) -> DeskResponse {
        if self.version_expired(&req.version) {
            return DeskResponse::fail(code::JOIN_VERSION_EXPIRED, VERSION_EXPIRED_MESSAGE);
        }
        let Some(desk) = self.world.desks.lookup(&req.desk).cloned() else {
            return DeskResponse::fail(code::DESK_NOT_FOUND, DESK_NOT_FOUND_MESSAGE);
        };
        let info = match desk.info().await {
            Ok(info) if !info.state.is_destroyed() => info,
            _ => return DeskResponse::fail(code::DESK_NOT_FOUND, DESK_NOT_FOUND_MESSAGE),
        };
        if info.is_full() && !info.is_seated(uid) {
            return DeskResponse::fail(code::DESK_FULL, DESK_FULL_MESSAGE);
        }
        let Some(player) = self.world.players.get(uid) else {
            return DeskResponse::fail(code::FAIL, "player not found");
        };
        if player.desk().is_some() {
            return DeskResponse::fail(code::ALREADY_IN_DESK, ALREADY_IN_DESK_MESSAGE);
        }

        match desk.join(SeatProfile::from(player), player.session().cloned()).await {
            Ok(table) => {
                self.link(uid, desk.code());
                DeskResponse::ok(table)
            }
            Err(DeskError::Full(_)) => DeskResponse::fail(code::DESK_FULL, DESK_FULL_MESSAGE),
            Err(DeskError::AlreadySeated(..)) => {
                DeskResponse::fail(code::ALREADY_IN_DESK, ALREADY_IN_DESK_MESSAGE)
            }
            Err(err @ (DeskError::NotFound(_) | DeskError::Unavailable(_))) => {
                tracing::debug!(player_id = %uid, %err, "desk vanished during join");
                DeskResponse::fail(code::DESK_NOT_FOUND, DESK_NOT_FOUND_MESSAGE)
            }
            Err(err) => {
                tracing::debug!(player_id = %uid, desk = %desk.code(), %err, "join rejected");
                DeskResponse::fail(code::FAIL, err.to_string())
            }
        }
    }

    fn link(&mut self, uid: PlayerId, desk: &DeskCode) {
        if let Err(err) = self.world.players.seat(uid, desk.clone()) {
            tracing::warn!(player_id = %uid, desk = %desk, %err, "seated player has no record");
        }
    }

    async fn exit(&mut self, uid: PlayerId) -> ExitResponse {
        let Some(desk) = self.seated_desk(uid) else {
            return ExitResponse {
                code: code::NOT_IN_DESK,
            };
        };
        match desk.exit(uid).await {
            Ok(()) => {
                self.world.players.release(desk.code(), &[uid]);
                ExitResponse { code: code::OK }
            }
            Err(DeskError::InvalidState(state)) => {
                tracing::debug!(player_id = %uid, desk = %desk.code(), %state, "exit after the round started");
                ExitResponse { code: code::FAIL }
            }
            Err(err) => {
                tracing::debug!(player_id = %uid, desk = %desk.code(), %err, "exit from a desk the player is not at");
                ExitResponse {
                    code: code::NOT_IN_DESK,
                }
            }
        }
    }

    async fn rejoin(&mut self, uid: PlayerId, desk_code: &DeskCode) -> CodeResponse {
        let gone = CodeResponse {
            code: code::DESK_GONE,
            error: DESK_GONE_MESSAGE.to_string(),
        };
        let Some(desk) = self
            .world
            .desks
            .lookup(desk_code)
            .filter(|desk| !desk.is_destroyed())
            .cloned()
        else {
            return gone;
        };
        let Some(session) = self.world.players.get(uid).and_then(|p| p.session().cloned()) else {
            return gone;
        };

        match desk.rejoin(uid, session).await {
            Ok(()) => {
                self.link(uid, desk_code);
                CodeResponse {
                    code: code::OK,
                    error: String::new(),
                }
            }
            Err(err @ DeskError::NotSeated(..)) => {
                tracing::debug!(player_id = %uid, desk = %desk_code, %err, "rejoin of a desk the player left");
                CodeResponse {
                    code: code::FAIL,
                    error: err.to_string(),
                }
            }
            Err(err) => {
                tracing::debug!(player_id = %uid, desk = %desk_code, %err, "rejoin failed");
                gone
            }
        }
    }

    async fn uncomplete_desk(&self, uid: PlayerId) -> UnCompleteDeskResponse {
        let table = match self.seated_desk(uid) {
            Some(desk) => desk
                .info()
                .await
                .ok()
                .filter(|info| !info.state.is_destroyed() && info.is_seated(uid))
                .map(|info| info.table()),
            None => None,
        };
        UnCompleteDeskResponse {
            exist: table.is_some(),
            table,
        }
    }
}

#[cfg(test)]
mod tests {
    use doushou_protocol::DeskMode;
    use doushou_session::command_queue;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{MemoryStore, ServiceConfig};

    #[tokio::test]
    async fn test_discard_desk_forgets_and_destroys() {
        let config = ServiceConfig::default();
        let (tx, rx) = mpsc::channel(8);
        let (_commands, queue) = command_queue(&config.queue);
        let mut dispatcher = Dispatcher::new(config, MemoryStore::new(), rx, tx.downgrade(), queue);

        let desk = dispatcher
            .world
            .desks
            .create(PlayerId(1), DeskMode::Room, 2, unix_now());
        dispatcher.discard_desk(&desk).await;
        assert!(dispatcher.world.desks.lookup(desk.code()).is_none());
        assert!(desk.is_destroyed());

        // Discarding again only logs.
        dispatcher.discard_desk(&desk).await;
        assert_eq!(desk.destroy().await, Ok(false));
        drop(tx);
    }
}
