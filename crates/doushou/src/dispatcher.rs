//! The dispatch loop: the single owner of live state.
//!
//! One task runs [`Dispatcher::run`]. It owns the [`World`] (players and
//! desks) and is the only code that mutates it. Everything else reaches
//! it through one of four inputs:
//!
//! ```text
//!   ServiceHandle / Invoker ──▶ inbound queue ──┐
//!   desks ──────────────────▶ notice channel ──┤
//!   command ticker (1 s) ───▶ drain kick/reset/recharge
//!   sweep ticker (5 min) ───▶ reclaim desks, online snapshot
//! ```
//!
//! The dispatcher awaits desk replies, but desks never await the
//! dispatcher (their notices go through an unbounded channel), so the two
//! can't deadlock.

use std::sync::Arc;

use doushou_protocol::{
    Camp, ClientMessage, DeskCode, DeskMode, LoginResponse, PlayerId, PlayerProfile, Reply,
    SessionId, code,
};
use doushou_room::{DeskNotice, DeskRegistry, DestroyCause, NoticeReceiver, NoticeSender, unix_now};
use doushou_session::{Applied, Bound, CommandQueue, PlayerRegistry, Session, Unbound};
use doushou_tick::Ticker;
use tokio::sync::{mpsc, oneshot};

use crate::offload::{Invoker, offload};
use crate::store::{ConsumptionRecord, Persistence, RoomRecord, RoomSettlement};
use crate::ServiceConfig;

/// A closure posted onto the dispatcher.
pub(crate) type Job = Box<dyn FnOnce(&mut World) + Send>;

/// Everything the dispatcher can be asked to do.
pub(crate) enum Inbound {
    Login {
        session: Session,
        profile: PlayerProfile,
    },
    Reconnect {
        session: Session,
        profile: PlayerProfile,
    },
    Message {
        session: SessionId,
        message: ClientMessage,
    },
    Disconnect(SessionId),
    Invoke(Job),
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// Live state: every player record and every desk.
///
/// Only reachable from the dispatcher, or from an invoke closure running
/// on it.
pub struct World {
    pub players: PlayerRegistry,
    pub desks: DeskRegistry,
}

pub(crate) struct Dispatcher<P: Persistence> {
    pub(crate) world: World,
    pub(crate) config: ServiceConfig,
    pub(crate) store: Arc<P>,
    inbound: mpsc::Receiver<Inbound>,
    /// Lets offloaded tasks post back without keeping the queue open.
    this: mpsc::WeakSender<Inbound>,
    notices: NoticeReceiver,
    commands: CommandQueue,
    command_tick: Ticker,
    sweep_tick: Ticker,
}

impl<P: Persistence> Dispatcher<P> {
    pub(crate) fn new(
        config: ServiceConfig,
        store: P,
        inbound: mpsc::Receiver<Inbound>,
        this: mpsc::WeakSender<Inbound>,
        commands: CommandQueue,
    ) -> Self {
        let (notice_tx, notices): (NoticeSender, NoticeReceiver) = mpsc::unbounded_channel();
        Self {
            world: World {
                players: PlayerRegistry::new(),
                desks: DeskRegistry::new(config.desk.clone(), notice_tx),
            },
            command_tick: Ticker::every("player-commands", config.command_interval),
            sweep_tick: Ticker::every("desk-sweep", config.sweep_interval),
            config,
            store: Arc::new(store),
            inbound,
            this,
            notices,
            commands,
        }
    }

    /// Runs until shut down, or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!(
            version = %self.config.version,
            force_update = self.config.force_update,
            stakes = %self.config.stakes,
            "dispatcher running"
        );

        loop {
            tokio::select! {
                inbound = self.inbound.recv() => match inbound {
                    Some(inbound) => {
                        if !self.handle_inbound(inbound).await {
                            return;
                        }
                    }
                    None => {
                        tracing::info!("all service handles dropped");
                        self.shutdown().await;
                        return;
                    }
                },
                Some(notice) = self.notices.recv() => self.handle_notice(notice),
                _ = self.command_tick.wait_for_tick() => self.drain_commands().await,
                _ = self.sweep_tick.wait_for_tick() => self.sweep().await,
            }
        }
    }

    /// Returns `false` once the dispatcher should stop.
    async fn handle_inbound(&mut self, inbound: Inbound) -> bool {
        match inbound {
            Inbound::Login { session, profile } => self.login(session, profile).await,
            Inbound::Reconnect { session, profile } => self.reconnect(session, profile).await,
            Inbound::Message { session, message } => self.handle_message(session, message).await,
            Inbound::Disconnect(session) => self.disconnect(session).await,
            Inbound::Invoke(job) => job(&mut self.world),
            Inbound::Shutdown { reply } => {
                let destroyed = self.shutdown().await;
                let _ = reply.send(destroyed);
                return false;
            }
        }
        true
    }

    pub(crate) fn invoker(&self) -> Option<Invoker> {
        self.this.upgrade().map(Invoker::new)
    }

    async fn shutdown(&mut self) -> usize {
        let destroyed = self.world.desks.shutdown_all().await;
        // Each destroyed desk has queued its notice before replying.
        while let Ok(notice) = self.notices.try_recv() {
            self.handle_notice(notice);
        }
        tracing::info!(
            destroyed,
            players = self.world.players.len(),
            "dispatcher stopped"
        );
        destroyed
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    async fn login(&mut self, session: Session, profile: PlayerProfile) {
        let bound = self.world.players.login(session, &profile);
        self.after_bind(bound).await;
    }

    async fn reconnect(&mut self, session: Session, profile: PlayerProfile) {
        let bound = self.world.players.reconnect(session, &profile);
        self.after_bind(bound).await;
    }

    /// Shared tail of login and reconnect: take the replaced session out
    /// of the desk group, load the balance of a fresh record, reply.
    async fn after_bind(&mut self, bound: Bound) {
        if let (Some(old), Some(code)) = (&bound.replaced, &bound.desk) {
            if let Some(desk) = self.world.desks.lookup(code) {
                // The seat stays online: the new session takes over.
                if let Err(err) = desk.detach(bound.player, old.id(), false).await {
                    tracing::debug!(player_id = %bound.player, desk = %code, %err, "replaced session not detached");
                }
            }
        }
        if bound.created {
            self.sync_balance(bound.player);
        }
        if let Some(player) = self.world.players.get(bound.player) {
            player.respond(Reply::Login(LoginResponse {
                code: code::OK,
                uid: bound.player,
                coin: player.coin,
            }));
        }
    }

    /// Loads the stored balance for a fresh record and pushes it.
    fn sync_balance(&self, uid: PlayerId) {
        let Some(invoker) = self.invoker() else {
            return;
        };
        let store = Arc::clone(&self.store);
        offload("sync-balance", async move {
            let coin = match store.fetch_player_balance(uid).await {
                Ok(coin) => coin,
                Err(err) => {
                    tracing::error!(player_id = %uid, %err, "could not load balance");
                    return;
                }
            };
            let applied = invoker
                .invoke(move |world| {
                    if let Err(err) = world.players.set_coin(uid, coin) {
                        tracing::debug!(player_id = %uid, %err, "balance arrived for a gone player");
                    }
                })
                .await;
            if applied.is_err() {
                tracing::debug!(player_id = %uid, "dispatcher gone, balance dropped");
            }
        });
    }

    async fn disconnect(&mut self, session: SessionId) {
        match self.world.players.unbind(session) {
            Some(unbound) => self.went_offline(unbound).await,
            None => tracing::debug!(%session, "disconnect of an unbound or replaced session"),
        }
    }

    /// A seated player keeps their seat, camp and ready state; anyone
    /// else is dropped.
    async fn went_offline(&mut self, unbound: Unbound) {
        let desk = unbound
            .desk
            .as_ref()
            .and_then(|code| self.world.desks.lookup(code))
            .filter(|desk| !desk.is_destroyed())
            .cloned();

        let Some(desk) = desk else {
            self.world.players.remove(unbound.player);
            return;
        };
        match desk.detach(unbound.player, unbound.session, true).await {
            Ok(()) => tracing::info!(
                player_id = %unbound.player,
                desk = %desk.code(),
                "player offline, seat kept"
            ),
            Err(err) => {
                tracing::warn!(player_id = %unbound.player, desk = %desk.code(), %err, "desk unreachable on disconnect");
                self.world.players.remove(unbound.player);
            }
        }
    }

    async fn drain_commands(&mut self) {
        for command in self.commands.drain() {
            match self.world.players.apply(command) {
                Ok(Applied::Kicked(unbound)) => self.went_offline(unbound).await,
                Ok(Applied::KickedOffline(uid)) => {
                    tracing::debug!(player_id = %uid, "kick for an offline player");
                }
                Ok(Applied::Reset { player, desk }) => {
                    tracing::info!(player_id = %player, desk = ?desk, "player reset");
                }
                Ok(Applied::Recharged { .. }) => {}
                Err(err) => tracing::warn!(?command, %err, "player command not applied"),
            }
        }
    }

    // ---------------------------------------------------------------------
    // Desks
    // ---------------------------------------------------------------------

    fn handle_notice(&mut self, notice: DeskNotice) {
        match notice {
            DeskNotice::RoundStarted {
                desk,
                creator,
                mode,
                stake,
                camps,
            } => self.round_started(desk, creator, mode, stake, camps),
            DeskNotice::Destroyed {
                desk,
                players,
                cause,
                record,
            } => self.desk_destroyed(desk, players, cause, record),
        }
    }

    /// Records camps, charges the creator in memory, then persists the
    /// room and the charge off the loop.
    fn round_started(
        &mut self,
        code: DeskCode,
        creator: PlayerId,
        mode: DeskMode,
        stake: i64,
        camps: Vec<(PlayerId, Camp)>,
    ) {
        for (uid, camp) in &camps {
            if let Some(player) = self.world.players.get_mut(*uid) {
                player.set_camp(Some(*camp));
            }
        }

        let Some(desk) = self.world.desks.lookup(&code).cloned() else {
            tracing::debug!(desk = %code, "round started on a removed desk");
            return;
        };

        let balance = if stake > 0 {
            match self.world.players.charge(creator, stake) {
                Ok(balance) => Some(balance),
                Err(err) => {
                    tracing::warn!(desk = %code, player_id = %creator, %err, "stake not charged");
                    None
                }
            }
        } else {
            None
        };
        tracing::info!(desk = %code, creator = %creator, stake, balance = ?balance, "round started");

        let Some(invoker) = self.invoker() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let room = RoomRecord {
            desk: code.clone(),
            creator,
            mode,
            stake,
            created_at: desk.created_at(),
            players: camps.iter().map(|(uid, _)| *uid).collect(),
        };

        offload("round-start", async move {
            let room_id = match store.insert_room(room).await {
                Ok(id) => {
                    // The desk actor serializes this with its other commands.
                    if let Err(err) = desk.set_record(id).await {
                        tracing::warn!(desk = %code, record = id, %err, "record id not stored");
                    }
                    Some(id)
                }
                Err(err) => {
                    tracing::error!(desk = %code, %err, "could not insert room record");
                    None
                }
            };

            let Some(balance) = balance else {
                return;
            };
            if let Err(err) = store.update_player_balance(creator, balance).await {
                tracing::error!(desk = %code, player_id = %creator, balance, %err, "could not persist stake");
            }
            let event = ConsumptionRecord {
                player: creator,
                desk: code.clone(),
                room: room_id,
                amount: stake,
                consumed_at: unix_now(),
            };
            if let Err(err) = store.insert_consumption_event(event).await {
                tracing::error!(desk = %code, player_id = %creator, %err, "could not record consumption");
            }

            let pushed = invoker
                .invoke(move |world| {
                    if let Some(player) = world.players.get(creator) {
                        player.push_coin();
                    }
                })
                .await;
            if pushed.is_err() {
                tracing::debug!(desk = %code, "dispatcher gone, coin push dropped");
            }
        });
    }

    fn desk_destroyed(
        &mut self,
        code: DeskCode,
        players: Vec<PlayerId>,
        cause: DestroyCause,
        record: Option<i64>,
    ) {
        self.world.desks.remove(&code);
        self.world.players.release(&code, &players);
        tracing::info!(
            desk = %code,
            ?cause,
            players = players.len(),
            desks = self.world.desks.len(),
            "desk released"
        );

        let Some(id) = record else {
            return;
        };
        let settlement = RoomSettlement {
            id,
            desk: code,
            players,
            result: match cause {
                DestroyCause::Settled(result) => Some(result),
                DestroyCause::Dissolved | DestroyCause::Requested => None,
            },
            finished_at: unix_now(),
        };
        let store = Arc::clone(&self.store);
        offload("room-update", async move {
            let (id, desk) = (settlement.id, settlement.desk.clone());
            if let Err(err) = store.update_room(settlement).await {
                tracing::error!(desk = %desk, record = id, %err, "could not update room record");
            }
        });
    }

    async fn sweep(&mut self) {
        let reclaimed = self.world.desks.sweep(unix_now()).await;
        let sessions = self.world.players.session_count();
        let desks = self.world.desks.len();
        tracing::info!(
            reclaimed = reclaimed.len(),
            sessions,
            players = self.world.players.len(),
            desks,
            sweeps = self.sweep_tick.tick_count(),
            command_overruns = self.command_tick.metrics().total_overruns,
            "sweep finished"
        );

        let store = Arc::clone(&self.store);
        offload("online-snapshot", async move {
            store.record_online_snapshot(sessions, desks).await;
        });
    }
}
