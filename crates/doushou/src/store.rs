//! Persistence hook.
//!
//! The service never waits on storage from the dispatch loop. Every call
//! below is made from an offloaded task (see [`offload`](crate::offload))
//! and its result, if any, re-enters live state through an invoke.
//!
//! Implement [`Persistence`] for your database; [`MemoryStore`] keeps
//! everything in process and is what the tests use.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use doushou_protocol::{DeskCode, DeskMode, GameResult, PlayerId};
use tokio::sync::Mutex;

use crate::StoreError;

/// A room as first written, when its round is dealt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub desk: DeskCode,
    pub creator: PlayerId,
    pub mode: DeskMode,
    pub stake: i64,
    pub created_at: i64,
    pub players: Vec<PlayerId>,
}

/// The update written when a room with a stored record is destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettlement {
    pub id: i64,
    pub desk: DeskCode,
    pub players: Vec<PlayerId>,
    /// `None` when the desk was dissolved or reclaimed without a result.
    pub result: Option<GameResult>,
    pub finished_at: i64,
}

/// A stake charged to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRecord {
    pub player: PlayerId,
    pub desk: DeskCode,
    /// Room record id, when the room insert succeeded.
    pub room: Option<i64>,
    pub amount: i64,
    pub consumed_at: i64,
}

/// Storage the service writes to.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one instance is shared by every
/// offloaded task, and the returned futures are `Send` because those
/// tasks run on the multi-threaded runtime.
pub trait Persistence: Send + Sync + 'static {
    /// Inserts a room record and returns its id.
    fn insert_room(
        &self,
        room: RoomRecord,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn update_room(
        &self,
        settlement: RoomSettlement,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn fetch_player_balance(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn update_player_balance(
        &self,
        player: PlayerId,
        coin: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_consumption_event(
        &self,
        event: ConsumptionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Best effort: failures are the implementation's to log.
    fn record_online_snapshot(
        &self,
        sessions: usize,
        desks: usize,
    ) -> impl Future<Output = ()> + Send;
}

/// One `record_online_snapshot` call as seen by [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineSnapshot {
    pub sessions: usize,
    pub desks: usize,
}

#[derive(Debug, Default)]
struct Tables {
    balances: HashMap<PlayerId, i64>,
    rooms: HashMap<i64, RoomRecord>,
    settlements: Vec<RoomSettlement>,
    consumption: Vec<ConsumptionRecord>,
    snapshots: Vec<OnlineSnapshot>,
    next_room: i64,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

/// In-process [`Persistence`]. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a stored balance.
    pub async fn set_balance(&self, player: PlayerId, coin: i64) {
        self.shared.tables.lock().await.balances.insert(player, coin);
    }

    /// While set, every fallible call returns [`StoreError::Backend`].
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn balance(&self, player: PlayerId) -> Option<i64> {
        self.shared.tables.lock().await.balances.get(&player).copied()
    }

    pub async fn room(&self, id: i64) -> Option<RoomRecord> {
        self.shared.tables.lock().await.rooms.get(&id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.shared.tables.lock().await.rooms.len()
    }

    pub async fn settlements(&self) -> Vec<RoomSettlement> {
        self.shared.tables.lock().await.settlements.clone()
    }

    pub async fn consumption(&self) -> Vec<ConsumptionRecord> {
        self.shared.tables.lock().await.consumption.clone()
    }

    pub async fn snapshots(&self) -> Vec<OnlineSnapshot> {
        self.shared.tables.lock().await.snapshots.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.shared.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store set to fail".into()));
        }
        Ok(())
    }
}

impl Persistence for MemoryStore {
    async fn insert_room(&self, room: RoomRecord) -> Result<i64, StoreError> {
        self.check()?;
        let mut tables = self.shared.tables.lock().await;
        tables.next_room += 1;
        let id = tables.next_room;
        tables.rooms.insert(id, room);
        Ok(id)
    }

    async fn update_room(&self, settlement: RoomSettlement) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.shared.tables.lock().await;
        if !tables.rooms.contains_key(&settlement.id) {
            return Err(StoreError::UnknownRoom(settlement.id));
        }
        tables.settlements.push(settlement);
        Ok(())
    }

    async fn fetch_player_balance(&self, player: PlayerId) -> Result<i64, StoreError> {
        self.check()?;
        self.shared
            .tables
            .lock()
            .await
            .balances
            .get(&player)
            .copied()
            .ok_or(StoreError::UnknownPlayer(player))
    }

    async fn update_player_balance(&self, player: PlayerId, coin: i64) -> Result<(), StoreError> {
        self.check()?;
        self.shared.tables.lock().await.balances.insert(player, coin);
        Ok(())
    }

    async fn insert_consumption_event(&self, event: ConsumptionRecord) -> Result<(), StoreError> {
        self.check()?;
        self.shared.tables.lock().await.consumption.push(event);
        Ok(())
    }

    async fn record_online_snapshot(&self, sessions: usize, desks: usize) {
        if self.check().is_err() {
            tracing::warn!(sessions, desks, "online snapshot dropped");
            return;
        }
        self.shared
            .tables
            .lock()
            .await
            .snapshots
            .push(OnlineSnapshot { sessions, desks });
    }
}
