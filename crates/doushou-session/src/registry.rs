//! The player registry: every live player record and which session is
//! bound to it.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is a pair of plain `HashMap`s with no locking. It is
//! owned by the service's dispatch task, and everything that wants to
//! change a player goes through that task (requests, desk notices, the
//! command queue, invoke closures).

use std::collections::HashMap;

use doushou_protocol::{DeskCode, PlayerId, PlayerProfile, SessionId};

use crate::{Player, PlayerCommand, Session, SessionError};

/// What a login or reconnect did to the registry.
#[derive(Debug)]
pub struct Bound {
    pub player: PlayerId,
    /// `true` if no record existed and one was created.
    pub created: bool,
    /// The session this one replaced. It has already been closed and
    /// unbound; the caller still has to detach it from any desk group.
    pub replaced: Option<Session>,
    /// Desk the player is seated at, if any.
    pub desk: Option<DeskCode>,
}

/// A session went away while still bound to its player.
#[derive(Debug, PartialEq, Eq)]
pub struct Unbound {
    pub player: PlayerId,
    pub session: SessionId,
    pub desk: Option<DeskCode>,
}

/// Result of applying one [`PlayerCommand`].
#[derive(Debug)]
pub enum Applied {
    /// The session was closed and unbound; run the disconnect path.
    Kicked(Unbound),
    /// The player was not connected; nothing to close.
    KickedOffline(PlayerId),
    /// The record is gone. Carries the desk it was linked to.
    Reset { player: PlayerId, desk: Option<DeskCode> },
    Recharged { player: PlayerId, coin: i64 },
}

#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    /// Index from session to player, kept in sync with `players`.
    bindings: HashMap<SessionId, PlayerId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `session` to the player in `profile`, creating the record if
    /// needed. A previously bound session is closed and unbound first.
    pub fn login(&mut self, session: Session, profile: &PlayerProfile) -> Bound {
        let bound = self.bind(session, profile);
        tracing::info!(
            player_id = %bound.player,
            created = bound.created,
            replaced = bound.replaced.is_some(),
            "player logged in"
        );
        bound
    }

    /// Same rebind path as [`login`](Self::login), used when a client
    /// comes back after losing its connection.
    pub fn reconnect(&mut self, session: Session, profile: &PlayerProfile) -> Bound {
        let bound = self.bind(session, profile);
        tracing::info!(
            player_id = %bound.player,
            created = bound.created,
            desk = ?bound.desk,
            "player reconnected"
        );
        bound
    }

    fn bind(&mut self, session: Session, profile: &PlayerProfile) -> Bound {
        let uid = profile.uid;
        let session_id = session.id();

        // A session moving to another identity leaves its old player offline.
        if let Some(previous_owner) = self.bindings.insert(session_id, uid) {
            if previous_owner != uid {
                if let Some(player) = self.players.get_mut(&previous_owner) {
                    player.replace_session(None);
                }
            }
        }

        match self.players.get_mut(&uid) {
            Some(player) => {
                player.update_profile(profile);
                let replaced = player
                    .replace_session(Some(session))
                    .filter(|old| old.id() != session_id);
                if let Some(old) = &replaced {
                    self.bindings.remove(&old.id());
                    old.close("replaced by a new session");
                }
                Bound {
                    player: uid,
                    created: false,
                    replaced,
                    desk: player.desk().cloned(),
                }
            }
            None => {
                self.players.insert(uid, Player::new(profile, session));
                Bound {
                    player: uid,
                    created: true,
                    replaced: None,
                    desk: None,
                }
            }
        }
    }

    /// Detaches a closed session. Returns `None` if the session was never
    /// bound or has already been replaced by a newer one.
    pub fn unbind(&mut self, session: SessionId) -> Option<Unbound> {
        let uid = self.bindings.remove(&session)?;
        let player = self.players.get_mut(&uid)?;
        if player.session().map(Session::id) != Some(session) {
            return None;
        }
        player.replace_session(None);
        tracing::info!(player_id = %uid, %session, "session unbound");
        Some(Unbound {
            player: uid,
            session,
            desk: player.desk().cloned(),
        })
    }

    /// Drops a player record entirely (explicit offline).
    pub fn remove(&mut self, uid: PlayerId) -> Option<Player> {
        let player = self.players.remove(&uid)?;
        if let Some(session) = player.session() {
            self.bindings.remove(&session.id());
        }
        tracing::info!(player_id = %uid, "player record removed");
        Some(player)
    }

    pub fn get(&self, uid: PlayerId) -> Option<&Player> {
        self.players.get(&uid)
    }

    pub fn get_mut(&mut self, uid: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&uid)
    }

    pub fn player_id(&self, session: SessionId) -> Option<PlayerId> {
        self.bindings.get(&session).copied()
    }

    /// The player bound to `session`.
    pub fn by_session(&self, session: SessionId) -> Result<&Player, SessionError> {
        self.player_id(session)
            .and_then(|uid| self.players.get(&uid))
            .ok_or(SessionError::NotLoggedIn(session))
    }

    pub fn by_session_mut(&mut self, session: SessionId) -> Result<&mut Player, SessionError> {
        let uid = self
            .player_id(session)
            .ok_or(SessionError::NotLoggedIn(session))?;
        self.players
            .get_mut(&uid)
            .ok_or(SessionError::NotLoggedIn(session))
    }

    /// Links a player to a desk.
    pub fn seat(&mut self, uid: PlayerId, desk: DeskCode) -> Result<(), SessionError> {
        let player = self.players.get_mut(&uid).ok_or(SessionError::NotFound(uid))?;
        player.set_desk(desk);
        Ok(())
    }

    /// Clears the desk link and camp of every listed player still linked
    /// to `desk`.
    pub fn release(&mut self, desk: &DeskCode, players: &[PlayerId]) {
        for uid in players {
            if let Some(player) = self.players.get_mut(uid) {
                if player.desk() == Some(desk) {
                    player.reset();
                }
            }
        }
    }

    /// Sets a balance and pushes `onCoinChange` if the player is online.
    pub fn set_coin(&mut self, uid: PlayerId, coin: i64) -> Result<(), SessionError> {
        let player = self.players.get_mut(&uid).ok_or(SessionError::NotFound(uid))?;
        player.coin = coin;
        player.push_coin();
        Ok(())
    }

    /// Deducts `amount` in memory and returns the new balance.
    pub fn charge(&mut self, uid: PlayerId, amount: i64) -> Result<i64, SessionError> {
        let player = self.players.get_mut(&uid).ok_or(SessionError::NotFound(uid))?;
        player.coin -= amount;
        Ok(player.coin)
    }

    pub fn apply(&mut self, command: PlayerCommand) -> Result<Applied, SessionError> {
        match command {
            PlayerCommand::Kick(uid) => {
                let player = self.players.get(&uid).ok_or(SessionError::NotFound(uid))?;
                let Some(session) = player.session().cloned() else {
                    return Ok(Applied::KickedOffline(uid));
                };
                session.close("kicked");
                let unbound = self
                    .unbind(session.id())
                    .ok_or(SessionError::NotLoggedIn(session.id()))?;
                tracing::info!(player_id = %uid, "player kicked");
                Ok(Applied::Kicked(unbound))
            }
            PlayerCommand::Reset(uid) => {
                let player = self.players.get(&uid).ok_or(SessionError::NotFound(uid))?;
                if player.is_online() {
                    return Err(SessionError::StillOnline(uid));
                }
                let desk = player.desk().cloned();
                self.remove(uid);
                Ok(Applied::Reset { player: uid, desk })
            }
            PlayerCommand::Recharge { player, coin } => {
                self.set_coin(player, coin)?;
                tracing::info!(player_id = %player, coin, "balance recharged");
                Ok(Applied::Recharged { player, coin })
            }
        }
    }

    /// Number of player records (online or not).
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Number of bound sessions.
    pub fn session_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }
}

// =========================================================================
// Tests
// =========================================================================
