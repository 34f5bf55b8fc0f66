//! Seats: a player's place at a desk.

use doushou_protocol::{Camp, PlayerId, Push};
use doushou_session::{Player, Session};

use crate::gate::GateSender;

/// The profile a desk shows to the other seat.
///
/// Captured when the player sits down; `coin` is a display snapshot and
/// is not kept in sync with the player's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatProfile {
    pub uid: PlayerId,
    pub name: String,
    pub head_url: String,
    pub sex: u8,
    pub ip: String,
    pub coin: i64,
}

impl From<&Player> for SeatProfile {
    fn from(player: &Player) -> Self {
        Self {
            uid: player.id,
            name: player.name.clone(),
            head_url: player.head_url.clone(),
            sex: player.sex,
            ip: player.ip.clone(),
            coin: player.coin,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Seat {
    pub(crate) profile: SeatProfile,
    pub(crate) online: bool,
    /// Session in the desk's broadcast group, if any.
    pub(crate) session: Option<Session>,
    pub(crate) camp: Option<Camp>,
    pub(crate) gate: Option<GateSender>,
}

impl Seat {
    pub(crate) fn new(profile: SeatProfile, session: Option<Session>) -> Self {
        Self {
            profile,
            online: session.is_some(),
            session,
            camp: None,
            gate: None,
        }
    }

    pub(crate) fn uid(&self) -> PlayerId {
        self.profile.uid
    }

    pub(crate) fn push(&self, push: Push) {
        if let Some(session) = &self.session {
            session.push(push);
        }
    }

    /// Puts `session` in the broadcast group in place of any earlier one.
    pub(crate) fn attach(&mut self, session: Session) {
        self.session = Some(session);
        self.online = true;
    }
}
