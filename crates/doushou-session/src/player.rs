//! The live player record.

use doushou_protocol::{Camp, CoinChange, DeskCode, PlayerId, PlayerProfile, Push, Reply};

use crate::Session;

/// Everything the core keeps about one player between requests.
///
/// The record outlives connections: a disconnect only clears `session`.
/// `desk` is the code of the desk the player sits at; the desk itself is
/// owned by the desk registry.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub head_url: String,
    pub sex: u8,
    pub ip: String,
    pub coin: i64,
    session: Option<Session>,
    desk: Option<DeskCode>,
    camp: Option<Camp>,
}

impl Player {
    pub fn new(profile: &PlayerProfile, session: Session) -> Self {
        Self {
            id: profile.uid,
            name: profile.name.clone(),
            head_url: profile.head_url.clone(),
            sex: profile.sex,
            ip: session.remote_ip().to_string(),
            coin: 0,
            session: Some(session),
            desk: None,
            camp: None,
        }
    }

    /// Refreshes the profile fields sent with a login or reconnect.
    pub(crate) fn update_profile(&mut self, profile: &PlayerProfile) {
        self.name.clone_from(&profile.name);
        self.head_url.clone_from(&profile.head_url);
        self.sex = profile.sex;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub(crate) fn replace_session(&mut self, session: Option<Session>) -> Option<Session> {
        if let Some(session) = &session {
            self.ip = session.remote_ip().to_string();
        }
        std::mem::replace(&mut self.session, session)
    }

    pub fn is_online(&self) -> bool {
        self.session.is_some()
    }

    pub fn desk(&self) -> Option<&DeskCode> {
        self.desk.as_ref()
    }

    pub fn set_desk(&mut self, desk: DeskCode) {
        self.desk = Some(desk);
    }

    pub fn camp(&self) -> Option<Camp> {
        self.camp
    }

    pub fn set_camp(&mut self, camp: Option<Camp>) {
        self.camp = camp;
    }

    /// Called whenever the player leaves a desk: drops the desk link and
    /// the camp of the last round.
    pub fn reset(&mut self) {
        self.desk = None;
        self.camp = None;
    }

    /// Pushes to the current session, if any.
    pub fn push(&self, push: Push) {
        if let Some(session) = &self.session {
            session.push(push);
        }
    }

    pub fn respond(&self, reply: Reply) {
        if let Some(session) = &self.session {
            session.respond(reply);
        }
    }

    /// Pushes the current balance as `onCoinChange`.
    pub fn push_coin(&self) {
        self.push(Push::CoinChange(CoinChange { coin: self.coin }));
    }
}
