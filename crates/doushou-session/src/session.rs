//! Sessions: the core's view of one live connection.
//!
//! A session is an id, the peer address and an outbound channel. The
//! transport adapter owns the receiving end and turns each [`Outbound`]
//! into bytes on the socket; nothing in the core touches the socket.
//!
//! Sessions are cheap to clone (the channel sender is reference counted),
//! so the same session can sit in the player registry and in a desk's
//! broadcast group at once.

use doushou_protocol::{Outbound, Push, Reply, SessionId};
use tokio::sync::mpsc;

/// Sending half of a session's outbound channel.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// Receiving half, held by the transport adapter.
pub type Inbox = mpsc::UnboundedReceiver<Outbound>;

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    remote_ip: String,
    outbox: Outbox,
}

impl Session {
    pub fn new(id: SessionId, remote_ip: impl Into<String>, outbox: Outbox) -> Self {
        Self {
            id,
            remote_ip: remote_ip.into(),
            outbox,
        }
    }

    /// Creates a session together with the receiver its adapter reads.
    pub fn channel(id: SessionId, remote_ip: impl Into<String>) -> (Self, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, remote_ip, tx), rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn remote_ip(&self) -> &str {
        &self.remote_ip
    }

    /// Sends a push. Returns `false` if the connection is already gone;
    /// callers treat that as "the player will resync on reconnect".
    pub fn push(&self, push: Push) -> bool {
        self.outbox.send(Outbound::Push(push)).is_ok()
    }

    /// Sends the direct response to the request being handled.
    pub fn respond(&self, reply: Reply) -> bool {
        self.outbox.send(Outbound::Response(reply)).is_ok()
    }

    /// Asks the adapter to close the connection.
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.outbox.send(Outbound::Close {
            reason: reason.into(),
        });
    }

    /// `true` once the adapter has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use doushou_protocol::{CoinChange, ExitResponse};

    use super::*;

    #[test]
    fn test_push_and_respond_reach_inbox_in_order() {
        let (session, mut inbox) = Session::channel(SessionId(1), "10.0.0.1");
        assert!(session.push(Push::CoinChange(CoinChange { coin: 5 })));
        assert!(session.respond(Reply::Exit(ExitResponse { code: 0 })));
        session.close("bye");

        assert!(matches!(inbox.try_recv(), Ok(Outbound::Push(Push::CoinChange(_)))));
        assert!(matches!(inbox.try_recv(), Ok(Outbound::Response(Reply::Exit(_)))));
        assert_eq!(
            inbox.try_recv().unwrap(),
            Outbound::Close { reason: "bye".into() }
        );
    }

    #[test]
    fn test_push_after_adapter_dropped_returns_false() {
        let (session, inbox) = Session::channel(SessionId(2), "10.0.0.2");
        drop(inbox);
        assert!(session.is_closed());
        assert!(!session.push(Push::CoinChange(CoinChange { coin: 1 })));
    }

    #[test]
    fn test_clones_share_the_same_channel() {
        let (session, mut inbox) = Session::channel(SessionId(3), "ip");
        let copy = session.clone();
        copy.push(Push::CoinChange(CoinChange { coin: 9 }));
        assert!(inbox.try_recv().is_ok());
        assert_eq!(copy.id(), session.id());
        assert_eq!(copy.remote_ip(), "ip");
    }
}
