//! TurnGate: the single-slot handoff from a desk's worker to its control
//! loop.
//!
//! Each seat gets a fresh gate when a round is armed. The worker holds the
//! sending half on the seat and the control loop holds the receiving half
//! for the seat's camp. Dropping the seat (or re-arming) drops the sender,
//! so a receiver left over from an earlier round sees a closed channel
//! instead of a stale action.

use doushou_board::Outcome;
use doushou_protocol::{Camp, PlayerId};
use tokio::sync::mpsc;

/// What the accepted action means for the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnEnd {
    /// Round still undetermined; hand the turn to the other camp.
    Advance,
    /// The board has a winner or a draw.
    Decided(Outcome),
    /// The acting camp gave up.
    Surrender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TurnSignal {
    pub(crate) player: PlayerId,
    pub(crate) end: TurnEnd,
}

pub(crate) type GateSender = mpsc::Sender<TurnSignal>;
pub(crate) type GateReceiver = mpsc::Receiver<TurnSignal>;

pub(crate) fn turn_gate() -> (GateSender, GateReceiver) {
    mpsc::channel(1)
}

/// Receiving halves for one round, one per camp.
#[derive(Debug)]
pub(crate) struct RoundGates {
    a: GateReceiver,
    b: GateReceiver,
}

impl RoundGates {
    pub(crate) fn new(a: GateReceiver, b: GateReceiver) -> Self {
        Self { a, b }
    }

    pub(crate) fn get(&mut self, camp: Camp) -> &mut GateReceiver {
        match camp {
            Camp::A => &mut self.a,
            Camp::B => &mut self.b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_gate_holds_exactly_one_signal() {
        let (tx, mut rx) = turn_gate();
        let signal = TurnSignal {
            player: PlayerId(1),
            end: TurnEnd::Advance,
        };
        tx.try_send(signal).unwrap();
        assert!(tx.try_send(signal).is_err());
        assert_eq!(rx.try_recv().unwrap(), signal);
    }

    #[test]
    fn test_turn_gate_closes_when_sender_dropped() {
        let (tx, mut rx) = turn_gate();
        drop(tx);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_round_gates_routes_by_camp() {
        let (tx_a, rx_a) = turn_gate();
        let (_tx_b, rx_b) = turn_gate();
        let mut gates = RoundGates::new(rx_a, rx_b);
        tx_a.try_send(TurnSignal {
            player: PlayerId(7),
            end: TurnEnd::Surrender,
        })
        .unwrap();
        assert!(gates.get(Camp::B).try_recv().is_err());
        assert_eq!(gates.get(Camp::A).try_recv().unwrap().player, PlayerId(7));
    }
}
