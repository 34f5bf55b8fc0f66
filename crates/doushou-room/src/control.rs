//! The per-round control loop.
//!
//! One task per running round. It never touches the board: it asks the
//! desk actor to open each turn, then waits for the first of the camp's
//! turn gate, the desk's termination signal, or the turn timer.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use doushou_protocol::{Camp, DeskCode};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::desk::{DeskHandle, RoundEnd};
use crate::gate::{RoundGates, TurnEnd};

/// Spawns the control loop for a freshly armed round.
pub(crate) fn spawn_round(desk: DeskHandle, gates: RoundGates, first: Camp, turn_timeout: Duration) {
    let code = desk.code().clone();
    spawn_guarded(code, run_round(desk, gates, first, turn_timeout));
}

/// Spawns `task` on behalf of desk `code`.
///
/// A panic inside the task is caught here and logged with a backtrace;
/// only this task ends.
pub(crate) fn spawn_guarded<F>(code: DeskCode, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            tracing::error!(
                desk = %code,
                panic = panic_message(panic.as_ref()),
                backtrace = %Backtrace::force_capture(),
                "control loop panicked"
            );
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn terminated(termination: &mut watch::Receiver<bool>) {
    let _ = termination.wait_for(|done| *done).await;
}

async fn run_round(desk: DeskHandle, mut gates: RoundGates, first: Camp, turn_timeout: Duration) {
    let code = desk.code().clone();
    let mut termination = desk.termination();

    if !matches!(desk.begin_round().await, Ok(true)) {
        tracing::debug!(desk = %code, "round no longer armed, control loop not started");
        return;
    }
    tracing::debug!(desk = %code, first_camp = first.code(), "control loop started");

    let mut camp = first;
    loop {
        let player = match desk.open_turn(camp).await {
            Ok(Some(player)) => player,
            _ => {
                tracing::debug!(desk = %code, "desk left Playing, control loop exiting");
                return;
            }
        };
        tracing::debug!(desk = %code, player_id = %player, camp = camp.code(), "turn opened");

        let signal = tokio::select! {
            _ = terminated(&mut termination) => {
                tracing::info!(desk = %code, "desk terminated, control loop exiting");
                return;
            }
            signal = gates.get(camp).recv() => signal,
            _ = tokio::time::sleep(turn_timeout) => {
                match desk.expire_turn(camp).await {
                    // The actor settled the round with the timeout flag.
                    Ok(true) => return,
                    // An action was accepted just before the timer fired.
                    Ok(false) => gates.get(camp).recv().await,
                    Err(_) => return,
                }
            }
        };

        let Some(signal) = signal else {
            tracing::debug!(desk = %code, camp = camp.code(), "turn gate closed, control loop exiting");
            return;
        };

        let end = match signal.end {
            TurnEnd::Advance => {
                camp = camp.opponent();
                continue;
            }
            TurnEnd::Decided(outcome) => RoundEnd::Board(outcome),
            TurnEnd::Surrender => RoundEnd::Surrender { loser: camp },
        };
        tracing::debug!(desk = %code, player_id = %signal.player, ?end, "round decided");
        if let Err(err) = desk.settle(end).await {
            tracing::warn!(desk = %code, %err, "could not settle round");
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use doushou_protocol::{DeskMode, PlayerId};
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::{DeskConfig, DeskRegistry, unix_now};

    #[tokio::test]
    async fn test_spawn_guarded_contains_panic() {
        let (notices, _notice_rx) = mpsc::unbounded_channel();
        let mut registry = DeskRegistry::new(DeskConfig::default(), notices);
        let first = registry.create(PlayerId(1), DeskMode::Room, 2, unix_now());
        let second = registry.create(PlayerId(2), DeskMode::Room, 2, unix_now());

        let (started_tx, started_rx) = oneshot::channel();
        let task = spawn_guarded(first.code().clone(), async move {
            let _ = started_tx.send(());
            panic!("turn bookkeeping went wrong");
        });
        started_rx.await.unwrap();

        // The panic is swallowed, so the task itself completes normally.
        assert!(task.await.is_ok());
        assert!(!first.is_destroyed());
        assert!(first.info().await.is_ok());
        assert!(second.info().await.is_ok());
    }

    #[test]
    fn test_panic_message_payloads() {
        let text: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(text.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
