//! The player command queue: kick, reset and recharge.
//!
//! Operators and the payment backend do not touch player records
//! directly. They enqueue a command through a [`CommandSender`], and the
//! dispatch loop drains the [`CommandQueue`] on its one-second tick, so
//! every mutation of a player record still happens on one task.
//!
//! Each command kind has its own bounded backlog. Enqueueing never
//! waits: a full backlog is reported as [`SessionError::QueueFull`].

use doushou_protocol::PlayerId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::SessionError;

/// One queued operation on a player record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Close the player's connection and treat it as a disconnect.
    Kick(PlayerId),
    /// Forget an offline player's record and desk link.
    Reset(PlayerId),
    /// The player's balance changed elsewhere; adopt `coin`.
    Recharge { player: PlayerId, coin: i64 },
}

/// Backlog sizes for the three command kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub kick_backlog: usize,
    pub reset_backlog: usize,
    pub recharge_backlog: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kick_backlog: 8,
            reset_backlog: 8,
            recharge_backlog: 32,
        }
    }
}

/// Producer side; clone freely.
#[derive(Debug, Clone)]
pub struct CommandSender {
    kick: mpsc::Sender<PlayerId>,
    reset: mpsc::Sender<PlayerId>,
    recharge: mpsc::Sender<(PlayerId, i64)>,
}

impl CommandSender {
    pub fn kick(&self, player: PlayerId) -> Result<(), SessionError> {
        offer(&self.kick, player, "kick")
    }

    pub fn reset(&self, player: PlayerId) -> Result<(), SessionError> {
        offer(&self.reset, player, "reset")
    }

    pub fn recharge(&self, player: PlayerId, coin: i64) -> Result<(), SessionError> {
        offer(&self.recharge, (player, coin), "recharge")
    }
}

fn offer<T>(tx: &mpsc::Sender<T>, value: T, queue: &'static str) -> Result<(), SessionError> {
    tx.try_send(value).map_err(|err| match err {
        TrySendError::Full(_) => {
            tracing::warn!(queue, "command queue full, dropping command");
            SessionError::QueueFull(queue)
        }
        TrySendError::Closed(_) => SessionError::QueueClosed(queue),
    })
}

/// Consumer side, owned by the dispatch loop.
#[derive(Debug)]
pub struct CommandQueue {
    kick: mpsc::Receiver<PlayerId>,
    reset: mpsc::Receiver<PlayerId>,
    recharge: mpsc::Receiver<(PlayerId, i64)>,
}

impl CommandQueue {
    /// Takes everything queued right now and returns without waiting.
    ///
    /// Kicks come first, then resets, then recharges; within a kind the
    /// enqueue order is kept.
    pub fn drain(&mut self) -> Vec<PlayerCommand> {
        let mut commands = Vec::new();
        drain_into(&mut self.kick, &mut commands, PlayerCommand::Kick);
        drain_into(&mut self.reset, &mut commands, PlayerCommand::Reset);
        drain_into(&mut self.recharge, &mut commands, |(player, coin)| {
            PlayerCommand::Recharge { player, coin }
        });
        commands
    }
}

fn drain_into<T>(
    rx: &mut mpsc::Receiver<T>,
    out: &mut Vec<PlayerCommand>,
    wrap: impl Fn(T) -> PlayerCommand,
) {
    loop {
        match rx.try_recv() {
            Ok(value) => out.push(wrap(value)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
}

/// Creates a connected sender/queue pair.
pub fn command_queue(config: &QueueConfig) -> (CommandSender, CommandQueue) {
    let (kick_tx, kick_rx) = mpsc::channel(config.kick_backlog.max(1));
    let (reset_tx, reset_rx) = mpsc::channel(config.reset_backlog.max(1));
    let (recharge_tx, recharge_rx) = mpsc::channel(config.recharge_backlog.max(1));
    (
        CommandSender {
            kick: kick_tx,
            reset: reset_tx,
            recharge: recharge_tx,
        },
        CommandQueue {
            kick: kick_rx,
            reset: reset_rx,
            recharge: recharge_rx,
        },
    )
}
