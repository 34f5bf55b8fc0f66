//! Desk registry: desk code → running desk.

use std::collections::HashMap;

use doushou_protocol::{DeskCode, DeskMode, PlayerId};
use rand::Rng;

use crate::desk::{DeskHandle, DeskSpec, NoticeSender, spawn_desk};
use crate::DeskConfig;

/// Owns every live desk.
///
/// Like the player registry this is plain maps without locks, owned by
/// the dispatch task. Desks report back through the notice channel given
/// at construction.
pub struct DeskRegistry {
    desks: HashMap<DeskCode, DeskHandle>,
    config: DeskConfig,
    notices: NoticeSender,
}

impl DeskRegistry {
    pub fn new(config: DeskConfig, notices: NoticeSender) -> Self {
        Self {
            desks: HashMap::new(),
            config,
            notices,
        }
    }

    /// Spawns a desk under a fresh six-digit code. The creator is not
    /// seated; callers join them next.
    pub fn create(&mut self, creator: PlayerId, mode: DeskMode, stake: i64, now: i64) -> DeskHandle {
        let code = self.allocate_code();
        let spec = DeskSpec {
            code: code.clone(),
            creator,
            mode,
            stake,
            created_at: now,
        };
        let handle = spawn_desk(spec, &self.config, self.notices.clone());
        self.desks.insert(code.clone(), handle.clone());
        tracing::info!(desk = %code, creator = %creator, desks = self.desks.len(), "desk created");
        handle
    }

    /// Random codes until one is unused.
    fn allocate_code(&self) -> DeskCode {
        let mut rng = rand::rng();
        loop {
            let number: u32 = rng.random_range(0..1_000_000);
            let code = DeskCode::new(format!("{number:0width$}", width = DeskCode::LEN));
            if !self.desks.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn lookup(&self, code: &DeskCode) -> Option<&DeskHandle> {
        self.desks.get(code)
    }

    pub fn remove(&mut self, code: &DeskCode) -> Option<DeskHandle> {
        let handle = self.desks.remove(code)?;
        tracing::debug!(desk = %code, remaining = self.desks.len(), "desk removed");
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.desks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desks.is_empty()
    }

    /// Reclaims desks that are destroyed, unreachable, or older than the
    /// idle deadline, and returns their codes.
    pub async fn sweep(&mut self, now: i64) -> Vec<DeskCode> {
        let deadline = i64::try_from(self.config.idle_deadline.as_secs()).unwrap_or(i64::MAX);
        let mut stale = Vec::new();

        for (code, handle) in &self.desks {
            if handle.is_destroyed() {
                stale.push(code.clone());
                continue;
            }
            let Ok(info) = handle.info().await else {
                tracing::warn!(desk = %code, "desk unreachable, reclaiming");
                stale.push(code.clone());
                continue;
            };
            if info.state.is_destroyed() {
                stale.push(code.clone());
            } else if handle.created_at().saturating_add(deadline) < now {
                tracing::info!(desk = %code, created_at = handle.created_at(), "desk past idle deadline");
                let _ = handle.destroy().await;
                stale.push(code.clone());
            } else {
                tracing::debug!(
                    desk = %code,
                    created_at = info.spec.created_at,
                    creator = %info.spec.creator,
                    state = %info.state,
                    players = info.players.len(),
                    "desk alive"
                );
            }
        }

        for code in &stale {
            self.desks.remove(code);
        }
        tracing::info!(swept = stale.len(), remaining = self.desks.len(), "desk sweep finished");
        stale
    }

    /// Destroys and forgets every desk. Returns how many were live.
    pub async fn shutdown_all(&mut self) -> usize {
        let mut destroyed = 0;
        for (_, handle) in self.desks.drain() {
            if let Ok(true) = handle.destroy().await {
                destroyed += 1;
            }
        }
        tracing::info!(destroyed, "all desks shut down");
        destroyed
    }
}
