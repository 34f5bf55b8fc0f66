//! `DoushouService` builder and the handle transport adapters talk to.
//!
//! This is the entry point for embedding the game core. It ties together
//! all the layers: session → desk → control loop, with persistence
//! hanging off the side.

use std::time::Duration;

use doushou_protocol::{ClientMessage, PlayerId, PlayerProfile, SessionId};
use doushou_room::DeskConfig;
use doushou_session::{CommandSender, QueueConfig, Session, command_queue};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, Inbound, World};
use crate::offload::Invoker;
use crate::store::Persistence;
use crate::{ServiceConfig, ServiceError, StakeTable};

/// Builder for configuring and starting the service.
///
/// # Example
///
/// ```rust,ignore
/// use doushou::prelude::*;
///
/// let service = DoushouServiceBuilder::new()
///     .version("1.0.2")
///     .force_update(true)
///     .stakes("1/2,2/4".parse()?)
///     .build(MemoryStore::new());
/// let (handle, task) = service.spawn();
/// ```
pub struct DoushouServiceBuilder {
    config: ServiceConfig,
}

impl DoushouServiceBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn force_update(mut self, force: bool) -> Self {
        self.config.force_update = force;
        self
    }

    pub fn stakes(mut self, stakes: StakeTable) -> Self {
        self.config.stakes = stakes;
        self
    }

    pub fn desk_config(mut self, config: DeskConfig) -> Self {
        self.config.desk = config;
        self
    }

    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.config.queue = config;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Builds the service around `store`. Nothing runs until
    /// [`run`](DoushouService::run) or [`spawn`](DoushouService::spawn).
    pub fn build<P: Persistence>(self, store: P) -> DoushouService<P> {
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_capacity.max(1));
        let (commands, queue) = command_queue(&self.config.queue);

        let dispatcher = Dispatcher::new(
            self.config,
            store,
            inbound_rx,
            inbound_tx.downgrade(),
            queue,
        );
        let handle = ServiceHandle {
            inbound: inbound_tx,
            commands,
        };
        DoushouService { dispatcher, handle }
    }
}

impl Default for DoushouServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built, not yet running, service.
pub struct DoushouService<P: Persistence> {
    dispatcher: Dispatcher<P>,
    handle: ServiceHandle,
}

impl<P: Persistence> DoushouService<P> {
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Runs the dispatch loop on the current task.
    ///
    /// Returns after [`ServiceHandle::shutdown`], or once every handle
    /// has been dropped.
    pub async fn run(self) {
        let Self { dispatcher, handle } = self;
        drop(handle);
        dispatcher.run().await;
    }

    /// Spawns the dispatch loop and returns a handle to it.
    pub fn spawn(self) -> (ServiceHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }
}

/// Cheap, cloneable access to a running service.
///
/// Transport adapters own one: they create a [`Session`] per connection,
/// log it in, forward its decoded requests with [`send`](Self::send) and
/// report the close with [`disconnect`](Self::disconnect). Replies and
/// pushes come back on the session's outbound channel.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    inbound: mpsc::Sender<Inbound>,
    commands: CommandSender,
}

impl ServiceHandle {
    async fn post(&self, inbound: Inbound) -> Result<(), ServiceError> {
        self.inbound
            .send(inbound)
            .await
            .map_err(|_| ServiceError::Unavailable)
    }

    /// Binds `session` to the player in `profile`. A `LoginResponse`
    /// follows on the session.
    pub async fn login(&self, session: Session, profile: PlayerProfile) -> Result<(), ServiceError> {
        self.post(Inbound::Login { session, profile }).await
    }

    /// Rebinds a player whose connection dropped.
    pub async fn reconnect(
        &self,
        session: Session,
        profile: PlayerProfile,
    ) -> Result<(), ServiceError> {
        self.post(Inbound::Reconnect { session, profile }).await
    }

    /// Forwards one request from a logged-in session.
    pub async fn send(&self, session: SessionId, message: ClientMessage) -> Result<(), ServiceError> {
        self.post(Inbound::Message { session, message }).await
    }

    /// Reports that a session's connection closed.
    pub async fn disconnect(&self, session: SessionId) -> Result<(), ServiceError> {
        self.post(Inbound::Disconnect(session)).await
    }

    /// Runs `job` on the dispatcher, between other requests.
    pub async fn invoke<F>(&self, job: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.post(Inbound::Invoke(Box::new(job))).await
    }

    /// An [`Invoker`] for tasks that need to post back later.
    pub fn invoker(&self) -> Invoker {
        Invoker::new(self.inbound.clone())
    }

    /// Queues a kick. Applied on the next command tick.
    pub fn kick(&self, player: PlayerId) -> Result<(), ServiceError> {
        self.commands.kick(player)?;
        Ok(())
    }

    /// Queues a reset of an offline player.
    pub fn reset(&self, player: PlayerId) -> Result<(), ServiceError> {
        self.commands.reset(player)?;
        Ok(())
    }

    /// Queues a balance change.
    pub fn recharge(&self, player: PlayerId, coin: i64) -> Result<(), ServiceError> {
        self.commands.recharge(player, coin)?;
        Ok(())
    }

    /// Destroys every desk and stops the dispatcher. Returns how many
    /// desks were live.
    pub async fn shutdown(&self) -> Result<usize, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.post(Inbound::Shutdown { reply }).await?;
        rx.await.map_err(|_| ServiceError::Unavailable)
    }
}
