//! # Doushou
//!
//! Session and match orchestration core for a two-player Dou Shou Qi
//! ("animal chess") service played on a hidden 4x4 board.
//!
//! The service admits players into desks, runs each desk's round as its
//! own actor plus a turn control loop, and keeps slow persistence off the
//! live path. Transport is somebody else's job: a connection is a
//! [`Session`](doushou_session::Session) whose outbound channel the
//! adapter drains.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doushou::prelude::*;
//!
//! # async fn demo() -> Result<(), ServiceError> {
//! doushou::init_tracing("info");
//! let (service, _task) = DoushouServiceBuilder::new()
//!     .build(MemoryStore::new())
//!     .spawn();
//!
//! let (session, mut inbox) = Session::channel(SessionId(1), "127.0.0.1");
//! let profile = PlayerProfile {
//!     uid: PlayerId(7),
//!     name: "ada".into(),
//!     head_url: String::new(),
//!     sex: 0,
//! };
//! service.login(session, profile).await?;
//! let _login = inbox.recv().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod handler;
mod offload;
mod server;
mod store;
mod telemetry;

pub use config::{ServiceConfig, StakeTable};
pub use dispatcher::World;
pub use error::{ConfigError, ServiceError, StoreError};
pub use offload::{Invoker, offload};
pub use server::{DoushouService, DoushouServiceBuilder, ServiceHandle};
pub use store::{
    ConsumptionRecord, MemoryStore, OnlineSnapshot, Persistence, RoomRecord, RoomSettlement,
};
pub use telemetry::init_tracing;

pub use doushou_protocol as protocol;
pub use doushou_room as room;
pub use doushou_session as session;

/// Everything a transport adapter or an embedding binary usually needs.
pub mod prelude {
    pub use crate::{
        DoushouService, DoushouServiceBuilder, MemoryStore, Persistence, ServiceConfig,
        ServiceError, ServiceHandle, StakeTable, World,
    };
    pub use doushou_protocol::{
        ClientMessage, DeskCode, DeskMode, Outbound, PlayerId, PlayerProfile, Push, Reply,
        SessionId,
    };
    pub use doushou_session::{Inbox, Session};
}
