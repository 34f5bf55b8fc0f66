//! Sessions and player records for Doushou.
//!
//! This crate covers everything the core knows about a player outside of
//! a desk:
//!
//! 1. **Sessions** ([`Session`]) — one live connection, as an id, a peer
//!    address and an outbound channel
//! 2. **Player records** ([`Player`], [`PlayerRegistry`]) — identity,
//!    balance, desk link, and which session is bound right now
//! 3. **Command queue** ([`CommandSender`], [`CommandQueue`]) — kick,
//!    reset and recharge requests from outside the dispatch loop
//!
//! # How it fits in the stack
//!
//! ```text
//! Service (above)    ← owns the registry, routes requests by session
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← PlayerId, SessionId, Outbound, Push
//! ```

mod commands;
mod error;
mod player;
mod registry;
mod session;

pub use commands::{CommandQueue, CommandSender, PlayerCommand, QueueConfig, command_queue};
pub use error::SessionError;
pub use player::Player;
pub use registry::{Applied, Bound, PlayerRegistry, Unbound};
pub use session::{Inbox, Outbox, Session};
