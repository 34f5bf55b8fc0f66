//! Desks for Doushou.
//!
//! Each desk runs as an isolated Tokio task (actor model) that owns its
//! seats, its board and its round state. While a round is being played a
//! second task, the control loop, drives turn progression and the turn
//! timeout by talking to the desk through the same command queue.
//!
//! # Key types
//!
//! - [`DeskRegistry`] — creates desks, looks them up by code, sweeps them
//! - [`DeskHandle`] — send commands to a running desk actor
//! - [`DeskNotice`] — what desks report back to the registry's owner
//! - [`DeskConfig`] — turn timeout, idle deadline, queue size

mod config;
mod control;
mod desk;
mod error;
mod gate;
mod registry;
mod seat;

pub use config::{DeskConfig, SEATS};
pub use desk::{
    Action, DeskHandle, DeskInfo, DeskNotice, DeskSpec, DestroyCause, NoticeReceiver,
    NoticeSender, unix_now,
};
pub use error::DeskError;
pub use registry::DeskRegistry;
pub use seat::SeatProfile;
