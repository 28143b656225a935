//! Kiosk client for the course board.
//!
//! A wall display shows course cards selected with physical buttons. This
//! crate keeps a local copy of the board state in step with the server:
//!
//! - [`snapshot`] fetches the full authoritative state (`GET /api/state`).
//! - [`connection`] owns the WebSocket event connection and reconnects
//!   after a fixed delay, forever.
//! - [`event`] decodes inbound frames into [`event::ServerEvent`].
//! - [`reducer`] applies one event to the local [`model::ClientState`].
//! - [`controller`] sequences the above and notifies a
//!   [`controller::StateObserver`] of every change.
//! - [`command`] sends the clear-history request (`POST /api/clear`).
//!
//! [`cli`], [`client`], and [`render`] make up the `kiosk_sync` binary,
//! which follows a board from a terminal.

pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod event;
pub mod model;
pub mod reducer;
pub mod render;
pub mod snapshot;

pub use config::SyncConfig;
pub use controller::{SyncController, SyncHandle};
pub use error::SyncError;
pub use model::{ClientState, Course};
