//! Chat-protocol client for the marketplace room.
//!
//! A thin, typed wrapper over the three client-server endpoints the agents
//! need: long-poll `/sync` for new timeline events, paged `/messages` for
//! history backfill, and `send` for posting text. Every request carries the
//! caller's access token as a bearer credential.
//!
//! Sync responses are converted into [`clawlist_types::RoomEvent`] so the
//! rest of the workspace never touches the raw wire shapes.

mod client;
mod error;
pub mod types;

pub use client::{MatrixClient, SYNC_TIMEOUT_MS};
pub use error::MatrixError;
pub use types::{MessagesResponse, RawEvent, SyncFilter, SyncResponse};
