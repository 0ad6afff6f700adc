//! Marketplace poller library logic.
//!
//! Watches the market room through a long-poll sync loop, recognises sale
//! listings, and wakes interested buyer agents after a randomized delay so
//! that responses do not look instantaneous.
//!
//! ```text
//! idle -> polling -> processing -> delaying -> idle   (until stopped)
//! ```
//!
//! Progress is persisted after every successful cycle, so a restarted
//! poller resumes from the last cursor and never alerts twice for the same
//! event.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod listing;
pub mod poller;
pub mod state;

pub use dispatch::{alert_text, CommandDispatcher, Dispatcher, Trigger};
pub use error::{DispatchError, PollerError, StateError};
pub use listing::is_listing;
pub use poller::{
    CycleReport, InFlightTriggers, MatrixTimeline, Poller, PollerSettings, ShutdownPolicy,
    StopHandle, SyncBatch, TimelineSource,
};
pub use state::PollerState;
