//! Link to the scaling backend.
//!
//! The game core only sees the `SyncLink` seam and the `SyncEvent`s that
//! come back through a channel. `ScaleSyncClient` is the real link:
//! one scale-up POST, then a WebSocket of replica counts.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::ScaleSyncClient;
pub use endpoints::Endpoints;

use crate::domain::rules::FailureKind;

/// Something that can start and tear down the backend side of a session.
pub trait SyncLink {
    /// Send the scale-up trigger for `session`, then subscribe to updates.
    /// Results come back asynchronously as `SyncEvent`s.
    fn open(&mut self, session: u64);

    /// Tear down the live session, if any. Idempotent.
    fn close(&mut self);
}

/// Transport event, tagged with the session that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncEvent {
    pub session: u64,
    pub kind: SyncEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEventKind {
    /// The backend acknowledged the scale-up request.
    Triggered,
    StreamOpened,
    Replicas(u32),
    /// Terminal for the session.
    Failed(FailureKind),
}
