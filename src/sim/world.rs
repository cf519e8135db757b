/// GameSnapshot: everything the game knows at one instant.
///
/// Owned exclusively by `GameStateMachine`. Everyone else reads it
/// (renderer, sound, tests) or submits events; nobody mutates it directly.

use std::time::Instant;

use crate::domain::direction::{Direction, Sequence};
use crate::domain::rules::{self, Outcome};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Idle,
    Playing,
    Finished,
}

/// Where the connection to the scaling backend stands.
/// Display-only; game decisions never read it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinkState {
    Offline,
    Triggering,
    /// Scale-up accepted; the replica stream is still connecting.
    Subscribing,
    Streaming,
}

#[derive(Clone, Debug)]
pub struct GameSnapshot {
    pub phase: Phase,
    /// Incremented on every start. Sync events carry it so stale ones can be dropped.
    pub session: u64,
    pub sequence: Sequence,
    pub cursor: usize,
    pub score: u32,
    pub replicas: u32,
    /// Set only in `Phase::Finished`.
    pub outcome: Option<Outcome>,
    pub link: LinkState,
    /// Armed when the scale limit is seen; a loss is recorded once it passes.
    pub grace_deadline: Option<Instant>,
    /// Number of sequences completed this game.
    pub sequences_cleared: u32,
}

impl GameSnapshot {
    pub fn new() -> Self {
        GameSnapshot {
            phase: Phase::Idle,
            session: 0,
            sequence: Vec::new(),
            cursor: 0,
            score: 0,
            replicas: rules::INITIAL_REPLICAS,
            outcome: None,
            link: LinkState::Offline,
            grace_deadline: None,
            sequences_cleared: 0,
        }
    }

    /// The symbol the player must press next, if a game is running.
    pub fn expected(&self) -> Option<Direction> {
        if self.phase != Phase::Playing {
            return None;
        }
        self.sequence.get(self.cursor).copied()
    }
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
