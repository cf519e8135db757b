/// Events emitted by state-machine transitions.
/// The session layer reacts to `Started`/`Finished` and logs the rest;
/// sound picks its cues from them.

use crate::domain::rules::Outcome;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// A new game began; the scale-up trigger must be sent for `session`.
    Started { session: u64 },
    Hit { score: u32 },
    Miss,
    SequenceCleared { next_len: usize },
    ReplicasChanged { replicas: u32 },
    /// Scale limit seen; the loss lands after the grace delay.
    GraceArmed,
    /// The game ended. Emitted once per session; the stream must be torn down.
    Finished { session: u64, outcome: Outcome },
    Reset,
}
