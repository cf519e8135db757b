/// Session: the state machine plus its link to the scaling backend.
///
/// All mutations arrive here on the event-loop thread, one at a time:
/// routed key presses, sync events drained from the client channel, and
/// the per-frame timer tick. The session reacts to two transition events:
///
///   - `Started`  → `link.open(session)`   (trigger, then subscribe)
///   - `Finished` → `link.close()`         (teardown, once per session)
///
/// Sync events tagged with another session id are dropped before they
/// reach the machine, so a trigger that resolves after a restart cannot
/// touch the new game.

use std::time::Instant;

use rand::Rng;
use tracing::debug;

use crate::domain::direction::Direction;
use crate::domain::rules::FailureKind;
use crate::net::{SyncEvent, SyncEventKind, SyncLink};
use super::event::GameEvent;
use super::machine::GameStateMachine;
use super::world::{GameSnapshot, Phase};

pub struct Session<R: Rng, L: SyncLink> {
    machine: GameStateMachine<R>,
    link: L,
}

impl<R: Rng, L: SyncLink> Session<R, L> {
    pub fn new(machine: GameStateMachine<R>, link: L) -> Self {
        Session { machine, link }
    }

    pub fn snapshot(&self) -> &GameSnapshot {
        self.machine.snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn start(&mut self) -> Vec<GameEvent> {
        let events = self.machine.start();
        self.dispatch(events)
    }

    pub fn submit_input(&mut self, symbol: Direction) -> Vec<GameEvent> {
        let events = self.machine.submit_input(symbol);
        self.dispatch(events)
    }

    pub fn reset(&mut self) -> Vec<GameEvent> {
        let events = self.machine.reset();
        self.dispatch(events)
    }

    pub fn tick(&mut self, now: Instant) -> Vec<GameEvent> {
        let events = self.machine.tick(now);
        self.dispatch(events)
    }

    pub fn on_sync_event(&mut self, event: SyncEvent, now: Instant) -> Vec<GameEvent> {
        let current = self.machine.snapshot().session;
        if event.session != current {
            debug!(stale = event.session, current, kind = ?event.kind, "dropping stale sync event");
            return vec![];
        }

        let events = match event.kind {
            SyncEventKind::Triggered => {
                self.machine.on_trigger_acknowledged();
                vec![]
            }
            SyncEventKind::StreamOpened => {
                self.machine.on_stream_opened();
                vec![]
            }
            SyncEventKind::Replicas(count) => self.machine.on_replica_update(count, now),
            SyncEventKind::Failed(FailureKind::StreamClosed) => self.machine.on_connection_lost(),
            SyncEventKind::Failed(kind) => self.machine.on_connection_error(kind),
        };
        self.dispatch(events)
    }

    /// Tear down whatever is live. Safe to call at any time.
    pub fn shutdown(&mut self) {
        self.link.close();
    }

    /// Give the link back, e.g. to wait out its teardown on exit.
    pub fn into_link(self) -> L {
        self.link
    }

    fn dispatch(&mut self, events: Vec<GameEvent>) -> Vec<GameEvent> {
        for event in &events {
            match event {
                GameEvent::Started { session } => self.link.open(*session),
                GameEvent::Finished { session, .. } => {
                    debug!(session, "closing sync link");
                    self.link.close();
                }
                GameEvent::Hit { score } => debug!(score, "hit"),
                GameEvent::SequenceCleared { next_len } => debug!(next_len, "sequence cleared"),
                GameEvent::ReplicasChanged { replicas } => debug!(replicas, "replicas changed"),
                GameEvent::Miss | GameEvent::GraceArmed | GameEvent::Reset => {}
            }
        }
        events
    }
}
