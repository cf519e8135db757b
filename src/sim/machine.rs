/// The game state machine.
///
/// States: Idle → Playing → Finished → Idle. Nothing else.
///
///   - `start`        Idle | Finished → Playing   (fresh fields, new session)
///   - `submit_input` Playing only                (score, cursor, sequence)
///   - `on_replica_update` Playing only           (may arm the grace deadline)
///   - `tick`         Playing only                (grace deadline → scale loss)
///   - `on_connection_*`   Playing only           (→ Finished, failure)
///   - `reset`        Finished → Idle
///
/// Every operation outside its phase is a silent no-op. The router already
/// gates keys by phase, and the session layer drops stale sync events, so a
/// no-op here only ever absorbs late transport noise.
///
/// Each operation returns the events it caused, the same way a simulation
/// step does. `Finished` is emitted exactly once per session because every
/// path into it goes through `finish`, which requires `Playing`.

use std::time::Instant;

use rand::Rng;
use tracing::{debug, info};

use crate::domain::direction::{Direction, SequenceGenerator};
use crate::domain::rules::{self, FailureKind, Outcome};
use super::event::GameEvent;
use super::world::{GameSnapshot, LinkState, Phase};

pub struct GameStateMachine<R: Rng> {
    snapshot: GameSnapshot,
    generator: SequenceGenerator<R>,
}

impl<R: Rng> GameStateMachine<R> {
    pub fn new(generator: SequenceGenerator<R>) -> Self {
        GameStateMachine {
            snapshot: GameSnapshot::new(),
            generator,
        }
    }

    pub fn snapshot(&self) -> &GameSnapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> Phase {
        self.snapshot.phase
    }

    // ── Phase transitions ──

    /// Begin a new game. A finished game is reset implicitly first.
    pub fn start(&mut self) -> Vec<GameEvent> {
        if self.snapshot.phase == Phase::Playing {
            return vec![];
        }

        let s = &mut self.snapshot;
        s.session += 1;
        s.score = 0;
        s.replicas = rules::INITIAL_REPLICAS;
        s.cursor = 0;
        s.sequence = self.generator.generate(rules::INITIAL_SEQUENCE_LEN);
        s.outcome = None;
        s.grace_deadline = None;
        s.sequences_cleared = 0;
        s.link = LinkState::Triggering;
        s.phase = Phase::Playing;

        info!(session = s.session, "game started");
        vec![GameEvent::Started { session: s.session }]
    }

    /// Return to the title screen after a finished game.
    pub fn reset(&mut self) -> Vec<GameEvent> {
        if self.snapshot.phase != Phase::Finished {
            return vec![];
        }
        self.snapshot.phase = Phase::Idle;
        vec![GameEvent::Reset]
    }

    // ── Player input ──

    pub fn submit_input(&mut self, symbol: Direction) -> Vec<GameEvent> {
        let expected = match self.snapshot.expected() {
            Some(d) => d,
            None => return vec![],
        };

        if symbol != expected {
            // Wrong key costs progress in this sequence, never score.
            self.snapshot.cursor = 0;
            return vec![GameEvent::Miss];
        }

        self.snapshot.score += 1;
        let mut events = vec![GameEvent::Hit { score: self.snapshot.score }];

        if rules::is_winning_score(self.snapshot.score) {
            events.extend(self.finish(Outcome::Win));
            return events;
        }

        self.snapshot.cursor += 1;
        if self.snapshot.cursor == self.snapshot.sequence.len() {
            let next_len = rules::next_sequence_len(self.snapshot.sequence.len());
            self.snapshot.sequence = self.generator.generate(next_len);
            self.snapshot.cursor = 0;
            self.snapshot.sequences_cleared += 1;
            events.push(GameEvent::SequenceCleared { next_len });
        }

        events
    }

    // ── Backend signals ──

    /// The scale-up request was acknowledged.
    pub fn on_trigger_acknowledged(&mut self) {
        if self.snapshot.phase == Phase::Playing && self.snapshot.link == LinkState::Triggering {
            debug!(session = self.snapshot.session, "scale-up acknowledged");
            self.snapshot.link = LinkState::Subscribing;
        }
    }

    /// The replica stream is connected.
    pub fn on_stream_opened(&mut self) {
        if self.snapshot.phase == Phase::Playing {
            self.snapshot.link = LinkState::Streaming;
        }
    }

    pub fn on_replica_update(&mut self, count: u32, now: Instant) -> Vec<GameEvent> {
        if self.snapshot.phase != Phase::Playing {
            return vec![];
        }

        self.snapshot.replicas = count;
        let mut events = vec![GameEvent::ReplicasChanged { replicas: count }];

        if rules::is_scale_limit(count) && self.snapshot.grace_deadline.is_none() {
            self.snapshot.grace_deadline = Some(now + rules::GRACE_DELAY);
            debug!(replicas = count, "scale limit reached, grace delay armed");
            events.push(GameEvent::GraceArmed);
        }

        events
    }

    /// The stream closed while the game was running.
    pub fn on_connection_lost(&mut self) -> Vec<GameEvent> {
        self.on_connection_error(FailureKind::StreamClosed)
    }

    /// The trigger failed or the stream errored.
    pub fn on_connection_error(&mut self, kind: FailureKind) -> Vec<GameEvent> {
        self.finish(Outcome::ConnectionFailure(kind))
    }

    // ── Timers ──

    /// Fire the grace deadline if it has passed.
    pub fn tick(&mut self, now: Instant) -> Vec<GameEvent> {
        match self.snapshot.grace_deadline {
            Some(deadline) if now >= deadline => self.finish(Outcome::ScaleLoss),
            _ => vec![],
        }
    }

    // ── Internal ──

    fn finish(&mut self, outcome: Outcome) -> Vec<GameEvent> {
        if self.snapshot.phase != Phase::Playing {
            return vec![];
        }
        let s = &mut self.snapshot;
        s.phase = Phase::Finished;
        s.outcome = Some(outcome);
        s.grace_deadline = None;
        s.link = LinkState::Offline;
        info!(
            session = s.session,
            ?outcome,
            score = s.score,
            replicas = s.replicas,
            "game finished"
        );
        vec![GameEvent::Finished { session: s.session, outcome }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn machine(seed: u64) -> GameStateMachine<StdRng> {
        GameStateMachine::new(SequenceGenerator::new(StdRng::seed_from_u64(seed)))
    }

    fn wrong_for(d: Direction) -> Direction {
        match d {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Press the expected key once, returning the events.
    fn press_correct(m: &mut GameStateMachine<StdRng>) -> Vec<GameEvent> {
        let d = m.snapshot().expected().expect("game should be running");
        m.submit_input(d)
    }

    fn finished_count(events: &[GameEvent]) -> usize {
        events.iter().filter(|e| matches!(e, GameEvent::Finished { .. })).count()
    }

    #[test]
    fn starts_idle() {
        let m = machine(1);
        assert_eq!(m.phase(), Phase::Idle);
        assert_eq!(m.snapshot().outcome, None);
    }

    #[test]
    fn start_initializes_fields() {
        let mut m = machine(1);
        let events = m.start();
        let s = m.snapshot();
        assert_eq!(events, vec![GameEvent::Started { session: 1 }]);
        assert_eq!(s.phase, Phase::Playing);
        assert_eq!(s.score, 0);
        assert_eq!(s.replicas, 1);
        assert_eq!(s.cursor, 0);
        assert_eq!(s.sequence.len(), 5);
        assert_eq!(s.link, LinkState::Triggering);
    }

    #[test]
    fn start_while_playing_is_ignored() {
        let mut m = machine(1);
        m.start();
        press_correct(&mut m);
        assert!(m.start().is_empty());
        assert_eq!(m.snapshot().score, 1);
        assert_eq!(m.snapshot().session, 1);
    }

    #[test]
    fn scenario_a_full_sequence() {
        let mut m = machine(2);
        m.start();
        let seq = m.snapshot().sequence.clone();
        let mut events = vec![];
        for d in seq {
            events.extend(m.submit_input(d));
        }
        let s = m.snapshot();
        assert_eq!(s.score, 5);
        assert_eq!(s.cursor, 0);
        assert_eq!(s.sequence.len(), 6);
        assert_eq!(s.sequences_cleared, 1);
        assert!(events.contains(&GameEvent::SequenceCleared { next_len: 6 }));
    }

    #[test]
    fn scenario_b_wrong_first_key() {
        let mut m = machine(3);
        m.start();
        let expected = m.snapshot().expected().unwrap();
        let events = m.submit_input(wrong_for(expected));
        assert_eq!(events, vec![GameEvent::Miss]);
        assert_eq!(m.snapshot().cursor, 0);
        assert_eq!(m.snapshot().score, 0);
    }

    #[test]
    fn miss_mid_sequence_resets_cursor_only() {
        let mut m = machine(4);
        m.start();
        press_correct(&mut m);
        press_correct(&mut m);
        let before = m.snapshot().sequence.clone();
        let expected = m.snapshot().expected().unwrap();
        m.submit_input(wrong_for(expected));
        let s = m.snapshot();
        assert_eq!(s.cursor, 0);
        assert_eq!(s.score, 2);
        assert_eq!(s.sequence, before);
    }

    #[test]
    fn sequence_length_progression() {
        let mut m = machine(5);
        m.start();
        let mut lengths = vec![m.snapshot().sequence.len()];
        while m.phase() == Phase::Playing {
            press_correct(&mut m);
            let len = m.snapshot().sequence.len();
            if *lengths.last().unwrap() != len {
                lengths.push(len);
            }
        }
        assert_eq!(lengths[0], 5);
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert!(lengths.iter().all(|&l| (5..=15).contains(&l)));
    }

    #[test]
    fn fifty_correct_inputs_win_once() {
        let mut m = machine(6);
        m.start();
        let mut events = vec![];
        for _ in 0..50 {
            events.extend(press_correct(&mut m));
        }
        let s = m.snapshot();
        assert_eq!(s.phase, Phase::Finished);
        assert_eq!(s.outcome, Some(Outcome::Win));
        assert_eq!(s.score, 50);
        assert_eq!(finished_count(&events), 1);
        assert_eq!(s.link, LinkState::Offline);
    }

    #[test]
    fn input_after_finish_is_ignored() {
        let mut m = machine(6);
        m.start();
        for _ in 0..50 {
            press_correct(&mut m);
        }
        assert!(m.submit_input(Direction::Up).is_empty());
        assert_eq!(m.snapshot().score, 50);
    }

    #[test]
    fn input_while_idle_is_ignored() {
        let mut m = machine(7);
        assert!(m.submit_input(Direction::Left).is_empty());
        assert_eq!(m.snapshot().score, 0);
    }

    #[test]
    fn scenario_c_scale_loss_after_grace() {
        let mut m = machine(8);
        m.start();
        let t0 = Instant::now();
        let events = m.on_replica_update(50, t0);
        assert!(events.contains(&GameEvent::GraceArmed));
        assert_eq!(m.snapshot().replicas, 50);

        // Still playing inside the grace window.
        assert!(m.tick(t0 + Duration::from_millis(50)).is_empty());
        assert_eq!(m.phase(), Phase::Playing);

        let events = m.tick(t0 + rules::GRACE_DELAY);
        assert_eq!(finished_count(&events), 1);
        assert_eq!(m.snapshot().outcome, Some(Outcome::ScaleLoss));
        assert_eq!(m.snapshot().grace_deadline, None);
    }

    #[test]
    fn win_inside_grace_window_takes_precedence() {
        let mut m = machine(9);
        m.start();
        for _ in 0..49 {
            press_correct(&mut m);
        }
        let t0 = Instant::now();
        m.on_replica_update(55, t0);
        let events = press_correct(&mut m);
        assert_eq!(finished_count(&events), 1);
        assert_eq!(m.snapshot().outcome, Some(Outcome::Win));

        // The cancelled deadline must not overwrite the win.
        assert!(m.tick(t0 + Duration::from_secs(1)).is_empty());
        assert_eq!(m.snapshot().outcome, Some(Outcome::Win));
    }

    #[test]
    fn grace_deadline_is_armed_once() {
        let mut m = machine(10);
        m.start();
        let t0 = Instant::now();
        m.on_replica_update(50, t0);
        let events = m.on_replica_update(60, t0 + Duration::from_millis(80));
        assert!(!events.contains(&GameEvent::GraceArmed));
        assert_eq!(m.snapshot().grace_deadline, Some(t0 + rules::GRACE_DELAY));
    }

    #[test]
    fn replica_updates_below_limit_keep_playing() {
        let mut m = machine(11);
        m.start();
        let t0 = Instant::now();
        for n in [2, 5, 17, 49] {
            assert_eq!(m.on_replica_update(n, t0), vec![GameEvent::ReplicasChanged { replicas: n }]);
        }
        assert!(m.tick(t0 + Duration::from_secs(10)).is_empty());
        assert_eq!(m.phase(), Phase::Playing);
        assert_eq!(m.snapshot().replicas, 49);
    }

    #[test]
    fn stale_replica_update_after_finish_is_ignored() {
        let mut m = machine(12);
        m.start();
        m.on_connection_lost();
        assert!(m.on_replica_update(70, Instant::now()).is_empty());
        assert_eq!(m.snapshot().replicas, 1);
    }

    #[test]
    fn scenario_d_trigger_failure() {
        let mut m = machine(13);
        m.start();
        let events = m.on_connection_error(FailureKind::Trigger);
        assert_eq!(finished_count(&events), 1);
        assert_eq!(
            m.snapshot().outcome,
            Some(Outcome::ConnectionFailure(FailureKind::Trigger))
        );
    }

    #[test]
    fn connection_lost_after_finish_does_not_reenter() {
        let mut m = machine(14);
        m.start();
        for _ in 0..50 {
            press_correct(&mut m);
        }
        assert!(m.on_connection_lost().is_empty());
        assert!(m.on_connection_error(FailureKind::StreamError).is_empty());
        assert_eq!(m.snapshot().outcome, Some(Outcome::Win));
    }

    #[test]
    fn scenario_e_reset_and_restart() {
        let mut m = machine(15);
        m.start();
        for _ in 0..7 {
            press_correct(&mut m);
        }
        m.on_replica_update(30, Instant::now());
        m.on_connection_lost();
        assert_eq!(m.phase(), Phase::Finished);

        assert_eq!(m.reset(), vec![GameEvent::Reset]);
        assert_eq!(m.phase(), Phase::Idle);
        // Fields untouched until the next start.
        assert_eq!(m.snapshot().score, 7);

        m.start();
        let s = m.snapshot();
        assert_eq!(s.phase, Phase::Playing);
        assert_eq!(s.session, 2);
        assert_eq!(s.score, 0);
        assert_eq!(s.replicas, 1);
        assert_eq!(s.cursor, 0);
        assert_eq!(s.sequence.len(), 5);
        assert_eq!(s.outcome, None);
    }

    #[test]
    fn reset_only_from_finished() {
        let mut m = machine(16);
        assert!(m.reset().is_empty());
        m.start();
        assert!(m.reset().is_empty());
        assert_eq!(m.phase(), Phase::Playing);
    }

    #[test]
    fn start_from_finished_is_implicit_reset() {
        let mut m = machine(17);
        m.start();
        m.on_connection_error(FailureKind::StreamError);
        let events = m.start();
        assert_eq!(events, vec![GameEvent::Started { session: 2 }]);
        assert_eq!(m.snapshot().score, 0);
    }

    #[test]
    fn stream_opened_updates_link() {
        let mut m = machine(18);
        m.on_stream_opened();
        assert_eq!(m.snapshot().link, LinkState::Offline);
        m.start();
        m.on_stream_opened();
        assert_eq!(m.snapshot().link, LinkState::Streaming);
    }

    #[test]
    fn link_state_follows_trigger_then_stream() {
        let mut m = machine(19);
        m.on_trigger_acknowledged();
        assert_eq!(m.snapshot().link, LinkState::Offline);

        m.start();
        assert_eq!(m.snapshot().link, LinkState::Triggering);
        m.on_trigger_acknowledged();
        assert_eq!(m.snapshot().link, LinkState::Subscribing);
        m.on_stream_opened();
        assert_eq!(m.snapshot().link, LinkState::Streaming);
        // A late acknowledgement never steps back.
        m.on_trigger_acknowledged();
        assert_eq!(m.snapshot().link, LinkState::Streaming);

        m.on_connection_lost();
        assert_eq!(m.snapshot().link, LinkState::Offline);
    }
}
