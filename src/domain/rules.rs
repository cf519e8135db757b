/// Game rules: thresholds, difficulty progression, and outcomes.
///
/// Pure functions and constants only, no state.

use std::time::Duration;

/// Points needed to win.
pub const WIN_SCORE: u32 = 50;

/// Replica count at which the autoscaler wins.
pub const SCALE_LIMIT: u32 = 50;

/// Replica count assumed at the start of every game.
pub const INITIAL_REPLICAS: u32 = 1;

pub const INITIAL_SEQUENCE_LEN: usize = 5;
pub const MAX_SEQUENCE_LEN: usize = 15;

/// Wait between seeing the scale limit and honoring it, so a winning
/// key press landing in the same instant still counts.
pub const GRACE_DELAY: Duration = Duration::from_millis(100);

/// Length of the sequence that follows a completed one.
pub fn next_sequence_len(current: usize) -> usize {
    (current + 1).min(MAX_SEQUENCE_LEN)
}

pub fn is_winning_score(score: u32) -> bool {
    score >= WIN_SCORE
}

pub fn is_scale_limit(replicas: u32) -> bool {
    replicas >= SCALE_LIMIT
}

/// Which transport failure ended a session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FailureKind {
    /// The scale-up trigger could not be issued or was rejected.
    Trigger,
    /// The update stream was closed while the game was running.
    StreamClosed,
    /// The update stream reported a transport error.
    StreamError,
}

/// How a game ended. Exactly one per finished session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Win,
    ScaleLoss,
    ConnectionFailure(FailureKind),
}

impl Outcome {
    pub fn headline(self) -> &'static str {
        match self {
            Outcome::Win => "YOU WIN! You reached 50 points first.",
            Outcome::ScaleLoss => "GAME OVER! The autoscaler reached 50 replicas.",
            Outcome::ConnectionFailure(FailureKind::Trigger) => {
                "GAME OVER! Failed to connect to the backend."
            }
            Outcome::ConnectionFailure(FailureKind::StreamClosed) => {
                "GAME OVER! Connection to the backend was lost."
            }
            Outcome::ConnectionFailure(FailureKind::StreamError) => {
                "GAME OVER! Connection error while watching replicas."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_len_grows_by_one_and_caps() {
        assert_eq!(next_sequence_len(5), 6);
        assert_eq!(next_sequence_len(14), 15);
        assert_eq!(next_sequence_len(15), 15);
    }

    #[test]
    fn length_progression_stays_in_bounds() {
        let mut len = INITIAL_SEQUENCE_LEN;
        for _ in 0..100 {
            let next = next_sequence_len(len);
            assert!(next >= len);
            assert!(next <= MAX_SEQUENCE_LEN);
            len = next;
        }
        assert_eq!(len, MAX_SEQUENCE_LEN);
    }

    #[test]
    fn thresholds() {
        assert!(!is_winning_score(49));
        assert!(is_winning_score(50));
        assert!(!is_scale_limit(49));
        assert!(is_scale_limit(50));
        assert!(is_scale_limit(51));
    }

    #[test]
    fn connection_failures_are_distinguishable() {
        let a = Outcome::ConnectionFailure(FailureKind::Trigger).headline();
        let b = Outcome::ConnectionFailure(FailureKind::StreamClosed).headline();
        assert_ne!(a, b);
        assert!(a.contains("Failed to connect"));
    }
}
