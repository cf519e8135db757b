/// Sound engine: short synthesized cues played through rodio.
///
/// Cues are plain sample buffers handed to a detached `Sink`, so playback
/// never blocks the frame loop. Without the "sound" feature the engine is
/// a stub and every cue is silent.

use crate::domain::rules::Outcome;
use crate::sim::event::GameEvent;

/// What the player should hear.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cue {
    Start,
    /// Pitch climbs with the score.
    Hit(u32),
    Miss,
    Clear,
    Win,
    Lose,
}

fn cue_for(event: &GameEvent) -> Option<Cue> {
    match event {
        GameEvent::Started { .. } => Some(Cue::Start),
        GameEvent::Hit { score } => Some(Cue::Hit(*score)),
        GameEvent::Miss => Some(Cue::Miss),
        GameEvent::SequenceCleared { .. } => Some(Cue::Clear),
        GameEvent::Finished { outcome: Outcome::Win, .. } => Some(Cue::Win),
        GameEvent::Finished { .. } => Some(Cue::Lose),
        GameEvent::ReplicasChanged { .. } | GameEvent::GraceArmed | GameEvent::Reset => None,
    }
}

mod synth {
    #![cfg_attr(not(feature = "sound"), allow(dead_code))]

    use std::f32::consts::TAU;

    use super::Cue;
    use crate::domain::rules::WIN_SCORE;

    pub const SAMPLE_RATE: u32 = 22050;

    #[derive(Clone, Copy, Debug)]
    pub enum Wave {
        Sine,
        /// Sine with a third harmonic on top.
        Bright,
        Square,
    }

    #[derive(Clone, Copy, Debug)]
    pub struct Note {
        pub freq: f32,
        pub secs: f32,
        pub wave: Wave,
        pub gain: f32,
    }

    impl Note {
        const fn new(freq: f32, secs: f32, wave: Wave, gain: f32) -> Self {
            Note { freq, secs, wave, gain }
        }

        fn sample(&self, t: f32) -> f32 {
            let phase = TAU * self.freq * t;
            match self.wave {
                Wave::Sine => phase.sin(),
                Wave::Bright => 0.7 * phase.sin() + 0.3 * (3.0 * phase).sin(),
                Wave::Square => phase.sin().signum(),
            }
        }
    }

    pub fn notes(cue: Cue) -> Vec<Note> {
        use self::Wave::*;
        match cue {
            Cue::Start => vec![
                Note::new(392.0, 0.07, Bright, 0.25),
                Note::new(523.0, 0.07, Bright, 0.25),
            ],
            Cue::Hit(score) => {
                let climb = score.min(WIN_SCORE) as f32 / WIN_SCORE as f32;
                vec![Note::new(660.0 + 440.0 * climb, 0.04, Sine, 0.2)]
            }
            Cue::Miss => vec![Note::new(110.0, 0.12, Square, 0.15)],
            Cue::Clear => [1047.0, 1319.0, 1568.0]
                .iter()
                .map(|&f| Note::new(f, 0.045, Bright, 0.25))
                .collect(),
            Cue::Win => {
                let mut run: Vec<Note> = [523.0, 659.0, 784.0]
                    .iter()
                    .map(|&f| Note::new(f, 0.1, Bright, 0.25))
                    .collect();
                run.push(Note::new(1047.0, 0.35, Sine, 0.3));
                run
            }
            Cue::Lose => [440.0, 370.0, 311.0, 261.0]
                .iter()
                .map(|&f| Note::new(f, 0.12, Bright, 0.25))
                .collect(),
        }
    }

    /// Mono samples in [-1, 1], each note fading out over its length.
    pub fn render(notes: &[Note]) -> Vec<f32> {
        let mut out = Vec::new();
        for note in notes {
            let n = (SAMPLE_RATE as f32 * note.secs) as usize;
            out.extend((0..n).map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let fade = 1.0 - i as f32 / n as f32;
                (note.sample(t) * fade * note.gain).clamp(-1.0, 1.0)
            }));
        }
        out
    }
}

#[cfg(feature = "sound")]
mod engine {
    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::synth::{self, SAMPLE_RATE};
    use super::Cue;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
    }

    impl SoundEngine {
        /// `None` when there is no audio device.
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;
            Some(SoundEngine { _stream: stream, handle })
        }

        pub fn play(&self, cue: Cue) {
            let samples = synth::render(&synth::notes(cue));
            if let Ok(sink) = Sink::try_new(&self.handle) {
                sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));
                sink.detach();
            }
        }
    }
}

#[cfg(feature = "sound")]
pub use engine::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _cue: Cue) {}
}

/// Play the cue for each event, if audio is available.
pub fn process_sound_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let Some(sfx) = sound else { return };
    for cue in events.iter().filter_map(cue_for) {
        sfx.play(cue);
    }
}

#[cfg(test)]
mod tests {
    use super::synth::{notes, render, SAMPLE_RATE};
    use super::*;
    use crate::domain::rules::{FailureKind, WIN_SCORE};

    #[test]
    fn events_pick_cues() {
        assert_eq!(cue_for(&GameEvent::Hit { score: 7 }), Some(Cue::Hit(7)));
        assert_eq!(cue_for(&GameEvent::Miss), Some(Cue::Miss));
        assert_eq!(
            cue_for(&GameEvent::Finished { session: 1, outcome: Outcome::Win }),
            Some(Cue::Win)
        );
        assert_eq!(
            cue_for(&GameEvent::Finished {
                session: 1,
                outcome: Outcome::ConnectionFailure(FailureKind::Trigger),
            }),
            Some(Cue::Lose)
        );
        assert_eq!(cue_for(&GameEvent::ReplicasChanged { replicas: 3 }), None);
    }

    #[test]
    fn hit_pitch_climbs_with_score() {
        let low = notes(Cue::Hit(1))[0].freq;
        let high = notes(Cue::Hit(40))[0].freq;
        assert!(low < high);
        // Capped at the winning score.
        assert_eq!(notes(Cue::Hit(WIN_SCORE))[0].freq, notes(Cue::Hit(500))[0].freq);
    }

    #[test]
    fn rendered_cues_are_bounded() {
        for cue in [Cue::Start, Cue::Hit(3), Cue::Miss, Cue::Clear, Cue::Win, Cue::Lose] {
            let samples = render(&notes(cue));
            assert!(!samples.is_empty(), "{cue:?} is silent");
            assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
        let miss = render(&notes(Cue::Miss));
        assert_eq!(miss.len(), (SAMPLE_RATE as f32 * 0.12) as usize);
    }
}
