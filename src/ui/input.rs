/// Keyboard input drain.
///
/// Every frame the pending terminal events are drained in arrival order.
/// Only key presses matter: each one is a discrete game input, so repeated
/// presses of the same key must all come through (no held-key collapsing).
/// Release events are dropped; terminals that report them would otherwise
/// double every input.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

pub struct InputState {
    /// Presses collected during the most recent `drain_events()`, oldest first.
    presses: Vec<KeyEvent>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            presses: Vec::with_capacity(8),
        }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame.
    pub fn drain_events(&mut self) {
        self.presses.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Press {
                    self.presses.push(key);
                }
            }
        }
    }

    /// Key codes pressed this frame, in order.
    pub fn pressed_codes(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.presses.iter().map(|k| k.code)
    }

    /// Check if any press this frame is Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.presses.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}
