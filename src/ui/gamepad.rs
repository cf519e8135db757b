/// Gamepad input via gilrs, fed to the router as key codes.
///
///   D-pad, left stick  →  arrow keys
///   confirm buttons    →  Enter   (default: Start, A)
///   cancel buttons     →  Esc     (default: Select)
///
/// Button names come from `[gamepad]` in config.toml.

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};
#[cfg(feature = "gamepad")]
use tracing::info;

use crossterm::event::KeyCode;

use crate::config::GamepadConfig;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.5;

/// Buttons that can carry the confirm or cancel action.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum PadButton {
    South,
    East,
    Start,
    Select,
}

impl PadButton {
    /// Accepts both position names and the usual labels (`A`, `B`, `Back`).
    fn parse(name: &str) -> Option<PadButton> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a" | "south" => Some(PadButton::South),
            "b" | "east" => Some(PadButton::East),
            "start" => Some(PadButton::Start),
            "select" | "back" => Some(PadButton::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn of(button: Button) -> Option<PadButton> {
        match button {
            Button::South => Some(PadButton::South),
            Button::East => Some(PadButton::East),
            Button::Start => Some(PadButton::Start),
            Button::Select => Some(PadButton::Select),
            _ => None,
        }
    }
}

/// Which key each mapped button stands for. Confirm wins if a button
/// is listed under both actions.
#[derive(Debug)]
struct ButtonKeys(Vec<(PadButton, KeyCode)>);

impl ButtonKeys {
    fn from_config(cfg: &GamepadConfig) -> Self {
        let parse = |names: &[String]| -> Vec<PadButton> {
            names.iter().filter_map(|n| PadButton::parse(n)).collect()
        };
        let mut confirm = parse(&cfg.confirm);
        if confirm.is_empty() {
            confirm = vec![PadButton::Start, PadButton::South];
        }
        let mut cancel = parse(&cfg.cancel);
        if cancel.is_empty() {
            cancel = vec![PadButton::Select];
        }

        let table = confirm
            .into_iter()
            .map(|b| (b, KeyCode::Enter))
            .chain(cancel.into_iter().map(|b| (b, KeyCode::Esc)))
            .collect();
        ButtonKeys(table)
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn key_for(&self, button: PadButton) -> Option<KeyCode> {
        self.0.iter().find(|(b, _)| *b == button).map(|&(_, key)| key)
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    /// Key codes produced since the last `update()`, oldest first.
    pending: Vec<KeyCode>,

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    buttons: ButtonKeys,

    /// Last stick position and the direction it was counted as.
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    stick: (f32, f32),
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    stick_dir: Option<KeyCode>,
}

impl GamepadState {
    pub fn new(cfg: &GamepadConfig) -> Self {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: Gilrs::new().ok(),
            pending: Vec::with_capacity(4),
            buttons: ButtonKeys::from_config(cfg),
            stick: (0.0, 0.0),
            stick_dir: None,
        }
    }

    /// Poll the pad. Call once per frame, then read `pressed_codes()`.
    pub fn update(&mut self) {
        self.pending.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    pub fn pressed_codes(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.pending.iter().copied()
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(button, _) => self.press(button),
                EventType::AxisChanged(Axis::LeftStickX, value, _) => {
                    self.stick.0 = value;
                    self.stick_moved();
                }
                EventType::AxisChanged(Axis::LeftStickY, value, _) => {
                    self.stick.1 = value;
                    self.stick_moved();
                }
                EventType::Connected => info!(id = ?event.id, "gamepad connected"),
                EventType::Disconnected => {
                    info!(id = ?event.id, "gamepad disconnected");
                    self.stick = (0.0, 0.0);
                    self.stick_dir = None;
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn press(&mut self, button: Button) {
        let key = match button {
            Button::DPadUp => Some(KeyCode::Up),
            Button::DPadDown => Some(KeyCode::Down),
            Button::DPadLeft => Some(KeyCode::Left),
            Button::DPadRight => Some(KeyCode::Right),
            other => PadButton::of(other).and_then(|b| self.buttons.key_for(b)),
        };
        self.pending.extend(key);
    }

    /// One press each time the stick leaves center toward a new direction.
    #[cfg(feature = "gamepad")]
    fn stick_moved(&mut self) {
        let dir = stick_direction(self.stick.0, self.stick.1);
        if dir != self.stick_dir {
            self.pending.extend(dir);
            self.stick_dir = dir;
        }
    }
}

/// Dominant stick axis past the deadzone. Stick Y is up-positive.
#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
fn stick_direction(x: f32, y: f32) -> Option<KeyCode> {
    if x.abs() < STICK_DEADZONE && y.abs() < STICK_DEADZONE {
        return None;
    }
    if x.abs() >= y.abs() {
        Some(if x < 0.0 { KeyCode::Left } else { KeyCode::Right })
    } else {
        Some(if y > 0.0 { KeyCode::Up } else { KeyCode::Down })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_config(confirm: &[&str], cancel: &[&str]) -> GamepadConfig {
        GamepadConfig {
            confirm: confirm.iter().map(|s| s.to_string()).collect(),
            cancel: cancel.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn button_names_accept_labels_and_positions() {
        assert_eq!(PadButton::parse("start"), Some(PadButton::Start));
        assert_eq!(PadButton::parse(" South "), Some(PadButton::South));
        assert_eq!(PadButton::parse("B"), Some(PadButton::East));
        assert_eq!(PadButton::parse("back"), Some(PadButton::Select));
        assert_eq!(PadButton::parse("turbo"), None);
    }

    #[test]
    fn default_mapping() {
        let keys = ButtonKeys::from_config(&pad_config(&["Start", "A"], &["Select"]));
        assert_eq!(keys.key_for(PadButton::Start), Some(KeyCode::Enter));
        assert_eq!(keys.key_for(PadButton::South), Some(KeyCode::Enter));
        assert_eq!(keys.key_for(PadButton::Select), Some(KeyCode::Esc));
        assert_eq!(keys.key_for(PadButton::East), None);
    }

    #[test]
    fn config_overrides_mapping() {
        let keys = ButtonKeys::from_config(&pad_config(&["B", "bogus"], &["nothing"]));
        assert_eq!(keys.key_for(PadButton::East), Some(KeyCode::Enter));
        assert_eq!(keys.key_for(PadButton::Start), None);
        // Every cancel name unknown: the default stays.
        assert_eq!(keys.key_for(PadButton::Select), Some(KeyCode::Esc));
    }

    #[test]
    fn confirm_wins_when_listed_twice() {
        let keys = ButtonKeys::from_config(&pad_config(&["Start"], &["Start"]));
        assert_eq!(keys.key_for(PadButton::Start), Some(KeyCode::Enter));
    }

    #[test]
    fn stick_picks_dominant_axis() {
        assert_eq!(stick_direction(0.1, -0.2), None);
        assert_eq!(stick_direction(-0.9, 0.3), Some(KeyCode::Left));
        assert_eq!(stick_direction(0.2, 0.8), Some(KeyCode::Up));
        assert_eq!(stick_direction(0.0, -0.7), Some(KeyCode::Down));
    }
}
