/// Input router: raw key codes → game commands, gated by phase.
///
///   Idle      confirm → Start
///   Playing   arrows / WASD → Input(direction)
///   Finished  confirm → Reset ("play again")
///   any       Esc → Quit
///
/// Everything else is ignored. One key, at most one command.

use crossterm::event::KeyCode;

use crate::domain::direction::Direction;
use crate::sim::world::Phase;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    Start,
    Input(Direction),
    Reset,
    Quit,
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc];

pub fn direction_for(code: KeyCode) -> Option<Direction> {
    if KEYS_UP.contains(&code) {
        Some(Direction::Up)
    } else if KEYS_DOWN.contains(&code) {
        Some(Direction::Down)
    } else if KEYS_LEFT.contains(&code) {
        Some(Direction::Left)
    } else if KEYS_RIGHT.contains(&code) {
        Some(Direction::Right)
    } else {
        None
    }
}

pub fn route(code: KeyCode, phase: Phase) -> Option<Command> {
    if KEYS_QUIT.contains(&code) {
        return Some(Command::Quit);
    }
    let confirm = KEYS_CONFIRM.contains(&code);
    match phase {
        Phase::Idle if confirm => Some(Command::Start),
        Phase::Playing => direction_for(code).map(Command::Input),
        Phase::Finished if confirm => Some(Command::Reset),
        _ => None,
    }
}
