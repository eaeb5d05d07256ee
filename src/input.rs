//! Key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Pause,
    Restart,
    Faster,
    Slower,
    None,
}

/// Map key event to an action. Ctrl-C always quits.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p' | 'P' | ' ') => Action::Pause,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Char('+' | '=') | KeyCode::Up => Action::Faster,
        KeyCode::Char('-' | '_') | KeyCode::Down => Action::Slower,
        _ => Action::None,
    }
}
