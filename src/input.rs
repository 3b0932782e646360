use std::collections::HashSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Up,
    Right,
    Down,
    Pause,
    Confirm,
    Credits,
    Other,
}

impl Key {
    pub fn from_event(ev: &KeyEvent) -> Key {
        match ev.code {
            KeyCode::Left | KeyCode::Char('a') => Key::Left,
            KeyCode::Up | KeyCode::Char('w') => Key::Up,
            KeyCode::Right | KeyCode::Char('d') => Key::Right,
            KeyCode::Down | KeyCode::Char('s') => Key::Down,
            KeyCode::Char(' ') | KeyCode::Esc => Key::Pause,
            KeyCode::Enter => Key::Confirm,
            KeyCode::Char('c') => Key::Credits,
            _ => Key::Other,
        }
    }
}

/// Keys held during the current frame. The terminal only reports presses,
/// so the owning screen releases everything at the end of each frame.
#[derive(Clone, Debug, Default)]
pub struct PressedKeys {
    keys: HashSet<Key>,
}

impl PressedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    pub fn release_all(&mut self) -> Vec<Key> {
        self.keys.drain().collect()
    }
}

impl std::iter::FromIterator<Key> for PressedKeys {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        PressedKeys { keys: iter.into_iter().collect() }
    }
}

pub fn is_ctrl_c(ev: &KeyEvent) -> bool {
    matches!(ev, KeyEvent { code: KeyCode::Char('c'), modifiers: KeyModifiers::CONTROL })
}
