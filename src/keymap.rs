use evdev::KeyCode;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MouseControl {
    Move(Direction),
    Click(MouseButton),
}

#[derive(Debug, Clone)]
pub(crate) struct KeyMap {
    pub except: HashSet<KeyCode>,
    pub control_mouse: HashMap<KeyCode, MouseControl>,
    pub move_with_select: HashSet<KeyCode>,
    pub remapped: HashSet<KeyCode>,
    pub remap: HashMap<KeyCode, KeyCode>,
    pub select_modifier: KeyCode,
    pub tap_key: KeyCode,
}

impl KeyMap {
    pub fn is_configured(&self, key: &KeyCode) -> bool {
        self.except.contains(key) || self.remapped.contains(key)
    }

    pub fn resolve(&self, key: &KeyCode) -> KeyCode {
        self.remap.get(key).copied().unwrap_or(*key)
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let remap = HashMap::from([
            (KeyCode::KEY_A, KeyCode::KEY_LEFT),
            (KeyCode::KEY_Q, KeyCode::KEY_LEFT),
            (KeyCode::KEY_S, KeyCode::KEY_UP),
            (KeyCode::KEY_W, KeyCode::KEY_UP),
            (KeyCode::KEY_D, KeyCode::KEY_DOWN),
            (KeyCode::KEY_E, KeyCode::KEY_DOWN),
            (KeyCode::KEY_F, KeyCode::KEY_RIGHT),
            (KeyCode::KEY_R, KeyCode::KEY_RIGHT),
            (KeyCode::KEY_G, KeyCode::KEY_HOME),
            (KeyCode::KEY_H, KeyCode::KEY_END),
            (KeyCode::KEY_T, KeyCode::KEY_PAGEUP),
            (KeyCode::KEY_Y, KeyCode::KEY_PAGEDOWN),
            (KeyCode::KEY_SPACE, KeyCode::KEY_LEFTCTRL),
        ]);

        Self {
            except: HashSet::from([
                KeyCode::KEY_TAB,
                KeyCode::KEY_LEFTALT,
                KeyCode::KEY_RIGHTALT,
                KeyCode::KEY_LEFTSHIFT,
                KeyCode::KEY_RIGHTSHIFT,
            ]),
            control_mouse: HashMap::from([
                (KeyCode::KEY_J, MouseControl::Move(Direction::Left)),
                (KeyCode::KEY_K, MouseControl::Move(Direction::Up)),
                (KeyCode::KEY_L, MouseControl::Move(Direction::Down)),
                (KeyCode::KEY_SEMICOLON, MouseControl::Move(Direction::Right)),
                (KeyCode::KEY_U, MouseControl::Click(MouseButton::Left)),
                (KeyCode::KEY_I, MouseControl::Click(MouseButton::Right)),
            ]),
            move_with_select: HashSet::from([
                KeyCode::KEY_Q,
                KeyCode::KEY_W,
                KeyCode::KEY_E,
                KeyCode::KEY_R,
            ]),
            remapped: remap.keys().copied().collect(),
            remap,
            select_modifier: KeyCode::KEY_LEFTSHIFT,
            tap_key: KeyCode::KEY_LEFTALT,
        }
    }
}
