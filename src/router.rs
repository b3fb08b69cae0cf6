use crate::io::{CursorActuator, Disposition, KeyEvent, RawInputSource, Transition};
use crate::keymap::{KeyMap, MouseButton, MouseControl};
use crate::state::{DirectionFlags, Latch, ModifierState};
use colored::Colorize;
use evdev::KeyCode;
use log::{debug, error};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Decides the fate of every key event while the pedal is down.
pub(crate) struct KeyEventRouter {
    keymap: Arc<KeyMap>,
    source: Arc<dyn RawInputSource>,
    actuator: Arc<dyn CursorActuator>,
    directions: Arc<DirectionFlags>,
    activity: Arc<AtomicBool>,
    select_modifier: ModifierState,
    left_click: Latch,
    right_click: Latch,
}

impl KeyEventRouter {
    pub fn new(
        keymap: Arc<KeyMap>,
        source: Arc<dyn RawInputSource>,
        actuator: Arc<dyn CursorActuator>,
        directions: Arc<DirectionFlags>,
        activity: Arc<AtomicBool>,
    ) -> Self {
        Self {
            keymap,
            source,
            actuator,
            directions,
            activity,
            select_modifier: ModifierState::default(),
            left_click: Latch::default(),
            right_click: Latch::default(),
        }
    }

    pub fn route(&self, event: KeyEvent) -> Disposition {
        self.activity.store(true, Ordering::Release);

        if let Some(control) = self.keymap.control_mouse.get(&event.key) {
            self.control_mouse(*control, event.transition);
            return Disposition::Suppress;
        }

        if !self.keymap.is_configured(&event.key) {
            debug!("{}: {:?}", "SUPPRESS".red(), event.key);
            return Disposition::Suppress;
        }

        if self.keymap.move_with_select.contains(&event.key) {
            self.hold_select_modifier();
        } else if self.keymap.except.contains(&event.key) {
            self.release_select_modifier();
        }

        Disposition::Forward(self.keymap.resolve(&event.key))
    }

    fn control_mouse(&self, control: MouseControl, transition: Transition) {
        match control {
            MouseControl::Move(direction) => {
                self.directions.set(direction, transition == Transition::Down);
            }
            MouseControl::Click(button) => {
                let latch = self.latch(button);
                match transition {
                    Transition::Down => {
                        if latch.fire() {
                            self.click(button);
                        }
                    }
                    Transition::Up => latch.reset(),
                }
            }
        }
    }

    fn click(&self, button: MouseButton) {
        let result = match button {
            MouseButton::Left => self.actuator.click_left(),
            MouseButton::Right => self.actuator.click_right(),
        };

        if let Err(e) = result {
            error!("Failed to click {button:?}: {e:#}");
        }
    }

    fn latch(&self, button: MouseButton) -> &Latch {
        match button {
            MouseButton::Left => &self.left_click,
            MouseButton::Right => &self.right_click,
        }
    }

    pub fn hold_select_modifier(&self) {
        if self.select_modifier.hold()
            && !self.synthesize(self.keymap.select_modifier, Transition::Down)
        {
            self.select_modifier.release();
        }
    }

    pub fn release_select_modifier(&self) {
        if self.select_modifier.release() {
            self.synthesize(self.keymap.select_modifier, Transition::Up);
        }
    }

    fn synthesize(&self, key: KeyCode, transition: Transition) -> bool {
        match self.source.synthesize(key, transition) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to synthesize {key:?} {transition:?}: {e:#}");
                false
            }
        }
    }

    pub fn reset(&self) {
        self.release_select_modifier();
        self.left_click.reset();
        self.right_click.reset();
        self.directions.clear();
    }

    #[cfg(test)]
    pub fn is_select_modifier_held(&self) -> bool {
        self.select_modifier.is_held()
    }

    #[cfg(test)]
    pub fn is_click_latched(&self, button: MouseButton) -> bool {
        self.latch(button).is_set()
    }
}
