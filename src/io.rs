use crate::consts::*;
use anyhow::{Result, anyhow};
use colored::{ColoredString, Colorize};
use evdev::{KeyCode, RelativeAxisCode};
use log::{debug, trace};
use parking_lot::Mutex;
use uinput::device::Device as UInputDevice;
use uinput::event::controller::{Controller, Mouse};
use uinput::event::relative::{Position, Relative};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Down,
    Up,
}

impl Transition {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            PRESS | REPEAT => Some(Transition::Down),
            RELEASE => Some(Transition::Up),
            _ => None,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            Transition::Down => PRESS,
            Transition::Up => RELEASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyEvent {
    pub key: KeyCode,
    pub transition: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Suppress,
    Forward(KeyCode),
}

pub(crate) type Subscriber = Box<dyn FnMut(KeyEvent) -> Disposition + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubscriptionHandle(pub u64);

/// System-wide keyboard stream with the ability to inject keys.
pub(crate) trait RawInputSource: Send + Sync {
    fn subscribe(&self, subscriber: Subscriber) -> Result<SubscriptionHandle>;

    fn unsubscribe(&self, handle: SubscriptionHandle);

    fn synthesize(&self, key: KeyCode, transition: Transition) -> Result<()>;
}

pub(crate) trait CursorActuator: Send + Sync {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<()>;

    fn click_left(&self) -> Result<()>;

    fn click_right(&self) -> Result<()>;
}

pub(crate) struct VirtualKeyboard {
    device: Option<Mutex<UInputDevice>>,
}

impl VirtualKeyboard {
    pub fn create(no_emit: bool) -> Result<Self> {
        if no_emit {
            return Ok(Self { device: None });
        }

        let device = uinput::default()
            .map_err(|e| anyhow!("Failed to open /dev/uinput (sudo modprobe uinput): {e}"))?
            .name("PedalKeys Keyboard")?
            .event(uinput::event::Keyboard::All)?
            .create()?;

        Ok(Self {
            device: Some(Mutex::new(device)),
        })
    }

    pub fn write_key(&self, key: KeyCode, state: i32, origin: &str) -> Result<()> {
        if let Some(device) = &self.device {
            let mut device = device.lock();
            device.write(EV_KEY, i32::from(key.0), state)?;
            device.synchronize()?;
        }

        log_key(key, state, origin);
        Ok(())
    }
}

pub(crate) struct VirtualMouse {
    device: Option<Mutex<UInputDevice>>,
}

impl VirtualMouse {
    pub fn create(no_emit: bool) -> Result<Self> {
        if no_emit {
            return Ok(Self { device: None });
        }

        let device = uinput::default()
            .map_err(|e| anyhow!("Failed to open /dev/uinput (sudo modprobe uinput): {e}"))?
            .name("PedalKeys Mouse")?
            .event(Controller::Mouse(Mouse::Left))?
            .event(Controller::Mouse(Mouse::Right))?
            .event(Relative::Position(Position::X))?
            .event(Relative::Position(Position::Y))?
            .create()?;

        Ok(Self {
            device: Some(Mutex::new(device)),
        })
    }

    fn click(&self, button: KeyCode) -> Result<()> {
        if let Some(device) = &self.device {
            let mut device = device.lock();
            device.write(EV_KEY, i32::from(button.0), PRESS)?;
            device.synchronize()?;
            device.write(EV_KEY, i32::from(button.0), RELEASE)?;
            device.synchronize()?;
        }

        debug!("{} {}: {:?}", "⇣".green().bold(), "CLICK".yellow(), button);
        Ok(())
    }
}

impl CursorActuator for VirtualMouse {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<()> {
        if let Some(device) = &self.device {
            let mut device = device.lock();
            if dx != 0 {
                device.write(EV_REL, i32::from(RelativeAxisCode::REL_X.0), dx)?;
            }
            if dy != 0 {
                device.write(EV_REL, i32::from(RelativeAxisCode::REL_Y.0), dy)?;
            }
            device.synchronize()?;
        }

        trace!("{}: {dx:+} {dy:+}", "MOVE".yellow());
        Ok(())
    }

    fn click_left(&self) -> Result<()> {
        self.click(KeyCode::BTN_LEFT)
    }

    fn click_right(&self) -> Result<()> {
        self.click(KeyCode::BTN_RIGHT)
    }
}

fn log_key(key: KeyCode, state: i32, origin: &str) {
    debug!(
        "{}[{}] {:?} [{}]",
        if is_modifier(&key) { "    " } else { "" },
        state_arrow(state),
        key,
        origin.purple(),
    );
}

fn state_arrow(state: i32) -> ColoredString {
    match state {
        PRESS => "↓".green().bold(),
        REPEAT => "↻".green(),
        _ => "↑".red().bold(),
    }
}

fn is_modifier(key: &KeyCode) -> bool {
    matches!(
        *key,
        KeyCode::KEY_LEFTSHIFT
            | KeyCode::KEY_RIGHTSHIFT
            | KeyCode::KEY_LEFTCTRL
            | KeyCode::KEY_RIGHTCTRL
            | KeyCode::KEY_LEFTALT
            | KeyCode::KEY_RIGHTALT
            | KeyCode::KEY_LEFTMETA
            | KeyCode::KEY_RIGHTMETA
    )
}
