use crate::consts::*;
use crate::io::{
    Disposition, KeyEvent, RawInputSource, Subscriber, SubscriptionHandle, Transition,
    VirtualKeyboard,
};
use anyhow::{Result, bail};
use crossbeam_channel::{Receiver, unbounded};
use evdev::Device as EvDevDevice;
use evdev::{EventType, InputEvent, KeyCode};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use udev::Enumerator;

pub(crate) fn open_keyboard_devices(names: &[String]) -> Result<Vec<EvDevDevice>> {
    debug!("Detecting keyboards");

    let keyboards = scan_keyboards(|name| names.iter().any(|wanted| wanted == name))?;
    if keyboards.is_empty() {
        bail!("No keyboards found");
    }

    keyboards.into_iter().map(grab).collect()
}

pub(crate) fn open_named_device(name: &str) -> Result<EvDevDevice> {
    match scan_keyboards(|candidate| candidate == name)?.into_iter().next() {
        Some(device) => grab(device),
        None => bail!("Device not found: {name}"),
    }
}

fn scan_keyboards(mut wanted: impl FnMut(&str) -> bool) -> Result<Vec<EvDevDevice>> {
    let mut enumerator = Enumerator::new()?;
    enumerator.match_subsystem("input")?;
    enumerator.match_property("ID_INPUT_KEYBOARD", "1")?;

    let mut devices = Vec::new();

    for device in enumerator.scan_devices()? {
        if let Some(devnode) = device.devnode()
            && let Ok(keyboard) = EvDevDevice::open(devnode)
        {
            if keyboard.name().is_some_and(&mut wanted) {
                devices.push(keyboard);
            } else {
                debug!("Device ignored: {:?}", keyboard.name());
            }
        }
    }

    Ok(devices)
}

fn grab(mut device: EvDevDevice) -> Result<EvDevDevice> {
    // Wait for all keys to be unpressed before grabbing the input device, otherwise
    // those keys get into a weird state
    let mut first = true;
    loop {
        let key_states = device.get_key_state()?;
        if key_states.iter().len() == 0 {
            break;
        }
        if first {
            first = false;
            warn!("Waiting for keys to be released");
        }
        thread::sleep(Duration::from_millis(20));
    }

    device.grab()?;
    info!("Device monitored: {}", device.name().unwrap_or("unnamed"));

    Ok(device)
}

struct Shared {
    subscriber: Mutex<Option<(SubscriptionHandle, Subscriber)>>,
    virt: VirtualKeyboard,
    /// Physical key → key currently held on the virtual keyboard on its behalf
    held: Mutex<HashMap<KeyCode, KeyCode>>,
    next_id: AtomicU64,
}

pub(crate) struct LinuxInputSource {
    shared: Arc<Shared>,
}

impl LinuxInputSource {
    pub fn spawn(keyboards: Vec<EvDevDevice>, virt: VirtualKeyboard) -> Self {
        let (tx, rx) = unbounded::<InputEvent>();

        for mut device in keyboards {
            let tx = tx.clone();
            let name = device.name().unwrap_or("unnamed").to_owned();
            thread::spawn(move || {
                loop {
                    match device.fetch_events() {
                        Err(e) => {
                            warn!("Keyboard {name} stopped: {e}");
                            break;
                        }
                        Ok(events) => {
                            for event in events {
                                if tx.send(event).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            });
        }

        let shared = Arc::new(Shared {
            subscriber: Mutex::new(None),
            virt,
            held: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });

        let dispatcher = Arc::clone(&shared);
        thread::spawn(move || dispatch_loop(&dispatcher, &rx));

        Self { shared }
    }
}

fn dispatch_loop(shared: &Shared, rx: &Receiver<InputEvent>) {
    for event in rx.iter() {
        if event.event_type() != EventType::KEY {
            continue;
        }

        let key = KeyCode(event.code());
        let state = event.value();
        if let Err(e) = shared.dispatch(key, state) {
            error!("Failed to dispatch {key:?}: {e:#}");
        }
    }
}

impl Shared {
    fn dispatch(&self, key: KeyCode, state: i32) -> Result<()> {
        let Some(transition) = Transition::from_value(state) else {
            return Ok(());
        };

        let disposition = {
            let mut slot = self.subscriber.lock();
            match slot.as_mut() {
                Some((_, subscriber)) => subscriber(KeyEvent { key, transition }),
                None => Disposition::Forward(key),
            }
        };

        self.apply(key, state, disposition)
    }

    fn apply(&self, key: KeyCode, state: i32, disposition: Disposition) -> Result<()> {
        let mut held = self.held.lock();

        // A key pressed under one disposition may be released under another,
        // so releases always clear whatever the press left on the virtual keyboard.
        match (disposition, state) {
            (Disposition::Forward(code), RELEASE) => {
                if let Some(previous) = held.remove(&key)
                    && previous != code
                {
                    self.virt.write_key(previous, RELEASE, "release")?;
                }
                self.virt.write_key(code, RELEASE, origin(key, code))
            }
            (Disposition::Forward(code), _) => {
                if let Some(previous) = held.insert(key, code)
                    && previous != code
                {
                    self.virt.write_key(previous, RELEASE, "release")?;
                }
                self.virt.write_key(code, state, origin(key, code))
            }
            (Disposition::Suppress, RELEASE) => match held.remove(&key) {
                Some(previous) => self.virt.write_key(previous, RELEASE, "release"),
                None => Ok(()),
            },
            (Disposition::Suppress, _) => Ok(()),
        }
    }

    /// Lifts keys that were remapped while subscribed; their physical release
    /// would otherwise pass through under the physical code.
    fn release_remapped(&self) {
        let mut held = self.held.lock();
        held.retain(|physical, emitted| {
            if *physical == *emitted {
                return true;
            }
            if let Err(e) = self.virt.write_key(*emitted, RELEASE, "release") {
                error!("Failed to release {emitted:?}: {e:#}");
            }
            false
        });
    }
}

fn origin(physical: KeyCode, emitted: KeyCode) -> &'static str {
    if physical == emitted { "raw" } else { "remap" }
}

impl RawInputSource for LinuxInputSource {
    fn subscribe(&self, subscriber: Subscriber) -> Result<SubscriptionHandle> {
        let mut slot = self.shared.subscriber.lock();
        if slot.is_some() {
            bail!("Keyboard stream already has a subscriber");
        }

        let handle = SubscriptionHandle(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        *slot = Some((handle, subscriber));
        debug!("Subscribed {handle:?}");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let removed = {
            let mut slot = self.shared.subscriber.lock();
            if slot.as_ref().is_some_and(|(current, _)| *current == handle) {
                slot.take()
            } else {
                None
            }
        };

        if removed.is_some() {
            debug!("Unsubscribed {handle:?}");
            self.shared.release_remapped();
        } else {
            warn!("Unsubscribe for unknown {handle:?}");
        }
    }

    fn synthesize(&self, key: KeyCode, transition: Transition) -> Result<()> {
        self.shared.virt.write_key(key, transition.value(), "synth")
    }
}
