use crate::consts::*;
use crossbeam_channel::{Receiver, unbounded};
use evdev::Device as EvDevDevice;
use evdev::{EventType, KeyCode};
use log::warn;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PedalSignal {
    Down,
    Up,
}

/// Streams pedal transitions from its evdev device.
pub(crate) fn watch_pedal(mut device: EvDevDevice, key: KeyCode) -> Receiver<PedalSignal> {
    let (tx, rx) = unbounded();

    thread::spawn(move || {
        loop {
            match device.fetch_events() {
                Err(e) => {
                    warn!("Pedal stopped: {e}");
                    break;
                }
                Ok(events) => {
                    for event in events {
                        let Some(signal) =
                            classify(event.event_type(), event.code(), event.value(), key)
                        else {
                            continue;
                        };
                        if tx.send(signal).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    rx
}

fn classify(event_type: EventType, code: u16, value: i32, key: KeyCode) -> Option<PedalSignal> {
    if event_type != EventType::KEY || code != key.0 {
        return None;
    }

    match value {
        PRESS => Some(PedalSignal::Down),
        RELEASE => Some(PedalSignal::Up),
        _ => None,
    }
}
