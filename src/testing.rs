//! In-memory stand-ins for the input source and the cursor.

use crate::io::{
    CursorActuator, Disposition, KeyEvent, RawInputSource, Subscriber, SubscriptionHandle,
    Transition,
};
use crate::keymap::MouseButton;
use anyhow::{Result, bail};
use evdev::KeyCode;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

pub(crate) fn down(key: KeyCode) -> KeyEvent {
    KeyEvent {
        key,
        transition: Transition::Down,
    }
}

pub(crate) fn up(key: KeyCode) -> KeyEvent {
    KeyEvent {
        key,
        transition: Transition::Up,
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    subscriber: Mutex<Option<(SubscriptionHandle, Subscriber)>>,
    synthesized: Mutex<Vec<(KeyCode, Transition)>>,
    subscriptions: AtomicU64,
    fail_subscribe: AtomicBool,
    fail_synthesis: AtomicBool,
}

impl FakeSource {
    pub fn feed(&self, event: KeyEvent) -> Option<Disposition> {
        let mut slot = self.subscriber.lock();
        slot.as_mut().map(|(_, subscriber)| subscriber(event))
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.lock().is_some()
    }

    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Acquire)
    }

    pub fn synthesized(&self) -> Vec<(KeyCode, Transition)> {
        self.synthesized.lock().clone()
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Release);
    }

    pub fn fail_synthesis(&self, fail: bool) {
        self.fail_synthesis.store(fail, Ordering::Release);
    }
}

impl RawInputSource for FakeSource {
    fn subscribe(&self, subscriber: Subscriber) -> Result<SubscriptionHandle> {
        if self.fail_subscribe.load(Ordering::Acquire) {
            bail!("input source unavailable");
        }

        let handle = SubscriptionHandle(self.subscriptions.fetch_add(1, Ordering::AcqRel) + 1);
        *self.subscriber.lock() = Some((handle, subscriber));
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut slot = self.subscriber.lock();
        if slot.as_ref().is_some_and(|(current, _)| *current == handle) {
            slot.take();
        }
    }

    fn synthesize(&self, key: KeyCode, transition: Transition) -> Result<()> {
        if self.fail_synthesis.load(Ordering::Acquire) {
            bail!("synthesis failed");
        }

        self.synthesized.lock().push((key, transition));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeCursor {
    moves: Mutex<Vec<(i32, i32)>>,
    clicks: Mutex<Vec<MouseButton>>,
    fail: AtomicBool,
    stall: Mutex<Duration>,
}

impl FakeCursor {
    pub fn moves(&self) -> Vec<(i32, i32)> {
        self.moves.lock().clone()
    }

    pub fn clicks(&self) -> Vec<MouseButton> {
        self.clicks.lock().clone()
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::Release);
    }

    /// Every move is recorded, then blocks for `duration`.
    pub fn stall(&self, duration: Duration) {
        *self.stall.lock() = duration;
    }

    fn record_click(&self, button: MouseButton) -> Result<()> {
        if self.fail.load(Ordering::Acquire) {
            bail!("cursor unavailable");
        }

        self.clicks.lock().push(button);
        Ok(())
    }
}

impl CursorActuator for FakeCursor {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<()> {
        self.moves.lock().push((dx, dy));

        let stall = *self.stall.lock();
        if !stall.is_zero() {
            thread::sleep(stall);
        }
        Ok(())
    }

    fn click_left(&self) -> Result<()> {
        self.record_click(MouseButton::Left)
    }

    fn click_right(&self) -> Result<()> {
        self.record_click(MouseButton::Right)
    }
}
