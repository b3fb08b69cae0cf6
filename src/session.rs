use crate::io::{CursorActuator, RawInputSource, SubscriptionHandle, Transition};
use crate::keymap::KeyMap;
use crate::mouse::MouseMotionEngine;
use crate::router::KeyEventRouter;
use crate::state::DirectionFlags;
use anyhow::Result;
use colored::Colorize;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

struct ActiveSession {
    started: Instant,
    activity: Arc<AtomicBool>,
    router: Arc<KeyEventRouter>,
    subscription: SubscriptionHandle,
    engine: MouseMotionEngine,
}

/// Pedal state machine: Idle while `active` is `None`, Active otherwise.
pub(crate) struct PedalSession {
    keymap: Arc<KeyMap>,
    source: Arc<dyn RawInputSource>,
    actuator: Arc<dyn CursorActuator>,
    tap_time: Duration,
    active: Option<ActiveSession>,
}

impl PedalSession {
    pub fn new(
        keymap: Arc<KeyMap>,
        source: Arc<dyn RawInputSource>,
        actuator: Arc<dyn CursorActuator>,
        tap_time: Duration,
    ) -> Self {
        Self {
            keymap,
            source,
            actuator,
            tap_time,
            active: None,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.active.is_some() {
            warn!("Pedal pressed while a session is already active, ignoring");
            return;
        }

        match self.open(now) {
            Ok(session) => {
                info!("{} {}", "↓".green().bold(), "PEDAL".cyan());
                self.active = Some(session);
            }
            Err(e) => error!("Pedal session failed to start, pedal is inert: {e:#}"),
        }
    }

    fn open(&self, now: Instant) -> Result<ActiveSession> {
        let activity = Arc::new(AtomicBool::new(false));
        let directions = Arc::new(DirectionFlags::default());
        let router = Arc::new(KeyEventRouter::new(
            Arc::clone(&self.keymap),
            Arc::clone(&self.source),
            Arc::clone(&self.actuator),
            Arc::clone(&directions),
            Arc::clone(&activity),
        ));

        let subscriber = Arc::clone(&router);
        let subscription = self
            .source
            .subscribe(Box::new(move |event| subscriber.route(event)))?;

        let engine = match MouseMotionEngine::spawn(directions, Arc::clone(&self.actuator)) {
            Ok(engine) => engine,
            Err(e) => {
                self.source.unsubscribe(subscription);
                return Err(e);
            }
        };

        Ok(ActiveSession {
            started: now,
            activity,
            router,
            subscription,
            engine,
        })
    }

    pub fn end(&mut self) -> bool {
        self.end_at(Instant::now())
    }

    /// Pedal up. Returns whether the press counted as a tap.
    pub fn end_at(&mut self, now: Instant) -> bool {
        let Some(session) = self.active.take() else {
            debug!("Pedal released without an active session");
            return false;
        };

        let elapsed = now.saturating_duration_since(session.started);
        let tapped = !session.activity.load(Ordering::Acquire) && elapsed < self.tap_time;
        if tapped {
            debug!("Pedal tap after {}ms", elapsed.as_millis());
            self.pulse_tap_key();
        }

        self.close(session);
        info!("{} {}", "↑".red().bold(), "PEDAL".cyan());
        tapped
    }

    fn close(&self, mut session: ActiveSession) {
        // Unsubscribe first so no late event can re-press the modifier.
        self.source.unsubscribe(session.subscription);
        session.router.reset();
        session.engine.stop();
    }

    fn pulse_tap_key(&self) {
        let key = self.keymap.tap_key;
        let pulse = self
            .source
            .synthesize(key, Transition::Down)
            .and_then(|()| self.source.synthesize(key, Transition::Up));

        if let Err(e) = pulse {
            error!("Failed to pulse {key:?}: {e:#}");
        }
    }
}

impl Drop for PedalSession {
    fn drop(&mut self) {
        if let Some(session) = self.active.take() {
            self.close(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Disposition;
    use crate::keymap::MouseButton;
    use crate::testing::{FakeCursor, FakeSource, down, up};
    use evdev::KeyCode;
    use std::thread;

    const TAP_TIME: Duration = Duration::from_millis(1000);

    fn session() -> (PedalSession, Arc<FakeSource>, Arc<FakeCursor>) {
        let source = Arc::new(FakeSource::default());
        let cursor = Arc::new(FakeCursor::default());
        let session = PedalSession::new(
            Arc::new(KeyMap::default()),
            source.clone(),
            cursor.clone(),
            TAP_TIME,
        );
        (session, source, cursor)
    }

    fn alt_pulse() -> Vec<(KeyCode, Transition)> {
        vec![
            (KeyCode::KEY_LEFTALT, Transition::Down),
            (KeyCode::KEY_LEFTALT, Transition::Up),
        ]
    }

    #[test]
    fn short_idle_press_pulses_tap_key() {
        let (mut session, source, _) = session();
        let t0 = Instant::now();
        session.start_at(t0);
        assert!(session.end_at(t0 + Duration::from_millis(500)));
        assert_eq!(source.synthesized(), alt_pulse());
    }

    #[test]
    fn long_idle_press_is_not_a_tap() {
        let (mut session, source, _) = session();
        let t0 = Instant::now();
        session.start_at(t0);
        assert!(!session.end_at(t0 + Duration::from_millis(1500)));
        assert!(source.synthesized().is_empty());
    }

    #[test]
    fn tap_threshold_is_exclusive() {
        let (mut session, source, _) = session();
        let t0 = Instant::now();
        session.start_at(t0);
        assert!(!session.end_at(t0 + TAP_TIME));
        assert!(source.synthesized().is_empty());
    }

    #[test]
    fn key_activity_cancels_tap() {
        let (mut session, source, _) = session();
        let t0 = Instant::now();
        session.start_at(t0);
        assert_eq!(source.feed(down(KeyCode::KEY_Z)), Some(Disposition::Suppress));
        assert!(!session.end_at(t0 + Duration::from_millis(500)));
        assert!(source.synthesized().is_empty());
    }

    #[test]
    fn activity_resets_between_sessions() {
        let (mut session, source, _) = session();
        let t0 = Instant::now();
        session.start_at(t0);
        source.feed(down(KeyCode::KEY_A));
        session.end_at(t0 + Duration::from_millis(100));

        let t1 = t0 + Duration::from_secs(5);
        session.start_at(t1);
        assert!(session.end_at(t1 + Duration::from_millis(100)));
    }

    #[test]
    fn session_routes_events_while_active_only() {
        let (mut session, source, _) = session();
        assert_eq!(source.feed(down(KeyCode::KEY_A)), None);

        session.start();
        assert!(session.is_active());
        assert_eq!(
            source.feed(down(KeyCode::KEY_A)),
            Some(Disposition::Forward(KeyCode::KEY_LEFT))
        );
        source.feed(up(KeyCode::KEY_A));

        session.end();
        assert!(!session.is_active());
        assert!(!source.is_subscribed());
        assert_eq!(source.feed(down(KeyCode::KEY_A)), None);
    }

    #[test]
    fn end_releases_held_shift() {
        let (mut session, source, _) = session();
        session.start();
        source.feed(down(KeyCode::KEY_Q));
        session.end();

        assert_eq!(
            source.synthesized(),
            vec![
                (KeyCode::KEY_LEFTSHIFT, Transition::Down),
                (KeyCode::KEY_LEFTSHIFT, Transition::Up),
            ]
        );
    }

    #[test]
    fn click_latch_does_not_leak_into_next_session() {
        let (mut session, source, cursor) = session();
        session.start();
        source.feed(down(KeyCode::KEY_U));
        session.end();

        session.start();
        source.feed(down(KeyCode::KEY_U));
        session.end();

        assert_eq!(cursor.clicks(), vec![MouseButton::Left, MouseButton::Left]);
    }

    #[test]
    fn reentrant_pedal_down_is_ignored() {
        let (mut session, source, _) = session();
        let t0 = Instant::now();
        session.start_at(t0);
        session.start_at(t0 + Duration::from_millis(200));
        assert_eq!(source.subscriptions(), 1);

        // The first press still owns the timing.
        assert!(!session.end_at(t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn failed_start_leaves_pedal_inert() {
        let (mut session, source, _) = session();
        source.fail_subscribe(true);
        let t0 = Instant::now();
        session.start_at(t0);
        assert!(!session.is_active());
        assert!(!session.end_at(t0 + Duration::from_millis(100)));
        assert!(source.synthesized().is_empty());
    }

    #[test]
    fn release_without_press_is_harmless() {
        let (mut session, source, _) = session();
        assert!(!session.end());
        assert!(source.synthesized().is_empty());
    }

    #[test]
    fn motion_stops_with_session() {
        let (mut session, source, cursor) = session();
        session.start();
        source.feed(down(KeyCode::KEY_SEMICOLON));
        thread::sleep(Duration::from_millis(250));
        session.end();

        let moves = cursor.moves().len();
        assert!(moves > 0);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cursor.moves().len(), moves);
    }

    #[test]
    fn end_returns_when_motion_stalls() {
        let (mut session, source, cursor) = session();
        cursor.stall(Duration::from_secs(2));
        session.start();
        source.feed(down(KeyCode::KEY_SEMICOLON));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(cursor.moves().len(), 1);

        let started = Instant::now();
        session.end();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!session.is_active());
        assert!(!source.is_subscribed());
    }
}
