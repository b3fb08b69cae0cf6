use crate::io::CursorActuator;
use crate::state::{DirectionFlags, Directions};
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select, tick};
use log::{debug, error, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) const MAX_SPEED: f32 = 7.5;
pub(crate) const ACCELERATION: f32 = 3.0;
pub(crate) const BREAK_ACCELERATION: f32 = 6.0;
pub(crate) const CHANGE_DIRECTION_ACCELERATION: f32 = 7.5;
pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(5);

const STOP_GRACE_TICKS: u32 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct MotionModel {
    velocity: Velocity,
    tick_seconds: f32,
}

impl MotionModel {
    pub fn new(interval: Duration) -> Self {
        Self {
            velocity: Velocity::default(),
            tick_seconds: interval.as_secs_f32(),
        }
    }

    #[cfg(test)]
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn step(&mut self, directions: Directions) -> Option<(i32, i32)> {
        let (h, v) = directions.axes();
        let (dir_x, dir_y) = normalize(h, v);
        let acceleration = self.acceleration(dir_x, dir_y);
        // Unclamped: long ticks overshoot the target.
        let t = self.tick_seconds * acceleration;

        self.velocity.x = lerp(self.velocity.x, dir_x * MAX_SPEED, t);
        self.velocity.y = lerp(self.velocity.y, dir_y * MAX_SPEED, t);

        // Ties round to even.
        let dx = self.velocity.x.round_ties_even() as i32;
        let dy = self.velocity.y.round_ties_even() as i32;
        (dx != 0 || dy != 0).then_some((dx, dy))
    }

    fn acceleration(&self, dir_x: f32, dir_y: f32) -> f32 {
        if dir_x == 0.0 && dir_y == 0.0 {
            BREAK_ACCELERATION
        } else if dot(self.velocity.x, self.velocity.y, dir_x, dir_y) < 0.0 {
            CHANGE_DIRECTION_ACCELERATION
        } else {
            ACCELERATION
        }
    }
}

fn normalize(x: f32, y: f32) -> (f32, f32) {
    if x == 0.0 && y == 0.0 {
        return (0.0, 0.0);
    }
    let magnitude = x.hypot(y);
    (x / magnitude, y / magnitude)
}

fn dot(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    x1 * x2 + y1 * y2
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub(crate) struct MouseMotionEngine {
    stop: Option<Sender<()>>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl MouseMotionEngine {
    pub fn spawn(directions: Arc<DirectionFlags>, actuator: Arc<dyn CursorActuator>) -> Result<Self> {
        Self::with_interval(TICK_INTERVAL, directions, actuator)
    }

    pub fn with_interval(
        interval: Duration,
        directions: Arc<DirectionFlags>,
        actuator: Arc<dyn CursorActuator>,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("pedalkeys-mouse".to_owned())
            .spawn(move || {
                motion_loop(interval, &directions, actuator.as_ref(), &stop_rx);
                let _ = done_tx.send(());
            })?;

        debug!("Mouse motion started ({}ms ticks)", interval.as_millis());

        Ok(Self {
            stop: Some(stop_tx),
            done: done_rx,
            handle: Some(handle),
            interval,
        })
    }

    /// Waits a bounded time for the loop to exit, detaching it on timeout.
    pub fn stop(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        drop(stop);

        let Some(handle) = self.handle.take() else {
            return;
        };

        match self.done.recv_timeout(self.interval * STOP_GRACE_TICKS) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    error!("Mouse motion thread panicked");
                } else {
                    debug!("Mouse motion stopped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    "Mouse motion did not stop within {}ms, detaching it",
                    (self.interval * STOP_GRACE_TICKS).as_millis()
                );
            }
        }
    }
}

impl Drop for MouseMotionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn motion_loop(
    interval: Duration,
    directions: &DirectionFlags,
    actuator: &dyn CursorActuator,
    stop: &Receiver<()>,
) {
    let ticker = tick(interval);
    let mut model = MotionModel::new(interval);

    loop {
        select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                if let Some((dx, dy)) = model.step(directions.snapshot())
                    && let Err(e) = actuator.move_relative(dx, dy)
                {
                    warn!("Failed to move cursor: {e:#}");
                }
            }
        }
    }
}
