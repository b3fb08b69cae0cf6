use crate::keymap::Direction;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct DirectionFlags {
    up: AtomicBool,
    down: AtomicBool,
    left: AtomicBool,
    right: AtomicBool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Directions {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionFlags {
    pub fn set(&self, direction: Direction, held: bool) {
        self.flag(direction).store(held, Ordering::Release);
    }

    pub fn snapshot(&self) -> Directions {
        Directions {
            up: self.up.load(Ordering::Acquire),
            down: self.down.load(Ordering::Acquire),
            left: self.left.load(Ordering::Acquire),
            right: self.right.load(Ordering::Acquire),
        }
    }

    pub fn clear(&self) {
        for direction in [Direction::Up, Direction::Down, Direction::Left, Direction::Right] {
            self.set(direction, false);
        }
    }

    fn flag(&self, direction: Direction) -> &AtomicBool {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }
}

impl Directions {
    /// Raw axis input in {-1, 0, 1}; opposing directions cancel out.
    pub fn axes(self) -> (f32, f32) {
        let h = f32::from(i8::from(self.right) - i8::from(self.left));
        let v = f32::from(i8::from(self.down) - i8::from(self.up));
        (h, v)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Latch(AtomicBool);

impl Latch {
    pub fn fire(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ModifierState(AtomicBool);

impl ModifierState {
    pub fn hold(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn release(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    #[cfg(test)]
    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
