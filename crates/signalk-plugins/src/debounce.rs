//! Leading-edge debounce with a trailing flush.
//!
//! The first value after a quiet period passes straight through and opens a
//! window of `delay`. Values arriving inside the window replace each other;
//! when the window closes the latest one is released and a new window opens.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    window_end: Option<Instant>,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            window_end: None,
            pending: None,
        }
    }

    /// Offer a value at `now`. Returns it back if it may fire immediately.
    pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
        if self.window_end.is_some_and(|end| end > now) {
            self.pending = Some(value);
            return None;
        }

        self.window_end = Some(now + self.delay);
        self.pending = None;
        Some(value)
    }

    /// When the held value is due, if one is held.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and(self.window_end)
    }

    /// Release the held value if its window has closed.
    pub fn expire(&mut self, now: Instant) -> Option<T> {
        match self.window_end {
            Some(end) if end <= now => {
                let value = self.pending.take()?;
                self.window_end = Some(now + self.delay);
                Some(value)
            }
            _ => None,
        }
    }
}
