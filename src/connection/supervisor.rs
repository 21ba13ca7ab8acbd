//! Inactivity timeout supervision.

use std::time::Duration;

use crate::platform::Timer;

/// Rearming one-shot inactivity timer.
///
/// Rearmed on every send and receive; when it expires with no activity in
/// between, the connection is forced closed. Every arming gets a fresh
/// generation, and only an expiry carrying the latest one counts. A fire
/// already in flight when the window was restarted, or after
/// [`stop`](Self::stop), is stale.
#[derive(Debug)]
pub struct TimeoutSupervisor<K> {
    timer: K,
    window: Duration,
    generation: u64,
    armed: bool,
}

impl<K: Timer> TimeoutSupervisor<K> {
    /// Wrap `timer` with an inactivity window of `window`.
    pub fn new(timer: K, window: Duration) -> Self {
        Self {
            timer,
            window,
            generation: 0,
            armed: false,
        }
    }

    /// Restart the window from now. Returns the new generation.
    pub fn rearm(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.timer.arm(self.window, self.generation);
        self.armed = true;
        self.generation
    }

    /// Cancel any pending expiry.
    pub fn stop(&mut self) {
        if self.armed {
            self.timer.cancel();
            self.armed = false;
        }
    }

    /// Record an expiry of `generation`. Returns `true` if it was for the
    /// live arming.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.armed && generation == self.generation {
            self.armed = false;
            true
        } else {
            false
        }
    }

    /// Check if an expiry is outstanding.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Generation of the most recent arming.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Configured inactivity window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Change the inactivity window; takes effect at the next rearm.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Borrow the underlying timer.
    pub fn timer(&self) -> &K {
        &self.timer
    }

    /// Mutably borrow the underlying timer.
    pub fn timer_mut(&mut self) -> &mut K {
        &mut self.timer
    }
}
