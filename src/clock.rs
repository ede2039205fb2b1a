//! Frame rate limiting.

use std::{
    thread,
    time::{Duration, Instant},
};

/// Limits how often a loop iterates.
pub trait Limiter {
    /// Called once per loop iteration; blocks until the next iteration may start.
    ///
    /// Returns the time that passed since the previous call.
    fn tick(&mut self) -> Duration;
}

/// A cooperative frame rate limiter.
///
/// [`FrameClock::tick`] sleeps for whatever is left of the frame budget since the previous tick. If
/// the work in between took longer than the budget, it returns immediately, so a slow loop simply
/// runs below the target frame rate.
#[derive(Debug)]
pub struct FrameClock {
    budget: Option<Duration>,
    last_tick: Option<Instant>,
}

impl FrameClock {
    /// Creates a clock targeting `fps` frames per second.
    ///
    /// An `fps` of 0 creates a clock that never sleeps.
    pub fn new(fps: u32) -> Self {
        Self {
            budget: (fps != 0).then(|| Duration::from_secs(1) / fps),
            last_tick: None,
        }
    }

    /// Returns the time budget of a single frame, or `None` if this clock does not limit.
    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Computes how long to sleep when `elapsed` has passed since the last tick.
    fn delay(&self, elapsed: Duration) -> Duration {
        match self.budget {
            Some(budget) => budget.saturating_sub(elapsed),
            None => Duration::ZERO,
        }
    }
}

impl Limiter for FrameClock {
    fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let Some(last) = self.last_tick else {
            // The first tick has nothing to measure against.
            self.last_tick = Some(now);
            return Duration::ZERO;
        };

        let delay = self.delay(now - last);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let now = Instant::now();
        self.last_tick = Some(now);
        now - last
    }
}
