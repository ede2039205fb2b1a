//! The capture-and-display loop.

use crate::clock::Limiter;
use crate::gui::{Event, Screen};
use crate::timer::{FpsCounter, Timer};
use crate::transform::FrameTransform;
use crate::video::FrameSource;

/// Counters collected while the loop runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of completed loop iterations.
    pub iterations: u64,
    /// Number of frames drawn to the screen.
    pub rendered: u64,
    /// Number of iterations in which no frame could be acquired.
    pub skipped: u64,
}

/// Reads frames from a [`FrameSource`], transforms them, and shows them on a [`Screen`] until the
/// screen reports [`Event::CloseRequested`].
///
/// The loop owns the source and the screen and releases both exactly once, after the last
/// iteration.
pub struct DisplayLoop<S, D, L> {
    source: S,
    screen: D,
    limiter: L,
    transform: FrameTransform,
    running: bool,
    stats: Stats,
    fps: FpsCounter,
    t_capture: Timer,
    t_transform: Timer,
}

impl<S: FrameSource, D: Screen, L: Limiter> DisplayLoop<S, D, L> {
    pub fn new(source: S, screen: D, limiter: L, transform: FrameTransform) -> Self {
        Self {
            source,
            screen,
            limiter,
            transform,
            running: true,
            stats: Stats::default(),
            fps: FpsCounter::new("display"),
            t_capture: Timer::new("capture"),
            t_transform: Timer::new("transform"),
        }
    }

    /// Returns whether the loop will run another iteration.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Runs iterations until the screen is closed, then releases the source and the screen.
    ///
    /// Errors from the screen abort the loop and are returned; the source and screen are dropped
    /// in that case.
    pub fn run(mut self) -> anyhow::Result<Stats> {
        while self.running {
            self.step()?;
        }

        log::debug!("display loop stopped: {:?}", self.stats);
        self.source.release();
        self.screen.quit();
        Ok(self.stats)
    }

    /// Runs a single iteration of the loop.
    ///
    /// A close event stops the loop after the current iteration, which still shows its frame.
    pub fn step(&mut self) -> anyhow::Result<()> {
        for event in self.screen.poll_events() {
            match event {
                Event::CloseRequested => {
                    log::debug!("close requested");
                    self.running = false;
                }
            }
        }

        let frame = self.t_capture.time(|| self.source.read());
        match frame {
            Some(frame) => {
                let image = self.t_transform.time(|| self.transform.apply(&frame));
                self.screen.blit(&image);
                self.stats.rendered += 1;
            }
            None => {
                log::trace!("no frame acquired, keeping previous contents");
                self.stats.skipped += 1;
            }
        }

        self.screen.present()?;
        self.limiter.tick();
        self.stats.iterations += 1;

        let timers = self.source.timers();
        self.fps
            .tick_with(timers.into_iter().chain([&self.t_capture, &self.t_transform]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use crate::gui::Canvas;
    use crate::image::{Frame, Image, Resolution};

    use super::*;

    struct Frames(Vec<Option<Frame>>);

    impl FrameSource for Frames {
        fn resolution(&self) -> Resolution {
            Resolution::new(2, 1)
        }

        fn read(&mut self) -> Option<Frame> {
            if self.0.is_empty() {
                None
            } else {
                self.0.remove(0)
            }
        }

        fn release(self) {}
    }

    /// Counts how often its timers are collected.
    struct Timed {
        t_read: Timer,
        collected: Cell<u32>,
    }

    impl FrameSource for Timed {
        fn resolution(&self) -> Resolution {
            Resolution::new(2, 1)
        }

        fn read(&mut self) -> Option<Frame> {
            self.t_read.time(|| None)
        }

        fn timers(&self) -> Vec<&Timer> {
            self.collected.set(self.collected.get() + 1);
            vec![&self.t_read]
        }

        fn release(self) {}
    }

    /// Closes itself after `close_after` polls.
    struct Headless {
        canvas: Canvas,
        polls: u32,
        close_after: u32,
    }

    impl Screen for Headless {
        fn poll_events(&mut self) -> Vec<Event> {
            self.polls += 1;
            if self.polls == self.close_after {
                vec![Event::CloseRequested]
            } else {
                Vec::new()
            }
        }

        fn blit(&mut self, image: &Image) {
            self.canvas.blit(image);
        }

        fn present(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn quit(self) {}
    }

    struct NoLimit;

    impl Limiter for NoLimit {
        fn tick(&mut self) -> Duration {
            Duration::ZERO
        }
    }

    fn headless(close_after: u32) -> Headless {
        Headless {
            canvas: Canvas::new(Resolution::new(2, 1)),
            polls: 0,
            close_after,
        }
    }

    #[test]
    fn step_stops_after_close() {
        let frame = Frame::from_bgr8(Resolution::new(2, 1), vec![0, 0, 255, 255, 0, 0]);
        let mut lp = DisplayLoop::new(
            Frames(vec![Some(frame.clone()), Some(frame)]),
            headless(2),
            NoLimit,
            FrameTransform::default(),
        );

        lp.step().unwrap();
        assert!(lp.is_running());
        lp.step().unwrap();
        assert!(!lp.is_running());
        assert_eq!(
            lp.stats(),
            Stats {
                iterations: 2,
                rendered: 2,
                skipped: 0,
            }
        );
    }

    #[test]
    fn source_timers_are_collected_every_iteration() {
        let mut lp = DisplayLoop::new(
            Timed {
                t_read: Timer::new("read"),
                collected: Cell::new(0),
            },
            headless(3),
            NoLimit,
            FrameTransform::default(),
        );
        lp.step().unwrap();
        lp.step().unwrap();
        assert_eq!(lp.source.collected.get(), 2);
        assert!(lp.source.t_read.to_string().starts_with("read: 2x"));
    }

    #[test]
    fn missing_frames_are_skipped() {
        let lp = DisplayLoop::new(Frames(vec![None]), headless(3), NoLimit, Default::default());
        let stats = lp.run().unwrap();
        assert_eq!(
            stats,
            Stats {
                iterations: 3,
                rendered: 0,
                skipped: 3,
            }
        );
    }
}
