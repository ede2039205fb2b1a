//! Video capture.

pub mod webcam;

use crate::image::{Frame, Resolution};
use crate::timer::Timer;

/// A device producing a sequence of [`Frame`]s.
pub trait FrameSource {
    /// Returns the resolution of the frames this source delivers.
    fn resolution(&self) -> Resolution;

    /// Reads the next frame, blocking until one is available.
    ///
    /// Returns `None` if no frame could be acquired this time. Sources report the reason
    /// themselves; the caller is expected to simply try again later.
    fn read(&mut self) -> Option<Frame>;

    /// Returns the profiling timers of this source, to be logged along with the display rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }

    /// Releases the underlying device.
    fn release(self)
    where
        Self: Sized;
}
