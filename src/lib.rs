//! Live webcam viewer.
//!
//! Frames are read from a V4L2 webcam, converted from the device's BGR channel order to RGB,
//! rotated by 90° counter-clockwise, mirrored, and shown in a fixed-size window at a limited frame
//! rate until the window is closed.
//!
//! # Environment Variables
//!
//! The defaults of [`Config`] can be overridden with these environment variables:
//!
//! * `CAMVIEW_DEVICE`: index `N` of the capture device to open (`/dev/videoN`). Default: `0`.
//! * `CAMVIEW_RESOLUTION`: resolution to request from the device, as `WIDTHxHEIGHT`. Default:
//!   `1280x720`. The device may pick a different one.
//! * `CAMVIEW_WINDOW`: size of the window, as `WIDTHxHEIGHT`. Default: `1280x720`.
//! * `CAMVIEW_TITLE`: window title.
//! * `CAMVIEW_FPS`: target frame rate of the display loop. `0` disables the limiter. Default: `30`.
//! * `CAMVIEW_LAYOUT`: how the rotated pixel array is turned into a surface, `column-major`
//!   (default) or `row-major`. See [`ArrayLayout`].
//! * `CAMVIEW_FIT_WINDOW`: if `1`/`true`, the window is sized to fit the frames the device actually
//!   delivers instead of `CAMVIEW_WINDOW`.
//! * `CAMVIEW_JPEG_BACKEND`: JPEG decoder for Motion JPEG webcams, `jpeg-decoder` (default) or
//!   `zune-jpeg`.
//!
//! Logging is configured with `RUST_LOG` (see [`env_logger`]).
//!
//! [`ArrayLayout`]: transform::ArrayLayout

use log::LevelFilter;

pub mod clock;
pub mod config;
pub mod display_loop;
pub mod gui;
pub mod image;
pub mod timer;
pub mod transform;
pub mod video;

pub use config::Config;

use crate::clock::FrameClock;
use crate::display_loop::{DisplayLoop, Stats};
use crate::gui::Window;
use crate::image::Resolution;
use crate::transform::FrameTransform;
use crate::video::webcam::{Webcam, WebcamOptions};
use crate::video::FrameSource;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and camview log at *debug* level, `wgpu` logs at *warn* level. `RUST_LOG`
/// overrides both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}

/// Opens the window and the webcam described by `config` and runs the display loop until the
/// window is closed.
pub fn run(config: Config) -> anyhow::Result<Stats> {
    let transform = FrameTransform::new(config.layout());
    let options = WebcamOptions::default()
        .index(config.device_index())
        .resolution(config.capture_resolution())
        .fps(config.fps())
        .jpeg_backend(config.jpeg_backend());

    let (window, clock, webcam) = if config.fit_window() {
        let webcam = Webcam::open(options)?;
        let res = transform.output_resolution(webcam.resolution());
        log::debug!("fitting window to {} frames", res);
        let window = Window::open(config.title(), res)?;
        (window, FrameClock::new(config.fps()), webcam)
    } else {
        let window = Window::open(config.title(), config.window_resolution())?;
        let clock = FrameClock::new(config.fps());
        let webcam = Webcam::open(options)?;
        (window, clock, webcam)
    };

    if check_fit(window.resolution(), transform.output_resolution(webcam.resolution())) {
        log::debug!("frames cover the {} window", window.resolution());
    }

    DisplayLoop::new(webcam, window, clock, transform).run()
}

/// Returns whether frames of size `frame` exactly cover a window of size `window`, and logs a
/// warning if they don't.
fn check_fit(window: Resolution, frame: Resolution) -> bool {
    if frame == window {
        return true;
    }

    // Frames are blitted unscaled, so they get clipped or leave parts of the window uncovered.
    log::warn!(
        "frames will be displayed at {} ({:?}) in a {} ({:?}) window",
        frame,
        frame.aspect_ratio(),
        window,
        window.aspect_ratio(),
    );
    false
}
