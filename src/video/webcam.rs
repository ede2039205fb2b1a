//! V4L2 webcam access.
//!
//! V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG, Motion JPEG, or YUYV 4:2:2 frames are
//! supported. All of them are converted to BGR [`Frame`]s.

use std::{cmp::Reverse, path::PathBuf};

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::jpeg::{decode_jpeg, JpegBackend};
use crate::image::{Frame, Resolution};
use crate::timer::Timer;

use super::FrameSource;

/// Indicates whether to prefer matching the requested resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the closest resolution to the
/// requested one, and then the highest frame rate available at that resolution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Prefer matching the requested resolution over the frame rate.
    #[default]
    Resolution,
    /// Prefer matching the requested frame rate over the resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Device selection and format negotiation options.
#[derive(Debug, Default)]
pub struct WebcamOptions {
    index: u32,
    frame: FramePrefs,
    jpeg_backend: JpegBackend,
}

impl WebcamOptions {
    /// Sets the index `N` of the device to open (`/dev/videoN`).
    #[inline]
    pub fn index(self, index: u32) -> Self {
        Self { index, ..self }
    }

    /// Sets the desired image resolution.
    ///
    /// The resolution is a request: the smallest resolution the webcam offers that is at least as
    /// large will be selected, or the largest one if none is.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired one. A value
    /// of 0 leaves the frame rate unconstrained.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = (fps != 0).then_some(fps);
        self
    }

    /// Selects whether to prefer the requested resolution or frame rate.
    ///
    /// When the camera cannot deliver both, this parameter controls which one will be
    /// maintained.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    /// Selects the decoder used for Motion JPEG webcams.
    #[inline]
    pub fn jpeg_backend(mut self, backend: JpegBackend) -> Self {
        self.jpeg_backend = backend;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> u32 {
        (1.0 / self.frame_interval.as_f32()).round() as u32
    }
}

/// Returns whether frames in `format` can be turned into [`Frame`]s.
fn is_supported(format: PixelFormat) -> bool {
    format == PixelFormat::JPEG || format == PixelFormat::MJPG || format == PixelFormat::YUYV
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    // Compressed formats first, they allow higher resolutions and frame rates over USB.
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?.pixel_format();
        log::debug!("device supports pixel format {}", format);
        match format {
            f if f == PixelFormat::JPEG || f == PixelFormat::MJPG => {
                pixel_format = Some(f);
                break;
            }
            f if is_supported(f) => {
                pixel_format.get_or_insert(f);
            }
            _ => {}
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let requested = FrameFormat {
        resolution: prefs.resolution.unwrap_or(Resolution::RES_720P),
        frame_interval: Fract::new(1, prefs.fps.unwrap_or(30)),
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let resolution = Resolution::new(size.width(), size.height());
                match device.frame_intervals(pixel_format, size.width(), size.height())? {
                    FrameIntervals::Discrete(intervals) => {
                        for rate in intervals {
                            formats.push(FrameFormat {
                                resolution,
                                frame_interval: *rate.fract(),
                            });
                        }
                    }
                    FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                        formats.push(FrameFormat {
                            resolution,
                            frame_interval: requested.frame_interval,
                        });
                    }
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            // The driver clamps the request to what it supports.
            log::debug!("device supports a range of resolutions, requesting {requested:?}");
            formats.push(requested);
        }
    }

    let Some(fmt) = pick_format(&formats, prefs) else {
        bail!("failed to negotiate a webcam format");
    };
    log::debug!(
        "negotiated {} @ {}Hz ({}) with prefs {:?}",
        fmt.resolution,
        fmt.fps(),
        pixel_format,
        prefs,
    );

    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks the format closest to the preferences.
///
/// A resolution "matches" if it is at least as large as the requested one; among matching
/// resolutions the smallest is closest, otherwise the largest. A frame rate matches if it is at
/// least the requested one, and higher frame rates are preferred.
fn pick_format(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let res_rank = |fmt: &FrameFormat| {
        let pixels = fmt.resolution.num_pixels() as i64;
        match prefs.resolution {
            Some(res) if fmt.resolution.covers(res) => (0, pixels),
            Some(_) | None => (1, -pixels),
        }
    };
    let fps_rank = |fmt: &FrameFormat| {
        let fps = fmt.fps();
        let matches = prefs.fps.map_or(true, |want| fps >= want);
        (!matches, Reverse(fps))
    };

    let formats = formats.iter().copied();
    match prefs.pref {
        ParamPreference::Resolution => formats.min_by_key(|fmt| (res_rank(fmt), fps_rank(fmt))),
        ParamPreference::Framerate => formats.min_by_key(|fmt| (fps_rank(fmt), res_rank(fmt))),
    }
}

/// A webcam yielding a stream of [`Frame`]s.
pub struct Webcam {
    stream: ReadStream,
    name: String,
    decoder: FrameDecoder,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam selected by `options`.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let path = PathBuf::from(format!("/dev/video{}", options.index));
        let dev = Device::open(&path)
            .with_context(|| format!("failed to open webcam {}", path.display()))?;

        let caps = dev.capabilities()?;
        let cap_flags = caps.device_capabilities();
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            bail!("{} ({}) is not a video capture device", caps.card(), path.display());
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;

        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let pixel_format = format.pixel_format();
        let stride = format.bytes_per_line() as usize;
        if !is_supported(pixel_format) {
            bail!("device switched to unsupported pixel format {}", pixel_format);
        }

        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {} {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            pixel_format,
            1.0 / actual.as_f32(),
        );
        log::debug!("{} bytes per line", stride);
        if let Some(requested) = options.frame.resolution {
            if requested != resolution {
                log::warn!("requested {} frames, but the device delivers {}", requested, resolution);
            }
        }

        let stream = capture.into_stream()?;

        Ok(Self {
            stream,
            name: caps.card().to_string(),
            decoder: FrameDecoder {
                pixel_format,
                resolution,
                stride,
                jpeg_backend: options.jpeg_backend,
            },
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        })
    }
}

impl FrameSource for Webcam {
    fn resolution(&self) -> Resolution {
        self.decoder.resolution
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Corrupted frames (which
    /// even high-quality webcams produce occasionally) are logged and reported as `None`.
    fn read(&mut self) -> Option<Frame> {
        let decoder = &self.decoder;
        let t_decode = &self.t_decode;

        let dequeue_guard = self.t_dequeue.start();
        let result = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            Ok(t_decode.time(|| decoder.decode(&buf)))
        });

        match result {
            Ok(Ok(frame)) => Some(frame),
            Ok(Err(e)) => {
                log::error!("webcam decode error: {}", e);
                None
            }
            Err(e) => {
                log::error!("failed to dequeue webcam frame: {}", e);
                None
            }
        }
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }

    fn release(self) {
        log::debug!("releasing webcam {}", self.name);
        drop(self.stream);
    }
}

/// Turns the raw buffers of a stream into [`Frame`]s, according to the negotiated format.
#[derive(Debug, Clone, Copy)]
struct FrameDecoder {
    pixel_format: PixelFormat,
    resolution: Resolution,
    /// Bytes per line of uncompressed formats.
    stride: usize,
    jpeg_backend: JpegBackend,
}

impl FrameDecoder {
    fn decode(&self, buf: &[u8]) -> anyhow::Result<Frame> {
        if self.pixel_format == PixelFormat::YUYV {
            return Frame::from_yuyv(self.resolution, self.stride, buf);
        }

        let frame = decode_jpeg(buf, self.jpeg_backend)?;
        if frame.resolution() != self.resolution {
            bail!(
                "decoded {} frame, but the device is configured for {}",
                frame.resolution(),
                self.resolution,
            );
        }
        Ok(frame)
    }
}
