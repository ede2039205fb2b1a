//! Runtime configuration.

use std::{env, str::FromStr};

use anyhow::Context;

use crate::image::jpeg::JpegBackend;
use crate::image::Resolution;
use crate::transform::ArrayLayout;

const ENV_DEVICE: &str = "CAMVIEW_DEVICE";
const ENV_RESOLUTION: &str = "CAMVIEW_RESOLUTION";
const ENV_WINDOW: &str = "CAMVIEW_WINDOW";
const ENV_TITLE: &str = "CAMVIEW_TITLE";
const ENV_FPS: &str = "CAMVIEW_FPS";
const ENV_LAYOUT: &str = "CAMVIEW_LAYOUT";
const ENV_FIT_WINDOW: &str = "CAMVIEW_FIT_WINDOW";
const ENV_JPEG_BACKEND: &str = "CAMVIEW_JPEG_BACKEND";

/// Settings of the display loop, the window, and the capture device.
#[derive(Debug, Clone)]
pub struct Config {
    device_index: u32,
    capture_resolution: Resolution,
    window_resolution: Resolution,
    title: String,
    fps: u32,
    layout: ArrayLayout,
    fit_window: bool,
    jpeg_backend: JpegBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_index: 0,
            capture_resolution: Resolution::RES_720P,
            window_resolution: Resolution::RES_720P,
            title: String::from("camview"),
            fps: 30,
            layout: ArrayLayout::default(),
            fit_window: false,
            jpeg_backend: JpegBackend::default(),
        }
    }
}

impl Config {
    /// Creates the default configuration, with overrides taken from the `CAMVIEW_*` environment
    /// variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        let var = |key: &str| {
            let value = lookup(key);
            if let Some(value) = &value {
                log::debug!("config override: `{}` is set to '{}'", key, value);
            }
            value
        };

        if let Some(v) = var(ENV_DEVICE) {
            config.device_index = parse_var(ENV_DEVICE, &v)?;
        }
        if let Some(v) = var(ENV_RESOLUTION) {
            config.capture_resolution = parse_var(ENV_RESOLUTION, &v)?;
        }
        if let Some(v) = var(ENV_WINDOW) {
            config.window_resolution = parse_var(ENV_WINDOW, &v)?;
        }
        if let Some(v) = var(ENV_TITLE) {
            config.title = v;
        }
        if let Some(v) = var(ENV_FPS) {
            config.fps = parse_var(ENV_FPS, &v)?;
        }
        if let Some(v) = var(ENV_LAYOUT) {
            config.layout = parse_var(ENV_LAYOUT, &v)?;
        }
        if let Some(v) = var(ENV_FIT_WINDOW) {
            config.fit_window = parse_bool(ENV_FIT_WINDOW, &v)?;
        }
        if let Some(v) = var(ENV_JPEG_BACKEND) {
            config.jpeg_backend = parse_var(ENV_JPEG_BACKEND, &v)?;
        }

        Ok(config)
    }

    /// Sets the index `N` of the capture device (`/dev/videoN`).
    pub fn with_device_index(self, device_index: u32) -> Self {
        Self {
            device_index,
            ..self
        }
    }

    /// Sets the resolution requested from the capture device.
    pub fn with_capture_resolution(self, capture_resolution: Resolution) -> Self {
        Self {
            capture_resolution,
            ..self
        }
    }

    /// Sets the size of the window.
    pub fn with_window_resolution(self, window_resolution: Resolution) -> Self {
        Self {
            window_resolution,
            ..self
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }

    /// Sets the target frame rate. 0 disables frame rate limiting.
    pub fn with_fps(self, fps: u32) -> Self {
        Self { fps, ..self }
    }

    pub fn with_layout(self, layout: ArrayLayout) -> Self {
        Self { layout, ..self }
    }

    /// If `true`, the window is sized to the transformed frames instead of using the configured
    /// window resolution.
    pub fn with_fit_window(self, fit_window: bool) -> Self {
        Self { fit_window, ..self }
    }

    pub fn with_jpeg_backend(self, jpeg_backend: JpegBackend) -> Self {
        Self {
            jpeg_backend,
            ..self
        }
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    pub fn capture_resolution(&self) -> Resolution {
        self.capture_resolution
    }

    pub fn window_resolution(&self) -> Resolution {
        self.window_resolution
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn layout(&self) -> ArrayLayout {
        self.layout
    }

    pub fn fit_window(&self) -> bool {
        self.fit_window
    }

    pub fn jpeg_backend(&self) -> JpegBackend {
        self.jpeg_backend
    }
}

fn parse_var<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    let parsed: anyhow::Result<T> = value.trim().parse::<T>().map_err(Into::into);
    parsed.with_context(|| format!("invalid value for `{key}`: '{value}'"))
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => anyhow::bail!("invalid value for `{key}`: '{value}' (expected `true` or `false`)"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = lookup(&[]).unwrap();
        assert_eq!(config.device_index(), 0);
        assert_eq!(config.capture_resolution(), Resolution::new(1280, 720));
        assert_eq!(config.window_resolution(), Resolution::new(1280, 720));
        assert_eq!(config.fps(), 30);
        assert_eq!(config.layout(), ArrayLayout::ColumnMajor);
        assert!(!config.fit_window());
        assert_eq!(config.jpeg_backend(), JpegBackend::JpegDecoder);
    }

    #[test]
    fn overrides() {
        let config = lookup(&[
            ("CAMVIEW_DEVICE", "2"),
            ("CAMVIEW_RESOLUTION", "640x480"),
            ("CAMVIEW_WINDOW", "480x640"),
            ("CAMVIEW_TITLE", "mirror"),
            ("CAMVIEW_FPS", " 60 "),
            ("CAMVIEW_LAYOUT", "row-major"),
            ("CAMVIEW_FIT_WINDOW", "true"),
            ("CAMVIEW_JPEG_BACKEND", "zune-jpeg"),
        ])
        .unwrap();
        assert_eq!(config.device_index(), 2);
        assert_eq!(config.capture_resolution(), Resolution::new(640, 480));
        assert_eq!(config.window_resolution(), Resolution::new(480, 640));
        assert_eq!(config.title(), "mirror");
        assert_eq!(config.fps(), 60);
        assert_eq!(config.layout(), ArrayLayout::RowMajor);
        assert!(config.fit_window());
        assert_eq!(config.jpeg_backend(), JpegBackend::ZuneJpeg);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (key, value) in [
            ("CAMVIEW_DEVICE", "-1"),
            ("CAMVIEW_RESOLUTION", "big"),
            ("CAMVIEW_FPS", "fast"),
            ("CAMVIEW_LAYOUT", "sideways"),
            ("CAMVIEW_FIT_WINDOW", "maybe"),
            ("CAMVIEW_JPEG_BACKEND", "turbojpeg"),
        ] {
            let err = lookup(&[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn builder() {
        let config = Config::default()
            .with_device_index(1)
            .with_fps(0)
            .with_title("x")
            .with_fit_window(true);
        assert_eq!(config.device_index(), 1);
        assert_eq!(config.fps(), 0);
        assert_eq!(config.title(), "x");
        assert!(config.fit_window());
    }
}
