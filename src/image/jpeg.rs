//! JPEG decoding for Motion JPEG webcams.

use std::str::FromStr;

use anyhow::{anyhow, bail};
use image::RgbImage;
use zune_jpeg::zune_core::{colorspace::ColorSpace, options::DecoderOptions};

use super::Frame;

/// Because computers, we support several different JPEG decoding backends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum JpegBackend {
    /// Uses the `jpeg-decoder` crate (through `image`), a robust but slow pure-Rust JPEG decoder.
    #[default]
    JpegDecoder,
    /// Uses the `zune-jpeg` crate, a pure-Rust JPEG decoder somewhat faster than `jpeg-decoder`.
    ZuneJpeg,
}

impl FromStr for JpegBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg-decoder" => Ok(Self::JpegDecoder),
            "zune-jpeg" => Ok(Self::ZuneJpeg),
            _ => bail!("unknown JPEG backend '{s}' (expected `jpeg-decoder` or `zune-jpeg`)"),
        }
    }
}

/// Decodes a JFIF JPEG or Motion JPEG from a byte slice into a BGR [`Frame`].
pub fn decode_jpeg(data: &[u8], backend: JpegBackend) -> anyhow::Result<Frame> {
    let rgb = match backend {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.into_rgb8()
        }
        JpegBackend::ZuneJpeg => {
            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB),
                data,
            );
            decomp.decode_headers()?;
            let colorspace = decomp
                .get_output_colorspace()
                .ok_or_else(|| anyhow!("JPEG headers were not decoded"))?;
            if colorspace != ColorSpace::RGB {
                bail!("unsupported colorspace {colorspace:?} (expected RGB)");
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| anyhow!("JPEG headers were not decoded"))?;
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow!("JPEG headers were not decoded"))?;
            RgbImage::from_raw(width.into(), height.into(), buf)
                .ok_or_else(|| anyhow!("decoded JPEG has unexpected size"))?
        }
    };

    Ok(Frame::from_rgb(&rgb))
}
