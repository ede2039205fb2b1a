//! Color and geometry transforms turning captured [`Frame`]s into displayable [`Image`]s.

use std::str::FromStr;

use anyhow::bail;
use image::{imageops, RgbImage};

use crate::image::{swap_red_blue, Frame, Image, Resolution};

/// Determines how a pixel array is interpreted when a surface is built from it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLayout {
    /// Array rows become surface rows: the pixel at row `r`, column `c` ends up at `(x, y) = (c, r)`.
    ///
    /// A rotated `W x H` frame becomes an `H x W` surface, so it only fills a window of the
    /// transposed size.
    RowMajor,
    /// The first array axis is the surface's X axis: the pixel at row `r`, column `c` ends up at
    /// `(x, y) = (r, c)`.
    ///
    /// This transposes the array. Following a counter-clockwise rotation with a transpose and a
    /// horizontal mirror yields the original orientation, so frames are displayed upright and at
    /// their capture size.
    #[default]
    ColumnMajor,
}

impl FromStr for ArrayLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "row-major" => Ok(Self::RowMajor),
            "column-major" => Ok(Self::ColumnMajor),
            _ => bail!("unknown array layout '{s}' (expected `row-major` or `column-major`)"),
        }
    }
}

/// Converts a BGR frame to an RGB image.
pub fn bgr_to_rgb(frame: &Frame) -> RgbImage {
    let mut data = frame.data().to_vec();
    swap_red_blue(&mut data);
    RgbImage::from_raw(frame.width(), frame.height(), data)
        .expect("frame size does not match its resolution")
}

/// Rotates an image by 90° counter-clockwise.
pub fn rotate_ccw(image: &RgbImage) -> RgbImage {
    imageops::rotate270(image)
}

/// Builds a drawable surface from a pixel array.
pub fn make_surface(array: &RgbImage, layout: ArrayLayout) -> Image {
    match layout {
        ArrayLayout::RowMajor => Image::from_rgb(array.clone()),
        ArrayLayout::ColumnMajor => {
            let transposed = RgbImage::from_fn(array.height(), array.width(), |x, y| {
                *array.get_pixel(y, x)
            });
            Image::from_rgb(transposed)
        }
    }
}

/// The per-frame transform of the display loop.
///
/// Applies, in order:
///
/// 1. BGR to RGB conversion ([`bgr_to_rgb`]),
/// 2. a rotation by 90° counter-clockwise ([`rotate_ccw`]),
/// 3. surface construction according to the [`ArrayLayout`] ([`make_surface`]),
/// 4. a horizontal mirror.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameTransform {
    layout: ArrayLayout,
}

impl FrameTransform {
    pub fn new(layout: ArrayLayout) -> Self {
        Self { layout }
    }

    pub fn apply(&self, frame: &Frame) -> Image {
        let rgb = bgr_to_rgb(frame);
        let rotated = rotate_ccw(&rgb);
        let mut surface = make_surface(&rotated, self.layout);
        surface.flip_horizontal_in_place();
        surface
    }

    /// Returns the size of the [`Image`] that [`FrameTransform::apply`] produces for frames of
    /// size `frame`.
    pub fn output_resolution(&self, frame: Resolution) -> Resolution {
        match self.layout {
            ArrayLayout::RowMajor => frame.transposed(),
            ArrayLayout::ColumnMajor => frame,
        }
    }
}
