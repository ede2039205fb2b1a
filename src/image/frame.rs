use std::fmt;

use anyhow::bail;
use image::RgbImage;

use super::Resolution;

/// A packed 8-bit image in blue-green-red channel order, as delivered by a capture device.
///
/// The data is laid out row by row, `height x width x 3` bytes in total.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    res: Resolution,
    data: Vec<u8>,
}

impl Frame {
    /// Creates a frame from packed BGR8 pixel data.
    ///
    /// # Panics
    ///
    /// This will panic if `data` does not hold exactly `width * height * 3` bytes.
    pub fn from_bgr8(res: Resolution, data: Vec<u8>) -> Self {
        let expected_size = Self::byte_len(res);
        assert_eq!(
            expected_size,
            data.len(),
            "incorrect buffer size {} for {} frame (expected {} bytes)",
            data.len(),
            res,
            expected_size,
        );

        Self { res, data }
    }

    /// Creates a frame from an RGB image by reordering its channels.
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let mut data = rgb.as_raw().clone();
        swap_red_blue(&mut data);
        Self {
            res: Resolution::new(rgb.width(), rgb.height()),
            data,
        }
    }

    /// Converts a packed YUYV 4:2:2 buffer (`Y0 U Y1 V` per pixel pair) to a frame.
    ///
    /// Rows start every `stride` bytes, which may be more than the `width * 2` bytes of pixel data
    /// a row holds. A `stride` of 0 means the rows are tightly packed. Padding at the end of each
    /// row and trailing bytes past the last row are ignored.
    ///
    /// Uses the limited-range BT.601 coefficients most webcams encode with.
    pub fn from_yuyv(res: Resolution, stride: usize, yuyv: &[u8]) -> anyhow::Result<Self> {
        if res.width() % 2 != 0 {
            bail!("YUYV frame width must be even, got {}", res);
        }
        let row_len = res.width() as usize * 2;
        let stride = if stride == 0 { row_len } else { stride };
        if stride < row_len {
            bail!(
                "YUYV stride of {} bytes is too small for {} frame (need at least {})",
                stride,
                res,
                row_len,
            );
        }
        let needed = match res.height() as usize {
            0 => 0,
            h => stride * (h - 1) + row_len,
        };
        if yuyv.len() < needed {
            bail!(
                "short YUYV buffer for {} frame: {} bytes (expected {})",
                res,
                yuyv.len(),
                needed,
            );
        }

        let mut data = Vec::with_capacity(Self::byte_len(res));
        for row in yuyv.chunks(stride).take(res.height() as usize) {
            for chunk in row[..row_len].chunks_exact(4) {
                let &[y0, u, y1, v] = chunk else { unreachable!() };
                data.extend_from_slice(&yuv_to_bgr(y0, u, v));
                data.extend_from_slice(&yuv_to_bgr(y1, u, v));
            }
        }

        Ok(Self { res, data })
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.res
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.res.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.res.height()
    }

    /// Returns the `[blue, green, red]` value of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this frame.
    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        assert!(
            x < self.width() && y < self.height(),
            "pixel ({x}, {y}) out of bounds for {} frame",
            self.res,
        );
        let i = (y as usize * self.width() as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Returns the packed BGR8 pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn byte_len(res: Resolution) -> usize {
        res.num_pixels() as usize * 3
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Frame", self.res)
    }
}

/// Swaps the first and third channel of every packed 3-byte pixel.
pub(crate) fn swap_red_blue(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
}

fn yuv_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;

    let clamp = |x: i32| (x >> 8).clamp(0, 255) as u8;
    let r = clamp(298 * c + 409 * e + 128);
    let g = clamp(298 * c - 100 * d - 208 * e + 128);
    let b = clamp(298 * c + 516 * d + 128);
    [b, g, r]
}
