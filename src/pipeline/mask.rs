//! Blend masks for pasting restored faces back into a frame.

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array2, Axis};

use crate::error::{Error, Result};

/// Per-pixel weights in `[0, 1]` used to composite a restored face onto a background.
///
/// Stored as a `(height, width)` array indexed `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendMask {
    data: Array2<f32>,
}

impl BlendMask {
    /// A mask that takes every pixel from the restored image.
    #[must_use]
    pub fn ones(width: u32, height: u32) -> Self {
        Self {
            data: Array2::ones((height as usize, width as usize)),
        }
    }

    /// Wrap a `(height, width)` array of weights.
    #[must_use]
    pub const fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Mask width in pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    /// Mask height in pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    /// Weight at `(x, y)`, or `None` outside the mask.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        self.data.get((y as usize, x as usize)).copied()
    }

    /// The underlying `(height, width)` weights.
    #[must_use]
    pub const fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    /// Render the mask as an 8-bit grayscale image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let w = self.data[[y as usize, x as usize]];
            Luma([(w * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Blend `restored` over `background`: `mask * restored + (1 - mask) * background`.
    ///
    /// # Errors
    ///
    /// Returns an error if the images and the mask differ in size.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn composite(&self, restored: &RgbImage, background: &RgbImage) -> Result<RgbImage> {
        let dims = (self.width(), self.height());
        for img in [restored, background] {
            if img.dimensions() != dims {
                return Err(Error::ShapeMismatch {
                    expected: format!("{}x{}", dims.0, dims.1),
                    actual: format!("{}x{}", img.width(), img.height()),
                });
            }
        }

        Ok(RgbImage::from_fn(dims.0, dims.1, |x, y| {
            let w = self.data[[y as usize, x as usize]].clamp(0.0, 1.0);
            let fg = restored.get_pixel(x, y).0;
            let bg = background.get_pixel(x, y).0;
            Rgb(std::array::from_fn(|c| {
                f32::from(fg[c])
                    .mul_add(w, f32::from(bg[c]) * (1.0 - w))
                    .round()
                    .clamp(0.0, 255.0) as u8
            }))
        }))
    }
}

/// Build the soft paste-back mask from a warped all-ones mask.
///
/// Returns the eroded hard mask (used to cut out the pasted face) and the
/// feathered blend mask. The feather width is `floor(sqrt(area)) / 20` where
/// `area` is the sum of the eroded mask.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn soft_mask(inv_mask: &Array2<f32>, upscale_factor: u32) -> (Array2<f32>, BlendMask) {
    let eroded = erode(inv_mask, 2 * upscale_factor as usize);

    let area: f64 = eroded.iter().map(|&v| f64::from(v)).sum();
    let w_edge = edge_width(area);
    if w_edge == 0 {
        if area <= 0.0 {
            tracing::warn!("Pasted face does not overlap the target frame; blend mask is empty");
        } else {
            tracing::debug!("Face area {area:.1} too small for feathering");
        }
    }

    let center = erode(&eroded, w_edge * 2);
    let soft = gaussian_blur(&center, w_edge * 2 + 1);

    (eroded, BlendMask::from_array(soft))
}

/// Feather width for a pasted face of the given area.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn edge_width(area: f64) -> usize {
    if !area.is_finite() || area <= 0.0 {
        return 0;
    }
    (area.sqrt() as usize) / 20
}

/// Grayscale erosion with a `k` x `k` square kernel.
///
/// The kernel anchor sits at `(k / 2, k / 2)`. Taps outside the raster are
/// ignored. `k == 0` returns the input unchanged.
#[must_use]
pub fn erode(src: &Array2<f32>, k: usize) -> Array2<f32> {
    if k <= 1 {
        return src.clone();
    }
    let rows = min_filter_1d(src, Axis(1), k);
    min_filter_1d(&rows, Axis(0), k)
}

fn min_filter_1d(src: &Array2<f32>, axis: Axis, k: usize) -> Array2<f32> {
    let anchor = k / 2;
    let mut out = src.clone();

    for (src_lane, mut out_lane) in src.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = src_lane.len();
        for i in 0..n {
            let start = i.saturating_sub(anchor);
            let end = (i + k - anchor).min(n);
            out_lane[i] = (start..end).fold(f32::INFINITY, |acc, j| acc.min(src_lane[j]));
        }
    }

    out
}

/// Separable Gaussian blur with a `k`-tap kernel and reflect-101 borders.
///
/// Sigma follows the usual kernel-size rule `0.3 * ((k - 1) / 2 - 1) + 0.8`.
/// `k <= 1` returns the input unchanged. `k` is expected to be odd.
#[must_use]
pub fn gaussian_blur(src: &Array2<f32>, k: usize) -> Array2<f32> {
    if k <= 1 {
        return src.clone();
    }
    debug_assert!(k % 2 == 1, "blur kernel must be odd, got {k}");

    let kernel = gaussian_kernel(k);
    let rows = convolve_1d(src, Axis(1), &kernel);
    convolve_1d(&rows, Axis(0), &kernel)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn convolve_1d(src: &Array2<f32>, axis: Axis, kernel: &[f64]) -> Array2<f32> {
    let radius = (kernel.len() / 2) as isize;
    let mut out = src.clone();

    for (src_lane, mut out_lane) in src.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = src_lane.len();
        for i in 0..n {
            let mut acc = 0.0f64;
            for (t, &weight) in kernel.iter().enumerate() {
                let j = reflect_101(i as isize + t as isize - radius, n);
                acc += weight * f64::from(src_lane[j]);
            }
            out_lane[i] = acc as f32;
        }
    }

    out
}

/// Mirror an index into `0..n` without repeating the edge sample (`gfedcb|abcdefgh|gfedcba`).
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn reflect_101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

/// Normalized 1D Gaussian kernel of `k` taps.
///
/// Small kernels use the fixed binomial weights.
#[allow(clippy::cast_precision_loss)]
fn gaussian_kernel(k: usize) -> Vec<f64> {
    match k {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109_375, 0.218_75, 0.281_25, 0.218_75, 0.109_375, 0.03125],
        _ => {
            let sigma = 0.3f64.mul_add((k as f64 - 1.0).mul_add(0.5, -1.0), 0.8);
            let center = (k as f64 - 1.0) * 0.5;
            let weights: Vec<f64> = (0..k)
                .map(|i| {
                    let d = i as f64 - center;
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f64 = weights.iter().sum();
            weights.into_iter().map(|w| w / sum).collect()
        }
    }
}
