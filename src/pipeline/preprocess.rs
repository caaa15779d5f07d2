//! Image to tensor conversion.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use crate::error::{Error, Result};
use crate::image::{ImageTensor, RGB_CHANNELS};

use super::ChannelOrder;

/// Per-channel normalization mean.
const MEAN: f32 = 0.5;

/// Per-channel normalization standard deviation.
const STD: f32 = 0.5;

/// Convert a face crop to a normalized `(1, 3, height, width)` tensor.
///
/// The image is:
/// 1. Downsampled to half its size
/// 2. Resized to the `width` x `height` face canvas
/// 3. Scaled to [0, 1] and reordered to the model's channel order
/// 4. Normalized with mean 0.5 and std 0.5 to [-1, 1]
/// 5. Returned channel-first with a leading batch axis
///
/// # Errors
///
/// Returns an error if the image is too small to halve.
pub fn preprocess(
    image: &RgbImage,
    width: u32,
    height: u32,
    order: ChannelOrder,
) -> Result<ImageTensor> {
    let (src_w, src_h) = image.dimensions();
    let (half_w, half_h) = (src_w / 2, src_h / 2);
    if half_w == 0 || half_h == 0 {
        return Err(Error::UnsupportedDimensions {
            width: src_w,
            height: src_h,
            reason: "image must be at least 2x2 pixels".to_string(),
        });
    }

    let half = imageops::resize(image, half_w, half_h, FilterType::Triangle);
    let face = imageops::resize(&half, width, height, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height as usize, width as usize));

    for (x, y, pixel) in face.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..RGB_CHANNELS {
            tensor[[0, c, y, x]] = normalize(pixel.0[order.rgb_index(c)]);
        }
    }

    Ok(tensor)
}

/// Map a [0, 255] sample to the model's [-1, 1] range.
#[inline]
fn normalize(value: u8) -> f32 {
    (f32::from(value) / 255.0 - MEAN) / STD
}
