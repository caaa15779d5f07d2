//! Tensor to image conversion and paste-back preparation.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3, ArrayView3};

use crate::error::{Error, Result};
use crate::image::RGB_CHANNELS;

use super::affine::{self, AffineMatrix};
use super::mask::{self, BlendMask};
use super::{AlignMode, ChannelOrder};

/// Convert one restored `(3, height, width)` tensor into an image sized
/// `target_width` x `target_height`, plus the mask for blending it onto the
/// original background.
///
/// In [`AlignMode::Direct`] the face is resized to the target and the mask is
/// all ones. In [`AlignMode::Affine`] the face is unwarped into frame
/// coordinates, cut out with the eroded warp mask, and a feathered mask is
/// built for pasting.
///
/// # Errors
///
/// Returns an error if the tensor is not 3-channel, the target is empty, or
/// the alignment matrix is singular.
pub fn postprocess(
    output: ArrayView3<'_, f32>,
    target_height: u32,
    target_width: u32,
    order: ChannelOrder,
    align: &AlignMode,
    upscale_factor: u32,
) -> Result<(RgbImage, BlendMask)> {
    if target_width == 0 || target_height == 0 {
        return Err(Error::UnsupportedDimensions {
            width: target_width,
            height: target_height,
            reason: "target frame is empty".to_string(),
        });
    }

    let canvas = to_canvas(output, order)?;

    match align {
        AlignMode::Direct => {
            let face = canvas_to_image(&canvas);
            let resized = imageops::resize(&face, target_width, target_height, FilterType::Triangle);
            Ok((resized, BlendMask::ones(target_width, target_height)))
        }
        AlignMode::Affine(matrix) => {
            unwarp(&canvas, matrix, target_height, target_width, upscale_factor)
        }
    }
}

/// Inverse matrix used to paste the face canvas back into frame coordinates.
///
/// The alignment inverse is scaled by `upscale_factor`; upscaled outputs also
/// get a half-pixel-per-scale offset on the translation.
///
/// # Errors
///
/// Returns an error if `matrix` is singular.
pub fn paste_back_matrix(matrix: &AffineMatrix, upscale_factor: u32) -> Result<AffineMatrix> {
    let scale = f64::from(upscale_factor);
    let inverse = matrix.invert()?.scaled(scale);
    if upscale_factor > 1 {
        let offset = 0.5 * scale;
        Ok(inverse.translated(offset, offset))
    } else {
        Ok(inverse)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unwarp(
    canvas: &Array3<f32>,
    matrix: &AffineMatrix,
    target_height: u32,
    target_width: u32,
    upscale_factor: u32,
) -> Result<(RgbImage, BlendMask)> {
    let inverse = paste_back_matrix(matrix, upscale_factor)?;
    tracing::debug!("Paste-back matrix: {inverse}");

    let (face_h, face_w, _) = canvas.dim();
    let inv_restored = affine::warp_rgb(canvas, &inverse, target_width, target_height)?;
    let inv_mask = affine::warp_mask(
        &Array2::ones((face_h, face_w)),
        &inverse,
        target_width,
        target_height,
    )?;

    let (eroded, soft) = mask::soft_mask(&inv_mask, upscale_factor);

    let pasted = RgbImage::from_fn(target_width, target_height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let weight = eroded[[y, x]];
        Rgb(std::array::from_fn(|c| {
            (weight * inv_restored[[y, x, c]]).clamp(0.0, 255.0) as u8
        }))
    });

    Ok((pasted, soft))
}

/// Clip, denormalize to rounded [0, 255] values and lay out as `(height, width, rgb)`.
fn to_canvas(output: ArrayView3<'_, f32>, order: ChannelOrder) -> Result<Array3<f32>> {
    let (channels, height, width) = output.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("{RGB_CHANNELS} channels"),
            actual: format!("{channels} channels"),
        });
    }

    Ok(Array3::from_shape_fn((height, width, RGB_CHANNELS), |(y, x, c)| {
        denormalize(output[[order.rgb_index(c), y, x]])
    }))
}

/// Map a [-1, 1] model value to a rounded [0, 255] sample.
#[inline]
fn denormalize(value: f32) -> f32 {
    let unit = (value.clamp(-1.0, 1.0) + 1.0) / 2.0;
    (unit * 255.0).round()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn canvas_to_image(canvas: &Array3<f32>) -> RgbImage {
    let (height, width, _) = canvas.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb(std::array::from_fn(|c| canvas[[y, x, c]].clamp(0.0, 255.0) as u8))
    })
}
