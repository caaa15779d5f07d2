//! Image loading and saving utilities.

mod load;
mod save;

pub use load::load_image;
pub use save::{save_image, save_mask};

use ndarray::Array4;

/// Image tensor in NCHW format (batch, channels, height, width).
/// Values are normalized to [-1, 1].
pub type ImageTensor = Array4<f32>;

/// Canonical face canvas size for GFPGAN models.
pub const FACE_SIZE: u32 = 512;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;
