//! # faceaugment
//!
//! Face restoration with a GFPGAN-style ONNX model.
//!
//! Two pre-aligned face crops are resized to the model's canonical face size,
//! normalized to `[-1, 1]`, run through the network in a single batch, and
//! converted back to images sized like their inputs. When the crops were
//! produced by an alignment transform, the restored face can be unwarped back
//! into frame coordinates together with a soft blend mask for pasting.
//!
//! ## Example
//!
//! ```no_run
//! use faceaugment::{image, Config, FaceAugmentor};
//!
//! # fn main() -> faceaugment::Result<()> {
//! let mut augmentor = FaceAugmentor::open("GFPGANv1.4.onnx", Config::default())?;
//!
//! let first = image::load_image("first_crop.png")?;
//! let second = image::load_image("second_crop.png")?;
//! let restored = augmentor.forward(&first, &second)?;
//!
//! image::save_image(&restored.first, "first_restored.jpg", 95)?;
//! image::save_image(&restored.second, "second_restored.jpg", 95)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, Result};
pub use model::{InferenceBackend, ModelInfo, OnnxBackend};
pub use pipeline::{AffineMatrix, AlignMode, BlendMask, ChannelOrder, Config, FaceAugmentor, Restored};
