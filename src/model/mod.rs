//! Model loading and the inference backend seam.

mod loader;

pub use loader::OnnxBackend;

use ndarray::Array4;

use crate::error::Result;
use crate::image::ImageTensor;

/// Metadata describing a loaded restoration model.
///
/// Dimensions are `None` when the model declares them as dynamic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Name of the first model input.
    pub input_name: String,
    /// Declared input channel count.
    pub channels: Option<usize>,
    /// Declared input height.
    pub height: Option<usize>,
    /// Declared input width.
    pub width: Option<usize>,
    /// Number of model outputs.
    pub output_count: usize,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            input_name: "input".to_string(),
            channels: None,
            height: None,
            width: None,
            output_count: 1,
        }
    }
}

/// Something that can run a batched NCHW face tensor through a restoration network.
///
/// [`OnnxBackend`] is the production implementation. The augmentor is generic
/// over this trait so the pre/post-processing can run without a model file.
pub trait InferenceBackend {
    /// Run inference on a `(batch, channels, height, width)` tensor.
    ///
    /// Returns every model output; batch positions match the input.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime fails or produces a malformed output.
    fn run(&mut self, batch: &ImageTensor) -> Result<Vec<Array4<f32>>>;

    /// Return metadata about the loaded model.
    fn info(&self) -> &ModelInfo;
}
