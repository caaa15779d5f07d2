//! Face restoration pipeline.

pub mod affine;
pub mod mask;
mod postprocess;
mod preprocess;

pub use affine::AffineMatrix;
pub use mask::BlendMask;
pub use postprocess::{paste_back_matrix, postprocess};
pub use preprocess::preprocess;

use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use ndarray::{Array4, ArrayView3, Axis};

use crate::error::{Error, Result};
use crate::image::{ImageTensor, FACE_SIZE, RGB_CHANNELS};
use crate::model::{InferenceBackend, OnnxBackend};

/// Channel order the network expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
}

impl ChannelOrder {
    /// Index into an RGB pixel for tensor channel `channel`.
    ///
    /// The mapping is its own inverse, so it also gives the tensor channel for
    /// an RGB index.
    #[must_use]
    pub const fn rgb_index(self, channel: usize) -> usize {
        match self {
            Self::Rgb => channel,
            Self::Bgr => 2 - channel,
        }
    }
}

/// How restored faces are mapped back to their targets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AlignMode {
    /// Resize the restored face to the target size.
    #[default]
    Direct,
    /// Unwarp the restored face with the inverse of this alignment transform.
    Affine(AffineMatrix),
}

/// Configuration for the face restoration pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Face canvas size, used when the model declares dynamic spatial dims.
    pub face_size: u32,

    /// Output magnification applied when pasting back in affine mode.
    pub upscale_factor: u32,

    /// Channel order the model expects.
    pub channel_order: ChannelOrder,

    /// Direct resize or affine paste-back.
    pub align: AlignMode,

    /// JPEG quality for saved outputs (1-100).
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            face_size: FACE_SIZE,
            upscale_factor: 2,
            channel_order: ChannelOrder::Rgb,
            align: AlignMode::Direct,
            output_quality: 95,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.face_size == 0 {
            return Err(Error::InvalidParameter {
                name: "face_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.upscale_factor == 0 {
            return Err(Error::InvalidParameter {
                name: "upscale_factor".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }
}

/// Two restored faces and the blend mask of the first.
#[derive(Debug, Clone)]
pub struct Restored {
    /// Restoration of the first input, sized like it.
    pub first: RgbImage,
    /// Restoration of the second input, sized like it.
    pub second: RgbImage,
    /// Blend mask for pasting `first` onto its background.
    pub mask: BlendMask,
}

/// Restores face crops with a GFPGAN-style network.
pub struct FaceAugmentor<B = OnnxBackend> {
    config: Config,
    backend: B,
    canvas: (u32, u32),
}

impl FaceAugmentor<OnnxBackend> {
    /// Load the ONNX model at `model_path` and build an augmentor around it.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid, or if the model cannot be loaded
    /// or is incompatible.
    pub fn open<P: AsRef<Path>>(model_path: P, config: Config) -> Result<Self> {
        config.validate()?;
        let backend = OnnxBackend::load(model_path)?;
        Self::with_backend(backend, config)
    }
}

impl<B: InferenceBackend> FaceAugmentor<B> {
    /// Create an augmentor around an already-loaded backend.
    ///
    /// The face canvas follows the model's declared input height and width,
    /// falling back to `config.face_size` for dynamic dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the model does not
    /// take 3-channel input.
    pub fn with_backend(backend: B, config: Config) -> Result<Self> {
        config.validate()?;

        let info = backend.info();
        if let Some(channels) = info.channels.filter(|&c| c != RGB_CHANNELS) {
            return Err(Error::ShapeMismatch {
                expected: format!("{RGB_CHANNELS} input channels"),
                actual: format!("{channels} input channels"),
            });
        }

        let canvas = (
            declared_or(info.width, config.face_size)?,
            declared_or(info.height, config.face_size)?,
        );

        tracing::info!(
            "Face augmentor ready: canvas {}x{}, {:?}, upscale {}",
            canvas.0,
            canvas.1,
            config.align,
            config.upscale_factor
        );

        Ok(Self {
            config,
            backend,
            canvas,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The inference backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Face canvas `(width, height)` fed to the network.
    #[must_use]
    pub const fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    /// Switch between direct resizing and affine paste-back.
    pub fn set_align(&mut self, align: AlignMode) {
        self.config.align = align;
    }

    /// Convert a face crop to a `(1, 3, height, width)` model input.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is too small to halve.
    pub fn preprocess(&self, image: &RgbImage) -> Result<ImageTensor> {
        let (width, height) = self.canvas;
        preprocess(image, width, height, self.config.channel_order)
    }

    /// Run a batch through the network.
    ///
    /// The first output must carry at least as many batch entries as the input.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the output batch is short.
    pub fn run(&mut self, batch: &ImageTensor) -> Result<Vec<Array4<f32>>> {
        tracing::debug!("Running inference on batch {:?}", batch.shape());

        let outputs = self.backend.run(batch)?;

        let first = outputs.first().ok_or_else(|| Error::ShapeMismatch {
            expected: "at least one output".to_string(),
            actual: "no output".to_string(),
        })?;
        if first.len_of(Axis(0)) < batch.len_of(Axis(0)) {
            return Err(Error::ShapeMismatch {
                expected: format!("batch of {}", batch.len_of(Axis(0))),
                actual: format!("batch of {}", first.len_of(Axis(0))),
            });
        }

        tracing::debug!("Inference produced {} output(s), first {:?}", outputs.len(), first.shape());
        Ok(outputs)
    }

    /// Convert one restored `(3, height, width)` tensor to an image and blend mask
    /// sized `target_width` x `target_height`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor or target is malformed, or the alignment
    /// matrix is singular.
    pub fn postprocess(
        &self,
        output: ArrayView3<'_, f32>,
        target_height: u32,
        target_width: u32,
    ) -> Result<(RgbImage, BlendMask)> {
        postprocess(
            output,
            target_height,
            target_width,
            self.config.channel_order,
            &self.config.align,
            self.config.upscale_factor,
        )
    }

    /// Restore two face crops with one batched inference call.
    ///
    /// Each output is sized like its own input. The returned mask belongs to
    /// the first image.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails.
    pub fn forward(&mut self, first: &RgbImage, second: &RgbImage) -> Result<Restored> {
        let first_tensor = self.preprocess(first)?;
        let second_tensor = self.preprocess(second)?;
        let batch = ndarray::concatenate(Axis(0), &[first_tensor.view(), second_tensor.view()])
            .map_err(|err| Error::ShapeMismatch {
                expected: "matching face tensors".to_string(),
                actual: err.to_string(),
            })?;

        let start = Instant::now();
        let outputs = self.run(&batch)?;
        tracing::info!("Inference took {:.3}s", start.elapsed().as_secs_f64());

        let restored = &outputs[0];
        let (first_img, mask) =
            self.postprocess(restored.index_axis(Axis(0), 0), first.height(), first.width())?;
        let (second_img, _) =
            self.postprocess(restored.index_axis(Axis(0), 1), second.height(), second.width())?;

        tracing::debug!("Restore finished in {:.3}s", start.elapsed().as_secs_f64());

        Ok(Restored {
            first: first_img,
            second: second_img,
            mask,
        })
    }

    /// Restore a single face and paste it into `frame`.
    ///
    /// The face is postprocessed against the frame's size and composited with
    /// its blend mask. In direct mode this replaces the whole frame.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails.
    pub fn restore_into_frame(&mut self, face: &RgbImage, frame: &RgbImage) -> Result<RgbImage> {
        let batch = self.preprocess(face)?;

        let start = Instant::now();
        let outputs = self.run(&batch)?;
        tracing::info!("Inference took {:.3}s", start.elapsed().as_secs_f64());

        let (restored, mask) =
            self.postprocess(outputs[0].index_axis(Axis(0), 0), frame.height(), frame.width())?;

        mask.composite(&restored, frame)
    }
}

fn declared_or(declared: Option<usize>, fallback: u32) -> Result<u32> {
    declared.map_or(Ok(fallback), |dim| {
        u32::try_from(dim).map_err(|_| Error::InvalidParameter {
            name: "model input".to_string(),
            reason: format!("dimension {dim} is too large"),
        })
    })
}
