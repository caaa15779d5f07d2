//! ONNX Runtime session loading and execution.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::ImageTensor;

use super::{InferenceBackend, ModelInfo};

/// Restoration network backed by an ONNX Runtime session.
///
/// The session is owned here and released when the backend is dropped.
pub struct OnnxBackend {
    session: Session,
    info: ModelInfo,
}

impl OnnxBackend {
    /// Load an ONNX model session from disk.
    ///
    /// The first input's declared shape determines the expected channel count,
    /// height and width.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be loaded.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(Error::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        tracing::info!("Loading model {}", path.display());

        let session = Session::builder()
            .map_err(|source| Error::ModelLoad {
                path: path.to_path_buf(),
                source,
            })?
            .commit_from_file(path)
            .map_err(|source| Error::ModelLoad {
                path: path.to_path_buf(),
                source,
            })?;

        let info = read_model_info(&session);
        tracing::debug!("Model info: {info:?}");

        Ok(Self { session, info })
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(&mut self, batch: &ImageTensor) -> Result<Vec<Array4<f32>>> {
        let input_value = Tensor::from_array(batch.as_standard_layout().into_owned())
            .map_err(|source| Error::Inference { source })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        let tensors = outputs
            .values()
            .map(|value| extract_array4(&value))
            .collect::<Result<Vec<_>>>()?;

        if tensors.is_empty() {
            return Err(Error::ShapeMismatch {
                expected: "at least one output".to_string(),
                actual: "no output".to_string(),
            });
        }

        Ok(tensors)
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

fn read_model_info(session: &Session) -> ModelInfo {
    let Some(input) = session.inputs.first() else {
        return ModelInfo {
            output_count: session.outputs.len(),
            ..ModelInfo::default()
        };
    };

    let dims: Vec<i64> = input
        .input_type
        .tensor_shape()
        .map(|shape| shape.iter().copied().collect())
        .unwrap_or_default();

    ModelInfo {
        input_name: input.name.clone(),
        channels: declared_dim(&dims, 1),
        height: declared_dim(&dims, 2),
        width: declared_dim(&dims, 3),
        output_count: session.outputs.len(),
    }
}

/// A positive dimension at `index`, or `None` for dynamic/missing dims.
fn declared_dim(dims: &[i64], index: usize) -> Option<usize> {
    dims.get(index)
        .copied()
        .filter(|&d| d > 0)
        .and_then(|d| usize::try_from(d).ok())
}

/// Extract a 4D array from an ONNX value.
fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    let dims = tensor_dims(shape_info)?;

    if dims.len() != 4 {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

/// Convert a concrete tensor shape to `usize` dimensions.
fn tensor_dims(shape: &[i64]) -> Result<Vec<usize>> {
    shape
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| Error::ShapeMismatch {
                expected: "non-negative dimensions".to_string(),
                actual: format!("{shape:?}"),
            })
        })
        .collect()
}
