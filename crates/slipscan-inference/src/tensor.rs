//! Tensor types for inference input/output.

use ndarray::{ArrayD, Axis, IxDyn};

use crate::{InferenceError, Result};

/// Element types understood by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Int64,
}

/// Input tensor for inference.
///
/// Token ids and attention masks are `Int64`; `Float32` covers models that
/// take pre-computed embeddings.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl InputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
            InputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            InputTensor::Float32(_) => TensorType::Float32,
            InputTensor::Int64(_) => TensorType::Int64,
        }
    }

    /// Create an Int64 tensor from raw data and shape.
    pub fn from_i64(data: Vec<i64>, shape: &[usize]) -> Result<Self> {
        let len = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Int64)
            .map_err(|_| InferenceError::Shape {
                shape: shape.to_vec(),
                len,
            })
    }

    /// Create a Float32 tensor from raw data and shape.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let len = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Float32)
            .map_err(|_| InferenceError::Shape {
                shape: shape.to_vec(),
                len,
            })
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl OutputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Index of the largest value along the last axis of the first row.
    ///
    /// For classifier logits shaped `[batch, classes]` this is the predicted
    /// class of the first sequence. Returns `None` for empty or non-float
    /// tensors.
    pub fn argmax_first_row(&self) -> Option<usize> {
        let arr = self.as_f32()?;
        let row = if arr.ndim() > 1 {
            arr.index_axis(Axis(0), 0).to_owned()
        } else {
            arr.clone()
        };

        row.iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}
