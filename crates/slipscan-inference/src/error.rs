//! Error types for the inference layer.

use thiserror::Error;

/// Errors that can occur while loading or running an ONNX model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model file could not be parsed or committed to a session.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Session options were rejected by the runtime.
    #[error("failed to configure session: {0}")]
    Session(String),

    /// Tensor data does not fit the requested shape.
    #[error("tensor shape {shape:?} does not hold {len} elements")]
    Shape { shape: Vec<usize>, len: usize },

    /// The runtime refused an input tensor.
    #[error("invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    /// Inference execution failed.
    #[error("inference failed: {0}")]
    Run(String),

    /// An output tensor had an unsupported element type or layout.
    #[error("failed to extract output: {0}")]
    Output(String),

    /// I/O error when loading model files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
