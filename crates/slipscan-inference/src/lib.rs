//! ONNX inference abstraction layer for slipscan.
//!
//! The learned document classifier talks to its model through the
//! [`InferenceBackend`] trait so the tokenization and label mapping can be
//! tested without an ONNX runtime. The `native` feature provides
//! [`OrtBackend`], backed by ONNX Runtime with the XNNPACK execution provider.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
