//! ONNX Runtime (ort) backend for native platforms with XNNPACK.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::debug;

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

/// Backend using ONNX Runtime for native inference.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OrtBackend {
    /// Load a model from a file path with the default thread count.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_threads(path, 4)
    }

    /// Load a model from a file path, limiting intra-op parallelism.
    pub fn from_file_with_threads<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading ONNX model from: {}", path.display());

        let bytes = std::fs::read(path)?;

        let session = Session::builder()
            .map_err(|e| InferenceError::Session(e.to_string()))?
            .with_execution_providers([XNNPACK::default().build()])
            .map_err(|e| InferenceError::Session(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Session(e.to_string()))?
            .with_intra_threads(threads)
            .map_err(|e| InferenceError::Session(e.to_string()))?
            .commit_from_memory(&bytes)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        debug!("Model inputs: {:?}, outputs: {:?}", input_names, output_names);

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }

    fn convert_input(name: &str, tensor: &InputTensor) -> Result<SessionInputValue<'static>> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&s| s as i64).collect();
        let converted = match tensor {
            InputTensor::Int64(arr) => {
                let data: Vec<i64> = arr.iter().copied().collect();
                Tensor::from_array((shape, data)).map(Into::into)
            }
            InputTensor::Float32(arr) => {
                let data: Vec<f32> = arr.iter().copied().collect();
                Tensor::from_array((shape, data)).map(Into::into)
            }
        };

        converted.map_err(|e| InferenceError::InvalidInput {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

fn to_array<T: Clone>(shape: &[i64], data: &[T]) -> Result<ArrayD<T>> {
    let shape: Vec<usize> = shape.iter().map(|&s| s as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
        .map_err(|e| InferenceError::Output(e.to_string()))
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let ort_inputs: Vec<(&str, SessionInputValue<'static>)> = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, Self::convert_input(name, tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Run(format!("session lock poisoned: {}", e)))?;

        let outputs = session
            .run(ort_inputs)
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());

        for (name, value) in outputs.iter() {
            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                OutputTensor::Float32(to_array(shape, data)?)
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
                OutputTensor::Int64(to_array(shape, data)?)
            } else {
                return Err(InferenceError::Output(format!(
                    "unsupported output type for '{}'",
                    name
                )));
            };

            results.push((name.to_string(), tensor));
        }

        Ok(results)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
