//! Learned document classifier: a sequence classification ONNX model with a
//! HuggingFace tokenizer.

use std::path::Path;

use slipscan_inference::{InferenceBackend, InputTensor, OrtBackend};
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use super::{KeywordClassifier, TextClassifier};
use crate::error::ClassifierError;
use crate::models::DocumentType;
use crate::models::config::ClassificationConfig;
use crate::normalize::mask_volatile;

/// ONNX text classifier over masked, truncated input.
pub struct OnnxTextClassifier {
    backend: Box<dyn InferenceBackend>,
    tokenizer: Tokenizer,
    labels: Vec<DocumentType>,
    max_input_tokens: usize,
    fallback: Option<KeywordClassifier>,
}

impl OnnxTextClassifier {
    /// Load `model.onnx` and `tokenizer.json` from a directory.
    pub fn from_dir(model_dir: &Path, config: &ClassificationConfig) -> Result<Self, ClassifierError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(ClassifierError::ModelLoad(format!(
                "{} not found",
                model_path.display()
            )));
        }

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ClassifierError::Tokenizer(format!("{}: {}", tokenizer_path.display(), e)))?;

        let backend = OrtBackend::from_file(&model_path)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        Ok(Self::new(Box::new(backend), tokenizer, config))
    }

    /// Build around an already loaded backend and tokenizer.
    pub fn new(
        backend: Box<dyn InferenceBackend>,
        tokenizer: Tokenizer,
        config: &ClassificationConfig,
    ) -> Self {
        Self {
            backend,
            tokenizer,
            labels: config.labels.iter().map(|l| label_to_type(l)).collect(),
            max_input_tokens: config.max_input_tokens.max(1),
            fallback: None,
        }
    }

    /// Classifier used when inference fails on a document.
    pub fn with_fallback(mut self, fallback: KeywordClassifier) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Run the model and return the predicted type.
    pub fn predict(&self, text: &str) -> Result<DocumentType, ClassifierError> {
        let masked = mask_volatile(text);
        let encoding = self
            .tokenizer
            .encode(masked.as_str(), true)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

        let len = encoding.get_ids().len().min(self.max_input_tokens);
        let ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&x| x as i64).collect();
        let mask: Vec<i64> = encoding.get_attention_mask()[..len]
            .iter()
            .map(|&x| x as i64)
            .collect();

        let input_ids = InputTensor::from_i64(ids, &[1, len])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let attention_mask = InputTensor::from_i64(mask, &[1, len])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let outputs = self
            .backend
            .run(&[("input_ids", input_ids), ("attention_mask", attention_mask)])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let (_, logits) = outputs
            .first()
            .ok_or_else(|| ClassifierError::Inference("model produced no outputs".to_string()))?;

        let index = logits
            .argmax_first_row()
            .ok_or_else(|| ClassifierError::Inference("logits are empty".to_string()))?;

        debug!("Classifier predicted label index {}", index);

        Ok(self.labels.get(index).copied().unwrap_or(DocumentType::Unknown))
    }
}

impl TextClassifier for OnnxTextClassifier {
    fn classify(&self, text: &str) -> DocumentType {
        match self.predict(text) {
            Ok(doc_type) => doc_type,
            Err(e) => {
                warn!("Learned classifier failed: {}", e);
                match &self.fallback {
                    Some(keywords) => keywords.classify(text),
                    None => DocumentType::Unknown,
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

/// Map a model label to a document type.
fn label_to_type(label: &str) -> DocumentType {
    match label.trim().to_uppercase().as_str() {
        "NF" => DocumentType::Invoice,
        "BOLETO" => DocumentType::PaymentSlip,
        _ => DocumentType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping() {
        assert_eq!(label_to_type("NF"), DocumentType::Invoice);
        assert_eq!(label_to_type(" boleto "), DocumentType::PaymentSlip);
        assert_eq!(label_to_type("OUTRO"), DocumentType::Unknown);
    }

    #[test]
    fn test_missing_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxTextClassifier::from_dir(dir.path(), &ClassificationConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }
}
