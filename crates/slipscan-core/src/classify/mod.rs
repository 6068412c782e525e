//! Document type classification.
//!
//! The keyword classifier is always available. A learned ONNX classifier can
//! replace it when the `ml` feature is enabled and a model directory is
//! configured.

mod keywords;
#[cfg(feature = "ml")]
mod learned;

pub use keywords::KeywordClassifier;
#[cfg(feature = "ml")]
pub use learned::OnnxTextClassifier;

use tracing::{info, warn};

use crate::models::DocumentType;
use crate::models::config::ClassificationConfig;

/// Assigns a document type to normalized text.
pub trait TextClassifier: Send + Sync {
    /// Classify one normalized text.
    fn classify(&self, text: &str) -> DocumentType;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Build the configured classifier.
///
/// A configured learned classifier that cannot be loaded is replaced by the
/// keyword classifier with a warning.
pub fn build_classifier(config: &ClassificationConfig) -> Box<dyn TextClassifier> {
    let keywords = KeywordClassifier::from_config(config);

    let Some(model_dir) = config.model_dir.as_ref() else {
        return Box::new(keywords);
    };

    #[cfg(feature = "ml")]
    {
        match OnnxTextClassifier::from_dir(model_dir, config) {
            Ok(learned) => {
                info!("Using learned classifier from {}", model_dir.display());
                return Box::new(learned.with_fallback(keywords));
            }
            Err(e) => {
                warn!(
                    "Failed to load classifier from {}: {}; using keywords",
                    model_dir.display(),
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "ml"))]
    {
        warn!(
            "Classifier model {} configured but built without the `ml` feature; using keywords",
            model_dir.display()
        );
    }

    info!("Using keyword classifier");
    Box::new(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_falls_back_to_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClassificationConfig {
            model_dir: Some(dir.path().join("absent")),
            ..Default::default()
        };

        let classifier = build_classifier(&config);
        assert_eq!(classifier.name(), "keywords");
        assert_eq!(
            classifier.classify("Linha Digitável Nota Fiscal"),
            DocumentType::PaymentSlip
        );
    }

    #[test]
    fn test_default_is_keywords() {
        let classifier = build_classifier(&ClassificationConfig::default());
        assert_eq!(classifier.name(), "keywords");
    }
}
