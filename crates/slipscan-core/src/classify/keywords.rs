//! Priority-ordered keyword classifier.

use tracing::debug;

use super::TextClassifier;
use crate::models::DocumentType;
use crate::models::config::{ClassificationConfig, UnknownPolicy};

/// Case-insensitive substring classifier.
///
/// Slip indicators are checked first and win over invoice indicators.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    slip_indicators: Vec<String>,
    invoice_indicators: Vec<String>,
    unknown_policy: UnknownPolicy,
}

impl KeywordClassifier {
    /// Classifier with the built-in vocabularies and permissive fallback.
    pub fn new() -> Self {
        Self::from_config(&ClassificationConfig::default())
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self {
            slip_indicators: lowercase_all(&config.slip_indicators),
            invoice_indicators: lowercase_all(&config.invoice_indicators),
            unknown_policy: config.unknown_policy,
        }
    }

    /// Set what unmatched text becomes.
    pub fn with_unknown_policy(mut self, policy: UnknownPolicy) -> Self {
        self.unknown_policy = policy;
        self
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TextClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> DocumentType {
        let lower = text.to_lowercase();

        if let Some(hit) = self.slip_indicators.iter().find(|k| lower.contains(k.as_str())) {
            debug!("Slip indicator '{}' matched", hit);
            return DocumentType::PaymentSlip;
        }

        if let Some(hit) = self
            .invoice_indicators
            .iter()
            .find(|k| lower.contains(k.as_str()))
        {
            debug!("Invoice indicator '{}' matched", hit);
            return DocumentType::Invoice;
        }

        match self.unknown_policy {
            UnknownPolicy::Strict => DocumentType::Unknown,
            UnknownPolicy::Permissive => DocumentType::PaymentSlip,
        }
    }

    fn name(&self) -> &'static str {
        "keywords"
    }
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
