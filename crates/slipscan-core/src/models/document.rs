//! Document types, extracted field values and per-document results.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Marker persisted and exported for a field that was looked for but absent.
pub const NOT_FOUND: &str = "not found";

/// Portuguese marker written by older ledgers.
const LEGACY_NOT_FOUND: &str = "Não encontrado";

/// Kind of financial document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    /// Service or goods invoice ("Nota Fiscal").
    #[serde(rename = "NF")]
    Invoice,
    /// Bank payment slip ("Boleto").
    #[serde(rename = "BOLETO")]
    PaymentSlip,
    /// Neither indicator vocabulary matched.
    #[serde(rename = "DESCONHECIDO")]
    Unknown,
}

impl DocumentType {
    /// Label used in the ledger, the export and the rename suffix.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "NF",
            DocumentType::PaymentSlip => "BOLETO",
            DocumentType::Unknown => "DESCONHECIDO",
        }
    }

    /// All variants, in label order.
    pub fn all() -> [DocumentType; 3] {
        [
            DocumentType::Invoice,
            DocumentType::PaymentSlip,
            DocumentType::Unknown,
        ]
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value of one extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// Matched text, exactly as it appeared in the document.
    Found(String),
    /// Label present but no value in the window.
    NotFound,
}

impl FieldValue {
    /// The matched text, if any.
    pub fn as_found(&self) -> Option<&str> {
        match self {
            FieldValue::Found(v) => Some(v),
            FieldValue::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }

    /// Cell/ledger rendering.
    pub fn as_str(&self) -> &str {
        self.as_found().unwrap_or(NOT_FOUND)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldValueVisitor;

        impl<'de> Visitor<'de> for FieldValueVisitor {
            type Value = FieldValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string, a not-found marker or null")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
                if v == NOT_FOUND || v == LEGACY_NOT_FOUND {
                    Ok(FieldValue::NotFound)
                } else {
                    Ok(FieldValue::Found(v.to_string()))
                }
            }

            fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
                Ok(FieldValue::NotFound)
            }

            fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
                Ok(FieldValue::NotFound)
            }
        }

        deserializer.deserialize_any(FieldValueVisitor)
    }
}

/// Field name to value. Every field of the active schema is a key once the
/// document has been fully processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFields(BTreeMap<String, FieldValue>);

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Matched text of a field, `None` when absent or not found.
    pub fn found(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(FieldValue::as_found)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    /// Merge a later page's result: found values never get overwritten and
    /// `NotFound` never replaces anything.
    pub fn merge(&mut self, other: ExtractedFields) {
        for (name, value) in other.0 {
            match self.0.get(&name) {
                Some(FieldValue::Found(_)) => {}
                Some(FieldValue::NotFound) => {
                    if value.is_found() {
                        self.0.insert(name, value);
                    }
                }
                None => {
                    self.0.insert(name, value);
                }
            }
        }
    }

    /// Whether each of `names` has a found value.
    pub fn all_found<'a>(&self, mut names: impl Iterator<Item = &'a str>) -> bool {
        names.all(|n| self.found(n).is_some())
    }

    /// Add any of `names` still missing as not found.
    pub fn fill_missing<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.0
                .entry(name.to_string())
                .or_insert(FieldValue::NotFound);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, FieldValue)> for ExtractedFields {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of processing one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    /// File name before renaming.
    pub original_name: String,
    /// File name after the type suffix was applied.
    pub renamed_name: String,
    /// Detected type. Meaningless when `error` is set.
    pub doc_type: DocumentType,
    pub fields: ExtractedFields,
    /// Failure that stopped processing of this document.
    pub error: Option<String>,
}

impl ProcessingResult {
    /// Result for a document that failed before classification finished.
    pub fn failed(original_name: impl Into<String>, error: impl Into<String>) -> Self {
        let original_name = original_name.into();
        Self {
            renamed_name: original_name.clone(),
            original_name,
            doc_type: DocumentType::Unknown,
            fields: ExtractedFields::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Type column: the label, or `ERRO: <message>` for failures.
    pub fn type_label(&self) -> String {
        match &self.error {
            Some(message) => format!("ERRO: {}", message),
            None => self.doc_type.label().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labels_roundtrip_through_serde() {
        for t in DocumentType::all() {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.label()));
            assert_eq!(serde_json::from_str::<DocumentType>(&json).unwrap(), t);
        }
    }

    #[test]
    fn test_field_value_reads_legacy_markers() {
        let fields: ExtractedFields = serde_json::from_str(
            r#"{"a": "12", "b": "not found", "c": null, "d": "Não encontrado"}"#,
        )
        .unwrap();

        assert_eq!(fields.found("a"), Some("12"));
        assert_eq!(fields.get("b"), Some(&FieldValue::NotFound));
        assert_eq!(fields.get("c"), Some(&FieldValue::NotFound));
        assert_eq!(fields.get("d"), Some(&FieldValue::NotFound));
        assert_eq!(
            serde_json::to_string(&fields).unwrap(),
            r#"{"a":"12","b":"not found","c":"not found","d":"not found"}"#
        );
    }

    #[test]
    fn test_merge_keeps_first_found_value() {
        let mut first = ExtractedFields::new();
        first.insert("Vencimento", FieldValue::Found("10/11/2025".into()));
        first.insert("Número do Documento", FieldValue::NotFound);

        let mut second = ExtractedFields::new();
        second.insert("Vencimento", FieldValue::Found("01/01/2030".into()));
        second.insert("Número do Documento", FieldValue::Found("00123".into()));
        second.insert("Valor do Documento", FieldValue::NotFound);

        first.merge(second);

        assert_eq!(first.found("Vencimento"), Some("10/11/2025"));
        assert_eq!(first.found("Número do Documento"), Some("00123"));
        assert_eq!(first.get("Valor do Documento"), Some(&FieldValue::NotFound));
    }

    #[test]
    fn test_not_found_does_not_replace_found() {
        let mut first = ExtractedFields::new();
        first.insert("a", FieldValue::Found("1".into()));
        let mut second = ExtractedFields::new();
        second.fill_missing(["a"]);
        first.merge(second);
        assert_eq!(first.found("a"), Some("1"));
    }

    #[test]
    fn test_error_type_label() {
        let result = ProcessingResult::failed("x.pdf", "page render failed");
        assert!(result.is_error());
        assert_eq!(result.type_label(), "ERRO: page render failed");
        assert_eq!(result.renamed_name, "x.pdf");
    }
}
