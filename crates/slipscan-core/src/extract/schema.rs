//! Field schemas: which named values each document type carries.

use crate::models::DocumentType;

/// Plain digit run (document and note numbers).
pub const NUMBER: &str = r"\d+";

/// `DD/MM/YYYY`.
pub const DATE: &str = r"\d{2}/\d{2}/\d{4}";

/// `DD/MM/YYYY` with an optional `HH:MM[:SS]`.
pub const DATE_TIME: &str = r"\d{2}/\d{2}/\d{4}(?:\s+\d{2}:\d{2}(?::\d{2})?)?";

/// Brazilian amount, `1.234,56`.
pub const AMOUNT: &str = r"\d{1,3}(?:\.\d{3})*,\d{2}";

/// Brazilian amount with an optional `R$` prefix.
pub const CURRENCY_AMOUNT: &str = r"R?\$?\s*\d{1,3}(?:\.\d{3})*,\d{2}";

pub const SLIP_NUMBER: &str = "Número do Documento";
pub const SLIP_DUE_DATE: &str = "Vencimento";
pub const SLIP_AMOUNT: &str = "Valor do Documento";

pub const INVOICE_NUMBER: &str = "Número da Nota";
pub const INVOICE_ISSUE_DATE: &str = "Data de Emissão";
pub const INVOICE_ISSUE_DATE_TIME: &str = "Data e Hora de Emissão";
pub const INVOICE_TOTAL: &str = "Valor Total da Nota";
pub const INVOICE_SERVICE_TOTAL: &str = "Valor Total do Serviço";

/// One named field and the shape of its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Label searched in the text, also the output key.
    pub name: String,
    /// Regex the value must match.
    pub pattern: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// Ordered set of fields for one document type, plus the two fields that
/// identify a document instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    doc_type: DocumentType,
    fields: Vec<FieldSpec>,
    natural_key: Option<(String, String)>,
}

impl FieldSchema {
    pub fn new(doc_type: DocumentType, fields: Vec<FieldSpec>) -> Self {
        Self {
            doc_type,
            fields,
            natural_key: None,
        }
    }

    /// Set the natural key fields.
    pub fn with_natural_key(mut self, first: &str, second: &str) -> Self {
        self.natural_key = Some((first.to_string(), second.to_string()));
        self
    }

    /// Built-in schema of a document type.
    pub fn for_type(doc_type: DocumentType) -> Self {
        match doc_type {
            DocumentType::PaymentSlip => Self::new(
                doc_type,
                vec![
                    FieldSpec::new(SLIP_NUMBER, NUMBER),
                    FieldSpec::new(SLIP_DUE_DATE, DATE),
                    FieldSpec::new(SLIP_AMOUNT, AMOUNT),
                ],
            )
            .with_natural_key(SLIP_DUE_DATE, SLIP_NUMBER),
            DocumentType::Invoice => Self::new(
                doc_type,
                vec![
                    FieldSpec::new(INVOICE_NUMBER, NUMBER),
                    FieldSpec::new(INVOICE_ISSUE_DATE, DATE_TIME),
                    FieldSpec::new(INVOICE_ISSUE_DATE_TIME, DATE_TIME),
                    FieldSpec::new(INVOICE_TOTAL, CURRENCY_AMOUNT),
                    FieldSpec::new(INVOICE_SERVICE_TOTAL, CURRENCY_AMOUNT),
                ],
            )
            .with_natural_key(INVOICE_ISSUE_DATE_TIME, INVOICE_NUMBER),
            DocumentType::Unknown => Self::new(doc_type, Vec::new()),
        }
    }

    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Natural key field names, `None` for types without one.
    pub fn natural_key(&self) -> Option<(&str, &str)> {
        self.natural_key
            .as_ref()
            .map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slip_schema() {
        let schema = FieldSchema::for_type(DocumentType::PaymentSlip);
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["Número do Documento", "Vencimento", "Valor do Documento"]
        );
        assert_eq!(
            schema.natural_key(),
            Some(("Vencimento", "Número do Documento"))
        );
    }

    #[test]
    fn test_invoice_key_fields_are_in_schema() {
        let schema = FieldSchema::for_type(DocumentType::Invoice);
        let (a, b) = schema.natural_key().unwrap();
        assert!(schema.names().any(|n| n == a));
        assert!(schema.names().any(|n| n == b));
    }

    #[test]
    fn test_unknown_schema_is_empty() {
        let schema = FieldSchema::for_type(DocumentType::Unknown);
        assert!(schema.is_empty());
        assert_eq!(schema.natural_key(), None);
    }
}
