//! Labelled field extraction from normalized page text.
//!
//! A field is looked for only when its label occurs in the text. The value
//! must then start within a bounded number of whitespace-separated tokens
//! after the label.

pub mod schema;

pub use schema::{FieldSchema, FieldSpec};

use regex::Regex;
use tracing::{debug, warn};

use crate::models::{DocumentType, ExtractedFields, FieldValue};

/// Default number of tokens allowed between a label and its value.
pub const DEFAULT_TOKEN_WINDOW: usize = 5;

/// Window-bounded label/value extractor.
///
/// Holds the built-in schemas with their value patterns compiled for the
/// configured token window.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    token_window: usize,
    invoice: CompiledSchema,
    slip: CompiledSchema,
    unknown: CompiledSchema,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_TOKEN_WINDOW)
    }

    /// Set the number of tokens allowed between label and value.
    pub fn with_token_window(self, token_window: usize) -> Self {
        if token_window == self.token_window {
            return self;
        }
        Self::with_window(token_window)
    }

    fn with_window(token_window: usize) -> Self {
        let compile = |t| CompiledSchema::compile(FieldSchema::for_type(t), token_window);
        Self {
            token_window,
            invoice: compile(DocumentType::Invoice),
            slip: compile(DocumentType::PaymentSlip),
            unknown: compile(DocumentType::Unknown),
        }
    }

    /// The compiled built-in schema of a document type.
    pub fn schema(&self, doc_type: DocumentType) -> &CompiledSchema {
        match doc_type {
            DocumentType::Invoice => &self.invoice,
            DocumentType::PaymentSlip => &self.slip,
            DocumentType::Unknown => &self.unknown,
        }
    }

    /// Compile a custom schema for this extractor's token window.
    pub fn compile(&self, schema: FieldSchema) -> CompiledSchema {
        CompiledSchema::compile(schema, self.token_window)
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct FieldMatcher {
    name: String,
    label: String,
    value: Option<Regex>,
}

/// A field schema with one compiled value pattern per field.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    schema: FieldSchema,
    matchers: Vec<FieldMatcher>,
}

impl CompiledSchema {
    fn compile(schema: FieldSchema, token_window: usize) -> Self {
        let matchers = schema
            .fields()
            .iter()
            .map(|spec| FieldMatcher {
                name: spec.name.clone(),
                label: spec.name.to_lowercase(),
                value: value_regex(spec, token_window),
            })
            .collect();
        Self { schema, matchers }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn doc_type(&self) -> DocumentType {
        self.schema.doc_type()
    }

    /// Extract every schema field from one text.
    ///
    /// Fields whose label is absent come back as not found, so every schema
    /// field is a key of the result.
    pub fn extract(&self, text: &str) -> ExtractedFields {
        self.extract_pages([text])
    }

    /// Extract the fields attempted on one page.
    ///
    /// A field whose label does not occur is left out entirely; a field whose
    /// label occurs without a value in the window is `NotFound`.
    pub fn scan_page(&self, text: &str) -> ExtractedFields {
        let lowered = text.to_lowercase();
        let mut fields = ExtractedFields::new();

        for matcher in &self.matchers {
            if !lowered.contains(&matcher.label) {
                continue;
            }

            let value = matcher
                .value
                .as_ref()
                .and_then(|re| re.captures(text))
                .and_then(|caps| caps.get(1))
                .map(|m| FieldValue::Found(m.as_str().trim().to_string()))
                .unwrap_or(FieldValue::NotFound);

            debug!("Field '{}': {}", matcher.name, value);
            fields.insert(matcher.name.clone(), value);
        }

        fields
    }

    /// Merge one more page into `fields`, keeping values already found.
    /// Returns true once every schema field is found.
    pub fn merge_page(&self, fields: &mut ExtractedFields, text: &str) -> bool {
        fields.merge(self.scan_page(text));
        fields.all_found(self.schema.names())
    }

    /// Mark every schema field not seen on any page as not found.
    pub fn finish(&self, mut fields: ExtractedFields) -> ExtractedFields {
        fields.fill_missing(self.schema.names());
        fields
    }

    /// Extract across pages in order, keeping the first found value of each
    /// field. Stops once every schema field is found.
    pub fn extract_pages<'a>(&self, pages: impl IntoIterator<Item = &'a str>) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        for page in pages {
            if self.merge_page(&mut fields, page) {
                break;
            }
        }
        self.finish(fields)
    }
}

fn value_regex(spec: &FieldSpec, token_window: usize) -> Option<Regex> {
    let pattern = format!(
        r"(?i){}[\s:\-]*(?:\S+\s+){{0,{}}}?({})",
        regex::escape(&spec.name),
        token_window,
        spec.pattern
    );

    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Invalid value pattern for field '{}': {}", spec.name, e);
            None
        }
    }
}
