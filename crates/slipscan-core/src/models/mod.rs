//! Data models for documents, extracted fields and configuration.

pub mod config;
pub mod document;

pub use config::SlipscanConfig;
pub use document::{DocumentType, ExtractedFields, FieldValue, ProcessingResult, NOT_FOUND};
