//! Scanned PDF page images read with lopdf.

mod embedded;

pub use embedded::EmbeddedImageRenderer;
