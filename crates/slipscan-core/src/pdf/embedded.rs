//! Page images embedded in scanned PDFs.
//!
//! Scanners store each page as one image XObject. Reading it back avoids
//! rasterization entirely.

use std::path::Path;

use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::OcrError;
use crate::ocr::{PageRenderer, is_image_path, is_pdf_path, load_image_page};

/// Renders pages by extracting their largest embedded image.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedImageRenderer;

impl EmbeddedImageRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Page images of an in-memory PDF.
    pub fn render_bytes(&self, data: &[u8], max_pages: usize) -> Result<Vec<DynamicImage>, OcrError> {
        let mut doc = Document::load_mem(data).map_err(|e| OcrError::Render(e.to_string()))?;

        if doc.is_encrypted() {
            doc.decrypt("")
                .map_err(|_| OcrError::Render("PDF is encrypted".to_string()))?;
            debug!("Decrypted PDF with empty password");
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(OcrError::Render("PDF has no pages".to_string()));
        }

        let mut images = Vec::new();
        for (number, page_id) in pages.iter().take(max_pages.max(1)) {
            match largest_page_image(&doc, *page_id) {
                Some(img) => {
                    trace!("Page {}: {}x{} image", number, img.width(), img.height());
                    images.push(img);
                }
                None => debug!("Page {} has no decodable image", number),
            }
        }

        if images.is_empty() {
            return Err(OcrError::Render(
                "no decodable page images (not a scanned PDF?)".to_string(),
            ));
        }

        Ok(images)
    }
}

impl PageRenderer for EmbeddedImageRenderer {
    fn render_pages(&self, path: &Path, max_pages: usize) -> Result<Vec<DynamicImage>, OcrError> {
        if is_image_path(path) {
            return load_image_page(path);
        }
        if !is_pdf_path(path) {
            return Err(OcrError::UnsupportedFormat(path.display().to_string()));
        }

        let data = std::fs::read(path)?;
        self.render_bytes(&data, max_pages)
    }
}

fn largest_page_image(doc: &Document, page_id: ObjectId) -> Option<DynamicImage> {
    let resources = page_resources(doc, page_id)?;
    let xobjects = resources.get(b"XObject").ok()?;
    let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) else {
        return None;
    };

    xobjects
        .iter()
        .filter_map(|(_, obj)| doc.dereference(obj).ok())
        .filter_map(|(_, obj)| decode_image(doc, obj))
        .max_by_key(|img| {
            let (w, h) = img.dimensions();
            u64::from(w) * u64::from(h)
        })
}

/// Resources of a page, inherited from the page tree when absent.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res))) = doc.dereference(resources) {
            return Some(res.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent)) => page_resources(doc, *parent),
        _ => None,
    }
}

fn decode_image(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

    let filter = dict.get(b"Filter").ok().and_then(|f| match f {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
        _ => None,
    });

    match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Unsupported image filter {:?}", filter.map(String::from_utf8_lossy));
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    raw_to_image(&data, width, height, color_space)
}

fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;

    match color_space {
        b"DeviceRGB" | b"RGB" => {
            let len = pixels.checked_mul(3)?;
            let buf = data.get(..len)?.to_vec();
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" => {
            let buf = data.get(..pixels)?.to_vec();
            GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        other => {
            trace!("Unsupported color space {}", String::from_utf8_lossy(other));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    /// One-page PDF whose page shows a 2x2 gray image.
    fn scanned_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 64, 128, 255],
        );
        let image_id = doc.add_object(image);

        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 2.into(), 2.into()],
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_inherited_gray_image() {
        let pages = EmbeddedImageRenderer::new()
            .render_bytes(&scanned_pdf(), 2)
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].dimensions(), (2, 2));
        assert_eq!(pages[0].to_luma8().into_raw(), vec![0, 64, 128, 255]);
    }

    #[test]
    fn test_garbage_is_render_error() {
        let err = EmbeddedImageRenderer::new()
            .render_bytes(b"not a pdf", 2)
            .unwrap_err();
        assert!(matches!(err, OcrError::Render(_)));
    }

    #[test]
    fn test_raw_rgb_too_short() {
        assert!(raw_to_image(&[1, 2, 3], 2, 2, b"DeviceRGB").is_none());
        assert!(raw_to_image(&[0; 12], 2, 2, b"DeviceRGB").is_some());
    }
}
