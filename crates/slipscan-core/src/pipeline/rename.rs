//! Type suffix renaming of source documents.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::models::DocumentType;

/// All type suffixes a file name may carry.
pub fn type_suffixes() -> impl Iterator<Item = String> {
    DocumentType::all().into_iter().map(|t| format!("_{}", t.label()))
}

/// Strip one trailing type suffix from a file stem.
pub fn strip_type_suffix(stem: &str) -> &str {
    type_suffixes()
        .find_map(|suffix| {
            stem.len()
                .checked_sub(suffix.len())
                .filter(|&at| stem.is_char_boundary(at))
                .filter(|&at| stem[at..].eq_ignore_ascii_case(&suffix))
                .map(|at| &stem[..at])
        })
        .unwrap_or(stem)
}

/// Name carrying the type suffix, `<stem>_<LABEL><ext>`, or `None` when the
/// name already ends with it.
pub fn tagged_name(file_name: &str, doc_type: DocumentType) -> Option<String> {
    let (stem, ext) = split_name(file_name);
    let suffix = format!("_{}", doc_type.label());
    if stem.ends_with(&suffix) {
        return None;
    }
    Some(format!("{}{}{}", stem, suffix, ext))
}

/// Rename `path` to carry its type suffix.
///
/// Already suffixed files are left alone. An existing target is never
/// overwritten: `<stem>_<n>_<LABEL><ext>` is used instead, with the first free
/// `n` from 2.
pub fn rename_with_type(path: &Path, doc_type: DocumentType) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))?;

    let Some(tagged) = tagged_name(file_name, doc_type) else {
        debug!("{} already tagged as {}", file_name, doc_type);
        return Ok(path.to_path_buf());
    };

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut target = dir.join(&tagged);

    if target.exists() {
        let (stem, ext) = split_name(file_name);
        let mut n = 2u32;
        loop {
            target = dir.join(format!("{}_{}_{}{}", stem, n, doc_type.label(), ext));
            if !target.exists() {
                break;
            }
            n += 1;
        }
        debug!("{} exists, using {}", tagged, target.display());
    }

    std::fs::rename(path, &target)?;
    info!("Renamed {} -> {}", file_name, target.display());
    Ok(target)
}

/// Split into stem and extension (with its dot).
fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tagged_name() {
        assert_eq!(
            tagged_name("fatura.pdf", DocumentType::PaymentSlip),
            Some("fatura_BOLETO.pdf".to_string())
        );
        assert_eq!(tagged_name("fatura_BOLETO.pdf", DocumentType::PaymentSlip), None);
        assert_eq!(
            tagged_name("fatura_BOLETO.pdf", DocumentType::Invoice),
            Some("fatura_BOLETO_NF.pdf".to_string())
        );
        assert_eq!(
            tagged_name("noext", DocumentType::Unknown),
            Some("noext_DESCONHECIDO".to_string())
        );
    }

    #[test]
    fn test_strip_type_suffix() {
        assert_eq!(strip_type_suffix("acme_NF"), "acme");
        assert_eq!(strip_type_suffix("acme_boleto"), "acme");
        assert_eq!(strip_type_suffix("acme"), "acme");
        assert_eq!(strip_type_suffix("_NF"), "");
    }

    #[test]
    fn test_rename_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"x").unwrap();

        let first = rename_with_type(&path, DocumentType::Invoice).unwrap();
        assert_eq!(first, dir.path().join("a_NF.pdf"));
        assert!(!path.exists());

        let second = rename_with_type(&first, DocumentType::Invoice).unwrap();
        assert_eq!(second, first);
        assert!(first.exists());
    }

    #[test]
    fn test_collision_is_disambiguated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_NF.pdf"), b"existing").unwrap();
        std::fs::write(dir.path().join("a_2_NF.pdf"), b"existing too").unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"new").unwrap();

        let renamed = rename_with_type(&path, DocumentType::Invoice).unwrap();
        assert_eq!(renamed, dir.path().join("a_3_NF.pdf"));
        assert_eq!(std::fs::read(dir.path().join("a_NF.pdf")).unwrap(), b"existing");
        assert_eq!(std::fs::read(&renamed).unwrap(), b"new");

        // The disambiguated name is itself tagged.
        assert_eq!(rename_with_type(&renamed, DocumentType::Invoice).unwrap(), renamed);
    }
}
