//! Staging of mail attachments into the input directory.
//!
//! Mailbox access lives outside this crate; a source only has to hand over
//! the attachments with their sender and date.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[\\/*?:"<>|]"#).unwrap();
}

/// Sender used when the mail carries none.
pub const UNKNOWN_SENDER: &str = "remetente_desconhecido";

/// One attachment of a received mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Raw `From` value.
    pub sender: String,
    /// Date the mail was received.
    pub received: NaiveDate,
    /// Attachment file name as sent.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Supplies attachments, already fetched.
pub trait AttachmentSource {
    fn attachments(&mut self) -> Result<Vec<Attachment>>;
}

impl AttachmentSource for Vec<Attachment> {
    fn attachments(&mut self) -> Result<Vec<Attachment>> {
        Ok(std::mem::take(self))
    }
}

/// File-system safe sender: `\ / * ? : " < > |` and spaces become `_`.
pub fn sanitize_sender(sender: &str) -> String {
    let trimmed = sender.trim();
    if trimmed.is_empty() {
        return UNKNOWN_SENDER.to_string();
    }
    UNSAFE_CHARS.replace_all(trimmed, "_").replace(' ', "_")
}

/// Write every attachment with an allowed extension into `dir` as
/// `<sender> - <YYYY-MM-DD><ext>`. Existing files are never overwritten; a
/// ` (n)` counter from 2 is added instead. Returns the written paths.
pub fn stage_attachments(
    source: &mut dyn AttachmentSource,
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut staged = Vec::new();

    for attachment in source.attachments()? {
        let Some(ext) = allowed_extension(&attachment.file_name, extensions) else {
            debug!("Skipping attachment {}", attachment.file_name);
            continue;
        };

        let base = format!(
            "{} - {}",
            sanitize_sender(&attachment.sender),
            attachment.received.format("%Y-%m-%d")
        );
        let path = write_new(dir, &base, &ext, &attachment.bytes)?;
        info!("Saved attachment {}", path.display());
        staged.push(path);
    }

    Ok(staged)
}

/// Extension (with dot, as sent) when it is one of `extensions`.
fn allowed_extension(file_name: &str, extensions: &[String]) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
        .then(|| format!(".{}", ext))
}

fn write_new(dir: &Path, base: &str, ext: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let mut counter = 1u32;
    loop {
        let name = if counter == 1 {
            format!("{}{}", base, ext)
        } else {
            format!("{} ({}){}", base, counter, ext)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attachment(sender: &str, name: &str, bytes: &[u8]) -> Attachment {
        Attachment {
            sender: sender.to_string(),
            received: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_sanitize_sender() {
        assert_eq!(
            sanitize_sender("Cobrança ACME <financeiro@acme.com>"),
            "Cobrança_ACME__financeiro@acme.com_"
        );
        assert_eq!(sanitize_sender("  "), UNKNOWN_SENDER);
    }

    #[test]
    fn test_stage_filters_and_disambiguates() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = vec![
            attachment("ACME", "boleto.pdf", b"one"),
            attachment("ACME", "logo.png", b"img"),
            attachment("ACME", "outro.pdf", b"two"),
            attachment("ACME", "nota.xml", b"<xml/>"),
        ];
        let extensions = vec!["pdf".to_string(), ".xml".to_string()];

        let staged = stage_attachments(&mut source, dir.path(), &extensions).unwrap();
        let names: Vec<_> = staged
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            vec![
                "ACME - 2025-10-03.pdf",
                "ACME - 2025-10-03 (2).pdf",
                "ACME - 2025-10-03.xml",
            ]
        );
        assert_eq!(std::fs::read(&staged[1]).unwrap(), b"two");
        assert!(source.is_empty());
    }

    #[test]
    fn test_existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ACME - 2025-10-03.pdf"), b"old").unwrap();

        let mut source = vec![attachment("ACME", "a.pdf", b"new")];
        let staged = stage_attachments(&mut source, dir.path(), &["pdf".to_string()]).unwrap();

        assert_eq!(staged[0], dir.path().join("ACME - 2025-10-03 (2).pdf"));
        assert_eq!(std::fs::read(dir.path().join("ACME - 2025-10-03.pdf")).unwrap(), b"old");
    }
}
