//! Text normalization of raw OCR output.

use lazy_static::lazy_static;
use regex::Regex;

/// Placeholder for date-shaped substrings.
pub const DATE_TOKEN: &str = "<DATE>";

/// Placeholder for currency-shaped substrings.
pub const AMOUNT_TOKEN: &str = "<AMOUNT>";

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    static ref DATE: Regex = Regex::new(r"\b\d{2}/\d{2}/\d{4}\b").unwrap();

    static ref AMOUNT: Regex = Regex::new(r"\b\d{1,3}(?:\.\d{3})*,\d{2}\b").unwrap();
}

/// Collapse every whitespace run (newlines included) to one space and trim.
pub fn normalize(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

/// Replace dates with `<DATE>` and amounts with `<AMOUNT>`.
///
/// Only for text fed to a learned classifier; the field extractor needs the
/// literal values.
pub fn mask_volatile(normalized: &str) -> String {
    let masked = DATE.replace_all(normalized, DATE_TOKEN);
    AMOUNT.replace_all(&masked, AMOUNT_TOKEN).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            normalize("  Linha \t Digitável\n\n Vencimento\r\n10/11/2025  "),
            "Linha Digitável Vencimento 10/11/2025"
        );
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn test_no_double_spaces_remain() {
        let text = normalize("a \u{a0} b\u{2003}\u{2003}c");
        assert!(!text.contains("  "));
        assert_eq!(text, "a b c");
    }

    #[test]
    fn test_mask_dates_and_amounts() {
        assert_eq!(
            mask_volatile("Vencimento 10/11/2025 Valor 1.234,56 Total 9,90 Doc 00123"),
            "Vencimento <DATE> Valor <AMOUNT> Total <AMOUNT> Doc 00123"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("x \n y");
        assert_eq!(normalize(&once), once);
    }
}
