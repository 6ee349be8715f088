//! Format adapters for import and export.

pub mod csv;

pub use self::csv::{CsvExportSink, CsvImportSource, UTF8_BOM, template_bytes};

/// MIME types accepted for uploads.
pub const ACCEPTED_MIMETYPES: &[&str] = &["text/plain", "text/csv"];

/// Returns true if a declared upload MIME type is acceptable.
///
/// Parameters such as `; charset=utf-8` are ignored.
#[must_use]
pub fn is_accepted_mimetype(mimetype: &str) -> bool {
    let essence = mimetype.split(';').next().unwrap_or_default().trim();
    ACCEPTED_MIMETYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(essence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("text/csv", true ; "csv")]
    #[test_case("text/plain", true ; "plain")]
    #[test_case("TEXT/CSV; charset=utf-8", true ; "with parameters")]
    #[test_case("application/json", false ; "json")]
    #[test_case("", false ; "empty")]
    fn test_is_accepted_mimetype(mimetype: &str, expected: bool) {
        assert_eq!(is_accepted_mimetype(mimetype), expected);
    }
}
