//! Text extraction for uploaded documents.
//!
//! Callers supply bytes plus a content type; this module returns plain
//! UTF-8 text ready for segmentation. PDF and plain text are supported;
//! invalid UTF-8 in plain text is replaced, not rejected.

use std::path::Path;

use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Extract plain text from document bytes.
///
/// Content-type parameters (`text/plain; charset=utf-8`) are ignored.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Infer a content type from a file extension (`.pdf`, `.txt`).
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        _ => None,
    }
}

/// Read a document from disk and extract its text.
pub fn read_document(path: &Path) -> Result<String, ExtractError> {
    let content_type = content_type_for_path(path).ok_or_else(|| {
        ExtractError::UnsupportedContentType(format!(
            "unknown extension for {}",
            path.display()
        ))
    })?;
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_text(&bytes, content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_content_type_returns_error() {
        let r = extract_text(b"x", "application/octet-stream");
        assert!(matches!(r, Err(ExtractError::UnsupportedContentType(_))));
    }

    #[test]
    fn test_plain_text_with_charset() {
        let text = extract_text(b"CHAPTER I\nArticle 1\n", "text/plain; charset=utf-8").unwrap();
        assert_eq!(text, "CHAPTER I\nArticle 1\n");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let text = extract_text(&[b'A', 0xff, b'B'], MIME_TEXT).unwrap();
        assert_eq!(text, "A\u{fffd}B");
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let r = extract_text(b"not a pdf", MIME_PDF);
        assert!(matches!(r, Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("gdpr.PDF")), Some(MIME_PDF));
        assert_eq!(content_type_for_path(Path::new("act.txt")), Some(MIME_TEXT));
        assert_eq!(content_type_for_path(Path::new("act.docx")), None);
        assert_eq!(content_type_for_path(Path::new("README")), None);
    }

    #[test]
    fn test_read_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("act.txt");
        std::fs::write(&path, "Article 1\nScope.").unwrap();
        assert_eq!(read_document(&path).unwrap(), "Article 1\nScope.");

        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            read_document(&missing),
            Err(ExtractError::Io { .. })
        ));
    }
}
