//! Input resolution: validate a user-supplied PDF path and name the document.
//!
//! We validate the PDF magic bytes (`%PDF`) before anything else so callers
//! get a meaningful error rather than a pdfium failure halfway through
//! setting up the workspace.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback document id for file names with no alphanumeric characters.
const FALLBACK_DOCUMENT_ID: &str = "document";

/// Resolve a local PDF path to an absolute path, validating existence,
/// readability and PDF magic bytes.
pub fn resolve_input(path: &Path) -> Result<PathBuf, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ExtractError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let absolute = path
        .canonicalize()
        .map_err(|e| ExtractError::workspace(path, e))?;
    debug!("Resolved local PDF: {}", absolute.display());
    Ok(absolute)
}

/// Derive the document id used to name staged images and workspace folders.
///
/// Every non-alphanumeric character of the file name (extension included) is
/// dropped, so `"Q3 report.pdf"` becomes `"Q3reportpdf"`.
pub fn document_id(path: &Path) -> String {
    let id: String = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    if id.is_empty() {
        FALLBACK_DOCUMENT_ID.to_string()
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn document_id_strips_punctuation_and_spaces() {
        assert_eq!(document_id(Path::new("/a/b/Q3 report.pdf")), "Q3reportpdf");
        assert_eq!(document_id(Path::new("sample.pdf")), "samplepdf");
        assert_eq!(document_id(Path::new("ünï-cødé.pdf")), "ünïcødépdf");
    }

    #[test]
    fn document_id_falls_back_when_empty() {
        assert_eq!(document_id(Path::new("/tmp/--.")), "document");
        assert_eq!(document_id(Path::new("/")), "document");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_input(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_input(tmp.path()).unwrap_err();
        match err {
            ExtractError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted_and_made_absolute() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(tmp.path()).unwrap();
        assert!(resolved.is_absolute());
    }
}
