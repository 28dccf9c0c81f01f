//! Error types for the edgequake-pdf2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot proceed or cannot be
//!   trusted (unreadable PDF, image I/O fault while normalising, a record
//!   that cannot be persisted). Returned as `Err(ExtractError)` from
//!   [`crate::extract::extract`] and the [`crate::extract::Orchestrator`].
//!
//! * [`CandidateError`] — **Non-fatal**: a single candidate image failed
//!   (service error, unparseable reply). Its raw response is quarantined in
//!   the errors folder and the loop moves on to the next candidate.
//!
//! Nothing is retried automatically: re-running the tool is the retry
//! mechanism, and already recorded candidates are skipped.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2json library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The document opened but produced no page images.
    #[error("No pages were rasterised from '{path}'")]
    NoPages { path: PathBuf },

    /// Decoding, resizing, cropping or saving an image failed.
    #[error("Image processing failed for '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    // ── Workspace errors ──────────────────────────────────────────────────
    /// A workspace directory or record file could not be read or written.
    #[error("Workspace I/O failed at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record already exists; records are written exactly once.
    #[error("Record '{path}' already exists and will not be overwritten")]
    RecordExists { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// No API credential was configured or found in the environment.
    #[error("No API key configured.\nPass --api-key or set OPENAI_API_KEY.")]
    MissingCredential,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Wrap an `io::Error` raised while touching `path` in the workspace.
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Workspace {
            path: path.into(),
            source,
        }
    }

    /// Wrap an `image::ImageError` raised while processing `path`.
    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        ExtractError::Image {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single candidate image.
///
/// Reported through [`crate::output::CandidateResult`] and the progress
/// callback; the raw service response is what lands in the errors folder.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum CandidateError {
    /// The service (or the transport) returned an error object.
    #[error("inference failed: {message}")]
    Inference { message: String },

    /// The response had no `choices[0].message.content` text.
    #[error("response carried no reply text")]
    MissingReply,

    /// The reply text was not recoverable as JSON.
    #[error("reply is not valid JSON: {detail}")]
    Parse { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_error_display_names_path() {
        let e = ExtractError::workspace(
            "/tmp/doc_output/a.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        let msg = e.to_string();
        assert!(msg.contains("/tmp/doc_output/a.json"), "got: {msg}");
        assert!(msg.contains("disk full"), "got: {msg}");
    }

    #[test]
    fn rasterisation_display() {
        let e = ExtractError::RasterisationFailed {
            page: 3,
            detail: "bad stream".into(),
        };
        assert!(e.to_string().contains("page 3"));
    }

    #[test]
    fn candidate_error_serialises() {
        let e = CandidateError::Parse {
            detail: "expected value at line 1".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("Parse"));
        assert!(e.to_string().contains("not valid JSON"));
    }

    #[test]
    fn missing_credential_mentions_env_var() {
        assert!(ExtractError::MissingCredential
            .to_string()
            .contains("OPENAI_API_KEY"));
    }
}
