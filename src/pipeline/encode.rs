//! Image encoding: candidate file → base64 data URI.
//!
//! VLM APIs accept images as base64 data URIs embedded in the JSON request
//! body. The file bytes are sent untouched; normalisation has already made
//! them fit the service's limits.

use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// MIME type used when the extension is unknown.
const FALLBACK_MIME: &str = "application/octet-stream";

/// A candidate image as an embeddable, self-describing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    /// Standard (padded) base64 of the file bytes.
    pub data: String,
}

impl EncodedImage {
    /// Encode raw bytes, taking the MIME type from `file_name`'s extension.
    pub fn from_bytes(file_name: &Path, bytes: &[u8]) -> Self {
        let mime_type = mime_guess::from_path(file_name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        Self {
            mime_type,
            data: STANDARD.encode(bytes),
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Read the image at `path` and wrap it as an [`EncodedImage`].
pub fn encode_file(path: &Path) -> Result<EncodedImage, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::workspace(path, e))?;
    let encoded = EncodedImage::from_bytes(path, &bytes);
    debug!(
        "Encoded {} ({}; {:.2} KB) → {} bytes base64",
        path.display(),
        encoded.mime_type,
        bytes.len() as f64 / 1024.0,
        encoded.data.len()
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_png_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_1.png");
        RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let enc = encode_file(&path).expect("encode should succeed");
        assert_eq!(enc.mime_type, "image/png");
        let decoded = STANDARD.decode(&enc.data).expect("valid base64");
        assert_eq!(decoded, std::fs::read(&path).unwrap());
    }

    #[test]
    fn data_uri_shape() {
        let enc = EncodedImage::from_bytes(Path::new("page.jpg"), b"abc");
        assert_eq!(enc.data_uri(), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn unknown_extension_still_encodes() {
        let enc = EncodedImage::from_bytes(Path::new("page.zzzunknown"), &[0, 1, 2, 3]);
        assert_eq!(enc.mime_type, FALLBACK_MIME);
        assert_eq!(STANDARD.decode(&enc.data).unwrap(), vec![0, 1, 2, 3]);

        let bare = EncodedImage::from_bytes(Path::new("page"), b"x");
        assert_eq!(bare.mime_type, FALLBACK_MIME);
    }

    #[test]
    fn missing_file_is_workspace_error() {
        let err = encode_file(Path::new("/no/such/image.png")).unwrap_err();
        assert!(matches!(err, ExtractError::Workspace { .. }));
    }
}
