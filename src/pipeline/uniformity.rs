//! Solid-colour detection.
//!
//! Cover separators, scanned blank sides and the empty tail slice of a split
//! page rasterise to a single colour. They carry no information, so they are
//! dropped from the candidate set before anything is sent for inference.

use crate::error::ExtractError;
use std::path::Path;

/// `true` when every pixel of the image at `path` equals its top-left pixel.
///
/// Compares raw channel bytes in the image's native colour type, so no
/// precision is lost to conversion. The file is only read.
pub fn is_solid_color(path: &Path) -> Result<bool, ExtractError> {
    let img = image::open(path).map_err(|e| ExtractError::image(path, e))?;
    let bpp = usize::from(img.color().bytes_per_pixel());
    let bytes = img.as_bytes();

    let Some(first) = bytes.get(..bpp) else {
        return Ok(true);
    };
    Ok(bytes.chunks_exact(bpp).all(|px| px == first))
}
