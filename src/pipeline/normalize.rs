//! Image normalisation: enforce the inference service's geometry limits.
//!
//! Two corrections are applied in a fixed order:
//!
//! 1. **Resize** — an image wider than `max_width` is scaled down to exactly
//!    `max_width`, height scaled by the same ratio. The file is replaced in
//!    place.
//! 2. **Split** — an image still taller than `max_height` is cut into
//!    `ceil(height / max_height)` horizontal bands of (near-)equal height,
//!    written as `<stem>_<slice>.<ext>` siblings. The oversized original is
//!    removed once every slice is on disk.
//!
//! Pages are read top to bottom, so stacking bands keeps whole text lines
//! together far more often than a 2-D tiling would. Nothing is ever cropped
//! away: slices tile the page exactly.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use image::imageops::FilterType;
use image::DynamicImage;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One rasterised page on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number in document order.
    pub page: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl PageImage {
    /// Describe an existing image file as page `page`, reading its dimensions
    /// from the header.
    pub fn open(page: usize, path: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let path = path.into();
        let (width, height) =
            image::image_dimensions(&path).map_err(|e| ExtractError::image(&path, e))?;
        Ok(Self {
            page,
            path,
            width,
            height,
        })
    }
}

/// A horizontal band of an over-tall page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitImage {
    /// Page number of the parent image.
    pub page: usize,
    /// 0-based position from the top of the parent.
    pub slice: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// The unit submitted for inference: a whole page or one of its slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCandidate {
    Page(PageImage),
    Slice(SplitImage),
}

impl ImageCandidate {
    pub fn path(&self) -> &Path {
        match self {
            ImageCandidate::Page(p) => &p.path,
            ImageCandidate::Slice(s) => &s.path,
        }
    }

    /// `(page, slice)` sort key; a whole page counts as slice 0.
    ///
    /// Ordering by this pair instead of by file name keeps page 10 after
    /// page 9 without zero-padding the names.
    pub fn ordinal(&self) -> (usize, usize) {
        match self {
            ImageCandidate::Page(p) => (p.page, 0),
            ImageCandidate::Slice(s) => (s.page, s.slice),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageCandidate::Page(p) => (p.width, p.height),
            ImageCandidate::Slice(s) => (s.width, s.height),
        }
    }

    /// The image's file name; records are keyed by it.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl PartialOrd for ImageCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ImageCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal()
            .cmp(&other.ordinal())
            .then_with(|| self.path().cmp(other.path()))
    }
}

/// Maximum candidate dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl ImageLimits {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            max_width: config.max_width,
            max_height: config.max_height,
        }
    }

    pub fn admits(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }
}

/// Height after scaling an image of `width × height` to `max_width` wide,
/// rounded to the nearest pixel and never below 1.
pub fn scaled_height(width: u32, height: u32, max_width: u32) -> u32 {
    let h = (height as f64 * max_width as f64 / width as f64).round() as u32;
    h.max(1)
}

/// Heights of the bands an image of `height` px is split into.
///
/// Returns `ceil(height / max_height)` values that sum to `height` and
/// differ by at most one pixel (taller bands first). A height within the
/// limit yields a single band.
pub fn slice_heights(height: u32, max_height: u32) -> Vec<u32> {
    let max_height = max_height.max(1);
    if height <= max_height {
        return vec![height];
    }
    let n = height.div_ceil(max_height);
    let base = height / n;
    let rem = height % n;
    (0..n).map(|i| base + u32::from(i < rem)).collect()
}

/// Scale `page` down to `max_width` if it is wider, replacing the file.
///
/// Returns whether the file was rewritten.
pub fn resize_in_place(page: &mut PageImage, max_width: u32) -> Result<bool, ExtractError> {
    if page.width <= max_width {
        return Ok(false);
    }

    let img = image::open(&page.path).map_err(|e| ExtractError::image(&page.path, e))?;
    let (width, height) = (img.width(), img.height());
    if width <= max_width {
        page.width = width;
        page.height = height;
        return Ok(false);
    }

    let new_height = scaled_height(width, height, max_width);
    debug!(
        "Resizing {} from {}x{} to {}x{}",
        page.path.display(),
        width,
        height,
        max_width,
        new_height
    );

    let resized = img.resize_exact(max_width, new_height, FilterType::Lanczos3);
    save_image(&resized, &page.path)?;

    page.width = max_width;
    page.height = new_height;
    Ok(true)
}

/// Cut `page` into stacked bands no taller than `max_height`.
///
/// Returns an empty vector (and leaves the file alone) when the page already
/// fits. Otherwise the slices are written next to the original, which is
/// then deleted.
pub fn split_in_place(page: &PageImage, max_height: u32) -> Result<Vec<SplitImage>, ExtractError> {
    if page.height <= max_height {
        return Ok(Vec::new());
    }

    let img = image::open(&page.path).map_err(|e| ExtractError::image(&page.path, e))?;
    let width = img.width();
    let heights = slice_heights(img.height(), max_height);
    debug!(
        "Splitting {} ({}px tall) into {} slices",
        page.path.display(),
        img.height(),
        heights.len()
    );

    let mut slices = Vec::with_capacity(heights.len());
    let mut top = 0u32;
    for (slice, band) in heights.into_iter().enumerate() {
        let path = slice_path(&page.path, slice);
        let part = img.crop_imm(0, top, width, band);
        save_image(&part, &path)?;
        slices.push(SplitImage {
            page: page.page,
            slice,
            path,
            width,
            height: band,
        });
        top += band;
    }

    std::fs::remove_file(&page.path).map_err(|e| ExtractError::workspace(&page.path, e))?;
    Ok(slices)
}

/// Resize, then split, one page. Every returned candidate fits `limits`.
pub fn normalize_page(
    mut page: PageImage,
    limits: ImageLimits,
) -> Result<Vec<ImageCandidate>, ExtractError> {
    resize_in_place(&mut page, limits.max_width)?;
    let slices = split_in_place(&page, limits.max_height)?;
    if slices.is_empty() {
        Ok(vec![ImageCandidate::Page(page)])
    } else {
        Ok(slices.into_iter().map(ImageCandidate::Slice).collect())
    }
}

/// `<dir>/<stem>_<slice>.<ext>` for a page image path.
fn slice_path(path: &Path, slice: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{slice}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{slice}"),
    };
    path.with_file_name(name)
}

/// Save `img` in the format implied by `path`'s extension.
pub(crate) fn save_image(img: &DynamicImage, path: &Path) -> Result<(), ExtractError> {
    let format = image::ImageFormat::from_path(path).map_err(|e| ExtractError::image(path, e))?;
    let result = if format == image::ImageFormat::Jpeg {
        // JPEG has no alpha channel and no 16-bit mode.
        DynamicImage::ImageRgb8(img.to_rgb8()).save_with_format(path, format)
    } else {
        img.save_with_format(path, format)
    };
    result.map_err(|e| ExtractError::image(path, e))
}
