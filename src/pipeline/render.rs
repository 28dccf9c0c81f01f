//! PDF rasterisation: render every page into the staging folder via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so
//! the runtime's worker threads never stall during CPU-heavy rendering.
//!
//! A document either rasterises completely or the run stops: a page that
//! fails to render is fatal, never skipped.

use crate::config::{ExtractionConfig, ImageFormat};
use crate::error::ExtractError;
use crate::pipeline::normalize::{save_image, PageImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library to bind.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasterise every page of `pdf_path` into `staging_dir`.
///
/// Writes `<doc_id>_<page>.<ext>` per page (1-based) and returns the pages
/// in document order.
pub async fn render_document(
    pdf_path: &Path,
    staging_dir: &Path,
    doc_id: &str,
    config: &ExtractionConfig,
) -> Result<Vec<PageImage>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let staging = staging_dir.to_path_buf();
    let doc_id = doc_id.to_string();
    let scale = config.render_scale;
    let format = config.image_format;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        render_document_blocking(&path, &staging, &doc_id, scale, format, password.as_deref())
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// File name of a rasterised page.
pub fn page_file_name(doc_id: &str, page: usize, format: ImageFormat) -> String {
    format!("{doc_id}_{page}.{}", format.extension())
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then a library in the working
/// directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(PathBuf::from(p)),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_document_blocking(
    pdf_path: &Path,
    staging_dir: &Path,
    doc_id: &str,
    scale: f32,
    format: ImageFormat,
    password: Option<&str>,
) -> Result<Vec<PageImage>, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if total_pages == 0 {
        return Err(ExtractError::NoPages {
            path: pdf_path.to_path_buf(),
        });
    }

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExtractError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        let path = staging_dir.join(page_file_name(doc_id, page_num, format));
        save_image(&image, &path)?;
        debug!(
            "Rendered page {} → {}x{} px → {}",
            page_num,
            image.width(),
            image.height(),
            path.display()
        );

        results.push(PageImage {
            page: page_num,
            path,
            width: image.width(),
            height: image.height(),
        });
    }

    Ok(results)
}
