//! End-to-end tests that rasterise a real PDF.
//!
//! The PDF is generated on the fly, so no fixture files are needed, but a
//! pdfium library must be loadable (`PDFIUM_LIB_PATH`, `./`, or the system
//! library). Without one the tests print SKIP and pass.
//!
//! `live_extraction` additionally calls the real completion endpoint and
//! only runs with `E2E_ENABLED=1` and `OPENAI_API_KEY` set:
//!   E2E_ENABLED=1 cargo test --test e2e live_extraction -- --nocapture

use async_trait::async_trait;
use edgequake_pdf2json::pipeline::render::{bind_pdfium, render_document};
use edgequake_pdf2json::{
    extract, EncodedImage, ExtractionConfig, InferenceResponse, MinIntervalLimiter, Orchestrator,
    VisionClient, Workspace,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if no pdfium library can be bound.
macro_rules! skip_unless_pdfium {
    () => {
        if let Err(e) = bind_pdfium() {
            println!("SKIP — {}", e);
            return;
        }
    };
}

const INVOICE_PAGE: &str = "BT /F1 24 Tf 72 700 Td (Invoice total: 42.00 EUR) Tj ET\n\
0 0 0 rg 72 600 200 40 re f";

/// A US-Letter PDF with one page per content stream.
fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages.len())
                .map(|i| format!("{} 0 R", 4 + 2 * i))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, content) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, obj).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

fn write_pdf(dir: &Path, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, minimal_pdf(pages)).unwrap();
    path
}

struct FixedReply {
    calls: AtomicUsize,
}

#[async_trait]
impl VisionClient for FixedReply {
    async fn complete(&self, _prompt: &str, _image: &EncodedImage) -> InferenceResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        InferenceResponse::classify(json!({
            "choices": [{ "message": { "content": "{\"total\": 42.0, \"currency\": \"EUR\"}" } }]
        }))
    }
}

// ── Rasteriser ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn renders_one_file_per_page() {
    skip_unless_pdfium!();
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "Invoice 7.pdf", &[INVOICE_PAGE, ""]);
    let ws = Workspace::for_document(&pdf);
    ws.reset().unwrap();
    let config = ExtractionConfig::default();

    let pages = render_document(&pdf, &ws.staging_dir(), ws.doc_id(), &config)
        .await
        .unwrap();

    assert_eq!(ws.doc_id(), "Invoice7pdf");
    assert_eq!(pages.len(), 2);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page, i + 1);
        assert_eq!(
            page.path,
            ws.staging_dir().join(format!("Invoice7pdf_{}.png", i + 1))
        );
        assert!(page.path.exists());
        assert!(page.width.abs_diff(612) <= 1, "width {}", page.width);
        assert!(page.height.abs_diff(792) <= 1, "height {}", page.height);
    }
    let on_disk = image::open(&pages[0].path).unwrap();
    assert_eq!((on_disk.width(), on_disk.height()), (pages[0].width, pages[0].height));
}

#[tokio::test]
async fn corrupt_pdf_is_fatal() {
    skip_unless_pdfium!();
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("broken.pdf");
    std::fs::write(&pdf, b"%PDF-1.4\nthis is not a pdf body").unwrap();
    let ws = Workspace::for_document(&pdf);
    ws.reset().unwrap();

    let err = render_document(&pdf, &ws.staging_dir(), ws.doc_id(), &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, edgequake_pdf2json::ExtractError::CorruptPdf { .. }),
        "got {err:?}"
    );
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_to_final_folder_with_blank_page_skipped() {
    skip_unless_pdfium!();
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "invoice.pdf", &[INVOICE_PAGE, "", INVOICE_PAGE]);
    let client = Arc::new(FixedReply {
        calls: AtomicUsize::new(0),
    });
    let config = ExtractionConfig::builder()
        .api_key("sk-test")
        .cleanup(true)
        .build()
        .unwrap();

    let mut orchestrator = Orchestrator::new(
        config.clone(),
        client.clone(),
        Box::new(MinIntervalLimiter::new(Duration::ZERO)),
    );
    let summary = orchestrator.run(&pdf).await.unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);

    let ws = Workspace::for_document(&pdf.canonicalize().unwrap());
    let record = ws.final_dir().join("invoicepdf_1.png.json");
    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&record).unwrap()).unwrap();
    assert_eq!(value, json!({"total": 42.0, "currency": "EUR"}));
    assert!(ws.final_dir().join("invoicepdf_3.png.json").exists());
    assert!(!ws.final_dir().join("invoicepdf_2.png.json").exists());
    assert!(!ws.errors_dir().exists());
    assert!(!ws.staging_dir().exists());

    // Second run: everything recorded, nothing sent.
    let summary = Orchestrator::new(
        config,
        client.clone(),
        Box::new(MinIntervalLimiter::new(Duration::ZERO)),
    )
    .run(&pdf)
    .await
    .unwrap();
    assert_eq!(summary.skipped(), 2);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn live_extraction() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    skip_unless_pdfium!();
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "live.pdf", &[INVOICE_PAGE]);
    let config = ExtractionConfig::builder()
        .prompt("Return {\"total\": <number>, \"currency\": <string>} for the invoice shown.")
        .build()
        .unwrap();

    let summary = extract(&pdf, &config).await.expect("extract() should succeed");

    assert_eq!(summary.dispatched(), 1);
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
}
