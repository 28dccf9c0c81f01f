//! # edgequake-pdf2json
//!
//! Extract structured JSON from PDF documents using Vision Language Models
//! (VLMs).
//!
//! ## Why this crate?
//!
//! Invoices, statements and forms carry their data in layout: columns,
//! boxes, tables that text extractors flatten into an unordered stream.
//! This crate rasterises each page and lets a VLM read it as a human would,
//! asking for the page's content back as JSON. One JSON record is written
//! per page (or per slice of an over-tall page).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate the local file, derive the document id
//!  ├─ 2. Render     rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Filter     drop single-colour pages and slices
//!  ├─ 4. Normalise  resize to 1024 px wide, split into ≤1024 px bands
//!  ├─ 5. Encode     image file → base64 data URI
//!  ├─ 6. VLM        one chat-completion call per image, rate limited
//!  ├─ 7. Parse      strip comments / code fences, parse JSON
//!  └─ 8. Record     <image>.json or quarantined <image>.response.json
//! ```
//!
//! Runs are resumable: an image with a record from an earlier run is not
//! sent again, so re-running after a partial failure only pays for what is
//! missing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2json::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from OPENAI_API_KEY unless set on the builder
//!     let config = ExtractionConfig::builder().model("gpt-4o").build()?;
//!     let summary = extract("statement.pdf", &config).await?;
//!     if let Some(dir) = &summary.commit.final_dir {
//!         println!("{} records in {}", summary.succeeded(), dir.display());
//!     }
//!     if let Some(dir) = &summary.commit.errors_dir {
//!         eprintln!("{} quarantined in {}", summary.failed(), dir.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod rate_limit;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ImageFormat};
pub use error::{CandidateError, ExtractError};
pub use extract::{extract, extract_sync, Orchestrator};
pub use output::{CandidateResult, CandidateStatus, CommitReport, RunSummary};
pub use pipeline::encode::EncodedImage;
pub use pipeline::llm::{InferenceResponse, OpenAiVisionClient, VisionClient};
pub use pipeline::normalize::PageImage;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use rate_limit::{MinIntervalLimiter, RateLimiter};
pub use workspace::Workspace;
