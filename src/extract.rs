//! Extraction entry points and the per-candidate orchestration loop.
//!
//! ```text
//! resolve ─▶ prepare workspace ─▶ rasterise ─▶ drop solid pages
//!        ─▶ resize/split ─▶ drop solid slices ─▶ sort by (page, slice)
//!        ─▶ for each candidate:
//!               record exists?  ── yes ─▶ SKIPPED
//!               └─ no ─▶ wait for limiter ─▶ dispatch
//!                        ├─ reply parses   ─▶ <name>.json            (output)
//!                        └─ anything else  ─▶ <name>.response.json   (errors)
//!        ─▶ commit ─▶ optional staging cleanup
//! ```
//!
//! Candidates are processed strictly one at a time. A failed candidate is
//! quarantined and the loop moves on; only workspace and image faults stop
//! the run.

use crate::config::ExtractionConfig;
use crate::error::{CandidateError, ExtractError};
use crate::output::{CandidateResult, CandidateStatus, RunSummary};
use crate::pipeline::llm::{InferenceResponse, OpenAiVisionClient, VisionClient};
use crate::pipeline::normalize::{self, ImageCandidate, ImageLimits, PageImage};
use crate::pipeline::{encode, input, parse, render, uniformity};
use crate::prompts;
use crate::rate_limit::{MinIntervalLimiter, RateLimiter};
use crate::workspace::Workspace;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one document through the pipeline.
///
/// The inference client and rate limiter are injected so tests (and callers
/// with their own quota handling) can substitute them.
pub struct Orchestrator {
    config: ExtractionConfig,
    client: Arc<dyn VisionClient>,
    limiter: Box<dyn RateLimiter>,
}

impl Orchestrator {
    pub fn new(
        config: ExtractionConfig,
        client: Arc<dyn VisionClient>,
        limiter: Box<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            client,
            limiter,
        }
    }

    /// An orchestrator using [`OpenAiVisionClient`] and a
    /// [`MinIntervalLimiter`] with `config.min_request_interval`.
    ///
    /// # Errors
    /// [`ExtractError::MissingCredential`] when no API key is configured or
    /// found in the environment.
    pub fn from_config(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let client = OpenAiVisionClient::from_config(&config)?;
        let limiter = MinIntervalLimiter::new(config.min_request_interval);
        Ok(Self::new(config, Arc::new(client), Box::new(limiter)))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract every page of the PDF at `document`.
    ///
    /// Returns `Ok` even when some candidates were quarantined; check
    /// [`RunSummary::failed`].
    pub async fn run(&mut self, document: impl AsRef<Path>) -> Result<RunSummary, ExtractError> {
        let total_start = Instant::now();
        let pdf_path = input::resolve_input(document.as_ref())?;
        let workspace = Workspace::for_document(&pdf_path);
        info!(
            "Starting extraction: {} (id {})",
            pdf_path.display(),
            workspace.doc_id()
        );

        workspace.prepare(self.config.fresh_start)?;

        let render_start = Instant::now();
        let pages = render::render_document(
            &pdf_path,
            &workspace.staging_dir(),
            workspace.doc_id(),
            &self.config,
        )
        .await?;
        info!(
            "Rendered {} pages in {}ms",
            pages.len(),
            render_start.elapsed().as_millis()
        );

        let mut summary = self.run_staged(&workspace, pages).await?;
        summary.document = pdf_path;
        summary.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Run everything after rasterisation on pages already in staging.
    pub async fn run_staged(
        &mut self,
        workspace: &Workspace,
        pages: Vec<PageImage>,
    ) -> Result<RunSummary, ExtractError> {
        let start = Instant::now();
        let page_count = pages.len();
        let staging = workspace.staging_dir();

        let limits = ImageLimits::from_config(&self.config);
        let candidates = tokio::task::spawn_blocking(move || collect_candidates(pages, limits))
            .await
            .map_err(|e| ExtractError::Internal(format!("Normalise task panicked: {}", e)))??;
        if candidates.is_empty() {
            warn!("Every page of {} is a single colour; nothing to submit", workspace.doc_id());
        }

        let total = candidates.len();
        info!("{} candidate images from {} pages", total, page_count);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(total);
        }

        let prompt = prompts::effective_prompt(self.config.prompt.as_deref()).to_string();
        let mut results = Vec::with_capacity(total);
        for (i, candidate) in candidates.iter().enumerate() {
            let result = self
                .process_candidate(workspace, candidate, &prompt, i + 1, total)
                .await?;
            results.push(result);
        }

        let commit = workspace.commit()?;
        if self.config.cleanup {
            workspace.clean_staging()?;
            debug!("Removed {}", staging.display());
        }

        let summary = RunSummary {
            document: staging,
            pages: page_count,
            candidates: results,
            commit,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {} recorded, {} quarantined, {} skipped",
            summary.succeeded(),
            summary.failed(),
            summary.skipped()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(summary.succeeded(), summary.failed(), summary.skipped());
        }
        Ok(summary)
    }

    async fn process_candidate(
        &mut self,
        workspace: &Workspace,
        candidate: &ImageCandidate,
        prompt: &str,
        index: usize,
        total: usize,
    ) -> Result<CandidateResult, ExtractError> {
        let name = candidate.file_name();
        let (page, slice) = match candidate {
            ImageCandidate::Page(p) => (p.page, None),
            ImageCandidate::Slice(s) => (s.page, Some(s.slice)),
        };
        let progress = self.config.progress_callback.clone();

        if workspace.has_record(&name) {
            debug!("Skipping {}: already recorded", name);
            if let Some(ref cb) = progress {
                cb.on_candidate_skipped(index, total, &name);
            }
            return Ok(CandidateResult {
                name,
                page,
                slice,
                status: CandidateStatus::Skipped,
                record: None,
                error: None,
                duration_ms: 0,
            });
        }

        let image = encode::encode_file(candidate.path())?;
        self.limiter.acquire().await;
        if let Some(ref cb) = progress {
            cb.on_candidate_start(index, total, &name);
        }
        let call_start = Instant::now();
        debug!("Dispatching {} ({}/{})", name, index, total);
        let response = self.client.complete(prompt, &image).await;
        self.limiter.complete();
        let duration_ms = call_start.elapsed().as_millis() as u64;

        match interpret_response(&response) {
            Ok(value) => {
                let record = workspace.record_success(&name, &value)?;
                info!("{}/{} {} recorded ({}ms)", index, total, name, duration_ms);
                if let Some(ref cb) = progress {
                    cb.on_candidate_recorded(index, total, &name);
                }
                Ok(CandidateResult {
                    name,
                    page,
                    slice,
                    status: CandidateStatus::Succeeded,
                    record: Some(record),
                    error: None,
                    duration_ms,
                })
            }
            Err(error) => {
                warn!("{}/{} {} quarantined: {}", index, total, name, error);
                let record = workspace.record_failure(&name, response.raw())?;
                if let Some(ref cb) = progress {
                    cb.on_candidate_quarantined(index, total, &name, &error.to_string());
                }
                Ok(CandidateResult {
                    name,
                    page,
                    slice,
                    status: CandidateStatus::Failed,
                    record: Some(record),
                    error: Some(error),
                    duration_ms,
                })
            }
        }
    }
}

/// Filter, normalise and order the staged pages.
///
/// Solid pages are dropped before normalisation, solid slices after it.
fn collect_candidates(
    pages: Vec<PageImage>,
    limits: ImageLimits,
) -> Result<Vec<ImageCandidate>, ExtractError> {
    let mut candidates = Vec::new();
    for page in pages {
        if uniformity::is_solid_color(&page.path)? {
            debug!("Page {} is a single colour, not submitted", page.page);
            continue;
        }
        for candidate in normalize::normalize_page(page, limits)? {
            if matches!(candidate, ImageCandidate::Slice(_))
                && uniformity::is_solid_color(candidate.path())?
            {
                debug!("{} is a single colour, not submitted", candidate.file_name());
                continue;
            }
            candidates.push(candidate);
        }
    }
    candidates.sort();
    Ok(candidates)
}

/// The parsed reply of a completed response, or why it must be quarantined.
fn interpret_response(response: &InferenceResponse) -> Result<Value, CandidateError> {
    if response.is_failed() {
        return Err(CandidateError::Inference {
            message: response
                .error_message()
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    let text = response.reply_text().ok_or(CandidateError::MissingReply)?;
    parse::parse_reply(text).ok_or_else(|| CandidateError::Parse {
        detail: format!("reply begins {:?}", excerpt(text, 60)),
    })
}

/// The first `max` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max: usize) -> String {
    let mut chars = text.trim().chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Extract a PDF with the default OpenAI-compatible client.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors: unreadable or
/// non-PDF input, rasterisation or image faults, a workspace that cannot be
/// written, or a missing API key. A document of blank pages is not an
/// error: it yields a summary with no candidates.
pub async fn extract(
    document: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, ExtractError> {
    Orchestrator::from_config(config.clone())?.run(document).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    document: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(document, config))
}
