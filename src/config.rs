//! Configuration types for PDF-to-JSON extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes it
//! easy to log a run's settings and diff two runs to understand why their
//! outputs differ.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Largest width and height, in pixels, of any image submitted for inference.
pub const MAX_DIMENSION: u32 = 1024;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for a PDF-to-JSON extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2json::ExtractionConfig;
/// use std::time::Duration;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o-mini")
///     .min_request_interval(Duration::from_secs(2))
///     .cleanup(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Vision model identifier sent in every request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Bearer credential. If None, [`API_KEY_ENV`] is read when the client is built.
    pub api_key: Option<String>,

    /// Chat-completion endpoint. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Extraction prompt. If None, uses [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Maximum tokens the model may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Wall-clock limit for one inference call, in seconds. Default: 120.
    ///
    /// A call that exceeds it is recorded as a failed candidate, not retried.
    pub request_timeout_secs: u64,

    /// Minimum pause between the end of one inference call and the start of
    /// the next. Default: 8 s.
    ///
    /// The service enforces a throughput limit per key; this throttle keeps a
    /// long document under it without any retry logic.
    pub min_request_interval: Duration,

    /// Images wider than this are scaled down to it. Default: [`MAX_DIMENSION`].
    pub max_width: u32,

    /// Images taller than this (after resizing) are split into stacked slices.
    /// Default: [`MAX_DIMENSION`].
    pub max_height: u32,

    /// File format of rasterised pages. Default: [`ImageFormat::Png`].
    pub image_format: ImageFormat,

    /// Page render scale; 1.0 renders at 72 DPI. Default: 1.0.
    pub render_scale: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Delete the staging images after the run. Default: false.
    pub cleanup: bool,

    /// Wipe earlier output and error records before the run. Default: false.
    ///
    /// When false the run resumes: candidates that already have a success or
    /// error record are skipped.
    pub fresh_start: bool,

    /// Optional per-candidate progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            prompt: None,
            max_tokens: 4096,
            request_timeout_secs: 120,
            min_request_interval: Duration::from_secs(8),
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
            image_format: ImageFormat::default(),
            render_scale: 1.0,
            password: None,
            cleanup: false,
            fresh_start: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("min_request_interval", &self.min_request_interval)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("image_format", &self.image_format)
            .field("render_scale", &self.render_scale)
            .field("cleanup", &self.cleanup)
            .field("fresh_start", &self.fresh_start)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured API key, falling back to [`API_KEY_ENV`].
    pub fn resolve_api_key(&self) -> Result<String, ExtractError> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ExtractError::MissingCredential),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn min_request_interval(mut self, interval: Duration) -> Self {
        self.config.min_request_interval = interval;
        self
    }

    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px.max(1);
        self
    }

    pub fn max_height(mut self, px: u32) -> Self {
        self.config.max_height = px.max(1);
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.1, 8.0);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn cleanup(mut self, v: bool) -> Self {
        self.config.cleanup = v;
        self
    }

    pub fn fresh_start(mut self, v: bool) -> Self {
        self.config.fresh_start = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model must not be empty".into()));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(ExtractError::InvalidConfig(format!(
                "Endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// On-disk format of rasterised and normalised page images.
///
/// PNG is lossless and keeps small print crisp; JPEG produces much smaller
/// uploads for photo-heavy scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Lossless PNG (default).
    #[default]
    Png,
    /// Baseline JPEG; alpha is dropped.
    Jpeg,
}

impl ImageFormat {
    /// File extension used for staged images, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.request_timeout_secs, 120);
        assert_eq!(c.min_request_interval, Duration::from_secs(8));
        assert_eq!(c.max_width, 1024);
        assert_eq!(c.max_height, 1024);
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.image_format, ImageFormat::Png);
    }

    #[test]
    fn builder_rejects_bad_endpoint() {
        let err = ExtractionConfig::builder()
            .endpoint("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_dimensions() {
        let c = ExtractionConfig::builder()
            .max_width(0)
            .max_height(0)
            .build()
            .unwrap();
        assert_eq!(c.max_width, 1);
        assert_eq!(c.max_height, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder()
            .api_key("sk-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn explicit_api_key_wins() {
        let c = ExtractionConfig::builder().api_key("sk-explicit").build().unwrap();
        assert_eq!(c.resolve_api_key().unwrap(), "sk-explicit");
    }

    #[test]
    fn image_format_extensions() {
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }
}
