//! Prompts for VLM-based page-to-JSON extraction.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::prompt`] (the CLI reads it from
//! `--prompt-file`); the constant here is used only when no override is
//! provided.

/// Default extraction prompt sent alongside every candidate image.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert data analyst and you have been given a task to extract the data from the image.
Extract the data you see as key value pairs in JSON. Only output the JSON and nothing else."#;

/// The prompt to use for a run: the override if present and non-blank,
/// otherwise [`DEFAULT_EXTRACTION_PROMPT`].
pub fn effective_prompt(custom: Option<&str>) -> &str {
    match custom {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_EXTRACTION_PROMPT,
    }
}
