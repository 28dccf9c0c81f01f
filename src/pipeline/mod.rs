//! Pipeline stages for PDF-to-JSON extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own with small generated images.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ uniformity ──▶ normalize ──▶ encode ──▶ llm ──▶ parse
//! (path)    (pdfium)   (drop blanks)  (resize/split) (base64)   (VLM)   (JSON)
//! ```
//!
//! 1. [`input`]      — validate the local PDF and derive the document id
//! 2. [`render`]     — rasterise every page into the staging folder; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`uniformity`] — exclude solid-colour images from the candidate set
//! 4. [`normalize`]  — enforce the maximum width (resize) and height (split)
//! 5. [`encode`]     — wrap a candidate file as a base64 data URI
//! 6. [`llm`]        — one chat-completion request per candidate; the only
//!    stage with network I/O
//! 7. [`parse`]      — recover a JSON value from the free-text reply

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod parse;
pub mod render;
pub mod uniformity;
