//! Reply parsing: recover a JSON value from free-text VLM output.
//!
//! Even when asked for "only JSON", vision models routinely add commentary,
//! `//` annotations next to values, or wrap the object in a ```` ```json ````
//! fence followed by a sentence of prose. Parsing runs in three passes:
//!
//! 1. Strip `//` line comments and `/* … */` block comments. String literals
//!    are matched first and kept, so a value like `"https://example.com"`
//!    survives.
//! 2. If a ```` ```json ```` marker is present, keep only the text between it
//!    and the next ```` ``` ```` (or the end of the reply when the fence is
//!    never closed).
//! 3. Parse what is left with `serde_json`.
//!
//! A reply that still fails to parse is not an error of the run: the caller
//! gets `None` and quarantines the raw response.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

static RE_COMMENTS_OR_STRINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"(?:\\.|[^"\\\n])*"|//[^\n]*|/\*.*?\*/"#).unwrap()
});

/// Parse a model reply into JSON, or `None` if it is not recoverable.
///
/// The parse error is logged at `warn` level for diagnostics.
pub fn parse_reply(text: &str) -> Option<Value> {
    match try_parse_reply(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Invalid JSON in reply ({})", e);
            None
        }
    }
}

fn try_parse_reply(text: &str) -> Result<Value, serde_json::Error> {
    let cleaned = strip_comments(text);
    serde_json::from_str(extract_json_fence(&cleaned))
}

/// Remove `//` and `/* */` comments outside of double-quoted strings.
pub fn strip_comments(text: &str) -> String {
    RE_COMMENTS_OR_STRINGS
        .replace_all(text, |caps: &Captures| {
            let m = &caps[0];
            if m.starts_with('"') {
                m.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// The body of the first ```` ```json ```` fence, or `text` unchanged.
pub fn extract_json_fence(text: &str) -> &str {
    let Some(open) = text.find(JSON_FENCE) else {
        return text;
    };
    let body = &text[open + JSON_FENCE.len()..];
    match body.find(FENCE) {
        Some(close) => &body[..close],
        None => body,
    }
}
