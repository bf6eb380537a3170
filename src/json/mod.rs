//! Incremental JSON reconstruction for model output.
//!
//! Text arrives in arbitrary fragments. [`JsonStreamAssembler`] buffers it, finds each
//! balanced top-level value with an explicit scanner, parses it (optionally repairing
//! common slips), validates it against an optional [`Template`] and predicate, and
//! yields the accepted values as a lazy stream.

mod assembler;
mod buffer;
mod repair;
mod scanner;
mod template;
mod validator;

use serde_json::Value;

pub use assembler::{AssemblerConfig, AssemblerState, JsonObjectStream, JsonStreamAssembler};
pub use buffer::DEFAULT_MAX_BUFFER_SIZE;
pub use repair::repair;
pub use template::Template;
pub use validator::Predicate;

/// Extracts the first JSON value from a complete model response.
///
/// The whole text is tried as JSON first; otherwise the first balanced span that
/// parses (after repair, when enabled) is returned. Useful for answers wrapped in
/// prose or markdown fences.
///
/// # Examples
///
/// ```
/// use llmeasy::json::extract_json;
/// use serde_json::json;
///
/// let answer = "Here you go:\n```json\n{\"name\": \"Rust\", tags: [\"fast\",],}\n```";
/// assert_eq!(
///     extract_json(answer, true),
///     Some(json!({"name": "Rust", "tags": ["fast"]}))
/// );
/// assert_eq!(extract_json("no json here", true), None);
/// ```
pub fn extract_json(text: &str, repair_json: bool) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }
    let mut scanner = scanner::BoundaryScanner::new();
    std::iter::from_fn(|| scanner.next_span(text))
        .find_map(|span| repair::parse_span(span.slice(text), repair_json).into_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_prefers_whole_text() {
        assert_eq!(extract_json(" [1, 2] ", false), Some(json!([1, 2])));
        assert_eq!(extract_json("\"just a string\"", false), Some(json!("just a string")));
    }

    #[test]
    fn extract_skips_broken_spans() {
        let text = r#"first {"broken": nope} then {"ok": 1}"#;
        assert_eq!(extract_json(text, false), Some(json!({"ok": 1})));
    }
}
