//! Cleanup and parse of raw model output.

use serde_json::Value as JsonValue;

use docket_core::{default_excerpt, Error, Result};

/// Strip decorative Markdown code fencing from raw model output.
///
/// Vision models frequently wrap their JSON in ```` ```json … ``` ````
/// blocks; the fencing carries no information and is removed before parsing.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Strip fencing and parse the output as JSON.
///
/// Parse failure carries a bounded excerpt of the raw text, never the full
/// blob.
pub fn parse_extraction(raw: &str) -> Result<JsonValue> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|_| Error::MalformedOutput(default_excerpt(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::defaults;
    use serde_json::json;

    #[test]
    fn test_strip_fenced_json_block() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fences() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_unfenced_passthrough() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_fenced_parses_identically_to_unfenced() {
        let fenced = parse_extraction("```json{\"a\":1}```").unwrap();
        let unfenced = parse_extraction("{\"a\":1}").unwrap();
        assert_eq!(fenced, unfenced);
        assert_eq!(fenced, json!({"a": 1}));
    }

    #[test]
    fn test_parse_failure_carries_bounded_excerpt() {
        let raw = format!("The total appears to be {}", "ten dollars ".repeat(100));
        let err = parse_extraction(&raw).unwrap_err();
        match err {
            Error::MalformedOutput(excerpt) => {
                assert!(excerpt.chars().count() <= defaults::EXCERPT_MAX_CHARS + 1);
                assert!(excerpt.starts_with("The total"));
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_preserves_structure_verbatim() {
        let raw = "```json\n{\"total\": \"10.00\", \"items\": [{\"name\": \"coffee\"}]}\n```";
        let value = parse_extraction(raw).unwrap();
        assert_eq!(value["total"], "10.00");
        assert_eq!(value["items"][0]["name"], "coffee");
    }
}
