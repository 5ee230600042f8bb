//! Prompt construction for receipt/document extraction.

use std::collections::BTreeMap;

/// Instruction attached to the user message alongside the image.
pub const USER_INSTRUCTION: &str =
    "Make sure every value in the JSON is correct and calculated. Just return JSON.";

/// Default keys the model is asked to extract when the caller does not
/// narrow them via `options["fields"]`.
const DEFAULT_FIELDS: &str =
    "\"price\", \"quantity\", \"items\", \"total\", \"date\", \"currency\", \"notes\", \"unit\", \"company_name\"";

/// Build the system prompt for an extraction request.
///
/// Recognized options:
/// - `fields` — comma-separated list of keys the caller wants extracted
/// - `include_items` — `"false"` suppresses per-line items
pub fn build_system_prompt(options: &BTreeMap<String, String>) -> String {
    let mut prompt = String::from(
        "Summarize the receipt or document image below into JSON.\n",
    );

    match options.get("fields") {
        Some(fields) if !fields.is_empty() => {
            let quoted: Vec<String> = fields
                .split(',')
                .map(|f| format!("\"{}\"", f.trim()))
                .collect();
            prompt.push_str(&format!(
                "Must include the keys {} if they are provided.\n",
                quoted.join(", ")
            ));
        }
        _ => {
            prompt.push_str(&format!(
                "Must include keys such as {} if they are provided.\n",
                DEFAULT_FIELDS
            ));
        }
    }

    if options.get("include_items").map(String::as_str) == Some("false") {
        prompt.push_str("Do not include individual line items.\n");
    }

    prompt.push_str(
        "If some items are missing, inaccurate, or uncertain, omit those details.\n\
         Just return the JSON representation of this document as if you were reading it naturally.\n\
         Do not hallucinate.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_lists_default_fields() {
        let prompt = build_system_prompt(&BTreeMap::new());
        assert!(prompt.contains("\"total\""));
        assert!(prompt.contains("\"company_name\""));
        assert!(prompt.contains("Do not hallucinate"));
    }

    #[test]
    fn test_fields_option_narrows_keys() {
        let mut options = BTreeMap::new();
        options.insert("fields".to_string(), "total, date".to_string());
        let prompt = build_system_prompt(&options);
        assert!(prompt.contains("\"total\", \"date\""));
        assert!(!prompt.contains("\"company_name\""));
    }

    #[test]
    fn test_include_items_false() {
        let mut options = BTreeMap::new();
        options.insert("include_items".to_string(), "false".to_string());
        let prompt = build_system_prompt(&options);
        assert!(prompt.contains("Do not include individual line items"));
    }

    #[test]
    fn test_include_items_default_allows_items() {
        let prompt = build_system_prompt(&BTreeMap::new());
        assert!(!prompt.contains("Do not include individual line items"));
    }
}
