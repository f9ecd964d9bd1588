//! JSON extraction from synthesized text.
//!
//! Role agents are instructed to answer with a single JSON value, but model
//! output routinely wraps it in prose or markdown code fences. Extraction
//! tries, in order:
//!
//! 1. The whole trimmed content, when it starts with `{` or `[`
//! 2. The body of the first fenced code block
//! 3. The first balanced JSON object or array found by bracket matching

use regex::Regex;
use thiserror::Error;

/// Error returned when no JSON value can be recovered from the content.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("No JSON content found in response. Content starts with: '{content_preview}'")]
pub struct JsonNotFound {
    /// First characters of the offending content, for diagnostics.
    pub content_preview: String,
}

/// Extracts the first JSON value (object or array) from mixed content.
///
/// # Errors
///
/// Returns [`JsonNotFound`] when no balanced JSON value is present.
pub fn extract_json(content: &str) -> Result<String, JsonNotFound> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Some(candidate) = balanced_prefix(trimmed) {
            return Ok(candidate);
        }
    }

    if let Some(block) = fenced_block(trimmed) {
        let block = block.trim();
        if let Some(candidate) = balanced_prefix(block) {
            return Ok(candidate);
        }
    }

    if let Some(start) = trimmed.find(['{', '[']) {
        if let Some(candidate) = balanced_prefix(&trimmed[start..]) {
            return Ok(candidate);
        }
    }

    Err(JsonNotFound {
        content_preview: preview(trimmed),
    })
}

/// Extracts and deserializes a JSON value from mixed content.
///
/// # Errors
///
/// Returns a human-readable message covering both extraction and
/// deserialization failures; callers fold it into their own error types.
pub fn extract_and_parse<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, String> {
    let json = extract_json(content).map_err(|e| e.to_string())?;
    serde_json::from_str(&json).map_err(|e| format!("extracted JSON does not match: {}", e))
}

/// Returns the body of the first fenced code block, if any.
fn fenced_block(content: &str) -> Option<&str> {
    // Language tags after the opening fence are common ("```json").
    let re = Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").expect("static regex");
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Returns the shortest balanced JSON prefix of `content`, which must start
/// at the opening bracket.
fn balanced_prefix(content: &str) -> Option<String> {
    let mut chars = content.char_indices();
    let (_, open) = chars.next()?;
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };

    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in chars {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(content[..=idx].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

fn preview(content: &str) -> String {
    content.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_object() {
        let json = extract_json(r#"{"verdict": "accept", "deficiencies": []}"#).unwrap();
        assert_eq!(json, r#"{"verdict": "accept", "deficiencies": []}"#);
    }

    #[test]
    fn test_direct_array() {
        let json = extract_json(r#"["cargo", "rustup"]"#).unwrap();
        assert_eq!(json, r#"["cargo", "rustup"]"#);
    }

    #[test]
    fn test_fenced_block() {
        let content = "Here you go:\n```json\n{\"gaps\": [\"lifetimes\"]}\n```\nAnything else?";
        let json = extract_json(content).unwrap();
        assert_eq!(json, r#"{"gaps": ["lifetimes"]}"#);
    }

    #[test]
    fn test_embedded_in_prose() {
        let content = "The keywords are [\"ownership\", \"borrowing\"] as requested.";
        let json = extract_json(content).unwrap();
        assert_eq!(json, r#"["ownership", "borrowing"]"#);
    }

    #[test]
    fn test_nested_brackets_in_strings() {
        let content = r#"{"description": "covers [advanced] topics like {generics}"}"#;
        let json = extract_json(content).unwrap();
        assert_eq!(json, content);
    }

    #[test]
    fn test_escaped_quotes() {
        let content = r#"{"note": "the \"borrow checker\" rules"}"#;
        assert_eq!(extract_json(content).unwrap(), content);
    }

    #[test]
    fn test_trailing_prose_dropped() {
        let content = r#"{"verdict": "revise", "deficiencies": ["no exercises"]} — hope that helps"#;
        let json = extract_json(content).unwrap();
        assert_eq!(json, r#"{"verdict": "revise", "deficiencies": ["no exercises"]}"#);
    }

    #[test]
    fn test_no_json_at_all() {
        let err = extract_json("I could not produce a structured answer.").unwrap_err();
        assert!(err.content_preview.starts_with("I could not"));
    }

    #[test]
    fn test_unbalanced_json_rejected() {
        assert!(extract_json(r#"{"verdict": "accept""#).is_err());
    }

    #[test]
    fn test_extract_and_parse_typed() {
        let keywords: Vec<String> = extract_and_parse("```\n[\"a\", \"b\"]\n```").unwrap();
        assert_eq!(keywords, vec!["a", "b"]);
    }

    #[test]
    fn test_extract_and_parse_type_mismatch() {
        let result: Result<Vec<String>, _> = extract_and_parse(r#"{"not": "an array"}"#);
        assert!(result.unwrap_err().contains("does not match"));
    }
}
