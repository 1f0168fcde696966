//! Reduces free-form model output to JSON.
//!
//! Grounded requests (those with the search tool attached) cannot ask for a
//! response schema, so the text that comes back may be fenced as markdown or
//! wrapped in prose.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::ParseError;

const FENCE: &str = "```";

/// Parse a JSON value out of model text.
///
/// Tries the fence-stripped text first, then the span between the first `{`
/// and the last `}` of the original text.
pub fn parse_json_from_text(text: &str) -> Result<Value, ParseError> {
    let clean = strip_code_fence(text.trim());

    match serde_json::from_str::<Value>(clean) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("JSON parse error, attempting fallback extraction: {}", e);
            let span = text.find('{').zip(text.rfind('}')).filter(|(open, close)| open < close);
            if let Some((open, close)) = span {
                match serde_json::from_str::<Value>(&text[open..=close]) {
                    Ok(value) => return Ok(value),
                    Err(e2) => warn!("fallback JSON parse error: {} (raw: {})", e2, preview(text)),
                }
            }
            Err(ParseError { raw: text.to_string() })
        }
    }
}

/// Normalize and decode into `T`. A shape mismatch is reported as a [`ParseError`] as well.
pub fn parse_as<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let value = parse_json_from_text(text)?;
    serde_json::from_value(value).map_err(|e| {
        warn!("model JSON did not match the expected shape: {}", e);
        ParseError { raw: text.to_string() }
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    // drop a language tag such as `json` on the opening line
    let rest = match rest.split_once('\n') {
        Some((tag, body)) if is_language_tag(tag) => body,
        _ if is_language_tag(rest) => "",
        _ => rest,
    };
    let rest = rest.trim();
    rest.strip_suffix(FENCE).unwrap_or(rest).trim()
}

fn is_language_tag(s: &str) -> bool {
    s.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...[{} chars]", &text[..idx], text.chars().count()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn strips_json_fence() {
        let value = parse_json_from_text("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn strips_bare_fence_and_other_tags() {
        assert_eq!(parse_json_from_text("```\n{\"a\":1}\n```").unwrap(), json!({"a": 1}));
        assert_eq!(parse_json_from_text("  ```JSON\n{\"a\":[1,2]}```  ").unwrap(), json!({"a": [1, 2]}));
        assert_eq!(parse_json_from_text("```{\"a\":1}```").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn falls_back_to_outer_braces_in_prose() {
        let value = parse_json_from_text("here: {\"a\":1} thanks").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn fallback_spans_nested_objects() {
        let text = "Sure! {\"self\": {\"pros\": [\"x\"]}, \"n\": 2}\nHope this helps.";
        assert_eq!(parse_json_from_text(text).unwrap(), json!({"self": {"pros": ["x"]}, "n": 2}));
    }

    #[test]
    fn non_json_text_is_a_parse_error_with_the_raw_text() {
        let err = parse_json_from_text("I could not find that page.").unwrap_err();
        assert_eq!(err.raw, "I could not find that page.");
    }

    #[test]
    fn unbalanced_braces_are_a_parse_error() {
        assert!(parse_json_from_text("} nothing {").is_err());
        assert!(parse_json_from_text("{\"a\": ").is_err());
    }

    #[test]
    fn non_object_json_parses_directly() {
        assert_eq!(parse_json_from_text(" [1, 2] ").unwrap(), json!([1, 2]));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Info {
        title: String,
    }

    #[test]
    fn parse_as_reports_shape_mismatch() {
        assert_eq!(parse_as::<Info>("{\"title\":\"x\"}").unwrap(), Info { title: "x".into() });
        let err = parse_as::<Info>("{\"title\": 5}").unwrap_err();
        assert_eq!(err.raw, "{\"title\": 5}");
    }
}
