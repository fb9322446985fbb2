//! Tolerant parsing of model replies that are supposed to be JSON.
//!
//! Models wrap JSON in markdown fences or add prose around it. A reply that
//! still cannot be parsed is kept verbatim under a fallback key; it is never
//! a stage failure.

use serde_json::{Map, Value};

/// Strip a surrounding markdown code fence, if any.
fn strip_fences(reply: &str) -> &str {
    let mut content = reply.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

/// Parse a reply as a JSON object.
///
/// Tries the fenced-stripped text first, then the outermost `{...}` span.
pub fn parse_json_reply(reply: &str) -> Result<Map<String, Value>, serde_json::Error> {
    let content = strip_fences(reply);
    match serde_json::from_str::<Map<String, Value>>(content) {
        Ok(map) => Ok(map),
        Err(err) => {
            let span = content
                .find('{')
                .zip(content.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &content[start..=end]);
            match span {
                Some(inner) if inner.len() < content.len() => serde_json::from_str(inner),
                _ => Err(err),
            }
        }
    }
}

/// Parse a reply, or wrap the raw text as `{fallback_key: reply}`.
pub fn parse_or_raw(reply: &str, fallback_key: &str) -> Value {
    match parse_json_reply(reply) {
        Ok(map) => Value::Object(map),
        Err(err) => {
            tracing::warn!(
                fallback_key = %fallback_key,
                error = %err,
                reply_chars = reply.len(),
                "Model reply was not valid JSON, keeping raw text"
            );
            let mut map = Map::new();
            map.insert(fallback_key.to_string(), Value::String(reply.to_string()));
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let map = parse_json_reply(r#"{"overall_assessment": "HIGH"}"#).unwrap();
        assert_eq!(map["overall_assessment"], "HIGH");
    }

    #[test]
    fn test_fenced_json() {
        let reply = "```json\n{\"verdict\": \"WEAK\"}\n```";
        assert_eq!(parse_json_reply(reply).unwrap()["verdict"], "WEAK");

        let reply = "```\n{\"verdict\": \"SUPPORTED\"}\n```";
        assert_eq!(parse_json_reply(reply).unwrap()["verdict"], "SUPPORTED");
    }

    #[test]
    fn test_json_inside_prose() {
        let reply = "Here is my analysis:\n{\"revised_confidence\": 0.6}\nHope this helps.";
        assert_eq!(parse_json_reply(reply).unwrap()["revised_confidence"], 0.6);
    }

    #[test]
    fn test_fallback_keeps_raw_text() {
        let value = parse_or_raw("The protein looks promising.", "raw_reasoning");
        assert_eq!(value["raw_reasoning"], "The protein looks promising.");
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(parse_json_reply("[1, 2, 3]").is_err());
    }
}
