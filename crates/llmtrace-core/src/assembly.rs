//! Trace assembly helpers
//!
//! Pure data-shaping functions converting raw call events into the
//! canonical trace record shape.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{ChatMessage, TokenUsage};

/// Serialize role-tagged messages into `{type, content}` entries.
pub fn serialize_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|msg| {
            serde_json::json!({
                "type": msg.role,
                "content": msg.content,
            })
        })
        .collect()
}

/// Extract token counters from a raw usage mapping. Missing or
/// malformed keys default to zero.
pub fn extract_token_usage(raw: &serde_json::Value) -> TokenUsage {
    let count = |key: &str| -> u32 {
        raw.get(key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };

    TokenUsage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
    }
}

/// Parse an ISO-ish timestamp string, tolerating a trailing `Z` for UTC
/// and naive timestamps (assumed UTC). Returns `None` on unparsable
/// input rather than erroring.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Naive timestamp without offset, e.g. "2024-05-01T12:00:00.123456"
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_become_type_content_entries() {
        let messages = vec![
            ChatMessage::new("system", "be helpful"),
            ChatMessage::new("human", "hi"),
        ];
        let serialized = serialize_messages(&messages);
        assert_eq!(serialized.len(), 2);
        assert_eq!(serialized[0]["type"], "system");
        assert_eq!(serialized[1]["content"], "hi");
    }

    #[test]
    fn token_usage_defaults_missing_keys_to_zero() {
        let usage = extract_token_usage(&serde_json::json!({"prompt_tokens": 10}));
        assert_eq!(
            usage,
            TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 0,
                total_tokens: 0
            }
        );

        assert_eq!(extract_token_usage(&serde_json::json!({})), TokenUsage::default());
        assert_eq!(
            extract_token_usage(&serde_json::json!({"prompt_tokens": "ten"})),
            TokenUsage::default()
        );
    }

    #[test]
    fn parses_trailing_z_as_utc() {
        let parsed = parse_timestamp("2024-05-01T12:00:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn parses_naive_timestamp_as_utc() {
        let parsed = parse_timestamp("2024-05-01T12:00:00.500").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn unparsable_input_yields_none() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("2024-13-99").is_none());
    }
}
