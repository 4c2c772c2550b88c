//! Recognition of token-usage telemetry in the agent's event stream.
//!
//! The agent CLI emits one JSON object per stdout line. Usage payloads have
//! moved between shapes across agent releases, so recognizers are tried in
//! order and the first match wins. Lines matching no recognizer carry no
//! token data; they are never an error.

use serde_json::Value;

use crate::core::telemetry::TokenEvent;

type Counters = (u64, u64, u64);

/// Try all recognizers against one stream line. `at_ms` stamps arrival time.
pub fn token_event_from_line(line: &str, at_ms: u64) -> Option<TokenEvent> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    token_event_from_value(&value, at_ms)
}

fn token_event_from_value(value: &Value, at_ms: u64) -> Option<TokenEvent> {
    const RECOGNIZERS: [fn(&Value) -> Option<Counters>; 4] = [
        top_level_usage,
        token_count_message,
        nested_message_usage,
        tokens_object,
    ];

    for recognize in RECOGNIZERS {
        if let Some((input, output, reasoning)) = recognize(value) {
            return Some(TokenEvent {
                input,
                output,
                reasoning,
                at_ms,
            });
        }
    }
    None
}

/// True if the line marks the end of an agent turn.
pub fn is_turn_boundary(line: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
        return false;
    };
    if value.get("type").and_then(Value::as_str) == Some("assistant") {
        return true;
    }
    matches!(
        value
            .pointer("/msg/type")
            .and_then(Value::as_str),
        Some("agent_message")
    )
}

/// Current shape: `{"usage": {"input_tokens": .., "output_tokens": .., "reasoning_output_tokens": ..}}`.
fn top_level_usage(value: &Value) -> Option<Counters> {
    counters_from_usage(value.get("usage")?)
}

/// Event-wrapped shape: `{"msg": {"type": "token_count", "input_tokens": .., ..}}`.
fn token_count_message(value: &Value) -> Option<Counters> {
    let msg = value.get("msg")?;
    if msg.get("type").and_then(Value::as_str) != Some("token_count") {
        return None;
    }
    counters_from_usage(msg)
}

/// Older assistant-message shape: `{"message": {"usage": {..}}}`.
fn nested_message_usage(value: &Value) -> Option<Counters> {
    counters_from_usage(value.pointer("/message/usage")?)
}

/// Compact shape: `{"tokens": {"input": .., "output": .., "reasoning": ..}}`.
fn tokens_object(value: &Value) -> Option<Counters> {
    let tokens = value.get("tokens")?;
    let input = tokens.get("input").and_then(Value::as_u64);
    let output = tokens.get("output").and_then(Value::as_u64);
    if input.is_none() && output.is_none() {
        return None;
    }
    let reasoning = tokens
        .get("reasoning")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Some((input.unwrap_or(0), output.unwrap_or(0), reasoning))
}

fn counters_from_usage(usage: &Value) -> Option<Counters> {
    let input = usage.get("input_tokens").and_then(Value::as_u64);
    let output = usage.get("output_tokens").and_then(Value::as_u64);
    if input.is_none() && output.is_none() {
        return None;
    }
    let reasoning = usage
        .get("reasoning_output_tokens")
        .or_else(|| usage.get("reasoning_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Some((input.unwrap_or(0), output.unwrap_or(0), reasoning))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_top_level_usage() {
        let line = r#"{"usage": {"input_tokens": 5, "output_tokens": 10, "reasoning_output_tokens": 2}}"#;
        let event = token_event_from_line(line, 7).expect("event");
        assert_eq!((event.input, event.output, event.reasoning), (5, 10, 2));
        assert_eq!(event.at_ms, 7);
    }

    #[test]
    fn recognizes_token_count_message() {
        let line = r#"{"id": "e1", "msg": {"type": "token_count", "input_tokens": 3, "output_tokens": 4}}"#;
        let event = token_event_from_line(line, 0).expect("event");
        assert_eq!((event.input, event.output, event.reasoning), (3, 4, 0));
    }

    #[test]
    fn recognizes_nested_message_usage() {
        let line = r#"{"type": "assistant", "message": {"usage": {"input_tokens": 8, "output_tokens": 9}}}"#;
        let event = token_event_from_line(line, 0).expect("event");
        assert_eq!((event.input, event.output), (8, 9));
    }

    #[test]
    fn recognizes_compact_tokens_object() {
        let line = r#"{"tokens": {"input": 1, "output": 2, "reasoning": 3}}"#;
        let event = token_event_from_line(line, 0).expect("event");
        assert_eq!((event.input, event.output, event.reasoning), (1, 2, 3));
    }

    #[test]
    fn unrecognized_shapes_yield_no_token_data() {
        assert!(token_event_from_line(r#"{"type": "system", "subtype": "init"}"#, 0).is_none());
        assert!(token_event_from_line("not json at all", 0).is_none());
        assert!(token_event_from_line(r#"{"usage": {"cost_usd": 0.2}}"#, 0).is_none());
    }

    #[test]
    fn first_matching_recognizer_wins() {
        // Both top-level usage and a tokens object present; top-level wins.
        let line = r#"{"usage": {"input_tokens": 5, "output_tokens": 5}, "tokens": {"input": 9, "output": 9}}"#;
        let event = token_event_from_line(line, 0).expect("event");
        assert_eq!(event.input, 5);
    }

    #[test]
    fn turn_boundaries_are_detected_across_shapes() {
        assert!(is_turn_boundary(r#"{"type": "assistant", "message": {}}"#));
        assert!(is_turn_boundary(r#"{"msg": {"type": "agent_message"}}"#));
        assert!(!is_turn_boundary(r#"{"msg": {"type": "token_count"}}"#));
        assert!(!is_turn_boundary("plain text"));
    }
}
