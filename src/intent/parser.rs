//! Classification of raw LLM replies.
//!
//! All of the fragile text matching lives here. A reply is a function call
//! when it carries exactly one native tool call, or when its text is a JSON
//! directive `{"function": "...", "arguments": {...}}` (optionally inside a
//! ```` ```json ```` fence). Any other non-empty text is an answer.

use serde_json::Value;

use crate::llm::LlmReply;
use crate::mcp::types::Arguments;

/// Which resolver pass produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Intent detection: a call or an answer is acceptable.
    First,
    /// Phrasing a function result: only an answer is acceptable.
    Second,
}

/// A classified reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Answer(String),
    Call { name: String, arguments: Arguments },
    Unparseable(String),
}

pub fn parse_reply(reply: &LlmReply, pass: Pass) -> ParsedReply {
    match reply.tool_calls.as_slice() {
        [] => {}
        [call] => {
            if pass == Pass::Second {
                return ParsedReply::Unparseable(
                    "function call where a final answer was expected".to_string(),
                );
            }
            return call_from_parts(&call.function.name, parse_tool_arguments(&call.function.arguments));
        }
        _ => {
            return ParsedReply::Unparseable(format!(
                "{} function calls in one reply",
                reply.tool_calls.len()
            ));
        }
    }

    let text = reply.content.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return ParsedReply::Unparseable("empty reply".to_string());
    }

    let body = strip_code_fence(text);
    if !body.starts_with('{') {
        return ParsedReply::Answer(text.to_string());
    }

    let Ok(Value::Object(mut directive)) = serde_json::from_str::<Value>(body) else {
        return ParsedReply::Unparseable("malformed function-call directive".to_string());
    };

    if pass == Pass::Second {
        return ParsedReply::Unparseable(
            "structured reply where a final answer was expected".to_string(),
        );
    }

    let name = match directive.remove("function") {
        Some(Value::String(name)) => name,
        _ => {
            return ParsedReply::Unparseable(
                "function-call directive without a function name".to_string(),
            );
        }
    };
    let arguments = match directive.remove("arguments") {
        None | Some(Value::Null) => Ok(Arguments::new()),
        Some(Value::Object(args)) => Ok(args),
        Some(_) => Err("directive arguments are not an object".to_string()),
    };
    call_from_parts(&name, arguments)
}

fn call_from_parts(name: &str, arguments: Result<Arguments, String>) -> ParsedReply {
    let name = name.trim();
    if name.is_empty() {
        return ParsedReply::Unparseable("function call without a name".to_string());
    }
    match arguments {
        Ok(arguments) => ParsedReply::Call {
            name: name.to_string(),
            arguments,
        },
        Err(reason) => ParsedReply::Unparseable(reason),
    }
}

/// Tool-call arguments arrive as a JSON string; empty means no arguments.
fn parse_tool_arguments(raw: &str) -> Result<Arguments, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(args)) => Ok(args),
        Ok(_) => Err("tool call arguments are not a JSON object".to_string()),
        Err(e) => Err(format!("tool call arguments are not valid JSON: {e}")),
    }
}

/// Unwrap a reply that is entirely one fenced code block.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ParsedReply {
        ParsedReply::Call {
            name: name.to_string(),
            arguments: args.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_plain_text_is_answer() {
        let reply = LlmReply::text("  It is sunny in Rome.  ");
        assert_eq!(
            parse_reply(&reply, Pass::First),
            ParsedReply::Answer("It is sunny in Rome.".to_string())
        );
    }

    #[test]
    fn test_native_tool_call() {
        let reply = LlmReply::tool_call("get_weather", r#"{"city":"Shenzhen"}"#);
        assert_eq!(
            parse_reply(&reply, Pass::First),
            call("get_weather", json!({"city": "Shenzhen"}))
        );
    }

    #[test]
    fn test_native_tool_call_with_empty_arguments() {
        let reply = LlmReply::tool_call("get_weather", "");
        assert_eq!(parse_reply(&reply, Pass::First), call("get_weather", json!({})));
    }

    #[test]
    fn test_json_directive() {
        let reply = LlmReply::text(r#"{"function": "get_weather", "arguments": {"city": "北京"}}"#);
        assert_eq!(
            parse_reply(&reply, Pass::First),
            call("get_weather", json!({"city": "北京"}))
        );
    }

    #[test]
    fn test_fenced_json_directive() {
        let reply = LlmReply::text(
            "```json\n{\"function\": \"unit_converter\", \"arguments\": {\"value\": 3, \"from_unit\": \"km\", \"to_unit\": \"m\"}}\n```",
        );
        assert_eq!(
            parse_reply(&reply, Pass::First),
            call(
                "unit_converter",
                json!({"value": 3, "from_unit": "km", "to_unit": "m"})
            )
        );
    }

    #[test]
    fn test_unparseable_shapes() {
        let cases = [
            LlmReply::text("   "),
            LlmReply::default(),
            LlmReply::text("{\"function\": \"get_weather\", "),
            LlmReply::text(r#"{"arguments": {"city": "Rome"}}"#),
            LlmReply::text(r#"{"function": "get_weather", "arguments": "Rome"}"#),
            LlmReply::tool_call("get_weather", "city=Rome"),
            LlmReply::tool_call("get_weather", "[\"Rome\"]"),
            LlmReply::tool_call("  ", "{}"),
        ];
        for reply in &cases {
            assert!(
                matches!(parse_reply(reply, Pass::First), ParsedReply::Unparseable(_)),
                "expected unparseable for {reply:?}"
            );
        }
    }

    #[test]
    fn test_multiple_tool_calls_are_unparseable() {
        let mut reply = LlmReply::tool_call("get_weather", r#"{"city":"Rome"}"#);
        reply.tool_calls.push(reply.tool_calls[0].clone());
        assert!(matches!(
            parse_reply(&reply, Pass::First),
            ParsedReply::Unparseable(_)
        ));
    }

    #[test]
    fn test_second_pass_rejects_calls() {
        let reply = LlmReply::tool_call("get_weather", r#"{"city":"Rome"}"#);
        assert!(matches!(
            parse_reply(&reply, Pass::Second),
            ParsedReply::Unparseable(_)
        ));

        let reply = LlmReply::text(r#"{"function": "get_weather", "arguments": {}}"#);
        assert!(matches!(
            parse_reply(&reply, Pass::Second),
            ParsedReply::Unparseable(_)
        ));

        let reply = LlmReply::text("Rome is 24°C and sunny.");
        assert!(matches!(
            parse_reply(&reply, Pass::Second),
            ParsedReply::Answer(_)
        ));
    }
}
