//! Tool Parser (base spec §4.4): post-stream JSON hygiene, `{name, arguments}`
//! validation, and extraction of a function call from free text. Every function here
//! is a small pure predicate, per the base spec's Design Notes, grounded on
//! `ensure_valid_json` / `is_valid_function_call_response` / `is_complex_vector_search`
//! / `extract_tool_invocations` in the source this spec was distilled from.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A parsed, validated function call.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedFunctionCall {
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
}

static TRAILING_COMMA_OBJ: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());
static TRAILING_COMMA_ARR: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());
static MD_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|python)?\s*(.*?)\s*```$").unwrap());
/// Non-recursive scan for an embedded `{ ... "name": "..." ... "arguments": { ... } }`
/// object inside a larger block of free text.
static CANDIDATE_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\{[^{}]*"name"\s*:\s*"[^"]*"[^{}]*"arguments"\s*:\s*\{.*?\}\s*\}"#).unwrap()
});

/// Replaces "smart" quotes with their ASCII equivalents.
fn normalize_smart_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(caps) = MD_FENCE.captures(trimmed) {
        caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()
    } else {
        trimmed.to_string()
    }
}

/// Hygiene pass: smart-quote normalization, markdown-fence stripping, single→double
/// quote repair (only when no double quote is present at all), trailing-comma repair.
/// Mirrors `ensure_valid_json` exactly.
pub fn ensure_valid_json(text: &str) -> String {
    let text = normalize_smart_quotes(text);
    let text = strip_markdown_fence(&text);
    let text = if !text.contains('"') && text.contains('\'') {
        text.replace('\'', "\"")
    } else {
        text
    };
    let text = TRAILING_COMMA_OBJ.replace_all(&text, "}").to_string();
    TRAILING_COMMA_ARR.replace_all(&text, "]").to_string()
}

/// `{name, arguments}` shape validation (base spec §4.4, §8 universal invariant):
/// top-level object with exactly the required keys, `name` a non-empty string,
/// `arguments` an object whose values are all scalars (no list, no nested object) —
/// except for the `vector_store_search` tool, where a `$`-operator filter is allowed
/// per base spec §4.4 (see [`is_complex_vector_search`]).
pub fn is_valid_function_call_response(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let Some(name) = obj.get("name").and_then(Value::as_str) else {
        return false;
    };
    if name.is_empty() {
        return false;
    }
    let Some(arguments) = obj.get("arguments").and_then(Value::as_object) else {
        return false;
    };
    if name == "vector_store_search" {
        arguments.values().all(|v| is_scalar(v) || is_complex_vector_search(v))
    } else {
        arguments.values().all(is_scalar)
    }
}

fn is_scalar(v: &Value) -> bool {
    !v.is_array() && !v.is_object()
}

/// Permits nested objects in a vector-search filter only when every key at a given
/// nesting level is a `$`-prefixed operator; rejects a list at any depth.
pub fn is_complex_vector_search(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().all(|(k, v)| {
            if k.starts_with('$') {
                match v {
                    Value::Object(_) => is_complex_vector_search(v),
                    Value::Array(items) => items.iter().all(|item| match item {
                        Value::Object(_) => is_complex_vector_search(item),
                        _ => is_scalar(item),
                    }),
                    other => is_scalar(other),
                }
            } else {
                match v {
                    Value::Array(_) => false,
                    Value::Object(_) => is_complex_vector_search(v),
                    _ => true,
                }
            }
        }),
        _ => is_scalar(value),
    }
}

/// Attempts to parse `text` (after [`ensure_valid_json`]) as a single JSON object and
/// validate it as a function call. Falls back to scanning for an embedded candidate
/// object only if the direct parse does not already yield a valid call, per the
/// source's fallback ordering (primary JSON path first, `extract_tool_invocations`
/// only when nothing was found there).
pub fn parse_function_call(text: &str) -> Option<ParsedFunctionCall> {
    let cleaned = ensure_valid_json(text);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if let Some(call) = to_parsed_call(&value) {
            return Some(call);
        }
    }
    extract_tool_invocation(text)
}

fn to_parsed_call(value: &Value) -> Option<ParsedFunctionCall> {
    if !is_valid_function_call_response(value) {
        return None;
    }
    let obj = value.as_object()?;
    let name = obj.get("name")?.as_str()?.to_string();
    let arguments = obj.get("arguments")?.as_object()?.clone();
    Some(ParsedFunctionCall { name, arguments })
}

/// Scans free text for an embedded `{"name": ..., "arguments": {...}}` candidate and
/// validates the first match that parses and passes [`is_valid_function_call_response`].
fn extract_tool_invocation(text: &str) -> Option<ParsedFunctionCall> {
    for m in CANDIDATE_OBJECT.find_iter(text) {
        let candidate = ensure_valid_json(m.as_str());
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            if let Some(call) = to_parsed_call(&value) {
                return Some(call);
            }
        }
    }
    None
}
