//! Parsing of the agent CLI's `stream-json` output.
//!
//! Each stdout line is one JSON record. Only the record kinds revflow reacts
//! to are decoded; everything else is skipped.

use revflow_core::types::ReviewComment;
use serde::Deserialize;
use serde_json::Value;

/// One decoded item from the agent's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    Text(String),
    Thinking(String),
    ToolUse { name: String, input: String },
    ToolResult { output: String, is_error: bool },
    /// Final record of a session. `text` holds the agent's last answer.
    Result { text: String, is_error: bool },
    /// The process itself failed (spawn, exit status, timeout).
    Failed(String),
}

const SUMMARY_MAX_CHARS: usize = 160;

/// Decodes one stdout line into zero or more records.
///
/// Non-JSON lines and unknown record types yield nothing.
pub fn parse_line(line: &str) -> Vec<StreamRecord> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let Ok(record) = serde_json::from_str::<Value>(line) else {
        tracing::debug!(line, "skipping non-json agent output");
        return Vec::new();
    };

    match record.get("type").and_then(Value::as_str) {
        Some("assistant") => content_blocks(&record)
            .filter_map(|block| match block.get("type").and_then(Value::as_str)? {
                "text" => Some(StreamRecord::Text(str_field(block, "text"))),
                "thinking" => Some(StreamRecord::Thinking(str_field(block, "thinking"))),
                "tool_use" => Some(StreamRecord::ToolUse {
                    name: str_field(block, "name"),
                    input: summarize_input(block.get("input").unwrap_or(&Value::Null)),
                }),
                _ => None,
            })
            .collect(),
        Some("user") => content_blocks(&record)
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_result"))
            .map(|block| StreamRecord::ToolResult {
                output: truncate(&tool_result_text(block.get("content")), SUMMARY_MAX_CHARS),
                is_error: block.get("is_error").and_then(Value::as_bool).unwrap_or(false),
            })
            .collect(),
        Some("result") => {
            let is_error = record.get("is_error").and_then(Value::as_bool).unwrap_or(false)
                || record.get("subtype").and_then(Value::as_str).is_some_and(|s| s != "success");
            let text = record
                .get("result")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| str_field(&record, "subtype"));
            vec![StreamRecord::Result { text, is_error }]
        }
        _ => Vec::new(),
    }
}

fn content_blocks(record: &Value) -> impl Iterator<Item = &Value> {
    record
        .pointer("/message/content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn str_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
}

fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// One-line description of a tool input: the path, command or query when
/// present, otherwise compact JSON.
pub fn summarize_input(input: &Value) -> String {
    for key in ["file_path", "path", "command", "pattern", "query", "url"] {
        if let Some(v) = input.get(key).and_then(Value::as_str) {
            return truncate(v, SUMMARY_MAX_CHARS);
        }
    }
    match input {
        Value::Null => String::new(),
        other => truncate(&other.to_string(), SUMMARY_MAX_CHARS),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}…")
}

/// Pulls the JSON object out of the agent's final answer.
///
/// Accepts a bare object, a fenced ```json block, or an object embedded in
/// surrounding prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = body.find("```") {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Some(v);
            }
        }
    }

    let open = trimmed.find('{')?;
    let close = trimmed.rfind('}')?;
    if close <= open {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[open..=close]) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ContextPayload {
    context: String,
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    #[serde(default)]
    comments: Vec<ReviewComment>,
}

fn no_json() -> String {
    "agent answer contained no JSON object".to_owned()
}

/// Parses `{"context": "..."}` from the final answer.
pub fn parse_context(text: &str) -> Result<String, String> {
    let value = extract_json(text).ok_or_else(no_json)?;
    let payload: ContextPayload =
        serde_json::from_value(value).map_err(|e| format!("malformed context payload: {e}"))?;
    Ok(payload.context)
}

/// Parses `{"comments": [...]}` from the final answer.
pub fn parse_review(text: &str) -> Result<Vec<ReviewComment>, String> {
    let value = extract_json(text).ok_or_else(no_json)?;
    let payload: ReviewPayload =
        serde_json::from_value(value).map_err(|e| format!("malformed review payload: {e}"))?;
    Ok(payload.comments)
}
