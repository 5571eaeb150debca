//! Interpretation of raw model output
//!
//! A model turn resolves to exactly one [`Action`]. Recognized forms:
//!
//! - `Final Answer: <text>`
//! - `Action: {"name": "...", "arguments": {...}}` (also a bare JSON object or a
//!   ```` ```json ```` fence holding one)
//! - a fenced code block, when code is allowed

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use iagent_core::ToolCall;

static FINAL_ANSWER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfinal[ \t]+answer[ \t]*:").expect("final answer regex is valid"));

// Only at the start of a line; "the corrective action: ..." in prose is not a call
static ACTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*action[ \t]*:").expect("action regex is valid"));

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(python|py|python3)?[ \t]*\r?\n(.*?)```")
        .expect("code fence regex is valid")
});

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:json|JSON)[ \t]*\r?\n(.*?)```").expect("json fence regex is valid")
});

/// What the loop should do with a model turn
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ToolCall(ToolCall),
    Code(String),
    FinalAnswer(String),
    /// Nothing recognizable; carries the reason fed back to the model
    Unrecognized(String),
}

/// Parse one model turn. `allow_code` enables fenced code blocks.
pub fn parse_action(output: &str, allow_code: bool) -> Action {
    let final_at = FINAL_ANSWER_MARKER.find(output);
    let action_at = ACTION_MARKER.find(output);

    // An earlier Action wins over a trailing Final Answer the model guessed ahead of time
    if let Some(action_at) = action_at {
        let before_final = final_at.map_or(true, |final_at| action_at.start() < final_at.start());
        if before_final {
            let end = final_at.map_or(output.len(), |final_at| final_at.start());
            match tool_call_from_text(&output[action_at.end()..end]) {
                Some(call) => return Action::ToolCall(call),
                None if final_at.is_some() => {}
                None => {
                    return Action::Unrecognized(
                        "Could not parse the Action. Use: Action: {\"name\": \"<tool>\", \"arguments\": {...}}"
                            .to_string(),
                    )
                }
            }
        }
    }

    if let Some(final_at) = final_at {
        let answer = output[final_at.end()..].trim();
        return Action::FinalAnswer(answer.to_string());
    }

    if let Some(captures) = JSON_FENCE.captures(output) {
        if let Some(call) = captures.get(1).and_then(|m| tool_call_from_text(m.as_str())) {
            return Action::ToolCall(call);
        }
    }

    if allow_code {
        if let Some(code) = CODE_FENCE
            .captures(output)
            .and_then(|c| c.get(2))
            .map(|m| m.as_str().trim())
            .filter(|code| !code.is_empty())
        {
            return Action::Code(code.to_string());
        }
    } else if let Some(call) = tool_call_from_text(output) {
        return Action::ToolCall(call);
    }

    let expected = if allow_code {
        "a ```python code block or 'Final Answer: <answer>'"
    } else {
        "'Action: {\"name\": ..., \"arguments\": ...}' or 'Final Answer: <answer>'"
    };
    Action::Unrecognized(format!(
        "Could not find an action in your reply. Respond with {}.",
        expected
    ))
}

/// Parse the first JSON object in `text` as a tool call
fn tool_call_from_text(text: &str) -> Option<ToolCall> {
    let start = text.find('{')?;
    let value = serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;
    tool_call_from_value(value)
}

fn tool_call_from_value(value: Value) -> Option<ToolCall> {
    let name = value
        .get("name")
        .or_else(|| value.get("tool"))
        .or_else(|| value.get("tool_name"))
        .and_then(Value::as_str)?
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    let arguments = match value
        .get("arguments")
        .or_else(|| value.get("input"))
        .or_else(|| value.get("args"))
    {
        None | Some(Value::Null) => serde_json::json!({}),
        // Some models double-encode the arguments object
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::String(s.clone())),
        Some(other) => other.clone(),
    };

    Some(ToolCall { name, arguments })
}
