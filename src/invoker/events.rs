// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parsing of the agent's `stream-json` output.
//!
//! The agent writes one JSON object per line:
//!
//! ```text
//! system → (assistant | user)* → result
//! ```
//!
//! `assistant` messages carry text/thinking and `tool_use` blocks, `user`
//! messages carry `tool_result` blocks, and the closing `result` event carries
//! the final answer plus execution statistics.

use serde::{Deserialize, Serialize};

use crate::error::InvocationError;

/// A normalized event from the agent stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Intermediate reasoning or narration.
    Thinking { text: String },
    /// The agent called a tool.
    ToolInvocation {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// A tool returned to the agent.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    /// The agent's answer.
    FinalOutput { text: String },
    /// Statistics emitted when the agent finishes.
    ExecutionSummary(ExecutionSummary),
}

/// Statistics from the closing `result` event. All fields are best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl ExecutionSummary {
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_ms.map(|ms| ms as f64 / 1000.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEvent {
    Assistant {
        #[serde(default)]
        message: Option<RawMessage>,
    },
    User {
        #[serde(default)]
        message: Option<RawMessage>,
    },
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        is_error: Option<bool>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        num_turns: Option<u32>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
    },
    /// `system` and anything newer than this parser.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: RawContent,
}

/// Content is either a plain string or an array of blocks.
#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum RawContent {
    Blocks(Vec<RawBlock>),
    Text(String),
    #[default]
    Empty,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Option<serde_json::Value>,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Option<serde_json::Value>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

/// Parse one line of agent output into zero or more events.
///
/// Blank lines and unknown event types yield no events. A line that is not a
/// JSON object with a `type` field is a protocol error.
pub fn parse_event_line(line: &str) -> Result<Vec<AgentEvent>, InvocationError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let raw: RawEvent = serde_json::from_str(trimmed).map_err(|e| {
        InvocationError::protocol(format!(
            "Malformed agent event ({e}): {}",
            preview(trimmed, 120)
        ))
    })?;

    let events = match raw {
        RawEvent::Assistant { message } => message
            .map(|m| assistant_events(m.content))
            .unwrap_or_default(),
        RawEvent::User { message } => message
            .map(|m| tool_result_events(m.content))
            .unwrap_or_default(),
        RawEvent::Result {
            subtype,
            is_error,
            result,
            duration_ms,
            num_turns,
            total_cost_usd,
        } => {
            let is_error = is_error.unwrap_or(false);
            let mut events = Vec::with_capacity(2);
            if let Some(text) = result.filter(|_| !is_error) {
                events.push(AgentEvent::FinalOutput { text });
            }
            events.push(AgentEvent::ExecutionSummary(ExecutionSummary {
                subtype,
                is_error,
                duration_ms,
                num_turns,
                cost_usd: total_cost_usd,
            }));
            events
        }
        RawEvent::Unknown => Vec::new(),
    };

    Ok(events)
}

fn assistant_events(content: RawContent) -> Vec<AgentEvent> {
    match content {
        RawContent::Blocks(blocks) => blocks
            .into_iter()
            .filter_map(|block| match block {
                RawBlock::Text { text } if !text.trim().is_empty() => {
                    Some(AgentEvent::Thinking { text })
                }
                RawBlock::Thinking {
                    thinking: Some(text),
                } if !text.trim().is_empty() => Some(AgentEvent::Thinking { text }),
                RawBlock::ToolUse { id, name, input } => Some(AgentEvent::ToolInvocation {
                    id,
                    name,
                    input: input.unwrap_or(serde_json::Value::Null),
                }),
                _ => None,
            })
            .collect(),
        RawContent::Text(text) if !text.trim().is_empty() => vec![AgentEvent::Thinking { text }],
        _ => Vec::new(),
    }
}

fn tool_result_events(content: RawContent) -> Vec<AgentEvent> {
    let RawContent::Blocks(blocks) = content else {
        return Vec::new();
    };

    blocks
        .into_iter()
        .filter_map(|block| match block {
            RawBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(AgentEvent::ToolResult {
                tool_use_id: tool_use_id.unwrap_or_default(),
                content: content.map(flatten_tool_content).unwrap_or_default(),
                is_error: is_error.unwrap_or(false),
            }),
            _ => None,
        })
        .collect()
}

/// Tool result content may be a string or an array of `{type: text, text}` parts.
fn flatten_tool_content(content: serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
