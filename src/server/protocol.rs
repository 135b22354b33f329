// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A2A JSON-RPC protocol types.
//!
//! Only the `message/send` method is served. Every answer is returned as a
//! single `task` object in its terminal state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::workflow::{WorkflowOutcome, WorkflowStatus};

/// A2A protocol version advertised in the agent card.
pub const PROTOCOL_VERSION: &str = "0.3.0";

/// The only supported JSON-RPC method.
pub const METHOD_MESSAGE_SEND: &str = "message/send";

/// Marker separating the question from the repository path in a message.
pub const REPO_PATH_MARKER: &str = "repo_path:";

/// Question used when the message holds only a repository path.
pub const DEFAULT_QUESTION: &str = "What is this repository about?";

/// Returned when a message carries no repository path.
pub const MISSING_REPO_PATH_HINT: &str = "Include 'repo_path: /path/to/repo' in your message";

// ============================================================================
// JSON-RPC Envelope
// ============================================================================

/// JSON-RPC error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: Value, task: Task) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            result: Some(task),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(id, codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub kind: String,
    pub text: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub parts: Vec<Part>,
}

/// A terminal A2A task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: String,
    pub status: TaskStatus,
    pub artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Task {
    fn new(id: String, state: TaskState, text: impl Into<String>) -> Self {
        Self {
            id,
            kind: "task".to_string(),
            status: TaskStatus {
                state,
                timestamp: Some(Utc::now().to_rfc3339()),
            },
            artifacts: vec![Artifact {
                parts: vec![Part::text(text)],
            }],
            metadata: None,
        }
    }

    /// Failed task telling the caller how to name the repository.
    pub fn missing_repo_path() -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            TaskState::Failed,
            MISSING_REPO_PATH_HINT,
        )
    }

    /// Task carrying a workflow's final answer.
    pub fn from_outcome(outcome: &WorkflowOutcome) -> Self {
        let state = match outcome.status {
            WorkflowStatus::Failed => TaskState::Failed,
            WorkflowStatus::Valid | WorkflowStatus::MaxIterationsReached => TaskState::Completed,
        };
        let mut task = Self::new(outcome.task_id.to_string(), state, &outcome.final_answer);

        let mut metadata = serde_json::json!({
            "workflowStatus": outcome.status,
            "iterations": outcome.iteration_count(),
        });
        if let Some(cost) = outcome.total_cost() {
            metadata["totalCostUsd"] = serde_json::json!(cost);
        }
        task.metadata = Some(metadata);
        task
    }

    /// Text of the first artifact part.
    pub fn text(&self) -> Option<&str> {
        self.artifacts
            .first()
            .and_then(|a| a.parts.first())
            .map(|p| p.text.as_str())
    }
}

// ============================================================================
// Agent Card
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Discovery document served under `/.well-known/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    pub protocol_version: String,
    pub url: String,
    pub capabilities: Value,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: "repo_expert".to_string(),
            description: "Repository expert using an external code agent with a generate/validate loop"
                .to_string(),
            version: crate::VERSION.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            url: url.into(),
            capabilities: serde_json::json!({}),
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: vec!["text/plain".to_string()],
            skills: vec![AgentSkill {
                id: "analyze_repo".to_string(),
                name: "Repository Analysis".to_string(),
                description: format!(
                    "Analyzes repositories with validation. Include '{REPO_PATH_MARKER} /path' in query."
                ),
                tags: vec!["code".to_string(), "repository".to_string()],
            }],
        }
    }
}

// ============================================================================
// Message Parsing
// ============================================================================

/// First text part of `params.message.parts`.
pub fn extract_text(params: Option<&Value>) -> Option<String> {
    params?
        .get("message")?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Split a message into the question and the repository path.
///
/// The question is everything before a case-insensitive `repo_path:` marker,
/// the path is the first whitespace-delimited token after it.
pub fn extract_params(text: &str) -> (String, Option<String>) {
    let lowered = text.to_ascii_lowercase();
    let (query, repo_path) = match lowered.find(REPO_PATH_MARKER) {
        None => (text.trim(), None),
        Some(idx) => {
            let after = &text[idx + REPO_PATH_MARKER.len()..];
            (
                text[..idx].trim(),
                after.split_whitespace().next().map(str::to_string),
            )
        }
    };

    let query = if query.is_empty() {
        DEFAULT_QUESTION.to_string()
    } else {
        query.to_string()
    };
    (query, repo_path)
}
