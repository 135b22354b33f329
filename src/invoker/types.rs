// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Invocation request and result types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::InvocationError;
use crate::trace::TraceContext;

/// Default tool round trips the agent may perform per invocation.
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Default wall-clock bound per invocation, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// One call to the external analysis agent.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Prompt handed to the agent.
    pub prompt: String,
    /// Working directory of the agent process.
    pub repository_path: PathBuf,
    /// Passed through to the agent, which enforces it.
    pub max_turns: u32,
    /// Hard wall-clock bound measured from process start.
    pub timeout_secs: u64,
    /// Where streamed events are traced.
    pub trace: TraceContext,
}

/// Outcome of one invocation. Never raised as an error: failures live in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInvocationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<InvocationError>,
}

impl AgentInvocationResult {
    /// A clean completion.
    pub fn succeeded(
        output_text: impl Into<String>,
        duration_seconds: f64,
        exit_code: Option<i32>,
        cost_estimate: Option<f64>,
    ) -> Self {
        Self {
            success: true,
            output_text: Some(output_text.into()),
            duration_seconds,
            exit_code,
            cost_estimate,
            error: None,
        }
    }

    /// A failed invocation. Any partial output is discarded.
    pub fn failed(error: InvocationError, duration_seconds: f64) -> Self {
        Self {
            success: false,
            output_text: None,
            duration_seconds,
            exit_code: error.exit_code,
            cost_estimate: None,
            error: Some(error),
        }
    }

    /// The output text, or an empty string.
    pub fn text(&self) -> &str {
        self.output_text.as_deref().unwrap_or("")
    }

    /// Human-readable description of the failure, if any.
    pub fn error_description(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(match &self.error {
            Some(error) => error.to_string(),
            None => "Agent invocation failed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvocationErrorKind;

    #[test]
    fn test_failed_result_carries_exit_code() {
        let result =
            AgentInvocationResult::failed(InvocationError::agent_failure("crashed", Some(3)), 0.5);
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.output_text.is_none());
        assert_eq!(
            result.error.as_ref().map(|e| e.kind),
            Some(InvocationErrorKind::AgentFailure)
        );
        assert_eq!(
            result.error_description().as_deref(),
            Some("AGENT_FAILURE: crashed")
        );
    }

    #[test]
    fn test_succeeded_result() {
        let result = AgentInvocationResult::succeeded("answer", 2.0, Some(0), None);
        assert!(result.success);
        assert_eq!(result.text(), "answer");
        assert!(result.error_description().is_none());
    }

    #[test]
    fn test_result_json_omits_missing_fields() {
        let result = AgentInvocationResult::succeeded("ok", 1.0, None, None);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("cost_estimate").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["success"], true);
    }
}
