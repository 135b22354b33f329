// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Workflow records, outcome and configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::invoker::AgentInvocationResult;
use crate::stages::{Revision, StageSettings, ValidationReport, Verdict};
use crate::telemetry::TaskId;

/// Default number of generator rounds.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// One completed generate/validate round. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    /// 1-based, dense and strictly increasing.
    pub iteration_index: u32,
    /// The candidate answer, or a placeholder when generation failed.
    pub generator_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_error: Option<String>,
    pub validator_verdict: Verdict,
    /// Present if and only if the verdict is not VALID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_feedback: Option<String>,
    pub generator_duration_seconds: f64,
    pub validator_duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_cost: Option<f64>,
}

impl IterationRecord {
    pub(crate) fn new(
        iteration_index: u32,
        generator_output: String,
        generation: &AgentInvocationResult,
        report: &ValidationReport,
    ) -> Self {
        Self {
            iteration_index,
            generator_output,
            generator_error: generation.error_description(),
            validator_verdict: report.verdict,
            validator_feedback: report.feedback.clone(),
            generator_duration_seconds: generation.duration_seconds,
            validator_duration_seconds: report.raw.duration_seconds,
            generator_cost: generation.cost_estimate,
            validator_cost: report.raw.cost_estimate,
        }
    }

    /// Revision input for the next round, if this round was not accepted.
    pub fn revision(&self) -> Option<Revision<'_>> {
        if self.validator_verdict.is_valid() {
            return None;
        }
        self.validator_feedback.as_deref().map(|feedback| Revision {
            previous_answer: &self.generator_output,
            verdict: self.validator_verdict,
            feedback,
        })
    }

    /// Sum of known invocation costs for this round.
    pub fn cost(&self) -> Option<f64> {
        match (self.generator_cost, self.validator_cost) {
            (None, None) => None,
            (g, v) => Some(g.unwrap_or(0.0) + v.unwrap_or(0.0)),
        }
    }
}

/// How a workflow run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// The validator accepted an answer.
    Valid,
    /// Every round was used without acceptance; the last answer is returned.
    MaxIterationsReached,
    /// The request was invalid; no agent was invoked.
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::MaxIterationsReached => "MAX_ITERATIONS_REACHED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub task_id: TaskId,
    pub final_answer: String,
    pub status: WorkflowStatus,
    pub iterations: Vec<IterationRecord>,
}

impl WorkflowOutcome {
    /// Outcome for a request rejected before any generation.
    pub fn failed(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            final_answer: reason.into(),
            status: WorkflowStatus::Failed,
            iterations: Vec::new(),
        }
    }

    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }

    /// Sum of all known invocation costs, if any were reported.
    pub fn total_cost(&self) -> Option<f64> {
        self.iterations
            .iter()
            .filter_map(IterationRecord::cost)
            .fold(None, |total, cost| Some(total.unwrap_or(0.0) + cost))
    }

    pub fn is_valid(&self) -> bool {
        self.status == WorkflowStatus::Valid
    }
}

/// Explicit engine configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// Bounds generator rounds; each is followed by exactly one validator round.
    pub max_iterations: u32,
    pub generator: StageSettings,
    pub validator: StageSettings,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            generator: StageSettings::default(),
            validator: StageSettings::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Apply the same bounds to both stages.
    pub fn with_stage_settings(mut self, settings: StageSettings) -> Self {
        self.generator = settings;
        self.validator = settings;
        self
    }

    /// Raise zero bounds to one. The engine always runs at least one round.
    pub fn normalized(self) -> Self {
        let stage = |s: StageSettings| StageSettings::new(s.max_turns.max(1), s.timeout_secs.max(1));
        Self {
            max_iterations: self.max_iterations.max(1),
            generator: stage(self.generator),
            validator: stage(self.validator),
        }
    }
}
