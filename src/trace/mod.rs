// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trace sink for per-task observability.
//!
//! Every workflow run emits stage-scoped [`TraceEvent`]s keyed by its
//! [`TaskId`]. Sinks are infallible by signature: a sink that cannot write
//! logs the problem and moves on, so tracing never changes workflow results.
//!
//! - [`FileTraceSink`] - `{task_id}.log` system log plus `{task_id}_agent.log` agent stream
//! - [`MemoryTraceSink`] - in-memory capture, mostly for tests
//! - [`NullTraceSink`] - discards everything

mod file;

pub use file::{init_log_dir, init_log_dirs, FileTraceSink, AGENT_LOG_SUFFIX, GITIGNORE_CONTENT};

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::invoker::AgentEvent;
use crate::stages::Verdict;
use crate::telemetry::TaskId;
use crate::workflow::WorkflowStatus;

/// Which stage of the workflow produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Generator,
    Validator,
}

impl StageKind {
    /// Display name used in system log lines.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Generator => "Generator",
            Self::Validator => "Validator",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Validator => "validator",
        }
    }
}

/// Identifies the task, stage and round an invocation belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub task_id: TaskId,
    pub stage: StageKind,
    pub iteration: u32,
}

impl TraceContext {
    pub fn new(task_id: TaskId, stage: StageKind, iteration: u32) -> Self {
        Self {
            task_id,
            stage,
            iteration,
        }
    }

    /// Scope for events emitted under this context.
    pub fn scope(&self) -> TraceScope {
        TraceScope::Stage {
            kind: self.stage,
            iteration: self.iteration,
        }
    }
}

/// The part of a run an event is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceScope {
    Workflow,
    Stage { kind: StageKind, iteration: u32 },
}

impl fmt::Display for TraceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow => f.write_str("workflow"),
            Self::Stage { kind, iteration } => write!(f, "{}_v{}", kind.as_str(), iteration),
        }
    }
}

impl Serialize for TraceScope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Structured payload of a trace event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TracePayload {
    WorkflowStarted {
        question: String,
        repository: String,
    },
    WorkflowCompleted {
        status: WorkflowStatus,
        iterations: usize,
    },
    WorkflowFailed {
        reason: String,
    },
    StageStarted,
    StageCompleted {
        duration_seconds: f64,
        success: bool,
    },
    Verdict {
        verdict: Verdict,
        #[serde(skip_serializing_if = "Option::is_none")]
        feedback: Option<String>,
    },
    MaxIterationsReached {
        max_iterations: u32,
    },
    InvocationStarted {
        repository: String,
        prompt: String,
    },
    InvocationFinished {
        duration_seconds: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        timed_out: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Agent(AgentEvent),
}

impl TracePayload {
    /// Whether this payload belongs to the agent stream log rather than the system log.
    pub fn is_agent_stream(&self) -> bool {
        matches!(
            self,
            Self::InvocationStarted { .. } | Self::InvocationFinished { .. } | Self::Agent(_)
        )
    }
}

/// One stage-scoped trace event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub task_id: TaskId,
    pub stage: TraceScope,
    pub timestamp: DateTime<Utc>,
    pub payload: TracePayload,
}

impl TraceEvent {
    /// Event scoped to the whole workflow run.
    pub fn workflow(task_id: &TaskId, payload: TracePayload) -> Self {
        Self {
            task_id: task_id.clone(),
            stage: TraceScope::Workflow,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Event scoped to one stage round.
    pub fn stage(context: &TraceContext, payload: TracePayload) -> Self {
        Self {
            task_id: context.task_id.clone(),
            stage: context.scope(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Level, message and details for the human-readable system log.
    ///
    /// Returns `None` for agent stream payloads.
    pub fn system_line(&self) -> Option<(&'static str, String, Vec<(&'static str, String)>)> {
        let stage_title = match self.stage {
            TraceScope::Stage { kind, .. } => kind.title(),
            TraceScope::Workflow => "Workflow",
        };
        let iteration = match self.stage {
            TraceScope::Stage { iteration, .. } => iteration,
            TraceScope::Workflow => 0,
        };

        let line = match &self.payload {
            TracePayload::WorkflowStarted {
                question,
                repository,
            } => (
                "INFO",
                "Workflow: Started".to_string(),
                vec![("query", question.clone()), ("repo", repository.clone())],
            ),
            TracePayload::WorkflowCompleted { status, iterations } => (
                "INFO",
                format!("Workflow: Completed ({status} after {iterations} iteration(s))"),
                Vec::new(),
            ),
            TracePayload::WorkflowFailed { reason } => {
                ("ERROR", format!("Workflow: Failed - {reason}"), Vec::new())
            }
            TracePayload::StageStarted => (
                "INFO",
                format!("{stage_title}: Starting (iteration {iteration})"),
                Vec::new(),
            ),
            TracePayload::StageCompleted {
                duration_seconds,
                success,
            } => {
                let outcome = if *success { "Done" } else { "Failed" };
                let level = if *success { "INFO" } else { "WARN" };
                (
                    level,
                    format!("{stage_title}: {outcome} ({duration_seconds:.1}s)"),
                    Vec::new(),
                )
            }
            TracePayload::Verdict { verdict, feedback } => {
                let details = feedback
                    .as_ref()
                    .map(|f| vec![("feedback", f.clone())])
                    .unwrap_or_default();
                ("INFO", format!("{stage_title}: {verdict}"), details)
            }
            TracePayload::MaxIterationsReached { max_iterations } => (
                "INFO",
                format!("Max iterations ({max_iterations}) reached, returning best answer"),
                Vec::new(),
            ),
            TracePayload::InvocationStarted { .. }
            | TracePayload::InvocationFinished { .. }
            | TracePayload::Agent(_) => return None,
        };

        Some(line)
    }
}

/// Accepts trace events for observability.
pub trait TraceSink: Send + Sync {
    /// Record one event. Must not panic or block for long.
    fn record(&self, event: TraceEvent);
}

/// A sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&self, _event: TraceEvent) {}
}

/// A sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in arrival order.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events recorded for one task.
    pub fn events_for(&self, task_id: &TaskId) -> Vec<TraceEvent> {
        self.events()
            .into_iter()
            .filter(|e| &e.task_id == task_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
