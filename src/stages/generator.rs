// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Generator stage: produces a candidate answer.

use super::{generator_prompt, StageSettings, Verdict};
use crate::invoker::{AgentInvocationResult, InvocationRequest, SharedInvoker};
use crate::telemetry::{StageTimer, TaskId};
use crate::trace::{StageKind, TraceContext, TraceEvent, TracePayload, TraceSink};
use crate::workflow::WorkflowRequest;

/// Outcome of the previous round, fed into a revision prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision<'a> {
    pub previous_answer: &'a str,
    pub verdict: Verdict,
    pub feedback: &'a str,
}

/// Answer text standing in for a failed generation.
pub fn placeholder_answer(result: &AgentInvocationResult) -> String {
    let description = result
        .error_description()
        .unwrap_or_else(|| "no output".to_string());
    format!("Error: answer generation failed ({description})")
}

/// Produces candidate answers through the agent.
#[derive(Clone)]
pub struct Generator {
    invoker: SharedInvoker,
    settings: StageSettings,
}

impl Generator {
    pub fn new(invoker: SharedInvoker, settings: StageSettings) -> Self {
        Self { invoker, settings }
    }

    pub fn settings(&self) -> StageSettings {
        self.settings
    }

    /// Run one generator round.
    pub async fn generate(
        &self,
        request: &WorkflowRequest,
        revision: Option<&Revision<'_>>,
        task_id: &TaskId,
        iteration: u32,
        sink: &dyn TraceSink,
    ) -> AgentInvocationResult {
        let trace = TraceContext::new(task_id.clone(), StageKind::Generator, iteration);
        sink.record(TraceEvent::stage(&trace, TracePayload::StageStarted));
        let timer = StageTimer::start(task_id, StageKind::Generator.as_str(), iteration);

        let invocation = InvocationRequest {
            prompt: generator_prompt(request.question(), revision),
            repository_path: request.repository_path().to_path_buf(),
            max_turns: self.settings.max_turns,
            timeout_secs: self.settings.timeout_secs,
            trace: trace.clone(),
        };
        let result = self.invoker.invoke(&invocation, sink).await;

        timer.finish(result.success);
        sink.record(TraceEvent::stage(
            &trace,
            TracePayload::StageCompleted {
                duration_seconds: result.duration_seconds,
                success: result.success,
            },
        ));

        result
    }
}
