// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Validator stage: judges a candidate answer.

use super::{parse_verdict, validator_prompt, StageSettings, Verdict};
use crate::invoker::{AgentInvocationResult, InvocationRequest, SharedInvoker};
use crate::telemetry::{StageTimer, TaskId};
use crate::trace::{StageKind, TraceContext, TraceEvent, TracePayload, TraceSink};
use crate::workflow::WorkflowRequest;

/// A verdict on one candidate answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub verdict: Verdict,
    /// Present unless the verdict is VALID.
    pub feedback: Option<String>,
    pub raw: AgentInvocationResult,
}

impl ValidationReport {
    /// Interpret a validator invocation.
    ///
    /// A failed invocation is INVALID with the error as feedback, so the next
    /// round always has something to work from.
    pub fn interpret(raw: AgentInvocationResult) -> Self {
        if !raw.success {
            let feedback = raw
                .error_description()
                .unwrap_or_else(|| "Validator invocation failed".to_string());
            return Self {
                verdict: Verdict::Invalid,
                feedback: Some(feedback),
                raw,
            };
        }

        let parsed = parse_verdict(raw.text());
        Self {
            verdict: parsed.verdict,
            feedback: parsed.feedback,
            raw,
        }
    }
}

/// Judges candidate answers through the agent.
#[derive(Clone)]
pub struct Validator {
    invoker: SharedInvoker,
    settings: StageSettings,
}

impl Validator {
    pub fn new(invoker: SharedInvoker, settings: StageSettings) -> Self {
        Self { invoker, settings }
    }

    pub fn settings(&self) -> StageSettings {
        self.settings
    }

    /// Run one validator round against `candidate_answer`.
    pub async fn validate(
        &self,
        request: &WorkflowRequest,
        candidate_answer: &str,
        task_id: &TaskId,
        iteration: u32,
        sink: &dyn TraceSink,
    ) -> ValidationReport {
        let trace = TraceContext::new(task_id.clone(), StageKind::Validator, iteration);
        sink.record(TraceEvent::stage(&trace, TracePayload::StageStarted));
        let timer = StageTimer::start(task_id, StageKind::Validator.as_str(), iteration);

        let invocation = InvocationRequest {
            prompt: validator_prompt(request.question(), candidate_answer),
            repository_path: request.repository_path().to_path_buf(),
            max_turns: self.settings.max_turns,
            timeout_secs: self.settings.timeout_secs,
            trace: trace.clone(),
        };
        let raw = self.invoker.invoke(&invocation, sink).await;

        timer.finish(raw.success);
        sink.record(TraceEvent::stage(
            &trace,
            TracePayload::StageCompleted {
                duration_seconds: raw.duration_seconds,
                success: raw.success,
            },
        ));

        let report = ValidationReport::interpret(raw);
        sink.record(TraceEvent::stage(
            &trace,
            TracePayload::Verdict {
                verdict: report.verdict,
                feedback: report.feedback.clone(),
            },
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvocationError;
    use crate::stages::UNPARSEABLE_VERDICT_FEEDBACK;

    #[test]
    fn test_interpret_valid() {
        let report = ValidationReport::interpret(AgentInvocationResult::succeeded(
            "VALID", 1.0, Some(0), None,
        ));
        assert_eq!(report.verdict, Verdict::Valid);
        assert!(report.feedback.is_none());
    }

    #[test]
    fn test_interpret_partial_feedback() {
        let report = ValidationReport::interpret(AgentInvocationResult::succeeded(
            "PARTIAL: does not mention the worker pool",
            1.0,
            Some(0),
            None,
        ));
        assert_eq!(report.verdict, Verdict::Partial);
        assert_eq!(
            report.feedback.as_deref(),
            Some("does not mention the worker pool")
        );
    }

    #[test]
    fn test_interpret_failed_invocation_is_invalid() {
        let report = ValidationReport::interpret(AgentInvocationResult::failed(
            InvocationError::timeout(30),
            30.0,
        ));
        assert_eq!(report.verdict, Verdict::Invalid);
        assert_eq!(
            report.feedback.as_deref(),
            Some("TIMEOUT: Timed out after 30s")
        );
    }

    #[test]
    fn test_interpret_unparseable_output() {
        let report = ValidationReport::interpret(AgentInvocationResult::succeeded(
            "Looks fine to me", 1.0, Some(0), None,
        ));
        assert_eq!(report.verdict, Verdict::Invalid);
        assert_eq!(report.feedback.as_deref(), Some(UNPARSEABLE_VERDICT_FEEDBACK));
    }
}
