// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Generate/validate workflow engine.
//!
//! ```text
//! GENERATING ──▶ VALIDATING ──VALID──────────────────▶ DONE(VALID)
//!     ▲              │
//!     │              ├─PARTIAL/INVALID, rounds left──▶ GENERATING (with feedback)
//!     │              │
//!     └──────────────┘─PARTIAL/INVALID, no rounds────▶ DONE(MAX_ITERATIONS_REACHED)
//! ```
//!
//! A request that fails validation ends in DONE(FAILED) without entering
//! GENERATING. Rounds are strictly sequential: the next generation needs the
//! previous validation's feedback.

mod request;
mod types;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

#[cfg(feature = "telemetry")]
use tracing::instrument;

pub use request::WorkflowRequest;
pub use types::{
    IterationRecord, WorkflowConfig, WorkflowOutcome, WorkflowStatus, DEFAULT_MAX_ITERATIONS,
};

use crate::error::WorkflowError;
use crate::invoker::{AgentInvocationResult, SharedInvoker};
use crate::stages::{placeholder_answer, Generator, Validator};
use crate::telemetry::TaskId;
use crate::trace::{TraceEvent, TracePayload, TraceSink};

enum State {
    Generating {
        iteration: u32,
    },
    Validating {
        iteration: u32,
        generation: AgentInvocationResult,
    },
    Done(WorkflowStatus),
}

/// Drives generator and validator rounds for one request at a time.
///
/// The engine holds no per-run state, so one instance can serve concurrent
/// requests behind an `Arc`.
#[derive(Clone)]
pub struct WorkflowEngine {
    generator: Generator,
    validator: Validator,
    config: WorkflowConfig,
    sink: Arc<dyn TraceSink>,
}

impl WorkflowEngine {
    /// Create an engine whose stages share `invoker`.
    pub fn new(invoker: SharedInvoker, config: WorkflowConfig, sink: Arc<dyn TraceSink>) -> Self {
        Self::with_stage_invokers(Arc::clone(&invoker), invoker, config, sink)
    }

    /// Create an engine with separate generator and validator invokers.
    ///
    /// Zero bounds in `config` are raised to one.
    pub fn with_stage_invokers(
        generator: SharedInvoker,
        validator: SharedInvoker,
        config: WorkflowConfig,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        let config = config.normalized();
        Self {
            generator: Generator::new(generator, config.generator),
            validator: Validator::new(validator, config.validator),
            config,
            sink,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn TraceSink> {
        &self.sink
    }

    /// Run the workflow to completion. Never fails: invalid input yields a FAILED outcome.
    #[cfg_attr(
        feature = "telemetry",
        instrument(skip_all, fields(task_id = %task_id))
    )]
    pub async fn run(
        &self,
        question: &str,
        repository_path: impl AsRef<Path>,
        task_id: TaskId,
    ) -> WorkflowOutcome {
        let repository_path = repository_path.as_ref();
        self.sink.record(TraceEvent::workflow(
            &task_id,
            TracePayload::WorkflowStarted {
                question: question.to_string(),
                repository: repository_path.display().to_string(),
            },
        ));

        let request = match WorkflowRequest::new(question, repository_path) {
            Ok(request) => request,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Rejected workflow request");
                self.sink.record(TraceEvent::workflow(
                    &task_id,
                    TracePayload::WorkflowFailed {
                        reason: e.to_string(),
                    },
                ));
                return WorkflowOutcome::failed(task_id, format!("Error: {e}"));
            }
        };

        let outcome = self.execute(&request, task_id).await;

        info!(
            task_id = %outcome.task_id,
            status = %outcome.status,
            iterations = outcome.iteration_count(),
            "Workflow completed"
        );
        self.sink.record(TraceEvent::workflow(
            &outcome.task_id,
            TracePayload::WorkflowCompleted {
                status: outcome.status,
                iterations: outcome.iteration_count(),
            },
        ));
        outcome
    }

    /// Run the workflow, aborting when `cancel_rx` turns true.
    ///
    /// Cancellation drops the in-flight invocation, which kills the agent process.
    pub async fn run_with_cancel(
        &self,
        question: &str,
        repository_path: impl AsRef<Path>,
        task_id: TaskId,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        if *cancel_rx.borrow() {
            return Err(WorkflowError::Cancelled);
        }

        let cancelled_task = task_id.clone();
        tokio::select! {
            outcome = self.run(question, repository_path, task_id) => Ok(outcome),
            _ = wait_for_cancel(&mut cancel_rx) => {
                warn!(task_id = %cancelled_task, "Workflow cancelled");
                self.sink.record(TraceEvent::workflow(
                    &cancelled_task,
                    TracePayload::WorkflowFailed {
                        reason: WorkflowError::Cancelled.to_string(),
                    },
                ));
                Err(WorkflowError::Cancelled)
            }
        }
    }

    async fn execute(&self, request: &WorkflowRequest, task_id: TaskId) -> WorkflowOutcome {
        let sink = self.sink.as_ref();
        let mut iterations: Vec<IterationRecord> = Vec::new();
        let mut state = State::Generating { iteration: 1 };

        let status = loop {
            state = match state {
                State::Generating { iteration } => {
                    let revision = iterations.last().and_then(IterationRecord::revision);
                    let generation = self
                        .generator
                        .generate(request, revision.as_ref(), &task_id, iteration, sink)
                        .await;
                    State::Validating {
                        iteration,
                        generation,
                    }
                }
                State::Validating {
                    iteration,
                    generation,
                } => {
                    let answer = if generation.success {
                        generation.text().to_string()
                    } else {
                        placeholder_answer(&generation)
                    };
                    let report = self
                        .validator
                        .validate(request, &answer, &task_id, iteration, sink)
                        .await;

                    iterations.push(IterationRecord::new(iteration, answer, &generation, &report));

                    if report.verdict.is_valid() {
                        State::Done(WorkflowStatus::Valid)
                    } else if iteration >= self.config.max_iterations {
                        sink.record(TraceEvent::workflow(
                            &task_id,
                            TracePayload::MaxIterationsReached {
                                max_iterations: self.config.max_iterations,
                            },
                        ));
                        State::Done(WorkflowStatus::MaxIterationsReached)
                    } else {
                        State::Generating {
                            iteration: iteration + 1,
                        }
                    }
                }
                State::Done(status) => break status,
            };
        };

        let final_answer = iterations
            .last()
            .map(|record| record.generator_output.clone())
            .unwrap_or_default();

        WorkflowOutcome {
            task_id,
            final_answer,
            status,
            iterations,
        }
    }
}

/// Resolves once the flag turns true. Pends forever if the sender is dropped.
async fn wait_for_cancel(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if *cancel_rx.borrow() {
            return;
        }
    }
}
