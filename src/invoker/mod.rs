// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! External agent invocation.
//!
//! The [`AgentInvoker`] trait is the seam between the workflow stages and the
//! external analysis agent. [`ClaudeCodeInvoker`] is the production
//! implementation; tests substitute scripted invokers.
//!
//! Invokers never fail by signature: timeouts, crashes and malformed streams
//! are reported through [`AgentInvocationResult::error`].

mod events;
mod process;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use events::{parse_event_line, AgentEvent, ExecutionSummary};
pub use process::{ClaudeCodeInvoker, InvokerConfig, DEFAULT_AGENT_COMMAND};
pub use types::{AgentInvocationResult, InvocationRequest, DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT_SECS};

use crate::trace::TraceSink;

/// Runs one prompt against the external agent.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke the agent. Streamed events are recorded into `sink` as they arrive.
    async fn invoke(
        &self,
        request: &InvocationRequest,
        sink: &dyn TraceSink,
    ) -> AgentInvocationResult;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// A shared invoker, as held by the stages.
pub type SharedInvoker = Arc<dyn AgentInvoker>;
