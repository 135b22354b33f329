// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Repo Expert - answers questions about a repository with a self-critique loop.
//!
//! A question and a repository path go into the [`workflow::WorkflowEngine`],
//! which asks an external code agent for an answer, has a second invocation
//! judge it, and feeds the judgment back for revision until the answer is
//! accepted or the round budget is spent.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing setup, task IDs and stage timers
//! - [`trace`] - Per-task trace sinks (system log and agent stream log)
//! - [`invoker`] - External agent subprocess invocation and stream parsing
//! - [`stages`] - Generator and validator stages, prompts and verdict parsing
//! - [`workflow`] - The generate/validate state machine
//! - [`server`] - A2A JSON-RPC transport over HTTP
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use repo_expert::invoker::ClaudeCodeInvoker;
//! use repo_expert::telemetry::TaskId;
//! use repo_expert::trace::NullTraceSink;
//! use repo_expert::workflow::{WorkflowConfig, WorkflowEngine};
//!
//! let engine = WorkflowEngine::new(
//!     Arc::new(ClaudeCodeInvoker::default()),
//!     WorkflowConfig::default(),
//!     Arc::new(NullTraceSink),
//! );
//! let outcome = engine.run("What does this repo do?", "/path/to/repo", TaskId::new()).await;
//! println!("{} ({})", outcome.final_answer, outcome.status);
//! ```

pub mod config;
pub mod error;
pub mod invoker;
pub mod server;
pub mod stages;
pub mod telemetry;
pub mod trace;
pub mod workflow;

// Re-export commonly used types at crate root
pub use error::{
    ConfigError, InvocationError, InvocationErrorKind, RequestError, Result, ServerError,
    WorkflowError,
};
pub use invoker::{
    AgentEvent, AgentInvocationResult, AgentInvoker, ClaudeCodeInvoker, InvocationRequest,
    InvokerConfig, SharedInvoker,
};
pub use stages::{StageSettings, Verdict};
pub use telemetry::TaskId;
pub use trace::{FileTraceSink, MemoryTraceSink, NullTraceSink, TraceEvent, TraceSink};
pub use workflow::{
    IterationRecord, WorkflowConfig, WorkflowEngine, WorkflowOutcome, WorkflowRequest,
    WorkflowStatus,
};

/// Repo Expert version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
