// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry and tracing infrastructure.
//!
//! - **Tracing**: Structured logging with spans for stage and invocation tracking
//! - **Task IDs**: Short identifiers keying every log line and trace file of one run
//!
//! # Usage
//!
//! Initialize telemetry at application startup:
//!
//! ```rust,ignore
//! use repo_expert::telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::from_verbosity(true, false))?;
//! ```
//!
//! Time a workflow stage:
//!
//! ```rust,ignore
//! use repo_expert::telemetry::{StageTimer, TaskId};
//!
//! let task_id = TaskId::new();
//! let timer = StageTimer::start(&task_id, "generator", 1);
//! // ... invoke the agent ...
//! let elapsed = timer.finish(true);
//! ```

mod correlation;
mod init;
mod spans;

pub use correlation::TaskId;
pub use init::{init_telemetry, TelemetryConfig, Verbosity};
pub use spans::StageTimer;
