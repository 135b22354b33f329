// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Subprocess invoker for the Claude CLI.
//!
//! Spawns the agent in the repository directory, consumes its `stream-json`
//! output line by line as it arrives, and enforces a hard wall-clock timeout
//! measured from process start. Every exit path reaps the child and kills
//! anything it left running in its process group.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::events::{parse_event_line, AgentEvent, ExecutionSummary};
use super::types::{AgentInvocationResult, InvocationRequest};
use super::AgentInvoker;
use crate::error::InvocationError;
use crate::trace::{TraceEvent, TracePayload, TraceSink};

/// Default agent executable.
pub const DEFAULT_AGENT_COMMAND: &str = "claude";

/// Characters of stderr kept for failure messages.
const STDERR_TAIL_CHARS: usize = 2000;

/// Grace period for draining stderr after the child exits.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// How to launch the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments placed before the generated ones.
    pub base_args: Vec<String>,
    /// Pass `--dangerously-skip-permissions`.
    pub skip_permissions: bool,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_AGENT_COMMAND.to_string(),
            base_args: Vec::new(),
            skip_permissions: true,
        }
    }
}

impl InvokerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }
}

/// Invokes the Claude CLI as a child process.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCodeInvoker {
    config: InvokerConfig,
}

impl ClaudeCodeInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Full argument list for one request, excluding the program itself.
    pub fn command_args(&self, request: &InvocationRequest) -> Vec<String> {
        let mut args = self.config.base_args.clone();
        args.extend([
            "-p".to_string(),
            request.prompt.clone(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
        ]);
        if self.config.skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        args.push("--max-turns".to_string());
        args.push(request.max_turns.to_string());
        args
    }

    fn build_command(&self, request: &InvocationRequest) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.command_args(request))
            .current_dir(&request.repository_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The agent leads its own group so tools it spawns can be killed with it.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    async fn run(
        &self,
        request: &InvocationRequest,
        sink: &dyn TraceSink,
        started: Instant,
    ) -> AgentInvocationResult {
        let mut child = match self.build_command(request).spawn() {
            Ok(child) => child,
            Err(e) => {
                return AgentInvocationResult::failed(
                    InvocationError::agent_failure(
                        format!("Failed to start '{}': {e}", self.config.program),
                        None,
                    ),
                    started.elapsed().as_secs_f64(),
                );
            }
        };
        // Declared after `child` so it drops first, including on cancellation.
        let mut group = ProcessGroup::new(child.id());

        let deadline =
            tokio::time::Instant::from_std(started) + Duration::from_secs(request.timeout_secs);
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(read_tail(stderr)));

        let Some(stdout) = child.stdout.take() else {
            group.kill();
            let _ = child.kill().await;
            abort(stderr_task);
            return AgentInvocationResult::failed(
                InvocationError::agent_failure("Agent stdout was not captured", None),
                started.elapsed().as_secs_f64(),
            );
        };

        let consumed =
            tokio::time::timeout_at(deadline, consume_stream(stdout, request, sink)).await;

        let stream = match consumed {
            Err(_) => {
                warn!(
                    timeout_secs = request.timeout_secs,
                    pid = child.id(),
                    "Agent timed out, killing process group"
                );
                group.kill();
                let _ = child.kill().await;
                abort(stderr_task);
                return AgentInvocationResult::failed(
                    InvocationError::timeout(request.timeout_secs),
                    started.elapsed().as_secs_f64(),
                );
            }
            Ok(Err(error)) => {
                warn!(error = %error, "Agent stream unreadable, killing process group");
                group.kill();
                let _ = child.kill().await;
                abort(stderr_task);
                return AgentInvocationResult::failed(error, started.elapsed().as_secs_f64());
            }
            Ok(Ok(stream)) => stream,
        };

        // The stream is finished; the process may still be running.
        let waited = tokio::time::timeout_at(deadline, child.wait()).await;
        let exit_code = match waited {
            Err(_) => {
                warn!(
                    timeout_secs = request.timeout_secs,
                    "Agent finished its stream but did not exit, killing process group"
                );
                group.kill();
                let _ = child.kill().await;
                abort(stderr_task);
                return AgentInvocationResult::failed(
                    InvocationError::timeout(request.timeout_secs),
                    started.elapsed().as_secs_f64(),
                );
            }
            Ok(Err(e)) => {
                group.kill();
                abort(stderr_task);
                return AgentInvocationResult::failed(
                    InvocationError::agent_failure(format!("Failed to wait for agent: {e}"), None),
                    started.elapsed().as_secs_f64(),
                );
            }
            Ok(Ok(status)) => status.code(),
        };

        // Background tools left by the agent hold stderr open; kill them first.
        group.kill();
        let stderr_tail = drain_stderr(stderr_task).await;
        conclude(
            stream,
            exit_code,
            &stderr_tail,
            started.elapsed().as_secs_f64(),
        )
    }
}

/// The agent's process group, killed on [`ProcessGroup::kill`] or on drop.
///
/// `kill_on_drop` only reaches the direct child; tools the agent started in
/// the background would otherwise outlive the invocation.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// Send SIGKILL to every process in the group. Idempotent.
    fn kill(&mut self) {
        let Some(leader) = self.leader.take() else {
            return;
        };
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match i32::try_from(leader) {
                Ok(pgid) => match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                    Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                    Err(e) => debug!(pgid, error = %e, "Failed to kill agent process group"),
                },
                Err(_) => debug!(leader, "Agent pid out of range for a process group"),
            }
        }
        #[cfg(not(unix))]
        let _ = leader;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[async_trait]
impl AgentInvoker for ClaudeCodeInvoker {
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            skip(self, request, sink),
            fields(
                task_id = %request.trace.task_id,
                stage = %request.trace.scope(),
                max_turns = request.max_turns,
                timeout_secs = request.timeout_secs,
            )
        )
    )]
    async fn invoke(
        &self,
        request: &InvocationRequest,
        sink: &dyn TraceSink,
    ) -> AgentInvocationResult {
        sink.record(TraceEvent::stage(
            &request.trace,
            TracePayload::InvocationStarted {
                repository: request.repository_path.display().to_string(),
                prompt: request.prompt.clone(),
            },
        ));

        let started = Instant::now();
        let result = self.run(request, sink, started).await;
        let wall_clock = started.elapsed().as_secs_f64();

        debug!(
            success = result.success,
            exit_code = ?result.exit_code,
            duration_secs = wall_clock,
            "Agent invocation finished"
        );

        sink.record(TraceEvent::stage(
            &request.trace,
            TracePayload::InvocationFinished {
                duration_seconds: wall_clock,
                exit_code: result.exit_code,
                timed_out: result.error.as_ref().is_some_and(|e| e.is_timeout()),
                error: result.error_description(),
            },
        ));

        result
    }

    fn name(&self) -> &str {
        &self.config.program
    }
}

/// What the stream produced before stdout closed.
#[derive(Debug, Default)]
struct StreamOutcome {
    final_output: Option<String>,
    summary: Option<ExecutionSummary>,
}

async fn consume_stream(
    stdout: ChildStdout,
    request: &InvocationRequest,
    sink: &dyn TraceSink,
) -> Result<StreamOutcome, InvocationError> {
    let mut lines = BufReader::new(stdout).lines();
    let mut outcome = StreamOutcome::default();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| InvocationError::protocol(format!("Failed to read agent output: {e}")))?
    {
        for event in parse_event_line(&line)? {
            match &event {
                AgentEvent::FinalOutput { text } => outcome.final_output = Some(text.clone()),
                AgentEvent::ExecutionSummary(summary) => outcome.summary = Some(summary.clone()),
                _ => {}
            }
            sink.record(TraceEvent::stage(&request.trace, TracePayload::Agent(event)));
        }
        // `result` is terminal. Inherited stdout may stay open after it.
        if outcome.summary.is_some() {
            break;
        }
    }

    Ok(outcome)
}

/// Turn a fully consumed stream and exit status into a result.
fn conclude(
    stream: StreamOutcome,
    exit_code: Option<i32>,
    stderr_tail: &str,
    elapsed_secs: f64,
) -> AgentInvocationResult {
    let duration = stream
        .summary
        .as_ref()
        .and_then(ExecutionSummary::duration_seconds)
        .unwrap_or(elapsed_secs);
    let cost = stream.summary.as_ref().and_then(|s| s.cost_usd);

    if let Some(text) = stream.final_output {
        return AgentInvocationResult::succeeded(text, duration, exit_code, cost);
    }

    let error = match exit_code {
        Some(0) => match &stream.summary {
            Some(summary) if summary.is_error => InvocationError::agent_failure(
                format!(
                    "Agent reported an error ({})",
                    summary.subtype.as_deref().unwrap_or("unknown")
                ),
                Some(0),
            ),
            _ => InvocationError::protocol("Agent stream ended without a final output"),
        },
        Some(code) => InvocationError::agent_failure(
            with_stderr(format!("Agent exited with code {code}"), stderr_tail),
            Some(code),
        ),
        None => InvocationError::agent_failure(
            with_stderr("Agent terminated by signal".to_string(), stderr_tail),
            None,
        ),
    };

    AgentInvocationResult::failed(error, duration)
}

fn with_stderr(message: String, stderr_tail: &str) -> String {
    let stderr_tail = stderr_tail.trim();
    if stderr_tail.is_empty() {
        message
    } else {
        format!("{message}: {stderr_tail}")
    }
}

async fn read_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!(error = %e, "Failed to read agent stderr");
    }
    let text = String::from_utf8_lossy(&buf);
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        text.into_owned()
    } else {
        text.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}

async fn drain_stderr(task: Option<JoinHandle<String>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match tokio::time::timeout(STDERR_DRAIN, &mut task).await {
        Ok(Ok(tail)) => tail,
        _ => {
            task.abort();
            String::new()
        }
    }
}

fn abort(task: Option<JoinHandle<String>>) {
    if let Some(task) = task {
        task.abort();
    }
}
