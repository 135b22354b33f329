// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! File-backed trace sink.
//!
//! Per task, two append-only files live in the log directory:
//! - `{task_id}.log` - system log, one `[timestamp] [LEVEL] message` line per event
//! - `{task_id}_agent.log` - agent stream, one JSON line per agent event
//!   framed by a header and a footer per invocation

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing::{error, info, warn};

use super::{TraceEvent, TracePayload, TraceSink};
use crate::telemetry::TaskId;

/// Suffix for the agent stream log.
pub const AGENT_LOG_SUFFIX: &str = "_agent.log";

/// Content of the `.gitignore` dropped next to the logs.
pub const GITIGNORE_CONTENT: &str = "*\n!.gitignore\n";

const RULE: &str = "================================================================================";

/// Create `<base>/tmp/logs` and `<base>/tmp/.gitignore`, returning the logs path.
pub fn init_log_dirs(base: &Path) -> io::Result<PathBuf> {
    let tmp = base.join("tmp");
    let logs = tmp.join("logs");
    fs::create_dir_all(&logs)?;
    write_gitignore(&tmp)?;
    Ok(logs)
}

/// Create an explicitly configured log directory with its own `.gitignore`.
pub fn init_log_dir(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    write_gitignore(dir)?;
    Ok(dir.to_path_buf())
}

fn write_gitignore(dir: &Path) -> io::Result<()> {
    let gitignore = dir.join(".gitignore");
    if !gitignore.exists() {
        fs::write(gitignore, GITIGNORE_CONTENT)?;
    }
    Ok(())
}

/// Writes trace events to per-task log files.
///
/// Writes for one task are serialized by a per-task lock so concurrent
/// workflows never interleave lines within a file.
pub struct FileTraceSink {
    dir: PathBuf,
    echo_to_console: bool,
    locks: Mutex<HashMap<TaskId, Arc<Mutex<()>>>>,
}

impl FileTraceSink {
    /// Create a sink writing into `dir`. The directory must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            echo_to_console: true,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Disable echoing system events through `tracing`.
    pub fn quiet(mut self) -> Self {
        self.echo_to_console = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the system log for a task.
    pub fn system_log_path(&self, task_id: &TaskId) -> PathBuf {
        self.dir.join(format!("{}.log", file_stem(task_id)))
    }

    /// Path of the agent stream log for a task.
    pub fn agent_log_path(&self, task_id: &TaskId) -> PathBuf {
        self.dir
            .join(format!("{}{}", file_stem(task_id), AGENT_LOG_SUFFIX))
    }

    fn task_lock(&self, task_id: &TaskId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(task_id.clone()).or_default())
    }

    /// Drop the task's lock entry once no writer holds it.
    ///
    /// Entries live only while a write is in flight, so runs that never emit a
    /// terminal event (a dropped request) leave nothing behind.
    fn release_task(&self, task_id: &TaskId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks
            .get(task_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(task_id);
        }
    }

    /// Append one event to its file.
    ///
    /// Writes are small synchronous appends made on the caller's thread,
    /// including tokio workers. One event is a single `write_all`.
    fn write(&self, event: &TraceEvent) -> io::Result<()> {
        let (path, text) = if event.payload.is_agent_stream() {
            (self.agent_log_path(&event.task_id), format_agent_entry(event)?)
        } else {
            (self.system_log_path(&event.task_id), format_system_entry(event))
        };

        let lock = self.task_lock(&event.task_id);
        let written = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(text.as_bytes()))
        };
        self.release_task(&event.task_id, lock);
        written
    }

    /// Number of tasks with a write in flight.
    fn tracked_tasks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn echo(&self, event: &TraceEvent) {
        if !self.echo_to_console {
            return;
        }
        if let Some((level, message, _)) = event.system_line() {
            match level {
                "ERROR" => error!(task_id = %event.task_id, "[{}] {}", event.task_id, message),
                "WARN" => warn!(task_id = %event.task_id, "[{}] {}", event.task_id, message),
                _ => info!(task_id = %event.task_id, "[{}] {}", event.task_id, message),
            }
        }
    }
}

impl TraceSink for FileTraceSink {
    fn record(&self, event: TraceEvent) {
        self.echo(&event);

        if let Err(e) = self.write(&event) {
            warn!(
                task_id = %event.task_id,
                dir = %self.dir.display(),
                "Failed to write trace event: {}",
                e
            );
        }
    }
}

/// File name stem for a task, replacing anything that could escape the log directory.
fn file_stem(task_id: &TaskId) -> String {
    if task_id.is_file_safe() {
        return task_id.to_string();
    }
    let cleaned: String = task_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

fn format_system_entry(event: &TraceEvent) -> String {
    let timestamp = event
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S");

    let Some((level, message, details)) = event.system_line() else {
        return String::new();
    };

    let mut out = format!("[{timestamp}] [{level}] {message}\n");
    for (key, value) in details {
        out.push_str(&format!("  {key}: {value}\n"));
    }
    out
}

fn format_agent_entry(event: &TraceEvent) -> io::Result<String> {
    let text = match &event.payload {
        TracePayload::InvocationStarted { repository, prompt } => {
            let timestamp = event
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S");
            format!(
                "\n{RULE}\n[{timestamp}] {}\nRepo: {repository}\nPrompt: {prompt}\n{RULE}\n",
                event.stage.to_string().to_uppercase()
            )
        }
        TracePayload::InvocationFinished {
            duration_seconds,
            exit_code,
            timed_out,
            ..
        } => {
            if *timed_out {
                format!("\n[TIMEOUT after {duration_seconds:.2}s]\n")
            } else {
                let exit = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
                format!("\n[Completed in {duration_seconds:.2}s, exit: {exit}]\n")
            }
        }
        TracePayload::Agent(agent_event) => {
            let mut line = serde_json::to_string(agent_event)?;
            line.push('\n');
            line
        }
        _ => String::new(),
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::AgentEvent;
    use crate::trace::{StageKind, TraceContext};
    use tempfile::TempDir;

    fn context(task: &str) -> TraceContext {
        TraceContext::new(TaskId::from(task), StageKind::Generator, 1)
    }

    #[test]
    fn test_init_log_dirs_creates_gitignore() {
        let temp = TempDir::new().unwrap();
        let logs = init_log_dirs(temp.path()).unwrap();

        assert!(logs.ends_with("tmp/logs"));
        assert!(logs.is_dir());
        let gitignore = fs::read_to_string(temp.path().join("tmp/.gitignore")).unwrap();
        assert_eq!(gitignore, GITIGNORE_CONTENT);
    }

    #[test]
    fn test_init_log_dirs_keeps_existing_gitignore() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("tmp")).unwrap();
        fs::write(temp.path().join("tmp/.gitignore"), "custom\n").unwrap();

        init_log_dirs(temp.path()).unwrap();
        let gitignore = fs::read_to_string(temp.path().join("tmp/.gitignore")).unwrap();
        assert_eq!(gitignore, "custom\n");
    }

    #[test]
    fn test_system_and_agent_logs_are_separate() {
        let temp = TempDir::new().unwrap();
        let sink = FileTraceSink::new(temp.path()).quiet();
        let ctx = context("task0001");

        sink.record(TraceEvent::stage(&ctx, TracePayload::StageStarted));
        sink.record(TraceEvent::stage(
            &ctx,
            TracePayload::InvocationStarted {
                repository: "/repo".to_string(),
                prompt: "What is this?".to_string(),
            },
        ));
        sink.record(TraceEvent::stage(
            &ctx,
            TracePayload::Agent(AgentEvent::FinalOutput {
                text: "An answer".to_string(),
            }),
        ));
        sink.record(TraceEvent::stage(
            &ctx,
            TracePayload::InvocationFinished {
                duration_seconds: 1.5,
                exit_code: Some(0),
                timed_out: false,
                error: None,
            },
        ));

        let system = fs::read_to_string(sink.system_log_path(&ctx.task_id)).unwrap();
        assert!(system.contains("[INFO] Generator: Starting (iteration 1)"));
        assert!(!system.contains("An answer"));

        let agent = fs::read_to_string(sink.agent_log_path(&ctx.task_id)).unwrap();
        assert!(agent.contains("GENERATOR_V1"));
        assert!(agent.contains("Repo: /repo"));
        assert!(agent.contains("\"final_output\""));
        assert!(agent.contains("[Completed in 1.50s, exit: 0]"));
    }

    #[test]
    fn test_timeout_footer() {
        let temp = TempDir::new().unwrap();
        let sink = FileTraceSink::new(temp.path()).quiet();
        let ctx = context("task0002");

        sink.record(TraceEvent::stage(
            &ctx,
            TracePayload::InvocationFinished {
                duration_seconds: 1.0,
                exit_code: None,
                timed_out: true,
                error: Some("TIMEOUT: Timed out after 1s".to_string()),
            },
        ));

        let agent = fs::read_to_string(sink.agent_log_path(&ctx.task_id)).unwrap();
        assert!(agent.contains("[TIMEOUT after 1.00s]"));
    }

    #[test]
    fn test_workflow_details_are_indented() {
        let temp = TempDir::new().unwrap();
        let sink = FileTraceSink::new(temp.path()).quiet();
        let task = TaskId::from("task0003");

        sink.record(TraceEvent::workflow(
            &task,
            TracePayload::WorkflowStarted {
                question: "How does auth work?".to_string(),
                repository: "/srv/app".to_string(),
            },
        ));

        let system = fs::read_to_string(sink.system_log_path(&task)).unwrap();
        assert!(system.contains("Workflow: Started"));
        assert!(system.contains("  query: How does auth work?"));
        assert!(system.contains("  repo: /srv/app"));
    }

    #[test]
    fn test_unwritable_dir_does_not_panic() {
        let sink = FileTraceSink::new("/nonexistent/trace/dir").quiet();
        sink.record(TraceEvent::workflow(
            &TaskId::from("x"),
            TracePayload::WorkflowFailed {
                reason: "nope".to_string(),
            },
        ));
    }

    #[test]
    fn test_unsafe_task_id_stays_in_dir() {
        let temp = TempDir::new().unwrap();
        let sink = FileTraceSink::new(temp.path()).quiet();
        let path = sink.system_log_path(&TaskId::from("../escape"));
        assert_eq!(path.parent().unwrap(), temp.path());
    }

    #[test]
    fn test_concurrent_writes_do_not_interleave() {
        let temp = TempDir::new().unwrap();
        let sink = Arc::new(FileTraceSink::new(temp.path()).quiet());
        let task = TaskId::from("shared01");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = Arc::clone(&sink);
                let task = task.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        sink.record(TraceEvent::workflow(
                            &task,
                            TracePayload::MaxIterationsReached { max_iterations: i },
                        ));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let system = fs::read_to_string(sink.system_log_path(&task)).unwrap();
        let lines: Vec<&str> = system.lines().collect();
        assert_eq!(lines.len(), 200);
        assert_eq!(sink.tracked_tasks(), 0);
        assert!(lines
            .iter()
            .all(|l| l.contains("[INFO] Max iterations (") && l.ends_with("returning best answer")));
    }

    #[test]
    fn test_unfinished_runs_leave_no_lock_entries() {
        let temp = TempDir::new().unwrap();
        let sink = FileTraceSink::new(temp.path()).quiet();

        // Runs whose request was dropped: stage events, never a terminal event.
        for i in 0..50 {
            let ctx = context(&format!("dropped{i}"));
            sink.record(TraceEvent::stage(&ctx, TracePayload::StageStarted));
            sink.record(TraceEvent::stage(
                &ctx,
                TracePayload::Agent(AgentEvent::Thinking {
                    text: "reading".to_string(),
                }),
            ));
        }

        assert_eq!(sink.tracked_tasks(), 0);
        assert!(sink.system_log_path(&TaskId::from("dropped49")).exists());
        assert!(sink.agent_log_path(&TaskId::from("dropped49")).exists());
    }
}
