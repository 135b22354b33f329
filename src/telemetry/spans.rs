// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stage timing spans.

use std::time::{Duration, Instant};
use tracing::{info_span, Span};

use super::TaskId;

/// RAII guard for timing one workflow stage (a generator or validator round).
pub struct StageTimer {
    stage: &'static str,
    iteration: u32,
    start: Instant,
    span: Span,
}

impl StageTimer {
    /// Start timing a stage.
    pub fn start(task_id: &TaskId, stage: &'static str, iteration: u32) -> Self {
        let span = info_span!(
            "stage",
            task_id = %task_id,
            stage = stage,
            iteration = iteration,
            duration_ms = tracing::field::Empty,
            success = tracing::field::Empty,
        );

        Self {
            stage,
            iteration,
            start: Instant::now(),
            span,
        }
    }

    /// Get elapsed time so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish the stage, recording duration and success. Returns the elapsed time.
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();

        self.span
            .record("duration_ms", duration.as_secs_f64() * 1000.0);
        self.span.record("success", success);

        tracing::info!(
            parent: &self.span,
            stage = self.stage,
            iteration = self.iteration,
            "Stage complete ({:.1}s)",
            duration.as_secs_f64()
        );

        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timer_lifecycle() {
        let task_id = TaskId::from("t1");
        let timer = StageTimer::start(&task_id, "generator", 1);
        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed().as_micros() > 0);
        let elapsed = timer.finish(true);
        assert!(elapsed >= Duration::from_millis(1));
    }
}
