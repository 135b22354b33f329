// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Generator and validator stages.
//!
//! Both stages share one [`AgentInvoker`](crate::invoker::AgentInvoker) and
//! differ only in prompt construction and in how the result is interpreted.

mod generator;
mod prompts;
mod validator;
mod verdict;

use serde::{Deserialize, Serialize};

pub use generator::{placeholder_answer, Generator, Revision};
pub use prompts::{generator_prompt, validator_prompt};
pub use validator::{ValidationReport, Validator};
pub use verdict::{parse_verdict, ParsedVerdict, Verdict, UNPARSEABLE_VERDICT_FEEDBACK};

use crate::invoker::{DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT_SECS};

/// Per-stage invocation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSettings {
    pub max_turns: u32,
    pub timeout_secs: u64,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl StageSettings {
    pub fn new(max_turns: u32, timeout_secs: u64) -> Self {
        Self {
            max_turns,
            timeout_secs,
        }
    }
}
